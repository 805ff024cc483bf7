use dashmap::DashSet;
use tracing::error;

use crate::errors::RegistryErrorKind;

/// Names currently being produced by a factory.
///
/// Both sets are safe for concurrent use without the cache lock, so re-entry from the
/// creating thread and attempts from other threads are detected the same way.
#[derive(Default)]
pub(crate) struct CreationTracker {
    in_creation: DashSet<String>,
    exclusions: DashSet<String>,
}

impl CreationTracker {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks `name` as currently in creation.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::CurrentlyInCreation`] if `name` is already marked and not excluded
    pub(crate) fn before_creation(&self, name: &str) -> Result<(), RegistryErrorKind> {
        if self.exclusions.contains(name) || self.in_creation.insert(name.to_owned()) {
            return Ok(());
        }

        let err = RegistryErrorKind::CurrentlyInCreation { name: name.to_owned() };
        error!("{}", err);
        Err(err)
    }

    /// # Errors
    /// Returns [`RegistryErrorKind::NotInCreation`] if `name` wasn't marked and isn't excluded
    pub(crate) fn after_creation(&self, name: &str) -> Result<(), RegistryErrorKind> {
        if self.exclusions.contains(name) || self.in_creation.remove(name).is_some() {
            return Ok(());
        }

        let err = RegistryErrorKind::NotInCreation { name: name.to_owned() };
        error!("{}", err);
        Err(err)
    }

    /// Passing `false` exempts `name` from the in-creation checks, `true` lifts the exemption.
    pub(crate) fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        if in_creation {
            self.exclusions.remove(name);
        } else {
            self.exclusions.insert(name.to_owned());
        }
    }

    #[must_use]
    pub(crate) fn is_currently_in_creation(&self, name: &str) -> bool {
        !self.exclusions.contains(name) && self.is_singleton_currently_in_creation(name)
    }

    #[must_use]
    pub(crate) fn is_singleton_currently_in_creation(&self, name: &str) -> bool {
        self.in_creation.contains(name)
    }
}
