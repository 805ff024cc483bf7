use super::instantiate::InstantiateErrorKind;

#[derive(thiserror::Error, Debug)]
pub enum RegistryErrorKind {
    #[error("Could not register singleton '{name}': there is already an instance bound")]
    AlreadyRegistered { name: String },
    #[error("Requested singleton '{name}' is currently in creation: is there an unresolvable circular reference?")]
    CurrentlyInCreation { name: String },
    #[error(
        "\
        Singleton creation of '{name}' is not allowed while singletons of this registry are in destruction. \
        Don't request a singleton from a destroy callback\
        "
    )]
    CreationDuringDestruction { name: String },
    #[error("Creation of singleton '{name}' failed ({} suppressed): {source}", .suppressed.len())]
    CreationFailed {
        name: String,
        #[source]
        source: Box<InstantiateErrorKind>,
        suppressed: Vec<anyhow::Error>,
    },
    #[error("Singleton '{name}' isn't currently in creation")]
    NotInCreation { name: String },
}

impl RegistryErrorKind {
    /// Walks nested creation failures down to the registry error that started them.
    ///
    /// A failure that wasn't caused by another registry error is its own root cause.
    #[must_use]
    pub fn root_cause(&self) -> &RegistryErrorKind {
        let mut current = self;
        while let RegistryErrorKind::CreationFailed { source, .. } = current {
            match source.as_ref() {
                InstantiateErrorKind::Registry(inner) => current = inner.as_ref(),
                InstantiateErrorKind::Custom(_) => break,
            }
        }
        current
    }
}
