use super::registry::RegistryErrorKind;

/// Error returned by a singleton factory.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    /// A nested registry call made by the factory failed
    #[error(transparent)]
    Registry(Box<RegistryErrorKind>),
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

impl From<RegistryErrorKind> for InstantiateErrorKind {
    #[inline]
    fn from(err: RegistryErrorKind) -> Self {
        Self::Registry(Box::new(err))
    }
}
