mod alias;
mod instantiate;
mod registry;

pub use alias::AliasErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use registry::RegistryErrorKind;
