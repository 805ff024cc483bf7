pub(crate) mod alias;
pub(crate) mod any;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod creation;
pub(crate) mod dependency;
pub(crate) mod disposable;
pub(crate) mod errors;
pub(crate) mod lifecycle;
pub(crate) mod registry;

pub use alias::{AliasRegistry, AliasResolver};
pub use any::{downcast, instance, same_instance, Instance};
pub use cache::{SingletonMutex, SingletonMutexGuard};
pub use config::Config;
pub use dependency::DependencyGraph;
pub use disposable::Disposable;
pub use errors::{AliasErrorKind, InstantiateErrorKind, RegistryErrorKind};
pub use registry::SingletonRegistry;
