use std::sync::Arc;
use tracing::debug;

use crate::{
    alias::{AliasRegistry, AliasResolver},
    any::{downcast, Instance},
    cache::{SingletonCache, SingletonMutex},
    config::Config,
    creation::CreationTracker,
    dependency::DependencyGraph,
    disposable::{Disposable, DisposableBeans},
    errors::{InstantiateErrorKind, RegistryErrorKind},
};

/// Registry of shared instances keyed by name.
///
/// Owns the singleton cache, the in-creation bookkeeping, the dependency graph
/// and the disposal handles of one container. Teardown lives in [`Self::destroy_singletons`].
pub struct SingletonRegistry<A = AliasRegistry> {
    pub(crate) cache: SingletonCache,
    pub(crate) creation: CreationTracker,
    pub(crate) graph: DependencyGraph,
    pub(crate) disposables: DisposableBeans,
    aliases: A,
}

impl Default for SingletonRegistry<AliasRegistry> {
    fn default() -> Self {
        Self::new()
    }
}

impl SingletonRegistry<AliasRegistry> {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_config(Config::default())
    }

    #[inline]
    #[must_use]
    pub fn new_with_config(config: Config) -> Self {
        Self::with_aliases(AliasRegistry::new(config.allow_alias_overriding), config)
    }
}

impl<A: AliasResolver> SingletonRegistry<A> {
    #[must_use]
    pub fn with_aliases(aliases: A, config: Config) -> Self {
        Self {
            cache: SingletonCache::new(config.suppressed_errors_limit),
            creation: CreationTracker::new(),
            graph: DependencyGraph::new(),
            disposables: DisposableBeans::new(),
            aliases,
        }
    }

    #[inline]
    #[must_use]
    pub const fn aliases(&self) -> &A {
        &self.aliases
    }

    /// Registers a fully constructed singleton under `name`.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::AlreadyRegistered`] if an instance is already bound to `name`
    pub fn register_singleton(&self, name: &str, instance: Instance) -> Result<(), RegistryErrorKind> {
        self.cache.register(name, instance)
    }

    /// Gets the singleton registered under `name`, or its early reference if it's currently in creation.
    ///
    /// A ready singleton is read without the cache lock, so it's never blocked by a factory running
    /// on another thread. Looking up an early reference takes the lock.
    #[inline]
    #[must_use]
    pub fn get_singleton(&self, name: &str) -> Option<Instance> {
        self.get_singleton_with_early(name, true)
    }

    /// Like [`Self::get_singleton`], but an early factory is only consulted if `allow_early_reference` is set.
    /// An early reference that was already materialized is returned either way.
    #[inline]
    #[must_use]
    pub fn get_singleton_with_early(&self, name: &str, allow_early_reference: bool) -> Option<Instance> {
        self.cache.get(name, allow_early_reference, &self.creation)
    }

    /// Gets the singleton registered under `name` as `T`.
    ///
    /// Returns `None` if there is no such singleton or it isn't a `T`.
    #[must_use]
    pub fn get_singleton_as<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.get_singleton(name).and_then(downcast::<T>)
    }

    /// Gets the singleton registered under `name`, creating and caching it with `factory` if absent.
    ///
    /// # Notes
    /// The factory is invoked at most once per successful creation and may request other singletons.
    /// A cycle back to `name` has to go through [`Self::get_singleton`] with an early factory registered
    /// by [`Self::add_singleton_factory`], re-entering this method for `name` fails instead.
    ///
    /// # Errors
    /// - Returns [`RegistryErrorKind::CreationDuringDestruction`] if singletons are being destroyed
    /// - Returns [`RegistryErrorKind::CurrentlyInCreation`] if `name` is already in creation
    /// - Returns [`RegistryErrorKind::CreationFailed`] if the factory failed
    pub fn get_or_create_singleton<F>(&self, name: &str, factory: F) -> Result<Instance, RegistryErrorKind>
    where
        F: FnOnce() -> Result<Instance, InstantiateErrorKind>,
    {
        self.cache.get_or_create(name, factory, &self.creation)
    }

    /// Registers a factory used to expose an early reference to `name` while it's in creation.
    ///
    /// Does nothing if `name` is already bound to an instance.
    pub fn add_singleton_factory<F>(&self, name: &str, factory: F)
    where
        F: FnOnce() -> Instance + Send + 'static,
    {
        self.cache.add_early_factory(name, Box::new(factory));
    }

    /// Records an error for the creation in progress.
    /// It's attached to [`RegistryErrorKind::CreationFailed`] if that creation fails.
    pub fn on_suppressed_error(&self, err: impl Into<anyhow::Error>) {
        self.cache.on_suppressed_error(err.into());
    }

    /// Purges `name` from the cache, used to roll back a failed creation.
    pub fn remove_singleton(&self, name: &str) {
        self.cache.remove(name);
        debug!(bean = name, "Removed from cache");
    }

    #[must_use]
    pub fn contains_singleton(&self, name: &str) -> bool {
        self.cache.contains(name)
    }

    /// Names in registration order
    #[must_use]
    pub fn singleton_names(&self) -> Vec<String> {
        self.cache.names()
    }

    #[must_use]
    pub fn singleton_count(&self) -> usize {
        self.cache.count()
    }

    pub fn clear_singleton_cache(&self) {
        self.cache.clear();
    }

    /// Passing `false` exempts `name` from in-creation checks, `true` lifts the exemption.
    pub fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        self.creation.set_currently_in_creation(name, in_creation);
    }

    #[must_use]
    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.creation.is_currently_in_creation(name)
    }

    /// Unlike [`Self::is_currently_in_creation`], ignores exemptions.
    #[must_use]
    pub fn is_singleton_currently_in_creation(&self, name: &str) -> bool {
        self.creation.is_singleton_currently_in_creation(name)
    }

    #[must_use]
    pub fn is_in_destruction(&self) -> bool {
        self.cache.is_in_destruction()
    }

    /// Adds a destroy callback for `name`.
    /// Callbacks run in reverse registration order on [`Self::destroy_singletons`].
    pub fn register_disposable_bean(&self, name: &str, bean: impl Disposable) {
        self.disposables.register(name, Box::new(bean));
        debug!(bean = name, "Disposable bean registered");
    }

    /// Registers that `outer` contains `inner`: `inner` is destroyed as part of destroying `outer`.
    pub fn register_contained_bean(&self, inner: &str, outer: &str) {
        self.graph.register_contained(inner, outer, &self.aliases);
    }

    /// Registers that `dependent` depends on `bean`: `dependent` is destroyed before `bean`.
    pub fn register_dependent_bean(&self, bean: &str, dependent: &str) {
        self.graph.register_dependent(bean, dependent, &self.aliases);
    }

    /// Whether `dependent` depends on `bean`, directly or transitively.
    #[must_use]
    pub fn is_dependent(&self, bean: &str, dependent: &str) -> bool {
        self.graph.is_dependent(bean, dependent, &self.aliases)
    }

    #[must_use]
    pub fn has_dependent_bean(&self, bean: &str) -> bool {
        self.graph.has_dependent_bean(bean)
    }

    #[must_use]
    pub fn dependent_beans(&self, bean: &str) -> Vec<String> {
        self.graph.dependent_beans(bean)
    }

    #[must_use]
    pub fn dependencies_for_bean(&self, bean: &str) -> Vec<String> {
        self.graph.dependencies_for_bean(bean)
    }

    #[must_use]
    pub fn contained_beans(&self, bean: &str) -> Vec<String> {
        self.graph.contained_beans(bean)
    }

    #[inline]
    #[must_use]
    pub const fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// The lock the registry creates singletons under.
    ///
    /// # Notes
    /// Extensions doing multi-step creation on their own should hold it to stay consistent with the registry.
    /// The lock is re-entrant, so registry calls made while holding it don't deadlock.
    #[inline]
    #[must_use]
    pub const fn singleton_mutex(&self) -> &SingletonMutex {
        self.cache.mutex()
    }
}
