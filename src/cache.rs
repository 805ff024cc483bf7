use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::{cell::RefCell, collections::HashMap, mem};
use tracing::{debug, error, info_span};

use crate::{
    any::Instance,
    creation::CreationTracker,
    errors::{InstantiateErrorKind, RegistryErrorKind},
};

/// Callback materializing an early reference to a singleton still in creation.
pub(crate) type EarlyFactory = Box<dyn FnOnce() -> Instance + Send>;

/// Slot of a singleton that isn't ready yet.
pub(crate) enum Entry {
    /// Early access factory, invoked at most once
    Pending(EarlyFactory),
    /// Reference exposed before the factory returned
    Early(Instance),
}

pub(crate) struct CacheState {
    entries: HashMap<String, Entry>,
    registered: IndexSet<String>,
    suppressed: Option<Vec<anyhow::Error>>,
    in_destruction: bool,
}

impl CacheState {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            registered: IndexSet::new(),
            suppressed: None,
            in_destruction: false,
        }
    }

    fn remove(&mut self, name: &str) {
        self.entries.remove(name);
        self.registered.shift_remove(name);
    }
}

/// The lock guarding every singleton cache mutation and the creation protocol.
///
/// The lock is re-entrant, so a factory holding it may call back into the registry from the same thread.
pub struct SingletonMutex {
    inner: ReentrantMutex<RefCell<CacheState>>,
}

impl SingletonMutex {
    fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(CacheState::new())),
        }
    }

    /// Blocks until the lock is acquired by the current thread.
    #[inline]
    #[must_use]
    pub fn lock(&self) -> SingletonMutexGuard<'_> {
        SingletonMutexGuard {
            guard: self.inner.lock(),
        }
    }
}

pub struct SingletonMutexGuard<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<CacheState>>,
}

/// Ready instances are published in a concurrent map, so reading them never waits for the cache lock.
/// The map is only written with the lock held.
pub(crate) struct SingletonCache {
    mutex: SingletonMutex,
    ready: DashMap<String, Instance>,
    suppressed_errors_limit: usize,
}

impl SingletonCache {
    #[must_use]
    pub(crate) fn new(suppressed_errors_limit: usize) -> Self {
        Self {
            mutex: SingletonMutex::new(),
            ready: DashMap::new(),
            suppressed_errors_limit,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) const fn mutex(&self) -> &SingletonMutex {
        &self.mutex
    }

    #[inline]
    fn ready(&self, name: &str) -> Option<Instance> {
        self.ready.get(name).map(|instance| instance.value().clone())
    }

    /// Promotes `instance` to ready, dropping any early remnants of `name`.
    fn add_ready(&self, state: &mut CacheState, name: &str, instance: Instance) {
        state.entries.remove(name);
        state.registered.insert(name.to_owned());
        self.ready.insert(name.to_owned(), instance);
    }

    /// # Errors
    /// Returns [`RegistryErrorKind::AlreadyRegistered`] if a ready instance is already bound to `name`
    pub(crate) fn register(&self, name: &str, instance: Instance) -> Result<(), RegistryErrorKind> {
        let SingletonMutexGuard { guard } = self.mutex.lock();
        let mut state = guard.borrow_mut();

        if self.ready.contains_key(name) {
            let err = RegistryErrorKind::AlreadyRegistered { name: name.to_owned() };
            error!("{}", err);
            return Err(err);
        }
        self.add_ready(&mut state, name, instance);
        debug!(bean = name, "Registered");
        Ok(())
    }

    /// Registers a factory for an early reference, no-op if `name` is already ready.
    pub(crate) fn add_early_factory(&self, name: &str, factory: EarlyFactory) {
        let SingletonMutexGuard { guard } = self.mutex.lock();
        let mut state = guard.borrow_mut();

        if self.ready.contains_key(name) {
            return;
        }
        state.entries.insert(name.to_owned(), Entry::Pending(factory));
        state.registered.insert(name.to_owned());
        debug!(bean = name, "Early factory registered");
    }

    /// Returns the ready instance, or an early reference if `name` is in creation.
    ///
    /// Only the early reference path takes the cache lock. An early factory is consumed
    /// on first use and its product is kept as the early reference.
    pub(crate) fn get(&self, name: &str, allow_early_reference: bool, tracker: &CreationTracker) -> Option<Instance> {
        if let Some(instance) = self.ready(name) {
            return Some(instance);
        }

        let SingletonMutexGuard { guard } = self.mutex.lock();

        let factory = {
            let mut state = guard.borrow_mut();
            if let Some(instance) = self.ready(name) {
                return Some(instance);
            }
            let in_creation = tracker.is_singleton_currently_in_creation(name);
            match state.entries.get(name) {
                Some(Entry::Early(instance)) if in_creation => return Some(instance.clone()),
                Some(Entry::Pending(_)) if in_creation && allow_early_reference => {}
                _ => return None,
            }
            let Some(Entry::Pending(factory)) = state.entries.remove(name) else {
                return None;
            };
            factory
        };

        // No borrow is held here, the early factory may call back into the cache
        let instance = factory();

        // The early factory may have registered `name` itself
        if let Some(ready) = self.ready(name) {
            debug!(bean = name, "Instance became ready while exposing early reference");
            return Some(ready);
        }
        guard
            .borrow_mut()
            .entries
            .insert(name.to_owned(), Entry::Early(instance.clone()));
        debug!(bean = name, "Early reference exposed");
        Some(instance)
    }

    /// Returns the ready instance for `name`, creating it with `factory` if absent.
    ///
    /// The factory runs under the cache lock. It may request other singletons, and those
    /// may reach `name` again through [`Self::get`], which then yields the early reference.
    /// If the factory panics, the in-creation mark and the suppressed errors window are
    /// rolled back before the panic propagates.
    ///
    /// # Errors
    /// - Returns [`RegistryErrorKind::CreationDuringDestruction`] if the registry is being destroyed
    /// - Returns [`RegistryErrorKind::CurrentlyInCreation`] if `name` is already in creation
    /// - Returns [`RegistryErrorKind::CreationFailed`] if the factory failed
    /// - Returns [`RegistryErrorKind::NotInCreation`] if the in-creation mark disappeared during the call
    pub(crate) fn get_or_create<F>(&self, name: &str, factory: F, tracker: &CreationTracker) -> Result<Instance, RegistryErrorKind>
    where
        F: FnOnce() -> Result<Instance, InstantiateErrorKind>,
    {
        let span = info_span!("get_or_create", bean = name);
        let _span_guard = span.enter();

        if let Some(instance) = self.ready(name) {
            debug!("Found in cache");
            return Ok(instance);
        }

        let SingletonMutexGuard { guard } = self.mutex.lock();

        let record_suppressed = {
            let mut state = guard.borrow_mut();
            if let Some(instance) = self.ready(name) {
                debug!("Found in cache");
                return Ok(instance);
            }
            if state.in_destruction {
                let err = RegistryErrorKind::CreationDuringDestruction { name: name.to_owned() };
                error!("{}", err);
                return Err(err);
            }
            debug!("Creating shared instance");

            tracker.before_creation(name)?;

            if state.suppressed.is_none() {
                state.suppressed = Some(Vec::new());
                true
            } else {
                false
            }
        };

        let creation = CreationGuard {
            cache: self,
            state: &guard,
            tracker,
            name,
            record_suppressed,
        };
        let result = factory();
        let (suppressed, after_creation) = creation.finish();

        let mut state = guard.borrow_mut();
        match result {
            Ok(instance) => {
                after_creation?;
                self.add_ready(&mut state, name, instance.clone());
                debug!("Cached");
                Ok(instance)
            }
            Err(err) => {
                if let Some(instance) = self.ready(name) {
                    debug!(%err, "Instance appeared during failed creation, using it");
                    after_creation?;
                    return Ok(instance);
                }
                state.remove(name);
                after_creation?;

                let err = RegistryErrorKind::CreationFailed {
                    name: name.to_owned(),
                    source: Box::new(err),
                    suppressed: suppressed.unwrap_or_default(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Records `err` for the creation currently running, if any.
    pub(crate) fn on_suppressed_error(&self, err: anyhow::Error) {
        let SingletonMutexGuard { guard } = self.mutex.lock();
        let mut state = guard.borrow_mut();

        if let Some(suppressed) = state.suppressed.as_mut() {
            if suppressed.len() < self.suppressed_errors_limit {
                suppressed.push(err);
            }
        }
    }

    pub(crate) fn remove(&self, name: &str) {
        let SingletonMutexGuard { guard } = self.mutex.lock();
        guard.borrow_mut().remove(name);
        self.ready.remove(name);
    }

    #[must_use]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.ready.contains_key(name)
    }

    #[must_use]
    pub(crate) fn count(&self) -> usize {
        let SingletonMutexGuard { guard } = self.mutex.lock();
        let count = guard.borrow().registered.len();
        count
    }

    #[must_use]
    pub(crate) fn names(&self) -> Vec<String> {
        let SingletonMutexGuard { guard } = self.mutex.lock();
        let names = guard.borrow().registered.iter().cloned().collect();
        names
    }

    pub(crate) fn set_in_destruction(&self, in_destruction: bool) {
        let SingletonMutexGuard { guard } = self.mutex.lock();
        guard.borrow_mut().in_destruction = in_destruction;
    }

    #[must_use]
    pub(crate) fn is_in_destruction(&self) -> bool {
        let SingletonMutexGuard { guard } = self.mutex.lock();
        let in_destruction = guard.borrow().in_destruction;
        in_destruction
    }

    /// Wipes every slot and resets the destruction flag.
    pub(crate) fn clear(&self) {
        let SingletonMutexGuard { guard } = self.mutex.lock();

        // Instances are dropped once no borrow or shard lock is held, dropping one may re-enter the cache
        let entries = {
            let mut state = guard.borrow_mut();
            state.registered.clear();
            state.in_destruction = false;
            mem::take(&mut state.entries)
        };
        let names = self.ready.iter().map(|instance| instance.key().clone()).collect::<Vec<_>>();
        let instances = names
            .iter()
            .filter_map(|name| self.ready.remove(name))
            .collect::<Vec<_>>();
        drop((entries, instances));
    }
}

/// Rolls back the bookkeeping of a creation whose factory unwound.
struct CreationGuard<'a> {
    cache: &'a SingletonCache,
    state: &'a RefCell<CacheState>,
    tracker: &'a CreationTracker,
    name: &'a str,
    record_suppressed: bool,
}

impl CreationGuard<'_> {
    /// Closes the suppressed errors window opened by this creation and clears the in-creation mark.
    fn finish(self) -> (Option<Vec<anyhow::Error>>, Result<(), RegistryErrorKind>) {
        let suppressed = if self.record_suppressed {
            self.state.borrow_mut().suppressed.take()
        } else {
            None
        };
        let after_creation = self.tracker.after_creation(self.name);
        mem::forget(self);
        (suppressed, after_creation)
    }
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        error!(bean = self.name, "Factory panicked, rolling back creation");

        let _ = self.tracker.after_creation(self.name);
        if let Ok(mut state) = self.state.try_borrow_mut() {
            if self.record_suppressed {
                state.suppressed = None;
            }
            if !self.cache.ready.contains_key(self.name) {
                state.remove(self.name);
            }
        }
    }
}
