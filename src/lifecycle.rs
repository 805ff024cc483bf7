use tracing::{debug, debug_span, info_span, warn};

use crate::{alias::AliasResolver, disposable::BoxedDisposable, registry::SingletonRegistry};

impl<A: AliasResolver> SingletonRegistry<A> {
    /// Destroys the singleton registered under `name` together with everything that depends on it
    /// or is contained by it.
    ///
    /// # Notes
    /// Dependent beans are destroyed first, then the bean's own destroy callback runs,
    /// then its contained beans are destroyed. A callback error is logged and doesn't stop the teardown.
    pub fn destroy_singleton(&self, name: &str) {
        self.cache.remove(name);
        let bean = self.disposables.take(name);
        self.destroy_bean(name, bean);
    }

    /// Destroys every disposable bean in reverse registration order and clears the registry.
    ///
    /// # Warning
    /// Singleton creation fails with [`crate::RegistryErrorKind::CreationDuringDestruction`] until the call returns,
    /// so destroy callbacks can't request new singletons.
    pub fn destroy_singletons(&self) {
        let span = info_span!("destroy_singletons");
        let _guard = span.enter();

        self.cache.set_in_destruction(true);

        let names = self.disposables.names();
        debug!(count = names.len(), "Destroying singletons");
        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        self.graph.clear();
        self.cache.clear();
        debug!("Singletons destroyed");
    }

    fn destroy_bean(&self, name: &str, bean: Option<BoxedDisposable>) {
        let span = debug_span!("destroy", bean = name);
        let _guard = span.enter();

        // Dependents are taken out of the graph before recursing, so a cycle leading back here finds none
        if let Some(dependents) = self.graph.take_dependents(name) {
            debug!(?dependents, "Destroying dependent beans");
            for dependent in &dependents {
                self.destroy_singleton(dependent);
            }
        }

        if let Some(bean) = bean {
            match bean.destroy() {
                Ok(()) => debug!("Destroy callback called"),
                Err(err) => warn!("Destroy callback failed: {err:#}"),
            }
        }

        if let Some(contained) = self.graph.take_contained(name) {
            debug!(?contained, "Destroying contained beans");
            for contained in &contained {
                self.destroy_singleton(contained);
            }
        }

        self.graph.remove_references(name);
    }
}
