use indexmap::IndexMap;
use parking_lot::Mutex;

/// Destroy callback associated with a singleton name.
///
/// A handle doesn't need a cached singleton behind it, any resource requiring ordered
/// teardown can be registered under a name.
pub trait Disposable: Send + Sync + 'static {
    /// # Errors
    /// Errors are logged by the registry and never abort a shutdown
    fn destroy(&self) -> anyhow::Result<()>;
}

pub(crate) type BoxedDisposable = Box<dyn Disposable>;

impl<F> Disposable for F
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    #[inline]
    fn destroy(&self) -> anyhow::Result<()> {
        self()
    }
}

/// Disposal handles in registration order.
#[derive(Default)]
pub(crate) struct DisposableBeans {
    beans: Mutex<IndexMap<String, BoxedDisposable>>,
}

impl DisposableBeans {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replacing a handle keeps the registration position of the name.
    pub(crate) fn register(&self, name: &str, bean: BoxedDisposable) {
        self.beans.lock().insert(name.to_owned(), bean);
    }

    #[must_use]
    pub(crate) fn take(&self, name: &str) -> Option<BoxedDisposable> {
        self.beans.lock().shift_remove(name)
    }

    /// Names in registration order.
    #[must_use]
    pub(crate) fn names(&self) -> Vec<String> {
        self.beans.lock().keys().cloned().collect()
    }
}
