use std::{any::Any, sync::Arc};

/// Shared handle to a singleton object.
///
/// Identity of a singleton is the identity of the allocation behind the handle,
/// so two handles refer to the same singleton iff [`same_instance`] returns `true`.
pub type Instance = Arc<dyn Any + Send + Sync>;

#[inline]
#[must_use]
pub fn instance<T: Send + Sync + 'static>(value: T) -> Instance {
    Arc::new(value)
}

#[inline]
#[must_use]
pub fn downcast<T: Send + Sync + 'static>(instance: Instance) -> Option<Arc<T>> {
    instance.downcast().ok()
}

#[inline]
#[must_use]
pub fn same_instance(a: &Instance, b: &Instance) -> bool {
    Arc::ptr_eq(a, b)
}
