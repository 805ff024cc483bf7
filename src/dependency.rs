use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;

use crate::alias::AliasResolver;

type Edges = IndexMap<String, IndexSet<String>>;

/// Containment and dependency edges between singletons.
///
/// `dependents` maps a bean to the beans that depend on it, `dependencies` is its inverse,
/// `contained` maps an outer bean to the inner beans it owns.
/// Every map has its own lock, held only for the duration of a single call.
#[derive(Default)]
pub struct DependencyGraph {
    contained: Mutex<Edges>,
    dependents: Mutex<Edges>,
    dependencies: Mutex<Edges>,
}

impl DependencyGraph {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `outer` contains `inner`, so `inner` is torn down together with `outer`.
    pub(crate) fn register_contained(&self, inner: &str, outer: &str, aliases: &impl AliasResolver) {
        {
            let mut contained = self.contained.lock();
            if !contained.entry(outer.to_owned()).or_default().insert(inner.to_owned()) {
                return;
            }
        }
        debug!(inner, outer, "Contained bean registered");
        self.register_dependent(inner, outer, aliases);
    }

    /// Records that `dependent` depends on `bean`, so `dependent` is destroyed before `bean`.
    pub(crate) fn register_dependent(&self, bean: &str, dependent: &str, aliases: &impl AliasResolver) {
        let canonical_name = aliases.canonical_name(bean);

        {
            let mut dependents = self.dependents.lock();
            if !dependents
                .entry(canonical_name.clone())
                .or_default()
                .insert(dependent.to_owned())
            {
                return;
            }
        }

        self.dependencies
            .lock()
            .entry(dependent.to_owned())
            .or_default()
            .insert(canonical_name.clone());
        debug!(bean = %canonical_name, dependent, "Dependent bean registered");
    }

    /// Whether `dependent` depends on `bean`, directly or transitively.
    #[must_use]
    pub fn is_dependent(&self, bean: &str, dependent: &str, aliases: &impl AliasResolver) -> bool {
        let dependents = self.dependents.lock();
        is_dependent(&dependents, bean, dependent, &mut HashSet::new(), aliases)
    }

    #[must_use]
    pub fn has_dependent_bean(&self, bean: &str) -> bool {
        self.dependents.lock().contains_key(bean)
    }

    /// Direct dependents of `bean`, in registration order.
    #[must_use]
    pub fn dependent_beans(&self, bean: &str) -> Vec<String> {
        snapshot(&self.dependents, bean)
    }

    /// Direct dependencies of `bean`, in registration order.
    #[must_use]
    pub fn dependencies_for_bean(&self, bean: &str) -> Vec<String> {
        snapshot(&self.dependencies, bean)
    }

    /// Beans contained by `bean`, in registration order.
    #[must_use]
    pub fn contained_beans(&self, bean: &str) -> Vec<String> {
        snapshot(&self.contained, bean)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contained.lock().is_empty() && self.dependents.lock().is_empty() && self.dependencies.lock().is_empty()
    }

    /// Removes the dependents of `bean` and returns them.
    ///
    /// A second call for the same bean returns nothing, which is what ends recursion on cyclic edges.
    pub(crate) fn take_dependents(&self, bean: &str) -> Option<IndexSet<String>> {
        self.dependents.lock().shift_remove(bean)
    }

    pub(crate) fn take_contained(&self, bean: &str) -> Option<IndexSet<String>> {
        self.contained.lock().shift_remove(bean)
    }

    /// Scrubs `bean` out of every dependents set and drops its dependencies entry.
    pub(crate) fn remove_references(&self, bean: &str) {
        self.dependents.lock().retain(|_, dependents| {
            dependents.shift_remove(bean);
            !dependents.is_empty()
        });
        self.dependencies.lock().shift_remove(bean);
    }

    /// Removes every edge `bean` participates in as a dependency or dependent.
    pub fn remove_all(&self, bean: &str) {
        self.dependents.lock().shift_remove(bean);
        self.remove_references(bean);
    }

    pub(crate) fn clear(&self) {
        self.contained.lock().clear();
        self.dependents.lock().clear();
        self.dependencies.lock().clear();
    }
}

fn snapshot(edges: &Mutex<Edges>, bean: &str) -> Vec<String> {
    edges
        .lock()
        .get(bean)
        .map(|names| names.iter().cloned().collect())
        .unwrap_or_default()
}

fn is_dependent(
    dependents: &Edges,
    bean: &str,
    dependent: &str,
    already_seen: &mut HashSet<String>,
    aliases: &impl AliasResolver,
) -> bool {
    if already_seen.contains(bean) {
        return false;
    }
    let canonical_name = aliases.canonical_name(bean);
    let Some(direct) = dependents.get(&canonical_name) else {
        return false;
    };
    if direct.contains(dependent) {
        return true;
    }

    already_seen.insert(bean.to_owned());
    direct
        .iter()
        .any(|transitive| is_dependent(dependents, transitive, dependent, already_seen, aliases))
}
