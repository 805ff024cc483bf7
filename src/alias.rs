use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::errors::AliasErrorKind;

/// Maps a declared name to the name the dependency graph is keyed by.
pub trait AliasResolver: Send + Sync {
    #[must_use]
    fn canonical_name(&self, name: &str) -> String;
}

impl<F> AliasResolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    #[inline]
    fn canonical_name(&self, name: &str) -> String {
        self(name)
    }
}

/// Alias to name map, resolved transitively.
///
/// Chains like `a -> b -> c` are allowed, cycles are rejected on registration,
/// so [`AliasResolver::canonical_name`] always terminates.
pub struct AliasRegistry {
    aliases: RwLock<HashMap<String, String>>,
    allow_overriding: bool,
}

impl Default for AliasRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AliasRegistry {
    #[inline]
    #[must_use]
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            aliases: RwLock::new(HashMap::new()),
            allow_overriding,
        }
    }

    /// Registers `alias` for `name`.
    ///
    /// An alias equal to the name removes the alias instead.
    ///
    /// # Errors
    /// - Returns [`AliasErrorKind::Overriding`] if the alias points to another name and overriding isn't allowed
    /// - Returns [`AliasErrorKind::Cycle`] if `name` is already a direct or indirect alias for `alias`
    pub fn register_alias(&self, name: &str, alias: &str) -> Result<(), AliasErrorKind> {
        let mut aliases = self.aliases.write();

        if alias == name {
            aliases.remove(alias);
            debug!(alias, "Alias ignored because it points to the same name");
            return Ok(());
        }

        if let Some(registered_name) = aliases.get(alias) {
            if registered_name == name {
                return Ok(());
            }
            if !self.allow_overriding {
                let err = AliasErrorKind::Overriding {
                    alias: alias.to_owned(),
                    registered_name: registered_name.clone(),
                    name: name.to_owned(),
                };
                warn!("{}", err);
                return Err(err);
            }
            debug!(alias, %registered_name, name, "Overriding alias");
        }

        if chain_contains(&aliases, alias, name) {
            let err = AliasErrorKind::Cycle {
                name: name.to_owned(),
                alias: alias.to_owned(),
            };
            warn!("{}", err);
            return Err(err);
        }

        aliases.insert(alias.to_owned(), name.to_owned());
        debug!(alias, name, "Alias registered");
        Ok(())
    }

    /// # Errors
    /// - Returns [`AliasErrorKind::NotRegistered`] if there is no such alias
    pub fn remove_alias(&self, alias: &str) -> Result<(), AliasErrorKind> {
        match self.aliases.write().remove(alias) {
            Some(_) => Ok(()),
            None => Err(AliasErrorKind::NotRegistered { alias: alias.to_owned() }),
        }
    }

    #[must_use]
    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.read().contains_key(name)
    }

    /// Whether `alias` resolves to `name`, directly or through other aliases.
    #[must_use]
    pub fn has_alias(&self, name: &str, alias: &str) -> bool {
        chain_contains(&self.aliases.read(), name, alias)
    }

    /// All aliases resolving to `name`, sorted.
    #[must_use]
    pub fn aliases(&self, name: &str) -> Vec<String> {
        let aliases = self.aliases.read();
        let mut result = Vec::new();
        collect_aliases(&aliases, name, &mut result);
        result.sort();
        result
    }
}

impl AliasResolver for AliasRegistry {
    fn canonical_name(&self, name: &str) -> String {
        let aliases = self.aliases.read();
        let mut canonical = name;
        while let Some(resolved) = aliases.get(canonical) {
            canonical = resolved.as_str();
        }
        canonical.to_owned()
    }
}

/// Follows the chain starting at `alias` looking for `name`.
fn chain_contains(aliases: &HashMap<String, String>, name: &str, alias: &str) -> bool {
    let mut current = alias;
    while let Some(registered_name) = aliases.get(current) {
        if registered_name == name {
            return true;
        }
        current = registered_name.as_str();
    }
    false
}

fn collect_aliases(aliases: &HashMap<String, String>, name: &str, result: &mut Vec<String>) {
    for (alias, registered_name) in aliases {
        if registered_name == name {
            result.push(alias.clone());
            collect_aliases(aliases, alias, result);
        }
    }
}
