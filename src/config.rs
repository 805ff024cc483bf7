/// Config for a singleton registry
/// ## Fields
/// - `suppressed_errors_limit`:
///   Maximum number of errors recorded through [`crate::SingletonRegistry::on_suppressed_error`]
///   while a creation is running. Errors past the limit are dropped.
///
/// - `allow_alias_overriding`:
///   If `true`, registering an existing alias for another name replaces the old mapping.
///   Only used by the default [`crate::AliasRegistry`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub suppressed_errors_limit: usize,
    pub allow_alias_overriding: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            suppressed_errors_limit: 100,
            allow_alias_overriding: true,
        }
    }
}
