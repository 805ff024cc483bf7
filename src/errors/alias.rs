#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AliasErrorKind {
    #[error("Cannot register alias '{alias}' for name '{name}': circular reference - '{name}' is a direct or indirect alias for '{alias}' already")]
    Cycle { name: String, alias: String },
    #[error("Cannot define alias '{alias}' for name '{name}': it is already registered for name '{registered_name}'")]
    Overriding {
        alias: String,
        registered_name: String,
        name: String,
    },
    #[error("No alias '{alias}' registered")]
    NotRegistered { alias: String },
}
