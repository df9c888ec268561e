use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty sum fields, duplicate view, bad pattern, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A view name that the config does not define.
    #[error("unknown view: {0}")]
    UnknownView(String),
    /// A required field binding does not exist in the input columns.
    #[error("{side} input: missing field '{field}' (bound as {binding})")]
    MissingField {
        side: String,
        binding: String,
        field: String,
    },
}

impl ReconError {
    pub fn missing_field(side: &str, binding: &str, field: &str) -> Self {
        Self::MissingField {
            side: side.into(),
            binding: binding.into(),
            field: field.into(),
        }
    }
}
