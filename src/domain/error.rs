use thiserror::Error;

/// Rejections raised before any browser work starts. The display strings are
/// returned verbatim in the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid type specified.")]
    InvalidType,
    #[error("Invalid input format specified.")]
    InvalidFormat,
    #[error("Invalid request body: {0}")]
    MalformedBody(String),
}

/// A page directive that could not be turned into a paper dimension.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("failed to parse `{name}` value `{value}`: unknown unit")]
    UnknownUnit { name: &'static str, value: String },
    #[error("failed to parse `{name}` value `{value}`: not a number")]
    NotANumber { name: &'static str, value: String },
    #[error("unknown paper format `{0}`")]
    UnknownFormat(String),
}
