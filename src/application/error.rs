use thiserror::Error;

use crate::{
    config::LoadError,
    domain::{
        envelope::{FailureKind, RenderFailure},
        error::OptionError,
    },
    infra::{browser::BrowserError, error::InfraError},
};

use super::registry::RegistryError;

/// Failures raised while producing a PDF. Converted to a [`RenderFailure`] at
/// the browser session boundary.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("template rendering failed: {0}")]
    Template(String),
    #[error("invalid page options: {0}")]
    InvalidOption(#[from] OptionError),
    #[error("page modifier `{name}` failed: {message}")]
    Modifier { name: &'static str, message: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("render task panicked: {0}")]
    Panicked(String),
}

impl RenderError {
    pub fn modifier(name: &'static str, message: impl Into<String>) -> Self {
        Self::Modifier {
            name,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            RenderError::Browser(BrowserError::Launch(_)) => FailureKind::Launch,
            RenderError::Browser(err) if err.is_timeout() => FailureKind::Timeout,
            RenderError::Template(_) => FailureKind::Template,
            other if other.to_string().contains("Timeout") => FailureKind::Timeout,
            _ => FailureKind::Render,
        }
    }

    /// User-facing failure; the error detail itself is only logged.
    pub fn to_failure(&self) -> RenderFailure {
        match self.kind() {
            FailureKind::Launch => RenderFailure::launch(),
            FailureKind::Timeout => RenderFailure::timeout(),
            FailureKind::Template => RenderFailure::template(),
            FailureKind::Validation | FailureKind::Render => RenderFailure::render(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
