use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

pub const PDF_DATA_URI_PREFIX: &str = "data:application/pdf;base64,";
pub const SUCCESS_MESSAGE: &str = "PDF generated successfully.";
pub const GENERIC_FAILURE_MESSAGE: &str = "PDF generation failed.";
pub const TIMEOUT_FAILURE_MESSAGE: &str = "PDF generation failed. Possible timeout error";
pub const TEMPLATE_FAILURE_MESSAGE: &str = "PDF generation failed. Template could not be rendered";
pub const LAUNCH_FAILURE_MESSAGE: &str = "PDF generation failed. Browser could not be launched";

/// Outcome of one render: PDF bytes or a user-facing failure.
pub type RenderResult = Result<Vec<u8>, RenderFailure>;

/// Failure categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Template,
    Launch,
    Timeout,
    Render,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Template => "template",
            FailureKind::Launch => "launch",
            FailureKind::Timeout => "timeout",
            FailureKind::Render => "render",
        }
    }
}

/// User-facing failure. Underlying details are logged, never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RenderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(FailureKind::Timeout, TIMEOUT_FAILURE_MESSAGE)
    }

    pub fn render() -> Self {
        Self::new(FailureKind::Render, GENERIC_FAILURE_MESSAGE)
    }

    pub fn template() -> Self {
        Self::new(FailureKind::Template, TEMPLATE_FAILURE_MESSAGE)
    }

    pub fn launch() -> Self {
        Self::new(FailureKind::Launch, LAUNCH_FAILURE_MESSAGE)
    }
}

impl From<ValidationError> for RenderFailure {
    fn from(error: ValidationError) -> Self {
        Self::new(FailureKind::Validation, error.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeData {
    pub pdf: Option<String>,
    pub log: Option<String>,
}

/// Uniform response returned for every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: EnvelopeStatus,
    pub message: String,
    pub data: EnvelopeData,
    /// Present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

impl ResponseEnvelope {
    pub fn success(pdf: &[u8]) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            message: SUCCESS_MESSAGE.to_string(),
            data: EnvelopeData {
                pdf: Some(pdf_data_uri(pdf)),
                log: None,
            },
            kind: None,
        }
    }

    pub fn failure(failure: RenderFailure) -> Self {
        Self {
            status: EnvelopeStatus::Failure,
            message: failure.message,
            data: EnvelopeData::default(),
            kind: Some(failure.kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }

    /// Decode the PDF bytes carried by a successful envelope.
    pub fn pdf_bytes(&self) -> Option<Vec<u8>> {
        let encoded = self.data.pdf.as_deref()?.strip_prefix(PDF_DATA_URI_PREFIX)?;
        STANDARD.decode(encoded).ok()
    }
}

impl From<RenderResult> for ResponseEnvelope {
    fn from(result: RenderResult) -> Self {
        match result {
            Ok(bytes) => Self::success(&bytes),
            Err(failure) => Self::failure(failure),
        }
    }
}

pub fn pdf_data_uri(pdf: &[u8]) -> String {
    format!("{PDF_DATA_URI_PREFIX}{}", STANDARD.encode(pdf))
}
