use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Convert a seconds value into a duration, rejecting zero, negative,
/// non-finite, and unrepresentably large input.
pub fn positive_seconds(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

/// Where the document comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Navigate the page to the source value.
    Url,
    /// Inject the source value as page content.
    String,
}

impl SourceKind {
    pub fn from_label(label: &str) -> Result<Self, ValidationError> {
        match label {
            "url" => Ok(Self::Url),
            "string" => Ok(Self::String),
            _ => Err(ValidationError::InvalidType),
        }
    }
}

/// Markup format of a `string` source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkupFormat {
    /// Templating-language source expanded before injection. Travels as `pug` on the wire.
    #[serde(rename = "pug")]
    Template,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "unspecified")]
    Unspecified,
}

impl MarkupFormat {
    /// Unknown labels collapse to `Unspecified`; the pipeline rejects them for `string` sources.
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("pug") => Self::Template,
            Some("html") => Self::Html,
            _ => Self::Unspecified,
        }
    }
}

/// Request body as received at the boundary, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderEvent {
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub format: Option<String>,
    /// Page timeout override in seconds.
    pub timeout: Option<f64>,
}

/// Validated render request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub source: String,
    pub kind: SourceKind,
    pub format: MarkupFormat,
    pub timeout: Option<Duration>,
}

impl RenderRequest {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            source: url.into(),
            kind: SourceKind::Url,
            format: MarkupFormat::Unspecified,
            timeout: None,
        }
    }

    pub fn html(html: impl Into<String>) -> Self {
        Self {
            source: html.into(),
            kind: SourceKind::String,
            format: MarkupFormat::Html,
            timeout: None,
        }
    }

    pub fn template(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind: SourceKind::String,
            format: MarkupFormat::Template,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// A `string` source must name a markup format; `url` sources ignore it.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.kind, self.format) {
            (SourceKind::String, MarkupFormat::Unspecified) => Err(ValidationError::InvalidFormat),
            _ => Ok(()),
        }
    }
}

impl TryFrom<RenderEvent> for RenderRequest {
    type Error = ValidationError;

    fn try_from(event: RenderEvent) -> Result<Self, Self::Error> {
        let kind = SourceKind::from_label(event.kind.as_str())?;
        Ok(Self {
            source: event.value,
            kind,
            format: MarkupFormat::from_label(event.format.as_deref()),
            timeout: event.timeout.and_then(positive_seconds),
        })
    }
}
