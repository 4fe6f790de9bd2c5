//! Headless browser seam.
//!
//! The render pipeline only talks to these traits; [`chromium`] drives a real
//! Chromium process and tests substitute in-memory fakes.

pub mod chromium;

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    error::OptionError,
    options::{PaperInches, RenderOptions},
};

pub use chromium::ChromiumLauncher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Everything a launcher needs to start one browser process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    pub headless: bool,
    pub args: Vec<String>,
    /// `None` lets the launcher locate a browser binary on its own.
    pub executable_path: Option<PathBuf>,
    pub viewport: Viewport,
    pub ignore_https_errors: bool,
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("{operation} Timeout Exceeded: {}ms exceeded", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("{operation} failed: {message}")]
    Protocol {
        operation: &'static str,
        message: String,
    },
    #[error("browser is already closed")]
    Closed,
}

impl BrowserError {
    pub fn protocol(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Protocol {
            operation,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}

/// Parameters for the browser's print-to-PDF call.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfParams {
    pub header_template: String,
    pub footer_template: String,
    pub display_header_footer: bool,
    pub print_background: bool,
    pub paper: PaperInches,
}

impl PdfParams {
    pub fn from_options(options: &RenderOptions) -> Result<Self, OptionError> {
        Ok(Self {
            header_template: options.header_template.clone(),
            footer_template: options.footer_template.clone(),
            display_header_footer: options.display_header_footer,
            print_background: options.print_background,
            paper: options.paper_inches()?,
        })
    }
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, config: &LaunchConfig) -> Result<Box<dyn BrowserHandle>, BrowserError>;
}

#[async_trait]
pub trait BrowserHandle: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, BrowserError>;

    /// Terminate the browser process. Further calls report [`BrowserError::Closed`].
    async fn close(&mut self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigate and wait for both `DOMContentLoaded` and `load`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Replace the document with `html` under the same wait contract as [`PageHandle::goto`].
    async fn set_content(&self, html: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Inner HTML of the first element matching `selector`, `None` when nothing matches.
    async fn inner_html(&self, selector: &str) -> Result<Option<String>, BrowserError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError>;

    async fn pdf(&self, params: &PdfParams, timeout: Duration) -> Result<Vec<u8>, BrowserError>;
}
