//! Render orchestration: request validation, preprocessing, browser session,
//! option extraction, and the final PDF call.

use std::{env, sync::Arc, time::Duration, time::Instant};

use metrics::{counter, histogram};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::{
    config::Settings,
    domain::{
        envelope::{RenderFailure, RenderResult, ResponseEnvelope},
        error::ValidationError,
        request::{MarkupFormat, RenderEvent, RenderRequest, SourceKind, positive_seconds},
    },
    infra::{
        browser::{BrowserLauncher, ChromiumLauncher, PdfParams},
        telemetry::{RENDER_MS, RENDER_TOTAL},
    },
};

use super::{
    error::RenderError, extractor::extract_options, registry::PluginRegistry,
    session::BrowserSession, template::TemplatePreprocessor,
};

/// Environment override for the page timeout, in seconds.
pub const PAGE_TIMEOUT_ENV: &str = "PAGE_TIMEOUT";

enum PageSource {
    Url(String),
    Markup(String),
}

pub struct RenderPipeline {
    session: BrowserSession,
    preprocessor: TemplatePreprocessor,
}

impl RenderPipeline {
    pub fn new(registry: Arc<PluginRegistry>, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            session: BrowserSession::new(launcher, Arc::clone(&registry)),
            preprocessor: TemplatePreprocessor::new(registry),
        }
    }

    /// Pipeline over the built-in plugins and a real Chromium launcher.
    pub fn from_settings(settings: &Settings) -> Self {
        let registry = PluginRegistry::new(settings.browser.clone(), settings.render.clone());
        Self::new(Arc::new(registry), Arc::new(ChromiumLauncher))
    }

    pub fn session(&self) -> &BrowserSession {
        &self.session
    }

    /// Entry point for raw request bodies.
    pub async fn handle_event(&self, event: RenderEvent) -> ResponseEnvelope {
        match RenderRequest::try_from(event) {
            Ok(request) => self.run(request).await,
            Err(err) => {
                warn!(
                    target = "application::pipeline",
                    op = "pipeline::handle_event",
                    result = "rejected",
                    error = %err,
                    "Render request rejected"
                );
                record_outcome("validation", None);
                ResponseEnvelope::failure(err.into())
            }
        }
    }

    pub async fn run(&self, request: RenderRequest) -> ResponseEnvelope {
        let render_id = Uuid::new_v4();
        let span = info_span!(
            "render",
            %render_id,
            kind = ?request.kind,
            format = ?request.format
        );

        async move {
            let started_at = Instant::now();
            let result = self.render(request).await;
            let elapsed = started_at.elapsed();

            match &result {
                Ok(bytes) => {
                    info!(
                        target = "application::pipeline",
                        op = "pipeline::run",
                        result = "success",
                        elapsed_ms = elapsed.as_millis() as u64,
                        pdf_bytes = bytes.len(),
                        "PDF rendered"
                    );
                    record_outcome("success", Some(elapsed));
                }
                Err(failure) => {
                    info!(
                        target = "application::pipeline",
                        op = "pipeline::run",
                        result = "failure",
                        kind = failure.kind.as_str(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "PDF render failed"
                    );
                    record_outcome(failure.kind.as_str(), Some(elapsed));
                }
            }

            ResponseEnvelope::from(result)
        }
        .instrument(span)
        .await
    }

    async fn render(&self, request: RenderRequest) -> RenderResult {
        request.validate()?;

        let source = match (request.kind, request.format) {
            (SourceKind::Url, _) => PageSource::Url(request.source),
            (SourceKind::String, MarkupFormat::Html) => PageSource::Markup(request.source),
            (SourceKind::String, MarkupFormat::Template) => {
                let html = self
                    .preprocessor
                    .expand(&request.source)
                    .await
                    .map_err(|err| err.to_failure())?;
                PageSource::Markup(html)
            }
            (SourceKind::String, MarkupFormat::Unspecified) => {
                return Err(RenderFailure::from(ValidationError::InvalidFormat));
            }
        };
        let timeout_override = request.timeout;

        self.session
            .with_browser(
                move |browser, state| {
                    Box::pin(async move {
                        let timeout = resolve_timeout(timeout_override, state.config.page_timeout);
                        let page = browser.new_page().await?;
                        match &source {
                            PageSource::Url(url) => page.goto(url, timeout).await?,
                            PageSource::Markup(html) => page.set_content(html, timeout).await?,
                        }

                        let options = extract_options(page.as_ref(), &state.hooks).await?;
                        let params = PdfParams::from_options(&options)?;
                        Ok::<_, RenderError>(page.pdf(&params, timeout).await?)
                    })
                },
                false,
            )
            .await
    }
}

/// Request override, then the `PAGE_TIMEOUT` environment variable, then the configured default.
pub fn resolve_timeout(request: Option<Duration>, default: Duration) -> Duration {
    request
        .or_else(|| {
            env::var(PAGE_TIMEOUT_ENV)
                .ok()
                .and_then(|value| value.trim().parse::<f64>().ok())
                .and_then(positive_seconds)
        })
        .unwrap_or(default)
}

fn record_outcome(result: &'static str, elapsed: Option<Duration>) {
    counter!(RENDER_TOTAL, "result" => result).increment(1);
    if let Some(elapsed) = elapsed {
        histogram!(RENDER_MS).record(elapsed.as_secs_f64() * 1000.0);
    }
}
