//! Browser process lifecycle around a single render.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Instant};

use futures::{FutureExt, future::BoxFuture};
use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    domain::envelope::{RenderFailure, RenderResult},
    infra::{
        browser::{BrowserError, BrowserHandle, BrowserLauncher},
        telemetry::BROWSER_LAUNCH_TOTAL,
    },
};

use super::{
    error::RenderError,
    registry::{PluginRegistry, RegistryState},
};

pub struct BrowserSession {
    launcher: Arc<dyn BrowserLauncher>,
    registry: Arc<PluginRegistry>,
    retained: Mutex<Option<Box<dyn BrowserHandle>>>,
}

impl BrowserSession {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, registry: Arc<PluginRegistry>) -> Self {
        Self {
            launcher,
            registry,
            retained: Mutex::new(None),
        }
    }

    /// Launch a browser, run `render` against it, and close it on every exit
    /// path. With `keep_alive` the browser is parked instead and stays open
    /// until [`BrowserSession::release_retained`].
    pub async fn with_browser<F>(&self, render: F, keep_alive: bool) -> RenderResult
    where
        F: for<'b> FnOnce(
                &'b dyn BrowserHandle,
                Arc<RegistryState>,
            ) -> BoxFuture<'b, Result<Vec<u8>, RenderError>>
            + Send,
    {
        let started_at = Instant::now();

        let state = self.registry.ensure_initialized().await.map_err(|err| {
            let err = RenderError::from(err);
            warn!(
                target = "application::session",
                op = "session::with_browser",
                result = "error",
                error_code = "registry_init",
                error = %err,
                "Plugin registry could not be initialized"
            );
            err.to_failure()
        })?;

        let mut browser = match self.launcher.launch(&state.config.launch).await {
            Ok(browser) => {
                counter!(BROWSER_LAUNCH_TOTAL, "result" => "ok").increment(1);
                browser
            }
            Err(err) => {
                counter!(BROWSER_LAUNCH_TOTAL, "result" => "error").increment(1);
                warn!(
                    target = "application::session",
                    op = "session::with_browser",
                    result = "error",
                    error_code = "launch",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "Browser launch failed"
                );
                return Err(RenderError::from(err).to_failure());
            }
        };

        let outcome = {
            let handle: &dyn BrowserHandle = browser.as_ref();
            AssertUnwindSafe(async move { render(handle, state).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(RenderError::Panicked(panic_message(payload.as_ref()))))
        };

        if keep_alive {
            self.park(browser).await;
        } else {
            close_browser(browser.as_mut()).await;
        }

        match outcome {
            Ok(bytes) => {
                debug!(
                    target = "application::session",
                    op = "session::with_browser",
                    result = "ok",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    pdf_bytes = bytes.len(),
                    keep_alive,
                    "Render function completed"
                );
                Ok(bytes)
            }
            Err(err) => {
                let failure: RenderFailure = err.to_failure();
                warn!(
                    target = "application::session",
                    op = "session::with_browser",
                    result = "error",
                    error_code = failure.kind.as_str(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "Render function failed"
                );
                Err(failure)
            }
        }
    }

    /// Close a browser parked by a keep-alive render. Returns whether one was open.
    pub async fn release_retained(&self) -> Result<bool, BrowserError> {
        let parked = self.retained.lock().await.take();
        match parked {
            Some(mut browser) => {
                browser.close().await?;
                info!(
                    target = "application::session",
                    op = "session::release_retained",
                    result = "ok",
                    "Retained browser closed"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn has_retained(&self) -> bool {
        self.retained.lock().await.is_some()
    }

    async fn park(&self, browser: Box<dyn BrowserHandle>) {
        let previous = self.retained.lock().await.replace(browser);
        if let Some(mut previous) = previous {
            close_browser(previous.as_mut()).await;
        }
    }
}

async fn close_browser(browser: &mut dyn BrowserHandle) {
    if let Err(err) = browser.close().await {
        warn!(
            target = "application::session",
            op = "session::close",
            result = "error",
            error = %err,
            "Browser close failed"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
