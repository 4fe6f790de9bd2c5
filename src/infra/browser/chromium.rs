//! Chromium adapter built on `headless_chrome`.
//!
//! `headless_chrome` speaks CDP over a blocking API, so every call runs on the
//! blocking pool and is bounded with `tokio::time::timeout`.

use std::{
    ffi::{OsStr, OsString},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab, types::PrintToPdfOptions};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{BrowserError, BrowserHandle, BrowserLauncher, LaunchConfig, PageHandle, PdfParams};

/// Keeps a retained browser's event loop alive between renders.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60 * 60);
/// Slack given to the tab's own waits so the outer bound fires first.
const TAB_TIMEOUT_GRACE: Duration = Duration::from_secs(1);
const READY_STATE_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, config: &LaunchConfig) -> Result<Box<dyn BrowserHandle>, BrowserError> {
        let started_at = Instant::now();
        let config = config.clone();
        let arg_count = config.args.len();

        let browser = run_blocking("Launch", None, move || launch_blocking(&config)).await?;

        info!(
            target = "infra::browser::chromium",
            op = "chromium::launch",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            args = arg_count,
            "Browser launched"
        );

        Ok(Box::new(ChromiumBrowser {
            browser: Some(browser),
        }))
    }
}

fn launch_blocking(config: &LaunchConfig) -> Result<Browser, BrowserError> {
    let args: Vec<OsString> = config.args.iter().map(OsString::from).collect();
    let arg_refs: Vec<&OsStr> = args.iter().map(OsString::as_os_str).collect();

    let options = LaunchOptions::default_builder()
        .headless(config.headless)
        .window_size(Some((config.viewport.width, config.viewport.height)))
        .path(config.executable_path.clone())
        .args(arg_refs)
        .ignore_certificate_errors(config.ignore_https_errors)
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .build()
        .map_err(|err| BrowserError::Launch(err.to_string()))?;

    Browser::new(options).map_err(|err| BrowserError::Launch(err.to_string()))
}

pub struct ChromiumBrowser {
    browser: Option<Browser>,
}

#[async_trait]
impl BrowserHandle for ChromiumBrowser {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, BrowserError> {
        let browser = self.browser.clone().ok_or(BrowserError::Closed)?;
        let tab = run_blocking("New page", None, move || {
            browser
                .new_tab()
                .map_err(|err| BrowserError::protocol("New page", err.to_string()))
        })
        .await?;

        Ok(Box::new(ChromiumPage { tab }))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        let browser = self.browser.take().ok_or(BrowserError::Closed)?;
        // Dropping the last handle terminates the child process.
        run_blocking("Close", None, move || {
            drop(browser);
            Ok(())
        })
        .await?;

        debug!(
            target = "infra::browser::chromium",
            op = "chromium::close",
            result = "ok",
            "Browser closed"
        );
        Ok(())
    }
}

pub struct ChromiumPage {
    tab: Arc<Tab>,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        run_blocking("Navigation", Some(timeout), move || {
            tab.set_default_timeout(tab_timeout(timeout));
            tab.navigate_to(&url)
                .and_then(|tab| tab.wait_until_navigated())
                .map_err(|err| BrowserError::protocol("Navigation", err.to_string()))?;
            wait_for_load(&tab, "Navigation", timeout)
        })
        .await
    }

    async fn set_content(&self, html: &str, timeout: Duration) -> Result<(), BrowserError> {
        let tab = Arc::clone(&self.tab);
        let script = write_document_script(html)?;
        run_blocking("Set content", Some(timeout), move || {
            tab.set_default_timeout(tab_timeout(timeout));
            tab.evaluate(&script, false)
                .map_err(|err| BrowserError::protocol("Set content", err.to_string()))?;
            wait_for_load(&tab, "Set content", timeout)
        })
        .await
    }

    async fn inner_html(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let selector = serde_json::to_string(selector)
            .map_err(|err| BrowserError::protocol("Query selector", err.to_string()))?;
        let script = format!(
            "(() => {{ const el = document.querySelector({selector}); return el === null ? null : el.innerHTML; }})()"
        );

        match self.evaluate(&script).await? {
            Value::String(markup) => Ok(Some(markup)),
            _ => Ok(None),
        }
    }

    async fn content(&self) -> Result<String, BrowserError> {
        let tab = Arc::clone(&self.tab);
        run_blocking("Content", None, move || {
            tab.get_content()
                .map_err(|err| BrowserError::protocol("Content", err.to_string()))
        })
        .await
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let tab = Arc::clone(&self.tab);
        let script = script.to_string();
        run_blocking("Evaluate", None, move || {
            let remote = tab
                .evaluate(&script, true)
                .map_err(|err| BrowserError::protocol("Evaluate", err.to_string()))?;
            Ok(remote.value.unwrap_or(Value::Null))
        })
        .await
    }

    async fn pdf(&self, params: &PdfParams, timeout: Duration) -> Result<Vec<u8>, BrowserError> {
        let tab = Arc::clone(&self.tab);
        let options = PrintToPdfOptions {
            display_header_footer: Some(params.display_header_footer),
            print_background: Some(params.print_background),
            header_template: Some(params.header_template.clone()),
            footer_template: Some(params.footer_template.clone()),
            paper_width: params.paper.width,
            paper_height: params.paper.height,
            ..PrintToPdfOptions::default()
        };

        run_blocking("Print", Some(timeout), move || {
            tab.set_default_timeout(tab_timeout(timeout));
            tab.print_to_pdf(Some(options))
                .map_err(|err| BrowserError::protocol("Print", err.to_string()))
        })
        .await
    }
}

/// Deadline for the tab's own waits; saturates instead of overflowing.
fn tab_timeout(timeout: Duration) -> Duration {
    timeout.saturating_add(TAB_TIMEOUT_GRACE)
}

fn write_document_script(html: &str) -> Result<String, BrowserError> {
    let literal = serde_json::to_string(html)
        .map_err(|err| BrowserError::protocol("Set content", err.to_string()))?;
    Ok(format!(
        "document.open(); document.write({literal}); document.close();"
    ))
}

/// Poll `document.readyState` until `complete`, which implies `DOMContentLoaded` fired too.
fn wait_for_load(tab: &Tab, operation: &'static str, timeout: Duration) -> Result<(), BrowserError> {
    // An unrepresentable deadline means the outer bound is the only limit.
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let state = tab
            .evaluate("document.readyState", false)
            .map_err(|err| BrowserError::protocol(operation, err.to_string()))?;
        if matches!(state.value, Some(Value::String(ref value)) if value == "complete") {
            return Ok(());
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(BrowserError::Timeout {
                operation,
                after: timeout,
            });
        }
        thread::sleep(READY_STATE_POLL);
    }
}

async fn run_blocking<T, F>(
    operation: &'static str,
    timeout: Option<Duration>,
    task: F,
) -> Result<T, BrowserError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BrowserError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(task);
    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, handle).await.map_err(|_| {
            warn!(
                target = "infra::browser::chromium",
                op = "chromium::run_blocking",
                result = "timeout",
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Browser operation exceeded its bound"
            );
            BrowserError::Timeout {
                operation,
                after: limit,
            }
        })?,
        None => handle.await,
    };

    joined.map_err(|err| BrowserError::protocol(operation, format!("browser task aborted: {err}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_script_escapes_markup() {
        let script = write_document_script("<p>\"quoted\"</script>\n</p>").expect("serializable");
        assert_eq!(
            script,
            r#"document.open(); document.write("<p>\"quoted\"</script>\n</p>"); document.close();"#
        );
    }

    #[test]
    fn tab_timeout_adds_grace_and_saturates() {
        assert_eq!(tab_timeout(Duration::from_secs(30)), Duration::from_secs(31));
        assert_eq!(tab_timeout(Duration::MAX), Duration::MAX);
    }

    #[tokio::test]
    async fn blocking_task_past_its_bound_times_out() {
        let err = run_blocking("Navigation", Some(Duration::from_millis(20)), || {
            thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .await
        .expect_err("should time out");

        assert!(err.is_timeout());
        assert!(err.to_string().contains("Timeout"));
    }

    #[tokio::test]
    async fn blocking_task_errors_propagate() {
        let err = run_blocking::<(), _>("Content", None, || {
            Err(BrowserError::protocol("Content", "target closed"))
        })
        .await
        .expect_err("should fail");

        assert_eq!(err.to_string(), "Content failed: target closed");
    }
}
