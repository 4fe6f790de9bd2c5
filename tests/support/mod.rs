//! In-memory browser fakes shared by the integration tests.
#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use pdfrelay::{
    application::{
        pipeline::RenderPipeline,
        plugins::{PluginFactory, builtin_factories},
        registry::PluginRegistry,
    },
    config::{BrowserSettings, RenderSettings},
    infra::browser::{
        BrowserError, BrowserHandle, BrowserLauncher, LaunchConfig, PageHandle, PdfParams,
    },
};
use serde_json::Value;

pub const FAKE_PDF: &[u8] = b"%PDF-1.7\n%fake\n";

#[derive(Debug, Clone)]
pub enum Failure {
    Timeout,
    Protocol(String),
    Panic,
}

/// What the fake page reports back.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    pub header: Option<String>,
    pub footer: Option<String>,
    /// Serialized document; defaults to whatever was loaded.
    pub content: Option<String>,
    pub load_failure: Option<Failure>,
}

#[derive(Default)]
pub struct Recorder {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
    pub launch_configs: Mutex<Vec<LaunchConfig>>,
    pub loaded: Mutex<Vec<String>>,
    pub load_timeouts: Mutex<Vec<Duration>>,
    pub pdf_params: Mutex<Vec<PdfParams>>,
}

impl Recorder {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().expect("loaded lock").clone()
    }

    pub fn load_timeouts(&self) -> Vec<Duration> {
        self.load_timeouts.lock().expect("timeouts lock").clone()
    }

    pub fn last_pdf_params(&self) -> Option<PdfParams> {
        self.pdf_params.lock().expect("pdf lock").last().cloned()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("calls lock").push(call.into());
    }
}

pub struct FakeLauncher {
    pub recorder: Arc<Recorder>,
    pub script: PageScript,
    pub fail_launch: bool,
}

impl FakeLauncher {
    pub fn new(script: PageScript) -> Self {
        Self {
            recorder: Arc::new(Recorder::default()),
            script,
            fail_launch: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::new(PageScript::default())
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, config: &LaunchConfig) -> Result<Box<dyn BrowserHandle>, BrowserError> {
        self.recorder
            .launch_configs
            .lock()
            .expect("config lock")
            .push(config.clone());
        if self.fail_launch {
            return Err(BrowserError::Launch("executable not found".into()));
        }
        self.recorder.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBrowser {
            recorder: Arc::clone(&self.recorder),
            script: self.script.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct FakeBrowser {
    recorder: Arc<Recorder>,
    script: PageScript,
    closed: AtomicBool,
}

#[async_trait]
impl BrowserHandle for FakeBrowser {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, BrowserError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }
        self.recorder.record("new_page");
        Ok(Box::new(FakePage {
            recorder: Arc::clone(&self.recorder),
            script: self.script.clone(),
            document: Mutex::new(String::new()),
        }))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakePage {
    recorder: Arc<Recorder>,
    script: PageScript,
    document: Mutex<String>,
}

impl FakePage {
    fn load(&self, call: &str, source: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.recorder.record(call);
        self.recorder
            .load_timeouts
            .lock()
            .expect("timeouts lock")
            .push(timeout);
        match &self.script.load_failure {
            Some(Failure::Timeout) => {
                return Err(BrowserError::Timeout {
                    operation: "Navigation",
                    after: timeout,
                });
            }
            Some(Failure::Protocol(message)) => {
                return Err(BrowserError::protocol("Navigation", message.clone()));
            }
            Some(Failure::Panic) => panic!("renderer crashed"),
            None => {}
        }
        self.recorder
            .loaded
            .lock()
            .expect("loaded lock")
            .push(source.to_string());
        *self.document.lock().expect("document lock") = source.to_string();
        Ok(())
    }
}

#[async_trait]
impl PageHandle for FakePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.load("goto", url, timeout)
    }

    async fn set_content(&self, html: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.load("set_content", html, timeout)
    }

    async fn inner_html(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        self.recorder.record(format!("inner_html:{selector}"));
        Ok(match selector {
            "#page-header" => self.script.header.clone(),
            "#page-footer" => self.script.footer.clone(),
            _ => None,
        })
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.recorder.record("content");
        Ok(self
            .script
            .content
            .clone()
            .unwrap_or_else(|| self.document.lock().expect("document lock").clone()))
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let marker = if script.contains("page-break") {
            "evaluate:page-break"
        } else if script.contains("page-header") {
            "evaluate:header-footer"
        } else {
            "evaluate"
        };
        self.recorder.record(marker);
        Ok(Value::Null)
    }

    async fn pdf(&self, params: &PdfParams, _timeout: Duration) -> Result<Vec<u8>, BrowserError> {
        self.recorder.record("pdf");
        self.recorder
            .pdf_params
            .lock()
            .expect("pdf lock")
            .push(params.clone());
        Ok(FAKE_PDF.to_vec())
    }
}

pub fn browser_settings() -> BrowserSettings {
    BrowserSettings {
        executable_path: Some(PathBuf::from("/usr/bin/chromium")),
        extra_args: vec!["--lang=en-US".into()],
        ..BrowserSettings::default()
    }
}

pub fn registry_with(factories: Vec<Arc<dyn PluginFactory>>) -> Arc<PluginRegistry> {
    Arc::new(PluginRegistry::with_factories(
        factories,
        browser_settings(),
        RenderSettings::default(),
    ))
}

/// Pipeline over the built-in plugins and a fake browser.
pub fn pipeline(launcher: FakeLauncher) -> (RenderPipeline, Arc<Recorder>) {
    pipeline_with(builtin_factories(), launcher)
}

pub fn pipeline_with(
    factories: Vec<Arc<dyn PluginFactory>>,
    launcher: FakeLauncher,
) -> (RenderPipeline, Arc<Recorder>) {
    let recorder = Arc::clone(&launcher.recorder);
    let pipeline = RenderPipeline::new(registry_with(factories), Arc::new(launcher));
    (pipeline, recorder)
}
