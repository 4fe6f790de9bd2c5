//! Process-wide plugin registry.
//!
//! Plugins and the browser launch configuration are resolved once, on first
//! use, and shared read-only afterwards. Initialization is single-flight:
//! concurrent first callers wait on one attempt, and a failed attempt leaves
//! the registry uninitialized so the next caller retries.

use std::{
    collections::HashSet,
    env,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use metrics::counter;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::{
    config::{BrowserSettings, RenderSettings},
    infra::{
        browser::{LaunchConfig, Viewport},
        telemetry::REGISTRY_INIT_TOTAL,
    },
};

use super::plugins::{PageModifier, PluginError, PluginFactory, PluginHooks, TemplateFilter, builtin_factories};

/// Launch flags applied to every browser process.
pub const FIXED_LAUNCH_ARGS: [&str; 4] = [
    "--no-sandbox",
    "--disable-translate",
    "--disable-extensions",
    "--disable-sync",
];

const BROWSER_CANDIDATES: [&str; 4] = [
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("plugin `{plugin}` failed to initialize: {source}")]
    Plugin {
        plugin: &'static str,
        #[source]
        source: PluginError,
    },
}

/// Hook contributions of every plugin, in plugin declaration order.
#[derive(Default, Clone)]
pub struct PluginHookSet {
    pub template_headers: Vec<String>,
    pub template_filters: Vec<(String, Arc<dyn TemplateFilter>)>,
    pub page_modifiers: Vec<Arc<dyn PageModifier>>,
    pub second_pass_modifiers: Vec<Arc<dyn PageModifier>>,
}

impl PluginHookSet {
    fn absorb(&mut self, hooks: PluginHooks) {
        self.template_headers.extend(hooks.template_headers);
        self.template_filters.extend(hooks.template_filters);
        self.page_modifiers.extend(hooks.page_modifiers);
        self.second_pass_modifiers.extend(hooks.second_pass_modifiers);
    }
}

/// Settings resolved at initialization and never reset.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessWideConfig {
    pub launch: LaunchConfig,
    pub basedir: PathBuf,
    pub page_timeout: Duration,
}

pub struct RegistryState {
    pub hooks: PluginHookSet,
    pub config: ProcessWideConfig,
}

pub struct PluginRegistry {
    factories: Vec<Arc<dyn PluginFactory>>,
    browser: BrowserSettings,
    render: RenderSettings,
    state: OnceCell<Arc<RegistryState>>,
}

impl PluginRegistry {
    /// Registry over the built-in plugin set.
    pub fn new(browser: BrowserSettings, render: RenderSettings) -> Self {
        Self::with_factories(builtin_factories(), browser, render)
    }

    pub fn with_factories(
        factories: Vec<Arc<dyn PluginFactory>>,
        browser: BrowserSettings,
        render: RenderSettings,
    ) -> Self {
        Self {
            factories,
            browser,
            render,
            state: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized()
    }

    /// Construct every plugin once and return the shared state.
    pub async fn ensure_initialized(&self) -> Result<Arc<RegistryState>, RegistryError> {
        self.state
            .get_or_try_init(|| self.initialize())
            .await
            .map(Arc::clone)
    }

    async fn initialize(&self) -> Result<Arc<RegistryState>, RegistryError> {
        let started_at = Instant::now();
        let mut hooks = PluginHookSet::default();

        for factory in &self.factories {
            let plugin = factory.name();
            let contributed = factory.construct().await.map_err(|source| {
                warn!(
                    target = "application::registry",
                    op = "registry::initialize",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    plugin,
                    error = %source,
                    "Plugin construction failed"
                );
                counter!(REGISTRY_INIT_TOTAL, "result" => "error").increment(1);
                RegistryError::Plugin { plugin, source }
            })?;
            hooks.absorb(contributed);
        }

        let config = ProcessWideConfig {
            launch: LaunchConfig {
                headless: self.browser.headless,
                args: merge_launch_args(&self.browser.extra_args),
                executable_path: resolve_executable(self.browser.executable_path.as_deref()),
                viewport: Viewport {
                    width: self.browser.viewport_width,
                    height: self.browser.viewport_height,
                },
                ignore_https_errors: self.browser.ignore_https_errors,
            },
            basedir: self.render.basedir.clone(),
            page_timeout: self.render.page_timeout,
        };

        info!(
            target = "application::registry",
            op = "registry::initialize",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            plugins = self.factories.len(),
            template_headers = hooks.template_headers.len(),
            template_filters = hooks.template_filters.len(),
            page_modifiers = hooks.page_modifiers.len(),
            second_pass_modifiers = hooks.second_pass_modifiers.len(),
            executable = ?config.launch.executable_path,
            "Plugin registry initialized"
        );
        counter!(REGISTRY_INIT_TOTAL, "result" => "ok").increment(1);

        Ok(Arc::new(RegistryState { hooks, config }))
    }
}

/// Fixed flags first, then configured extras; duplicates keep their first position.
pub fn merge_launch_args(extra: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    FIXED_LAUNCH_ARGS
        .iter()
        .map(|arg| (*arg).to_string())
        .chain(extra.iter().cloned())
        .filter(|arg| seen.insert(arg.clone()))
        .collect()
}

/// The configured binary wins; otherwise probe `PATH`. `None` defers to the launcher.
fn resolve_executable(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return Some(path.to_path_buf());
    }

    let search_path = env::var_os("PATH")?;
    env::split_paths(&search_path).find_map(|dir| {
        BROWSER_CANDIDATES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}
