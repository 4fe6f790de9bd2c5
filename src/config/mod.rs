//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::request::positive_seconds;

pub use cli::{
    BrowserOverrides, CliArgs, Command, LoggingOverrides, RenderArgs, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pdfrelay";
const ENV_PREFIX: &str = "PDFRELAY";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;
const DEFAULT_BASEDIR: &str = ".";
const DEFAULT_PAGE_TIMEOUT_SECS: f64 = 30.0;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub browser: BrowserSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Explicit browser binary; probed on `PATH` when absent.
    pub executable_path: Option<PathBuf>,
    /// Launch arguments merged with the fixed safety flags.
    pub extra_args: Vec<String>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub ignore_https_errors: bool,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub page_timeout: Duration,
    pub basedir: PathBuf,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable_path: None,
            extra_args: Vec::new(),
            headless: true,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            ignore_https_errors: true,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs_f64(DEFAULT_PAGE_TIMEOUT_SECS),
            basedir: PathBuf::from(DEFAULT_BASEDIR),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("browser.extra_args")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => {
            raw.apply_browser_overrides(&args.browser);
            raw.apply_logging_overrides(&args.logging);
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    browser: RawBrowserSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }

        self.apply_browser_overrides(&overrides.browser);
        self.apply_logging_overrides(&overrides.logging);
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_browser_overrides(&mut self, overrides: &BrowserOverrides) {
        if let Some(path) = overrides.executable_path.as_ref() {
            self.browser.executable_path = Some(path.clone());
        }
        if !overrides.extra_args.is_empty() {
            self.browser
                .extra_args
                .get_or_insert_with(Vec::new)
                .extend(overrides.extra_args.iter().cloned());
        }
        if let Some(headless) = overrides.headless {
            self.browser.headless = Some(headless);
        }
        if let Some(seconds) = overrides.page_timeout_seconds {
            self.render.page_timeout_seconds = Some(seconds);
        }
        if let Some(basedir) = overrides.basedir.as_ref() {
            self.render.basedir = Some(basedir.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            browser,
            render,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            browser: build_browser_settings(browser)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_browser_settings(browser: RawBrowserSettings) -> Result<BrowserSettings, LoadError> {
    let executable_path = match browser.executable_path {
        Some(path) if path.as_os_str().is_empty() => {
            return Err(LoadError::invalid(
                "browser.executable_path",
                "path must not be empty",
            ));
        }
        other => other,
    };

    let extra_args = browser
        .extra_args
        .unwrap_or_default()
        .into_iter()
        .map(|arg| arg.trim().to_string())
        .filter(|arg| !arg.is_empty())
        .collect();

    let viewport_width = browser.viewport_width.unwrap_or(DEFAULT_VIEWPORT_WIDTH);
    if viewport_width == 0 {
        return Err(LoadError::invalid(
            "browser.viewport_width",
            "must be greater than zero",
        ));
    }
    let viewport_height = browser.viewport_height.unwrap_or(DEFAULT_VIEWPORT_HEIGHT);
    if viewport_height == 0 {
        return Err(LoadError::invalid(
            "browser.viewport_height",
            "must be greater than zero",
        ));
    }

    Ok(BrowserSettings {
        executable_path,
        extra_args,
        headless: browser.headless.unwrap_or(true),
        viewport_width,
        viewport_height,
        ignore_https_errors: browser.ignore_https_errors.unwrap_or(true),
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let seconds = render
        .page_timeout_seconds
        .unwrap_or(DEFAULT_PAGE_TIMEOUT_SECS);
    let page_timeout = positive_seconds(seconds)
        .ok_or_else(|| LoadError::invalid("render.page_timeout_seconds", "must be a positive number"))?;

    let basedir = render
        .basedir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BASEDIR));
    if basedir.as_os_str().is_empty() {
        return Err(LoadError::invalid("render.basedir", "path must not be empty"));
    }

    Ok(RenderSettings {
        page_timeout,
        basedir,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrowserSettings {
    executable_path: Option<PathBuf>,
    extra_args: Option<Vec<String>>,
    headless: Option<bool>,
    viewport_width: Option<u32>,
    viewport_height: Option<u32>,
    ignore_https_errors: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    page_timeout_seconds: Option<f64>,
    basedir: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests;
