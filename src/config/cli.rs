use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the pdfrelay binary.
#[derive(Debug, Parser)]
#[command(name = "pdfrelay", version, about = "Headless-browser PDF renderer")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PDFRELAY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve render requests over HTTP.
    Serve(Box<ServeArgs>),
    /// Render a single document and exit.
    Render(Box<RenderArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BrowserOverrides {
    /// Override the browser executable used for rendering.
    #[arg(long = "browser-executable-path", value_name = "PATH")]
    pub executable_path: Option<PathBuf>,

    /// Additional browser launch argument; may be repeated.
    #[arg(long = "browser-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub extra_args: Vec<String>,

    /// Toggle headless browser mode.
    #[arg(
        long = "browser-headless",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub headless: Option<bool>,

    /// Override the default page render timeout.
    #[arg(long = "page-timeout-seconds", value_name = "SECONDS")]
    pub page_timeout_seconds: Option<f64>,

    /// Override the directory templates resolve files against.
    #[arg(long = "basedir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub basedir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub browser: BrowserOverrides,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub browser: BrowserOverrides,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Source kind: `url` or `string`.
    #[arg(long = "type", value_name = "KIND", default_value = "url")]
    pub kind: String,

    /// Markup format for string sources: `pug` or `html`.
    #[arg(long = "format", value_name = "FORMAT")]
    pub format: Option<String>,

    /// Source value (a URL or inline markup).
    #[arg(long = "value", value_name = "VALUE", conflicts_with = "value_file")]
    pub value: Option<String>,

    /// Read the source value from a file.
    #[arg(long = "value-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub value_file: Option<PathBuf>,

    /// Per-request page timeout in seconds.
    #[arg(long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Write the decoded PDF here instead of printing the response envelope.
    #[arg(long = "output", short = 'o', value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}
