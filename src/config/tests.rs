use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        logging: LoggingOverrides {
            log_level: Some("debug".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_resolve_without_sources() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert!(settings.browser.headless);
    assert!(settings.browser.ignore_https_errors);
    assert!(settings.browser.executable_path.is_none());
    assert_eq!(settings.browser.viewport_width, 1920);
    assert_eq!(settings.browser.viewport_height, 1080);
    assert_eq!(settings.render.page_timeout, Duration::from_secs(30));
    assert_eq!(settings.render.basedir, PathBuf::from("."));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        logging: LoggingOverrides {
            log_json: Some(true),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn cli_browser_args_extend_configured_args() {
    let mut raw = RawSettings::default();
    raw.browser.extra_args = Some(vec!["--single-process".to_string()]);

    let overrides = BrowserOverrides {
        extra_args: vec!["--disable-gpu".to_string(), "  ".to_string()],
        ..Default::default()
    };
    raw.apply_browser_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(
        settings.browser.extra_args,
        vec!["--single-process".to_string(), "--disable-gpu".to_string()]
    );
}

#[test]
fn rejects_non_positive_timeout() {
    let mut raw = RawSettings::default();
    raw.render.page_timeout_seconds = Some(0.0);

    let err = Settings::from_raw(raw).expect_err("zero timeout must be rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "render.page_timeout_seconds",
            ..
        }
    ));
}

#[test]
fn rejects_oversized_timeout() {
    let mut raw = RawSettings::default();
    raw.render.page_timeout_seconds = Some(1e30);

    let err = Settings::from_raw(raw).expect_err("oversized timeout must be rejected");
    assert!(err.to_string().contains("render.page_timeout_seconds"));
}

#[test]
fn rejects_zero_port() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn rejects_empty_executable_path() {
    let mut raw = RawSettings::default();
    raw.browser.executable_path = Some(PathBuf::new());

    let err = Settings::from_raw(raw).expect_err("empty path must be rejected");
    assert!(err.to_string().contains("browser.executable_path"));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["pdfrelay"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "pdfrelay",
        "render",
        "--type",
        "string",
        "--format",
        "pug",
        "--value-file",
        "/tmp/report.hbs",
        "--timeout",
        "12.5",
        "--browser-arg",
        "--disable-gpu",
        "-o",
        "/tmp/report.pdf",
    ]);

    match args.command.expect("render command") {
        Command::Render(render) => {
            assert_eq!(render.kind, "string");
            assert_eq!(render.format.as_deref(), Some("pug"));
            assert_eq!(
                render.value_file.as_deref(),
                Some(std::path::Path::new("/tmp/report.hbs"))
            );
            assert_eq!(render.timeout, Some(12.5));
            assert_eq!(render.browser.extra_args, vec!["--disable-gpu".to_string()]);
            assert_eq!(
                render.output.as_deref(),
                Some(std::path::Path::new("/tmp/report.pdf"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "pdfrelay",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--browser-executable-path",
        "/opt/chromium/chrome",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.browser.executable_path.as_deref(),
                Some(std::path::Path::new("/opt/chromium/chrome"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
