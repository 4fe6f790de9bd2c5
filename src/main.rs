use std::{process, sync::Arc};

use pdfrelay::{
    application::{error::AppError, pipeline::RenderPipeline},
    config::{self, RenderArgs},
    domain::{envelope::ResponseEnvelope, request::RenderEvent},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;
    let pipeline = Arc::new(RenderPipeline::from_settings(&settings));

    match command {
        config::Command::Serve(_) => run_serve(settings, pipeline).await,
        config::Command::Render(args) => run_render(pipeline, *args).await,
    }
}

async fn run_serve(settings: config::Settings, pipeline: Arc<RenderPipeline>) -> Result<(), AppError> {
    let router = http::build_router(HttpState {
        pipeline: Arc::clone(&pipeline),
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "pdfrelay listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    if let Err(err) = pipeline.session().release_retained().await {
        warn!(error = %err, "failed to close retained browser");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}

async fn run_render(pipeline: Arc<RenderPipeline>, args: RenderArgs) -> Result<(), AppError> {
    let value = match (args.value, args.value_file) {
        (Some(value), _) => value,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?,
        (None, None) => {
            return Err(AppError::validation(
                "either --value or --value-file is required",
            ));
        }
    };

    let event = RenderEvent {
        value,
        kind: args.kind,
        format: args.format,
        timeout: args.timeout,
    };
    let envelope = pipeline.handle_event(event).await;

    match args.output {
        Some(path) => {
            let pdf = envelope
                .pdf_bytes()
                .ok_or_else(|| AppError::unexpected(envelope.message.clone()))?;
            tokio::fs::write(&path, &pdf)
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(path = %path.display(), pdf_bytes = pdf.len(), "PDF written");
            Ok(())
        }
        None => {
            print_envelope(&envelope)?;
            if envelope.is_success() {
                Ok(())
            } else {
                Err(AppError::unexpected(format!(
                    "render failed: {}",
                    envelope.message
                )))
            }
        }
    }
}

fn print_envelope(envelope: &ResponseEnvelope) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(envelope)
        .map_err(|err| AppError::unexpected(format!("failed to serialize envelope: {err}")))?;
    println!("{json}");
    Ok(())
}
