use std::{net::SocketAddr, process};

use sportsbuddy::{
    application::error::AppError,
    cache::CacheContext,
    config::{self, Command, Settings},
    infra::{
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use tokio::sync::watch;
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    match cli_args.command.unwrap_or(Command::Serve) {
        Command::CheckConfig => check_config(&settings),
        Command::Serve => {
            telemetry::init(&settings.logging).map_err(AppError::from)?;
            run_serve(settings).await
        }
    }
}

fn check_config(settings: &Settings) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(&settings.redacted())
        .map_err(|err| AppError::unexpected(format!("failed to render settings: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let cache = CacheContext::from_settings(&settings);
    if cache.store().is_enabled() && !cache.store().ping().await {
        warn!(
            target = "sportsbuddy::startup",
            backend = cache.store().backend_name(),
            "cache store unreachable at startup; serving uncached until it recovers"
        );
    }
    info!(
        target = "sportsbuddy::startup",
        backend = cache.store().backend_name(),
        environment = settings.environment.as_str(),
        single_flight = settings.cache.single_flight,
        rate_limit = settings.rate_limit.enabled,
        "cache context ready"
    );

    let state = ApiState::in_memory(cache, settings.rate_limit.clone());
    serve_http(&settings, state).await
}

async fn serve_http(settings: &Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(settings.server.addr, err)))?;
    info!(
        target = "sportsbuddy::startup",
        addr = %settings.server.addr,
        "listening"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let drain_deadline = async move {
        if shutdown_rx.wait_for(|stopping| *stopping).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline => {
            warn!(
                target = "sportsbuddy::shutdown",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "sportsbuddy::shutdown", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!(target = "sportsbuddy::shutdown", "shutdown signal received");
}
