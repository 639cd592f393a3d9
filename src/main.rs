use std::{process, sync::Arc};

use catalog_relay::{
    application::error::AppError,
    clock::SystemClock,
    config,
    context::RelayContext,
    infra::{
        credentials::MemoryCredentialStore, error::InfraError, http, telemetry,
        upstream::HttpUpstream,
    },
};
use tokio::{signal, sync::Notify};
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
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging).map_err(AppError::from)?;
            run_serve(settings).await
        }
        config::Command::CheckConfig(_) => {
            println!("{settings:#?}");
            Ok(())
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let upstream = HttpUpstream::new(&settings.upstream)?;
    let relay = Arc::new(RelayContext::new(
        settings.cache.clone(),
        settings.upstream.auth_settings(),
        Arc::new(upstream),
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(SystemClock),
    ));

    let sweeper = relay.spawn_index_sweeper();
    let result = serve_http(&settings, relay).await;

    sweeper.abort();
    let _ = sweeper.await;

    result
}

async fn serve_http(settings: &config::Settings, relay: Arc<RelayContext>) -> Result<(), AppError> {
    let router = http::build_router(relay);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "catalog_relay::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = signal::ctrl_c().await {
                warn!(
                    target = "catalog_relay::serve",
                    error = %err,
                    "failed to listen for shutdown signal"
                );
                std::future::pending::<()>().await;
            }
            info!(target = "catalog_relay::serve", "shutting down");
            shutdown.notify_one();
        }
    });

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            shutdown.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "catalog_relay::serve",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out"
            );
        }
    }

    Ok(())
}
