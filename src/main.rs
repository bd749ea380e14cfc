use std::future::IntoFuture;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use bookstore::{
    application::{
        auth::AuthService,
        catalog::CatalogService,
        error::AppError,
        repos::{AuthorsRepo, BooksRepo, OrdersRepo, UsersRepo},
        reports::ReportService,
    },
    cache::{AdmissionController, AdmissionPolicy, ResponseCache, TokenRegistry, spawn_sweeper},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState},
        reports::{self, ReportWriter},
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Report(_) => run_report(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories.clone(), &settings);

    let mut background = vec![
        spawn_sweeper(
            "response_cache",
            app.state.responses.clone(),
            settings.cache.sweep_interval,
        ),
        spawn_sweeper(
            "admission",
            app.state.admission.clone(),
            settings.rate_limit.window,
        ),
    ];

    if settings.reports.enabled {
        info!(
            target = "bookstore::reports",
            dir = %app.report_writer.dir().display(),
            interval_secs = settings.reports.interval.as_secs(),
            "Sales report job scheduled"
        );
        background.push(reports::spawn_report_job(
            app.reports,
            app.report_writer,
            settings.reports.interval,
        ));
    }

    let result = serve_http(&settings, app.state).await;

    for handle in background {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_report(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);

    let path = reports::run_once(&app.reports, &app.report_writer).await?;
    info!(
        target = "bookstore::reports",
        path = %path.display(),
        "Report completed"
    );
    Ok(())
}

struct ApplicationContext {
    state: AppState,
    reports: ReportService,
    report_writer: ReportWriter,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> ApplicationContext {
    let books_repo: Arc<dyn BooksRepo> = repositories.clone();
    let authors_repo: Arc<dyn AuthorsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let orders_repo: Arc<dyn OrdersRepo> = repositories;

    let tokens = Arc::new(TokenRegistry::new());
    let admission = Arc::new(AdmissionController::new(AdmissionPolicy {
        rate: settings.rate_limit.rate_per_second,
        burst: settings.rate_limit.burst.get(),
        window: settings.rate_limit.window,
    }));

    let state = AppState {
        auth: Arc::new(AuthService::new(users_repo, tokens.clone())),
        catalog: Arc::new(CatalogService::new(books_repo, authors_repo)),
        tokens,
        admission,
        responses: Arc::new(ResponseCache::new()),
        cache_ttl: settings.cache.ttl,
        request_timeout: settings.server.request_timeout,
    };

    ApplicationContext {
        state,
        reports: ReportService::new(orders_repo, settings.reports.lookback),
        report_writer: ReportWriter::new(settings.reports.output_dir.clone()),
    }
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "bookstore::http",
        addr = %settings.server.addr,
        "Listening"
    );

    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = shutdown_deadline(grace) => {
            warn!(
                target = "bookstore::http",
                grace_secs = grace.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "bookstore::http", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "bookstore::http", "Shutdown signal received");
}

/// Completes `grace` after the shutdown signal fires.
async fn shutdown_deadline(grace: Duration) {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

