// src/main.rs
use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use least_conn_balancer::{
    config::{self, Config},
    health::{HealthChecker, HttpProbe},
    metrics::MetricsRegistry,
    proxy::{BackendPool, Proxy},
    server::{AdminHandler, RequestHandler, ServerBuilder},
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("least_conn_balancer=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            config::load_config(&path).await?
        }
        None => {
            info!("No configuration file given, using built-in defaults");
            let config = Config::default();
            config.validate()?;
            config
        }
    };

    let metrics_registry = Arc::new(MetricsRegistry::new()?);
    let metrics = metrics_registry.collector();

    let pool = BackendPool::new(config.backends.iter().cloned());

    let probe = Arc::new(HttpProbe::new(&config)?);
    let health = Arc::new(HealthChecker::new(
        config.health_check.interval(),
        pool.clone(),
        probe,
        Some(metrics.clone()),
    ));
    let _monitors = health.start();

    if config.metrics.enabled {
        let admin_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        let admin = AdminHandler::new(metrics_registry, pool.clone(), &config.metrics.path);
        start_admin_server(admin_addr, admin);
    }

    let proxy = Arc::new(Proxy::new(&config, pool, Some(metrics)));

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Starting load balancer on {}", addr);
    info!("Tracing support enabled: {}", config.trace);

    ServerBuilder::new(addr)
        .with_handler(RequestHandler::new(proxy))
        .serve_with_shutdown(shutdown_signal())
        .await?;

    health.shutdown();
    info!("Load balancer stopped");
    Ok(())
}

fn start_admin_server(addr: SocketAddr, admin: AdminHandler) {
    let make_service = make_service_fn(move |_| {
        let admin = admin.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let admin = admin.clone();
                async move { admin.handle(req).await }
            }))
        }
    });

    info!("Admin server listening on http://{}", addr);

    tokio::spawn(async move {
        match Server::try_bind(&addr) {
            Ok(builder) => {
                if let Err(e) = builder.serve(make_service).await {
                    error!("Admin server error: {}", e);
                }
            }
            Err(e) => error!("Admin server failed to bind {}: {}", addr, e),
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
