mod api;
mod middleware;
mod scheduler;

use fuelwatch_core::Environment;
use fuelwatch_db::{PoolConfig, Store};
use fuelwatch_pipeline::{spawn_cycle_worker, Services, TriggerSource};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = fuelwatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "configuration loaded");

    let store = Store::connect(&config.database_url, PoolConfig::from_app_config(&config)).await?;
    let applied = store.run_migrations().await?;
    tracing::info!(applied, "migrations up to date");

    let services = Services::from_config(store.clone(), &config)?;
    let (cycles, worker) = spawn_cycle_worker(services.runner.clone());

    if config.cycle.run_on_startup {
        cycles.trigger(TriggerSource::Startup)?;
    }
    let mut scheduler = scheduler::build_scheduler(cycles.clone(), &config.cycle.schedule).await?;

    let auth = AuthState::new(&config.api_keys, config.env == Environment::Development)?;
    let state = AppState {
        store: store.clone(),
        registry: services.registry,
        query: services.query,
        cycles: cycles.clone(),
        top_k: config.cycle.top_k,
    };
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    cycles.shutdown();
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "cycle worker panicked");
    }
    store.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
