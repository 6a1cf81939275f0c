use clap::Parser;
use taskflow_resources::Scheduler;
use taskflow_server::{create_app, Core, Settings};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("taskflow: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = Settings::parse();
    let core = Core::build(&settings).await?;

    let (scheduler_cancel_tx, scheduler_cancel_rx) = tokio::sync::watch::channel(false);
    let scheduler = Scheduler::new(core.resources.clone(), core.store.clone());
    let scheduler_handle = tokio::spawn(scheduler.run(scheduler_cancel_rx));

    let app = create_app(core);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "taskflow server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = scheduler_cancel_tx.send(true);
    let _ = scheduler_handle.await;

    tracing::info!("taskflow server shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
