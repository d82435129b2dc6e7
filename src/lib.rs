pub mod api;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
pub use config::Config;
use db::{NewUser, Role};
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder().label("app", "sokoni")?;
        for (key, value) in &config.observability.loki_labels {
            builder = builder.extra_field(key.clone(), value.clone())?;
        }
        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve" | "-d" | "--serve") => run_server(config, prometheus_handle).await,

        Some("create-admin") => {
            if args.len() < 4 {
                println!("Usage: sokoni create-admin <username> <email>");
                println!("Set ADMIN_PASSWORD to choose the password; otherwise one is generated.");
                return Ok(());
            }
            cmd_create_admin(&config, &args[2], &args[3]).await
        }

        Some("init" | "--init") => {
            Config::create_default_if_missing()?;
            println!("Config file created. Edit config.toml and run again.");
            Ok(())
        }

        Some("help" | "-h" | "--help") => {
            print_help();
            Ok(())
        }

        Some(other) => {
            println!("Unknown command: {other}");
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Sokoni - SME directory platform backend");
    println!();
    println!("USAGE:");
    println!("  sokoni <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("  serve                          Run the HTTP server (default)");
    println!("  create-admin <username> <email>");
    println!("                                 Provision an admin account");
    println!("  init                           Create default config file");
    println!("  help                           Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("  DATABASE_URL or DB_HOST/DB_PORT/DB_NAME/DB_USER/DB_PASSWORD");
    println!("  SESSION_SECRET, APP_ENV, PORT, ADMIN_PASSWORD (create-admin)");
}

/// The only path that can produce an `admin` account. Neither sign-in path
/// can; federated first contact always lands on `user`.
async fn cmd_create_admin(config: &Config, username: &str, email: &str) -> anyhow::Result<()> {
    let password = match std::env::var("ADMIN_PASSWORD") {
        Ok(password) if password.len() >= 8 => password,
        Ok(_) => anyhow::bail!("ADMIN_PASSWORD must be at least 8 characters"),
        Err(_) => {
            let generated = generate_password();
            println!("Generated password: {generated}");
            println!("Store it now; it is not recoverable later.");
            generated
        }
    };

    let shared = SharedState::new(config.clone()).await?;

    let user = shared
        .store
        .create_user(
            NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password: Some(password),
                ..Default::default()
            },
            Role::Admin,
        )
        .await?;

    println!("Admin account created: {} (id {})", user.username, user.id);

    shared.store.close_and_drain().await?;
    Ok(())
}

fn generate_password() -> String {
    use rand::Rng;
    use rand::distr::Alphanumeric;

    let mut rng = rand::rng();
    (0..24).map(|_| rng.sample(Alphanumeric) as char).collect()
}

async fn run_server(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!("Sokoni v{} starting...", env!("CARGO_PKG_VERSION"));

    let shared = Arc::new(SharedState::new(config.clone()).await?);
    let api_state = api::create_app_state(shared.clone(), prometheus_handle);

    let app = api::router(api_state).await?;
    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Web server running at http://{addr}");
    info!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight handlers have finished; now drain the pool before exiting.
    shared.store.clone().close_and_drain().await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Error listening for shutdown: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Error installing SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Shutdown signal received"),
        () = terminate => info!("SIGTERM received"),
    }
}
