//! Assist API server binary.
//!
//! `serve` runs the HTTP API against PostgreSQL. `create-user` provisions an
//! account, since the API itself has no registration endpoint.

use std::net::SocketAddr;
use std::time::Duration;

use assist_api::AppState;
use assist_api::config::ApiConfig;
use assist_core::auth::password::hash_password_with_cost;
use assist_core::cpf;
use assist_core::models::auth::{NewUser, Role};
use assist_core::rate_limit::RateLimiter;
use assist_core::store::{Stores, UserStore};
use clap::{Args, Parser, Subcommand};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often expired rate-limit windows are swept.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "assist_api_server", about = "Assist API server")]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct DbArgs {
    /// PostgreSQL connection URL. Overrides `DATABASE_URL` from the config.
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, global = true, default_value_t = 10)]
    max_connections: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Address to listen on. Overrides `BIND_ADDR`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Create a user account.
    CreateUser {
        /// CPF, formatted or bare.
        #[arg(long)]
        cpf: String,

        #[arg(long)]
        name: String,

        /// One of beneficiary, server, secretary, coordinator.
        #[arg(long)]
        role: Role,

        #[arg(long)]
        email: Option<String>,

        /// Initial password. Read from the environment to keep it out of
        /// shell history.
        #[arg(long, env = "ASSIST_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,assist_api=debug,assist_core=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ApiConfig::from_env()?;
    if let Some(url) = cli.db.database_url {
        config.database_url = url;
    }

    let pool = connect(&config.database_url, cli.db.max_connections).await?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            serve(config, pool).await
        }
        Command::CreateUser {
            cpf,
            name,
            role,
            email,
            password,
        } => create_user(&config, pool, &cpf, name, role, email, &password).await,
    }
}

async fn connect(url: &str, max_connections: u32) -> Result<PgPool, Box<dyn std::error::Error>> {
    info!(max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await?;

    info!("running database migrations");
    assist_api::migrate(&pool).await?;
    Ok(pool)
}

async fn serve(config: ApiConfig, pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        bind_addr = %config.bind_addr,
        production = config.is_hardened(),
        "starting assist_api_server"
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, Stores::postgres(pool));

    let shutdown = CancellationToken::new();
    let pruner = tokio::spawn(prune_windows(state.limiter.clone(), shutdown.clone()));

    let app = assist_api::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutting down");
            shutdown.cancel();
        }
    })
    .await;

    shutdown.cancel();
    let _ = pruner.await;

    result?;
    Ok(())
}

/// Drops elapsed rate-limit windows until cancelled.
async fn prune_windows(limiter: std::sync::Arc<RateLimiter>, ct: CancellationToken) {
    let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        tokio::select! {
            _ = ct.cancelled() => break,
            _ = ticker.tick() => match limiter.prune().await {
                Ok(0) => {}
                Ok(pruned) => debug!(pruned, "pruned rate-limit windows"),
                Err(e) => warn!(error = %e, "rate-limit prune failed"),
            },
        }
    }
}

async fn create_user(
    config: &ApiConfig,
    pool: PgPool,
    cpf_input: &str,
    name: String,
    role: Role,
    email: Option<String>,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let digits = cpf::normalize(cpf_input).ok_or("invalid CPF")?;
    if password.len() < 8 {
        return Err("password must be at least 8 characters".into());
    }

    let password_hash = hash_password_with_cost(password, config.bcrypt_cost)?;
    let stores = Stores::postgres(pool);
    let user = stores
        .users
        .create(NewUser {
            cpf: digits,
            name,
            email,
            password_hash,
            role,
        })
        .await?;

    info!(
        user_id = user.id,
        cpf = %cpf::mask(&user.cpf),
        role = %user.role,
        "user created"
    );
    Ok(())
}
