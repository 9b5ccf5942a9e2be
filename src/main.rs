use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand::RngCore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway::api;
use gateway::cli;
use gateway::config::{self, Config, LogFormat};
use gateway::store::memory::MemoryStore;
use gateway::store::postgres::PgStore;
use gateway::store::{AccountStore, TokenLedger};
use gateway::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    init_tracing(cfg.log_format);

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port, memory }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port, memory).await
        }
        Some(cli::Commands::GenSecret) => {
            let mut secret = zeroize::Zeroizing::new([0u8; 32]);
            rand::rngs::OsRng.fill_bytes(&mut secret[..]);
            println!("{}", hex::encode(&secret[..]));
            Ok(())
        }
        Some(cli::Commands::Token { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            handle_token_command(&db, command).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port, false).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "gateway=debug,smartroute=debug,tower_http=debug".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn run_server(cfg: Config, port: u16, memory: bool) -> anyhow::Result<()> {
    let state = if memory {
        tracing::warn!("Using in-memory store; accounts and tokens are lost on exit");
        AppState::from_config(MemoryStore::new(), &cfg)?
    } else {
        tracing::info!("Connecting to database...");
        let db = PgStore::connect(&cfg.database_url).await?;

        tracing::info!("Running migrations...");
        db.migrate().await?;

        AppState::from_config(db, &cfg)?
    };
    let state = Arc::new(state);

    tracing::info!(bypass = ?cfg.bypass.prefixes(), "Auth gate configured");

    let app = api::router(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("SmartRoute gateway listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    use axum::http::HeaderValue;

    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    // Responses may carry tokens.
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.remove("Server");

    resp
}

async fn handle_token_command(db: &PgStore, cmd: cli::TokenCommands) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Revoke { token } => {
            let existed = db.find(&token).await?.is_some();
            db.revoke(&token).await?;
            if existed {
                println!("Token revoked.");
            } else {
                println!("Token not found.");
            }
        }
        cli::TokenCommands::RevokeUser { email } => {
            let email = email.trim().to_lowercase();
            let account = db
                .find_account(&email)
                .await?
                .with_context(|| format!("account not found: {}", email))?;
            let revoked = db.revoke_all_for_owner(account.id).await?;
            println!("Revoked {} token(s) for {}.", revoked, email);
        }
    }
    Ok(())
}
