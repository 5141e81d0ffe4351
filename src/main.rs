mod db;
mod entities;
mod export;
mod models;
mod repo;
mod routes;
mod scanner;
mod state;
mod validation;

use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use clap::Parser;
use sea_orm::{EntityTrait, PaginatorTrait};
use tracing_subscriber::EnvFilter;

use entities::operator;
use scanner::CommandReader;
use state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Database path
    #[arg(short, long, env = "DATABASE_PATH", default_value = "forkpi.db")]
    db_path: String,

    /// Host name accepted in the Host header besides loopback
    #[arg(long, env = "EXTERNAL_HOST", default_value = "localhost")]
    external_host: String,

    /// Program that waits for a tag and prints its UID
    #[arg(long, env = "READER_COMMAND", default_value = "nfc-read-uid")]
    reader_command: String,

    /// Extra argument for the reader program (repeatable)
    #[arg(long = "reader-arg")]
    reader_args: Vec<String>,

    /// Admin nickname for first run
    #[arg(long, env = "ADMIN_NICK")]
    admin_nick: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let port = args.port;

    // JWT secret: from env, from file, or generate and save to file
    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        let secret_path = std::path::Path::new("jwt_secret.key");
        if let Ok(saved) = std::fs::read_to_string(secret_path) {
            let saved = saved.trim().to_string();
            if !saved.is_empty() {
                tracing::info!("Loaded JWT secret from jwt_secret.key");
                return saved;
            }
        }
        let secret = random_string(64);
        if let Err(e) = std::fs::write(secret_path, &secret) {
            tracing::warn!("Could not save JWT secret to file: {e}");
        } else {
            tracing::info!("Generated and saved JWT secret to jwt_secret.key");
        }
        secret
    });

    tracing::info!("Initializing database at {}", args.db_path);
    let db = db::init_db(&args.db_path).await?;

    // --- First-Run Operator ---
    if let Some(nick) = args.admin_nick {
        let operator_count = operator::Entity::find().count(&db).await?;

        if operator_count == 0 {
            let temp_password = random_string(12);
            routes::auth::create_operator(&db, &nick, &temp_password).await?;

            println!();
            println!("  ╔══════════════════════════════════════════════╗");
            println!("  ║         FIRST-RUN OPERATOR CREATED!          ║");
            println!("  ╠══════════════════════════════════════════════╣");
            println!("  ║  Username: {:<34}║", nick.to_lowercase());
            println!("  ║  Password: {:<34}║", temp_password);
            println!("  ╠══════════════════════════════════════════════╣");
            println!("  ║  PLEASE SAVE THESE CREDENTIALS NOW!          ║");
            println!("  ╚══════════════════════════════════════════════╝");
            println!();
        }
    }

    tracing::info!("Using RFID reader program {}", args.reader_command);
    let reader = Arc::new(CommandReader::new(args.reader_command, args.reader_args));
    let state = AppState::new(db, jwt_secret, reader);

    let allowed_host = args.external_host;
    let app = routes::router(state).layer(middleware::from_fn(move |req, next| {
        validate_host(req, next, allowed_host.clone())
    }));

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("ForkPi keypair server listening on http://localhost:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn random_string(len: usize) -> String {
    use rand::Rng;
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Host part of a Host header value, without the port.
fn host_name(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}

/// Reject requests with an unexpected Host header (DNS rebinding protection).
async fn validate_host(req: Request, next: Next, allowed_host: String) -> Response {
    if let Some(host_val) = req.headers().get("host").and_then(|v| v.to_str().ok()) {
        let host_str = host_name(host_val);
        let is_local = host_str == "localhost" || host_str == "127.0.0.1" || host_str == "::1";
        let is_allowed = host_str == allowed_host;
        if !is_local && !is_allowed {
            return (axum::http::StatusCode::MISDIRECTED_REQUEST, "Misdirected Request").into_response();
        }
    }
    next.run(req).await
}
