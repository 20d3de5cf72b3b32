use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Process-wide token signing secret. Required before the first request;
    /// a missing secret is a fatal configuration error at startup.
    pub jwt_secret: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Used item market API")]
pub struct Args {
    /// Host to bind to (overrides MARKET_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MARKET_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides MARKET_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Token signing secret (overrides MARKET_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("MARKET_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("MARKET_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing MARKET_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading MARKET_PORT"),
        };
        let env_db = env::var("MARKET_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/market.db".into());

        let jwt_secret = match args.jwt_secret {
            Some(secret) => secret,
            None => env::var("MARKET_JWT_SECRET")
                .context("MARKET_JWT_SECRET must be set before the first request")?,
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            jwt_secret,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
