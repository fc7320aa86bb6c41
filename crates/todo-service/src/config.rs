use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "todo-service")]
#[command(about = "HTTP service for the todo list")]
#[command(version)]
pub struct Args {
    #[arg(long, default_value = "./todo.sqlite3")]
    pub db: PathBuf,
    #[arg(long, default_value = "127.0.0.1:4000")]
    pub bind: SocketAddr,
    #[arg(long, value_enum, default_value_t = Environment::Development)]
    pub env: Environment,
    #[arg(long, default_value_t = 3000)]
    pub operation_timeout_ms: u64,
    /// Upper bound on handling one request, body read and response included.
    #[arg(long, default_value_t = 30_000)]
    pub request_timeout_ms: u64,
    /// Log filter directive; `RUST_LOG` takes precedence when set.
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// Settings resolved once at startup and shared read-only with handlers.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind: SocketAddr,
    pub environment: Environment,
    pub operation_timeout: Duration,
    pub request_timeout: Duration,
    pub log_filter: String,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            db_path: args.db,
            bind: args.bind,
            environment: args.env,
            operation_timeout: Duration::from_millis(args.operation_timeout_ms),
            request_timeout: Duration::from_millis(args.request_timeout_ms),
            log_filter: args.log_filter,
        }
    }
}
