use std::net::SocketAddr;

use anyhow::bail;
use clap::{ArgAction, Parser, ValueEnum};

use crate::store::StoreOptions;
use crate::validate::Rules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    Postgres,
    Memory,
}

/// Server settings, read from flags or the environment (a `.env` file is
/// loaded first by the binary).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "SSAAM_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Storage backend
    #[arg(long, env = "SSAAM_STORAGE", value_enum, default_value = "postgres")]
    pub storage: StorageKind,

    /// PostgreSQL connection string, required for the postgres backend
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "SSAAM_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Seconds to wait for a database connection before giving up
    #[arg(long, env = "SSAAM_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// Reject students whose RFID code is already registered
    #[arg(long, env = "SSAAM_ENFORCE_RFID_UNIQUENESS", default_value_t = true, action = ArgAction::Set)]
    pub enforce_rfid_uniqueness: bool,

    /// Require `school_year` and `semester` on every student
    #[arg(long, env = "SSAAM_REQUIRE_TERM_FIELDS", default_value_t = false, action = ArgAction::Set)]
    pub require_term_fields: bool,
}

impl Config {
    pub fn rules(&self) -> Rules {
        Rules {
            require_term_fields: self.require_term_fields,
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            enforce_rfid_uniqueness: self.enforce_rfid_uniqueness,
        }
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        match self.database_url.as_deref() {
            Some(url) if !url.is_empty() => Ok(url),
            _ => bail!("DATABASE_URL must be set when using the postgres storage backend"),
        }
    }
}
