//! Configuration management for shelfserve
//!
//! Settings come from the command line, optionally overlaid by a TOML file
//! named with `-c`. Values in the file win over command-line defaults.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{value_parser, Parser};
use serde::Deserialize;

use crate::epub::archive::DEFAULT_MAX_INFLATE;
use crate::epub::cache::DEFAULT_CAPACITY;

pub const DEFAULT_WORKERS: usize = 2;

#[derive(Debug, Parser)]
#[command(name = "shelfserve", version, about)]
pub struct Cli {
    /// The address the server binds to. Specify '::' to bind to all addresses
    #[arg(short, long, default_value = "0.0.0.0")]
    pub address: String,

    /// The server listening port
    #[arg(short, long, default_value_t = 1131, value_parser = value_parser!(u16).range(1..))]
    pub port: u16,

    /// The contents root directory
    #[arg(short, long, default_value = ".")]
    pub root_dir: PathBuf,

    /// Path of a TOML config file
    #[arg(short, long)]
    pub config_file: Option<PathBuf>,

    /// Print the bcrypt hash of a password for the config file and exit
    #[arg(long, value_name = "PASSWORD")]
    pub hash_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    address: Option<String>,
    port: Option<u16>,
    root_dir: Option<PathBuf>,
    cert_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
    user_name: Option<String>,
    password_hash: Option<String>,
    workers: Option<usize>,
    book_cache_size: Option<usize>,
    max_inflate_size: Option<u64>,
}

/// TLS certificate chain and private key, both PEM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Basic auth credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_name: String,
    /// bcrypt hash
    pub password_hash: String,
}

/// Effective server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub address: String,
    pub port: u16,
    pub root_dir: PathBuf,
    pub tls: Option<TlsConfig>,
    pub credentials: Option<Credentials>,
    pub workers: usize,
    pub book_cache_size: usize,
    pub max_inflate_size: u64,
}

impl Config {
    /// Defaults for serving `root_dir`
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 1131,
            root_dir: root_dir.into(),
            tls: None,
            credentials: None,
            workers: DEFAULT_WORKERS,
            book_cache_size: DEFAULT_CAPACITY,
            max_inflate_size: DEFAULT_MAX_INFLATE,
        }
    }

    /// `address:port`, bracketing IPv6 literals
    pub fn bind_addr(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

fn parse_config_file(file: &Path) -> Result<TomlConfig> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read config file {}", file.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse config file {}", file.display()))
}

fn pair<A, B>(a: Option<A>, b: Option<B>, what: &str) -> Result<Option<(A, B)>> {
    match (a, b) {
        (Some(a), Some(b)) => Ok(Some((a, b))),
        (None, None) => Ok(None),
        _ => bail!("Both {} are needed", what),
    }
}

/// Merge the CLI with the optional config file and validate the result
pub fn get_config(cli: Cli) -> Result<Config> {
    let mut config = Config {
        address: cli.address,
        port: cli.port,
        ..Config::new(cli.root_dir)
    };

    let Some(path) = cli.config_file else {
        return Ok(config);
    };
    let file = parse_config_file(&path)?;

    config.tls = pair(file.cert_path, file.key_path, "cert file and key file")?
        .map(|(cert_path, key_path)| TlsConfig { cert_path, key_path });
    config.credentials = pair(file.user_name, file.password_hash, "user name and password hash")?
        .map(|(user_name, password_hash)| Credentials {
            user_name,
            password_hash,
        });

    if let Some(address) = file.address {
        config.address = address;
    }
    if let Some(port) = file.port {
        if port == 0 {
            bail!("port must be at least 1");
        }
        config.port = port;
    }
    if let Some(root_dir) = file.root_dir {
        config.root_dir = root_dir;
    }
    if let Some(workers) = file.workers {
        if workers == 0 {
            bail!("workers must be at least 1");
        }
        config.workers = workers;
    }
    if let Some(size) = file.book_cache_size {
        if size == 0 {
            bail!("book_cache_size must be at least 1");
        }
        config.book_cache_size = size;
    }
    if let Some(limit) = file.max_inflate_size {
        config.max_inflate_size = limit;
    }

    Ok(config)
}
