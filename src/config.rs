use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Parser, Debug)]
#[command(name = "toka", version, about = "Share and discover music from the terminal")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to data directory (local storage, logs, self-hosted store)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Store backend to use
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Base URL of the hosted store
    #[arg(long)]
    pub store_url: Option<String>,

    /// Public (anon) key of the hosted store
    #[arg(long, env = "TOKA_ANON_KEY", hide_env_values = true)]
    pub anon_key: Option<String>,

    /// Location to open, e.g. "/" or "/profile/Jane%20Doe"
    #[arg(long, default_value = "/")]
    pub path: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Hosted query + storage API
    #[default]
    Rest,
    /// SQLite file and blob directory inside the data dir
    Sqlite,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub sqlite: SqliteConfig,
    pub log: LogConfig,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub bucket: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SqliteConfig {
    pub path: Option<PathBuf>,
    pub blob_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LogConfig {
    pub file: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Rest,
            url: None,
            anon_key: None,
            bucket: "songs".to_string(),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> AppResult<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config: Config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|err| {
                AppError::Config(format!("{}: {}", config_path.display(), err))
            })?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(backend) = cli.backend {
            config.store.backend = backend;
        }
        if let Some(ref url) = cli.store_url {
            config.store.url = Some(url.clone());
        }
        if let Some(ref anon_key) = cli.anon_key {
            config.store.anon_key = Some(anon_key.clone());
        }

        // Resolve paths relative to data dir
        if config.sqlite.path.is_none() {
            config.sqlite.path = Some(data_dir.join("toka.db"));
        }
        if config.sqlite.blob_dir.is_none() {
            config.sqlite.blob_dir = Some(data_dir.join("blobs"));
        }
        if config.log.file.is_none() {
            config.log.file = Some(data_dir.join("toka.log"));
        }
        config.data_dir = data_dir;

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".toka")
        })
    }

    pub fn local_storage_path(&self) -> PathBuf {
        self.data_dir.join("local_storage.json")
    }

    pub fn sqlite_path(&self) -> &std::path::Path {
        self.sqlite
            .path
            .as_deref()
            .unwrap_or_else(|| std::path::Path::new("toka.db"))
    }

    pub fn blob_dir(&self) -> &std::path::Path {
        self.sqlite
            .blob_dir
            .as_deref()
            .unwrap_or_else(|| std::path::Path::new("blobs"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log
            .file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("toka.log"))
    }
}
