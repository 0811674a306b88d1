use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "comicshelf", about = "A self-hosted comic library")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Read a chapter in the terminal
    Read {
        /// Chapter id to open
        chapter_id: String,
    },
    /// Print this device's identifier
    DeviceId,
    /// Print reading stats and badges for this device
    Stats,
    /// Print a bcrypt hash suitable for `[admin] key_hash`
    HashAdminKey {
        /// Plaintext admin key
        key: String,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
    pub reader: ReaderConfig,
    pub local: LocalConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API from a browser. Empty allows any.
    pub cors_origins: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
    /// Base used when building public blob URLs. Defaults to the server address.
    pub public_base_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// bcrypt hash of the admin key. Admin routes are closed while unset.
    pub key_hash: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ReaderConfig {
    pub ui_idle_ms: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LocalConfig {
    pub path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { ui_idle_ms: 2200 }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("comicshelf.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("blobs"));
        }
        if config.storage.public_base_url.is_none() {
            let host = match config.server.host.as_str() {
                "0.0.0.0" => "localhost",
                other => other,
            };
            config.storage.public_base_url =
                Some(format!("http://{}:{}", host, config.server.port));
        }
        if let Some(base) = config.storage.public_base_url.as_deref() {
            url::Url::parse(base)
                .map_err(|e| anyhow::anyhow!("Invalid storage.public_base_url {}: {}", base, e))?;
        }
        if config.local.path.is_none() {
            config.local.path = Some(data_dir.join("local.json"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".comicshelf")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("comicshelf.db"))
    }

    pub fn blobs_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("blobs"))
    }

    pub fn public_base_url(&self) -> String {
        self.storage
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.server.port))
    }

    pub fn local_path(&self) -> PathBuf {
        self.local
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("local.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(data_dir: Option<PathBuf>) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir,
            command: None,
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.reader.ui_idle_ms, 2200);
        assert!(config.admin.key_hash.is_none());
        assert!(config.database.path.is_none());
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_with(Some(PathBuf::from("/tmp/test-comicshelf")));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-comicshelf"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_comicshelf() {
        let dir = Config::data_dir(&cli_with(None));
        assert!(dir.ends_with(".comicshelf"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_with(Some(tmp.path().to_path_buf()))).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.db_path(), tmp.path().join("comicshelf.db"));
        assert_eq!(config.blobs_path(), tmp.path().join("blobs"));
        assert_eq!(config.local_path(), tmp.path().join("local.json"));
        assert_eq!(config.public_base_url(), "http://localhost:3000");
    }

    #[test]
    fn load_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            host: Some("127.0.0.1".to_string()),
            port: Some(8080),
            ..cli_with(Some(tmp.path().to_path_buf()))
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.public_base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[storage]
public_base_url = "https://cdn.example.com"

[admin]
key_hash = "$2b$04$abc"

[reader]
ui_idle_ms = 5000
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            ..cli_with(Some(tmp.path().to_path_buf()))
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.public_base_url(), "https://cdn.example.com");
        assert_eq!(config.admin.key_hash.as_deref(), Some("$2b$04$abc"));
        assert_eq!(config.reader.ui_idle_ms, 5000);
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            ..cli_with(Some(tmp.path().to_path_buf()))
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn parses_read_subcommand() {
        let cli = Cli::parse_from(["comicshelf", "read", "ch-1"]);
        assert_eq!(
            cli.command,
            Some(Command::Read {
                chapter_id: "ch-1".to_string()
            })
        );
    }

    #[test]
    fn rejects_unparseable_public_base_url() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[storage]
public_base_url = "not a url"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            ..cli_with(Some(tmp.path().to_path_buf()))
        };
        assert!(Config::load(&cli).is_err());
    }
}
