use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "postbook", about = "Accounts, profiles, posts, likes and comments over HTTP")]
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

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an account with staff and superuser capabilities
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Root directory of the image store.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "postbook_session".to_string(),
            session_hours: 720,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
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

        config.resolve_paths(&data_dir);
        Ok(config)
    }

    /// Fills unset paths relative to `data_dir`.
    pub fn resolve_paths(&mut self, data_dir: &std::path::Path) {
        if self.database.path.is_none() {
            self.database.path = Some(data_dir.join("postbook.db"));
        }
        if self.storage.path.is_none() {
            self.storage.path = Some(data_dir.join("media"));
        }
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".postbook")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("postbook.db"))
    }

    pub fn media_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("media"))
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
        assert_eq!(config.auth.cookie_name, "postbook_session");
        assert_eq!(config.auth.session_hours, 720);
        assert_eq!(config.auth.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.database.path.is_none());
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn create_admin_subcommand_parses() {
        let cli = Cli::parse_from([
            "postbook",
            "--port",
            "8080",
            "create-admin",
            "--email",
            "root@x.com",
            "--password",
            "pw",
        ]);
        assert_eq!(cli.port, Some(8080));
        match cli.command {
            Some(Command::CreateAdmin { email, password }) => {
                assert_eq!(email, "root@x.com");
                assert_eq!(password, "pw");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_with(Some(PathBuf::from("/tmp/test-postbook")));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-postbook"));
    }

    #[test]
    fn data_dir_defaults_to_dot_postbook() {
        let dir = Config::data_dir(&cli_with(None));
        assert!(dir.ends_with(".postbook"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_with(Some(tmp.path().to_path_buf()))).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.db_path(), tmp.path().join("postbook.db"));
        assert_eq!(config.media_path(), tmp.path().join("media"));
    }

    #[test]
    fn load_reads_toml_file_and_cli_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[storage]
path = "/srv/images"

[auth]
cookie_name = "my_cookie"
session_hours = 24
bcrypt_cost = 4
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
            command: None,
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.media_path(), PathBuf::from("/srv/images"));
        assert_eq!(config.auth.cookie_name, "my_cookie");
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(config.auth.bcrypt_cost, 4);
    }
}
