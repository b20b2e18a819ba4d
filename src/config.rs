use crate::api::DEFAULT_API_URL;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Tasks are kept in memory only when unset.
    pub data_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
    pub file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            data_file: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: "info".to_string(),
            file: None,
        }
    }
}

/// `<config dir>/kanban/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kanban").join("config.toml"))
}

impl Config {
    /// Reads the config file (explicit path, else the default location) and
    /// applies `KANBAN_*` / `RUST_LOG` overrides from the environment.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let mut config = match path {
            Some(path) => Config::from_file(&path)?,
            None => Config::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("KANBAN_HOST") {
            self.server.host = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "KANBAN_HOST",
                value,
            })?;
        }
        if let Some(value) = lookup("KANBAN_PORT") {
            self.server.port = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "KANBAN_PORT",
                value,
            })?;
        }
        if let Some(value) = lookup("KANBAN_DATA_FILE") {
            self.server.data_file = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("KANBAN_API_URL") {
            self.client.api_url = value;
        }
        if let Some(value) = lookup("KANBAN_LOG_FILE") {
            self.log.file = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("RUST_LOG") {
            self.log.filter = value;
        }
        Ok(())
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server_addr().to_string(), "127.0.0.1:5000");
        assert_eq!(config.client.api_url, "http://localhost:5000/api");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[server]\nport = 8080\ndata_file = \"/tmp/tasks.json\"\n\n[log]\nfilter = \"debug\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.server.data_file, Some(PathBuf::from("/tmp/tasks.json")));
        assert_eq!(config.log.filter, "debug");
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("KANBAN_HOST", "0.0.0.0"),
            ("KANBAN_PORT", "7000"),
            ("KANBAN_API_URL", "http://example.test/api"),
            ("RUST_LOG", "kanban=trace"),
        ]);
        let mut config = Config::default();
        config
            .apply_env(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server_addr().to_string(), "0.0.0.0:7000");
        assert_eq!(config.client.api_url, "http://example.test/api");
        assert_eq!(config.log.filter, "kanban=trace");
        assert_eq!(config.server.data_file, None);
    }

    #[test]
    fn test_invalid_port_env() {
        let mut config = Config::default();
        let err = config
            .apply_env(|name| (name == "KANBAN_PORT").then(|| "lots".to_string()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for KANBAN_PORT: lots");
    }
}
