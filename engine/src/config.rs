use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

lazy_static! {
    static ref root_config_path: PathBuf =
        PathBuf::from(&shellexpand::tilde("~/.kingjuke/").to_string());
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct JukeboxConfig {
    pub theme: String,
    pub tags: Vec<String>,
    /// Terms refused anywhere in a song title.
    pub blacklist: Vec<String>,

    pub admin_user: String,
    pub admin_password: String,

    pub socket_name: String,
    pub output_device: Option<String>,
    pub library_dir: Option<PathBuf>,
}

impl Default for JukeboxConfig {
    fn default() -> Self {
        Self {
            theme: "Anything".to_owned(),
            tags: Vec::new(),
            blacklist: Vec::new(),

            admin_user: "user".to_owned(),
            admin_password: "password".to_owned(),

            socket_name: "kingjuke.sock".to_owned(),
            output_device: None,
            library_dir: None,
        }
    }
}

impl JukeboxConfig {
    /// Reads `~/.kingjuke/config.json`, then applies the environment.
    pub fn load() -> Result<JukeboxConfig, ConfigError> {
        let mut config = JukeboxConfig::load_from(&root_config_path.join("config.json"))?;

        config.apply_env(|key| env::var(key).ok());

        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<JukeboxConfig, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());

                return Ok(JukeboxConfig::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        let mut config: JukeboxConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })?;

        if let Some(library_dir) = &config.library_dir {
            let expanded = shellexpand::tilde(&library_dir.to_string_lossy()).to_string();
            config.library_dir = Some(PathBuf::from(expanded));
        }

        info!("Loaded config from {}", path.display());

        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(user) = lookup("JUKEBOX_ADMIN_USER").filter(|user| !user.is_empty()) {
            self.admin_user = user;
        }

        if let Some(password) = lookup("JUKEBOX_ADMIN_PASSWORD").filter(|pwd| !pwd.is_empty()) {
            self.admin_password = password;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let directory = tempfile::tempdir().unwrap();

        let config = JukeboxConfig::load_from(&directory.path().join("config.json")).unwrap();

        assert_eq!(config, JukeboxConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("config.json");
        fs::write(
            &path,
            r#"{"theme": "Disco", "blacklist": ["remix"], "library_dir": "/srv/music"}"#,
        )
        .unwrap();

        let config = JukeboxConfig::load_from(&path).unwrap();

        assert_eq!(config.theme, "Disco");
        assert_eq!(config.blacklist, vec!["remix".to_owned()]);
        assert_eq!(config.library_dir, Some(PathBuf::from("/srv/music")));
        assert_eq!(config.socket_name, "kingjuke.sock");
        assert_eq!(config.admin_user, "user");
    }

    #[test]
    fn broken_file_is_an_error() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("config.json");
        fs::write(&path, "{ theme: ").unwrap();

        assert!(matches!(
            JukeboxConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn environment_overrides_admin_credentials() {
        let mut config = JukeboxConfig::default();

        config.apply_env(|key| match key {
            "JUKEBOX_ADMIN_USER" => Some("dj".to_owned()),
            "JUKEBOX_ADMIN_PASSWORD" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.admin_user, "dj");
        assert_eq!(config.admin_password, "password");
    }
}
