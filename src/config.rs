use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::{
    search::{DEFAULT_ANNOTS_BY_URL_LIMIT, DEFAULT_SEARCH_LIMIT},
    storage::{self, StorageManager},
};

const CONFIG_FILE: &str = "config.yaml";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address the daemon binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Page size of searches that do not ask for one.
    #[serde(default = "default_search_limit")]
    pub default_search_limit: usize,

    #[serde(default = "default_annots_by_url_limit")]
    pub default_annots_by_url_limit: usize,

    /// Keep collections on disk. When off everything lives in memory and is
    /// gone on exit.
    #[serde(default = "default_persist")]
    pub persist: bool,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            default_search_limit: default_search_limit(),
            default_annots_by_url_limit: default_annots_by_url_limit(),
            persist: default_persist(),
            base_path: String::new(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_annots_by_url_limit() -> usize {
    DEFAULT_ANNOTS_BY_URL_LIMIT
}

fn default_persist() -> bool {
    true
}

impl Config {
    fn validate(&mut self) -> anyhow::Result<()> {
        if self.default_search_limit == 0 {
            self.default_search_limit = 1
        }
        if self.default_annots_by_url_limit == 0 {
            self.default_annots_by_url_limit = 1
        }

        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            bail!("listen_addr \"{}\" is not a socket address", self.listen_addr);
        }

        Ok(())
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)
            .with_context(|| format!("couldn't create {base_path}"))?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str = String::from_utf8(store.read(CONFIG_FILE)?)
            .context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            log::info!("upgrading {CONFIG_FILE}");
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_default_config() {
        let tmp = tempfile::tempdir().unwrap();
        let base_path = tmp.path().to_string_lossy().to_string();

        let config = Config::load_with(&base_path).unwrap();
        assert_eq!(config.default_search_limit, 10);
        assert_eq!(config.default_annots_by_url_limit, 1000);
        assert!(config.persist);
        assert!(tmp.path().join("config.yaml").exists());
    }

    #[test]
    fn test_fills_missing_fields_and_resaves() {
        let tmp = tempfile::tempdir().unwrap();
        let base_path = tmp.path().to_string_lossy().to_string();
        std::fs::write(tmp.path().join("config.yaml"), "default_search_limit: 25\n").unwrap();

        let config = Config::load_with(&base_path).unwrap();
        assert_eq!(config.default_search_limit, 25);
        assert_eq!(config.listen_addr, "127.0.0.1:8080");

        let saved = std::fs::read_to_string(tmp.path().join("config.yaml")).unwrap();
        assert!(saved.contains("default_annots_by_url_limit: 1000"));
    }

    #[test]
    fn test_rejects_bad_listen_addr() {
        let tmp = tempfile::tempdir().unwrap();
        let base_path = tmp.path().to_string_lossy().to_string();
        std::fs::write(tmp.path().join("config.yaml"), "listen_addr: nowhere\n").unwrap();

        assert!(Config::load_with(&base_path).is_err());
    }
}
