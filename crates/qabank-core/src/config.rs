//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `QABANK_*` env vars
//! (`QABANK_DATA__STORE_PATH` sets `data.store_path`). Provides helpers to
//! expand `~` and `${VAR}` and to resolve relative paths against the
//! directory the configuration was loaded from.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_STORE_PATH: &str = "data/qabank.jsonl";
pub const DEFAULT_NOTES_DIR: &str = "notes";

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub store_path: String,
    pub notes_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { store_path: DEFAULT_STORE_PATH.to_string(), notes_dir: DEFAULT_NOTES_DIR.to_string() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Cap on printed results; unlimited when absent.
    pub default_limit: Option<usize>,
}

impl Config {
    /// Load from the working directory for the `RUST_ENV` environment (default `dev`).
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    pub fn load_from(base_dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file(base_dir.join("config.toml")));
        let overlay = match env_name {
            "dev" | "development" => Some("config.dev.toml"),
            "prod" | "production" => Some("config.prod.toml"),
            "test" | "testing" => Some("config.test.toml"),
            _ => None,
        };
        if let Some(file) = overlay {
            figment = figment.merge(Toml::file(base_dir.join(file)));
        }
        figment = figment.merge(Env::prefixed("QABANK_").split("__"));

        let config = Self { figment, base_dir: base_dir.to_path_buf() };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn data(&self) -> Result<DataSettings> {
        self.section("data")
    }

    pub fn search(&self) -> Result<SearchSettings> {
        self.section("search")
    }

    /// Configured entry log, expanded and resolved against the config directory.
    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(resolve_with_base(&self.base_dir, self.data()?.store_path))
    }

    pub fn notes_dir(&self) -> Result<PathBuf> {
        Ok(resolve_with_base(&self.base_dir, self.data()?.notes_dir))
    }

    fn section<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.get(key)
    }

    fn validate(&self) -> Result<()> {
        let data = self.data()?;
        if data.store_path.trim().is_empty() {
            return Err(Error::InvalidConfig("data.store_path must not be empty".into()));
        }
        if self.search()?.default_limit == Some(0) {
            return Err(Error::InvalidConfig("search.default_limit must be positive".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
