//! Configuration file and settings resolution.
//!
//! Config file lookup:
//!   1. `--config PATH`                        (explicit, must exist)
//!   2. `./siwa-secret.toml`                   (project-local, if it exists)
//!   3. `~/.config/siwa-secret/config.toml`    (global, if it exists)
//!
//! Each value is taken from the first of: command-line flag, environment
//! variable, config file, built-in default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error;
use crate::secret::{self, SecretParams};

pub const LOCAL_CONFIG: &str = "siwa-secret.toml";

/// Top-level config from `siwa-secret.toml`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub apple: AppleConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct AppleConfig {
    pub team_id: Option<String>,
    pub client_id: Option<String>,
    pub key_id: Option<String>,
    /// Path to the `.p8` file, or the PEM itself.
    pub private_key: Option<String>,
    pub lifetime_secs: Option<u64>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid TOML in {}", path.display()))
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub team_id: Option<String>,
    pub client_id: Option<String>,
    pub key_id: Option<String>,
    pub key_file: Option<PathBuf>,
    pub lifetime_secs: Option<u64>,
}

/// Where the private key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    File(PathBuf),
    Inline(String),
}

impl KeySource {
    pub fn load(&self) -> error::Result<String> {
        match self {
            Self::File(path) => secret::load_key(path),
            Self::Inline(pem) => secret::normalize_pem("inline private_key", pem),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub params: SecretParams,
    pub key: KeySource,
}

impl Settings {
    /// Merge overrides over the (optional) config file loaded from `config_path`.
    pub fn resolve(
        config: Option<&Config>,
        config_path: Option<&Path>,
        overrides: &Overrides,
    ) -> Result<Self> {
        let file = config.map(|c| c.apple.clone()).unwrap_or_default();
        let base_dir = config_path
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let hint = config_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| LOCAL_CONFIG.to_string());

        let pick = |cli: &Option<String>, cfg: Option<String>, flag: &str, env: &str| {
            cli.clone().or(cfg).with_context(|| {
                format!(
                    "{} is not set. Pass --{flag}, set {env}, or add it under [apple] in {hint}",
                    flag.replace('-', "_")
                )
            })
        };

        let team_id = pick(&overrides.team_id, file.team_id, "team-id", "APPLE_TEAM_ID")?;
        let client_id = pick(&overrides.client_id, file.client_id, "client-id", "APPLE_CLIENT_ID")?;
        let key_id = pick(&overrides.key_id, file.key_id, "key-id", "APPLE_KEY_ID")?;

        let key = if let Some(path) = &overrides.key_file {
            KeySource::File(expand(path.to_string_lossy().as_ref(), Path::new("")))
        } else if let Some(value) = &file.private_key {
            resolve_key(value, &base_dir)
        } else {
            KeySource::File(base_dir.join(format!("AuthKey_{key_id}.p8")))
        };

        let lifetime_secs = overrides
            .lifetime_secs
            .or(file.lifetime_secs)
            .unwrap_or(secret::DEFAULT_LIFETIME_SECS);

        Ok(Self {
            params: SecretParams::new(team_id, client_id, key_id).with_lifetime(lifetime_secs),
            key,
        })
    }
}

/// Find the config file to read, if any.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }

    dirs::home_dir()
        .map(|home| home.join(".config/siwa-secret/config.toml"))
        .filter(|p| p.exists())
}

/// Return the path `init` writes to.
pub fn init_config_path(global: bool) -> Result<PathBuf> {
    if global {
        let home = dirs::home_dir().context("could not determine home directory")?;
        Ok(home.join(".config/siwa-secret/config.toml"))
    } else {
        Ok(PathBuf::from(LOCAL_CONFIG))
    }
}

/// A `private_key` value is either inline PEM or a path.
fn resolve_key(value: &str, relative_to: &Path) -> KeySource {
    if value.trim_start().starts_with("-----BEGIN") {
        return KeySource::Inline(value.to_string());
    }
    KeySource::File(expand(value, relative_to))
}

/// Expand `~` and anchor relative paths.
fn expand(value: &str, relative_to: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(value);
    let path = Path::new(expanded.as_ref());
    if path.is_relative() {
        relative_to.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Template config for `init`.
pub const CONFIG_TEMPLATE: &str = r#"# siwa-client-secret configuration
#
# Keys are created under Certificates, Identifiers & Profiles > Keys:
#   https://developer.apple.com/account/resources/authkeys/list

[apple]
team_id   = "YOUR_TEAM_ID"
client_id = "com.example.app"     # Services ID or bundle ID
key_id    = "YOUR_KEY_ID"

# Path to the .p8 key (relative to this file), or the PEM inline.
# Defaults to AuthKey_<key_id>.p8 next to this file.
# private_key = "AuthKey_YOUR_KEY_ID.p8"

# Token lifetime in seconds. Apple allows at most 15777000 (6 months).
# lifetime_secs = 15552000
"#;
