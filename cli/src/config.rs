use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

use slank_core::sheets::CachePolicy;

/// Service-account credentials plus the spreadsheet to operate on. Lives in
/// a JSON file outside the repo; see `Config::load_secrets`.
#[derive(Debug, Clone, Deserialize)]
pub struct Secrets {
    pub spreadsheet_id: String,
    pub client_email: String,
    pub private_key: String,
    pub private_key_id: String,
    pub token_uri: String,
}

pub struct Config {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub secrets_path: PathBuf,
    pub cache_fresh_for: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "slank").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let cache_dir = proj_dirs.cache_dir().join("gsheets");

        let secrets_path = match std::env::var_os("SLANK_SECRETS") {
            Some(path) => PathBuf::from(path),
            None => data_dir.join("secrets.json"),
        };

        let cache_fresh_for = match std::env::var("SLANK_CACHE_FRESH_SECS") {
            Ok(secs) => Duration::from_secs(
                secs.parse()
                    .context("SLANK_CACHE_FRESH_SECS must be a whole number of seconds")?,
            ),
            Err(_) => CachePolicy::default().fresh_for,
        };

        Ok(Config {
            data_dir,
            cache_dir,
            secrets_path,
            cache_fresh_for,
        })
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            fresh_for: self.cache_fresh_for,
            ..CachePolicy::default()
        }
    }

    pub fn load_secrets(&self) -> Result<Secrets> {
        let raw = std::fs::read_to_string(&self.secrets_path).with_context(|| {
            format!(
                "Failed to read secrets file {} (set SLANK_SECRETS to override the path)",
                self.secrets_path.display()
            )
        })?;
        serde_json::from_str(&raw).with_context(|| {
            format!("Malformed secrets file {}", self.secrets_path.display())
        })
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}
