use crate::error::{Error, ErrorKind};
use crate::followers::AliasMatch;
use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use url::Url;

pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8000/";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
pub const MIN_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SEC: u64 = 10;

/// Settings, stored as JSON in the profile directory. Missing fields take
/// their defaults, so older files keep loading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the node's HTTP service lives
    pub origin: String,

    pub poll_interval_ms: u64,
    pub request_timeout_sec: u64,
    pub connect_timeout_sec: u64,
    pub set_user_agent: bool,

    /// How followers are matched against our subscriptions
    pub alias_match: AliasMatch,

    /// Require scanned QR payloads to look like an Ed25519 key
    pub strict_scanned_keys: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            origin: DEFAULT_ORIGIN.to_owned(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_sec: DEFAULT_REQUEST_TIMEOUT_SEC,
            connect_timeout_sec: DEFAULT_CONNECT_TIMEOUT_SEC,
            set_user_agent: true,
            alias_match: AliasMatch::default(),
            strict_scanned_keys: true,
        }
    }
}

impl Settings {
    /// Load settings for the current profile, or defaults if there is no
    /// settings file yet. Environment overrides are not applied here, so
    /// what is loaded can be saved back unchanged.
    pub fn load() -> Result<Settings, Error> {
        let profile = Profile::current()?;
        Settings::load_from(&profile.settings_file)
    }

    /// These settings with `MURMUR_ORIGIN` in place of the saved origin,
    /// if it is set. For running against a node, never for saving.
    pub fn with_env_overrides(mut self) -> Settings {
        if let Ok(origin) = env::var("MURMUR_ORIGIN") {
            tracing::info!("Using MURMUR_ORIGIN: {}", origin);
            self.origin = origin;
        }
        self
    }

    pub fn load_from(path: &Path) -> Result<Settings, Error> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self) -> Result<(), Error> {
        let profile = Profile::current()?;
        self.save_to(&profile.settings_file)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Error> {
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// The service origin as a base URL. Relative endpoint paths are joined
    /// onto it, so we make sure it ends in a slash.
    pub fn origin_url(&self) -> Result<Url, Error> {
        parse_origin(&self.origin)
    }

    /// The poll interval, never below `MIN_POLL_INTERVAL_MS`
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}

pub fn parse_origin(origin: &str) -> Result<Url, Error> {
    let mut url = Url::parse(origin)?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ErrorKind::InvalidOrigin(format!(
            "{} (scheme must be http or https)",
            origin
        ))
        .into());
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ErrorKind::InvalidOrigin(origin.to_owned()).into());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
