use std::{collections::HashMap, fs, path::Path, path::PathBuf, time::Duration};

use shared::domain::NotificationPermission;
use tracing::warn;
use url::Url;

use crate::{reconnect::ReconnectPolicy, stream::StreamSettings};

pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub server_url: String,
    pub stream_path: String,
    pub set_name_path: String,
    pub send_path: String,
    /// Zero means retry immediately after every fault.
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    /// Zero disables stall detection.
    pub stall_timeout_secs: u64,
    pub notifications: NotificationPermission,
    pub cookie_file: PathBuf,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            stream_path: "/stream".into(),
            set_name_path: "/setname".into(),
            send_path: "/send".into(),
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
            stall_timeout_secs: 30,
            notifications: NotificationPermission::Granted,
            cookie_file: PathBuf::from("./data/cookies.json"),
        }
    }
}

impl ClientSettings {
    /// Resolves `path` under `server_url`, keeping any path prefix the
    /// server is mounted at.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = Url::parse(&self.server_url)?;
        if !base.path().ends_with('/') {
            let prefix = format!("{}/", base.path());
            base.set_path(&prefix);
        }
        base.join(path.trim_start_matches('/'))
    }

    pub fn stream_endpoint(&self) -> Result<Url, url::ParseError> {
        self.endpoint(&self.stream_path)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        if self.reconnect_initial_ms == 0 {
            return ReconnectPolicy::immediate();
        }
        ReconnectPolicy::exponential(
            Duration::from_millis(self.reconnect_initial_ms),
            Duration::from_millis(self.reconnect_max_ms),
        )
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        (self.stall_timeout_secs > 0).then(|| Duration::from_secs(self.stall_timeout_secs))
    }

    pub fn stream_settings(&self) -> Result<StreamSettings, url::ParseError> {
        Ok(StreamSettings {
            endpoint: self.stream_endpoint()?,
            reconnect: self.reconnect_policy(),
            stall_timeout: self.stall_timeout(),
        })
    }

    /// Applies `key = "value"` overrides; unknown keys and unparsable
    /// numbers are logged and skipped.
    pub fn apply_overrides(&mut self, values: &HashMap<String, String>) {
        for (key, value) in values {
            match key.as_str() {
                "server_url" => self.server_url = value.clone(),
                "stream_path" => self.stream_path = value.clone(),
                "set_name_path" => self.set_name_path = value.clone(),
                "send_path" => self.send_path = value.clone(),
                "reconnect_initial_ms" => set_number(key, value, &mut self.reconnect_initial_ms),
                "reconnect_max_ms" => set_number(key, value, &mut self.reconnect_max_ms),
                "stall_timeout_secs" => set_number(key, value, &mut self.stall_timeout_secs),
                "notifications" => match NotificationPermission::parse(value) {
                    Some(permission) => self.notifications = permission,
                    None => warn!(
                        key = %key,
                        value = %value,
                        "ignoring unknown notification permission"
                    ),
                },
                "cookie_file" => self.cookie_file = PathBuf::from(value),
                _ => warn!(key = %key, "ignoring unknown client setting"),
            }
        }
    }
}

fn set_number(key: &str, raw: &str, slot: &mut u64) {
    match raw.trim().parse::<u64>() {
        Ok(parsed) => *slot = parsed,
        Err(err) => warn!(key, raw, "ignoring invalid numeric setting: {err}"),
    }
}

/// Flattens file values to the strings `apply_overrides` takes. Tables and
/// arrays have no meaning here and are skipped.
fn scalar_settings(values: HashMap<String, toml::Value>) -> HashMap<String, String> {
    values
        .into_iter()
        .filter_map(|(key, value)| {
            let raw = match value {
                toml::Value::String(raw) => raw,
                toml::Value::Integer(number) => number.to_string(),
                toml::Value::Float(number) => number.to_string(),
                toml::Value::Boolean(flag) => flag.to_string(),
                other => {
                    warn!(key = %key, kind = other.type_str(), "ignoring non-scalar client setting");
                    return None;
                }
            };
            Some((key, raw))
        })
        .collect()
}

/// Defaults, then `client.toml`, then environment.
pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => settings.apply_overrides(&scalar_settings(file_cfg)),
            Err(err) => warn!(path = %file.display(), "ignoring unreadable settings file: {err}"),
        }
    }

    let mut env_cfg = HashMap::new();
    if let Some(v) = env("CHAT_SERVER_URL") {
        env_cfg.insert("server_url".to_string(), v);
    }
    for key in [
        "server_url",
        "stream_path",
        "set_name_path",
        "send_path",
        "reconnect_initial_ms",
        "reconnect_max_ms",
        "stall_timeout_secs",
        "notifications",
        "cookie_file",
    ] {
        if let Some(v) = env(&format!("APP__{}", key.to_ascii_uppercase())) {
            env_cfg.insert(key.to_string(), v);
        }
    }
    settings.apply_overrides(&env_cfg);

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
