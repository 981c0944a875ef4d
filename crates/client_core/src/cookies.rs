use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::capabilities::CookieStore;

/// Looks up `name` in a raw `Cookie` header.
///
/// Returns the first matching pair. Malformed segments are skipped.
pub fn read_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}

/// Leading `name=value` of a `Set-Cookie` header, attributes dropped.
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().trim_matches('"').to_string()))
}

fn validate_pair(name: &str, value: &str) -> Result<()> {
    if name.is_empty() || name.contains(['=', ';', ' ']) {
        return Err(anyhow!("invalid cookie name '{name}'"));
    }
    if value.contains(';') {
        return Err(anyhow!("cookie value for '{name}' must not contain ';'"));
    }
    Ok(())
}

fn upsert(pairs: &mut Vec<CookiePair>, name: &str, value: &str) {
    match pairs.iter_mut().find(|pair| pair.name == name) {
        Some(pair) => pair.value = value.to_string(),
        None => pairs.push(CookiePair {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn render_header(pairs: &[CookiePair]) -> String {
    pairs
        .iter()
        .map(|pair| format!("{}={}", pair.name, pair.value))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CookiePair {
    name: String,
    value: String,
}

#[derive(Default)]
pub struct MemoryCookieStore {
    pairs: Mutex<Vec<CookiePair>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        if let Ok(mut guard) = store.pairs.lock() {
            for (name, value) in pairs {
                upsert(&mut guard, name, value);
            }
        }
        store
    }
}

impl CookieStore for MemoryCookieStore {
    fn cookie_header(&self) -> String {
        self.pairs
            .lock()
            .map(|guard| render_header(&guard))
            .unwrap_or_default()
    }

    fn set_cookie(&self, name: &str, value: &str) -> Result<()> {
        validate_pair(name, value)?;
        let mut guard = self
            .pairs
            .lock()
            .map_err(|_| anyhow!("cookie store lock poisoned"))?;
        upsert(&mut guard, name, value);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CookieJarError {
    #[error("failed to read cookie jar '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cookie jar '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Cookie jar persisted as JSON so identity survives restarts.
pub struct FileCookieStore {
    path: PathBuf,
    pairs: Mutex<Vec<CookiePair>>,
}

impl FileCookieStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CookieJarError> {
        let path = path.into();
        let pairs = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| CookieJarError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(CookieJarError::Read {
                    path: path.clone(),
                    source,
                })
            }
        };
        debug!(path = %path.display(), cookies = pairs.len(), "cookie jar opened");
        Ok(Self {
            path,
            pairs: Mutex::new(pairs),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, pairs: &[CookiePair]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create cookie jar directory '{}'", parent.display())
                })?;
            }
        }
        let raw = serde_json::to_string_pretty(pairs)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write cookie jar '{}'", self.path.display()))
    }
}

impl CookieStore for FileCookieStore {
    fn cookie_header(&self) -> String {
        self.pairs
            .lock()
            .map(|guard| render_header(&guard))
            .unwrap_or_default()
    }

    fn set_cookie(&self, name: &str, value: &str) -> Result<()> {
        validate_pair(name, value)?;
        let mut guard = self
            .pairs
            .lock()
            .map_err(|_| anyhow!("cookie store lock poisoned"))?;
        upsert(&mut guard, name, value);
        self.persist(&guard)
    }
}

#[cfg(test)]
#[path = "tests/cookies_tests.rs"]
mod tests;
