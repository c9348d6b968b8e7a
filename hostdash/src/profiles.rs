//! Connection profiles: JSON mapping of profile name -> { url, tls_ca }.
//! Stored under $XDG_CONFIG_HOME/hostdash/profiles.json (fallback: the platform
//! config dir). Credentials are never written here.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, io, path::PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProfileEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    pub version: u32,
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("hostdash")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hostdash")
    }
}

pub fn profiles_path() -> PathBuf {
    config_dir().join("profiles.json")
}

// A missing or unreadable file is an empty profile set
pub fn load_profiles() -> ProfilesFile {
    let path = profiles_path();
    match fs::read_to_string(&path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            warn!("ignoring malformed {}: {e}", path.display());
            ProfilesFile::default()
        }),
        Err(_) => ProfilesFile::default(),
    }
}

pub fn save_profiles(p: &ProfilesFile) -> io::Result<()> {
    let path = profiles_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(p).map_err(io::Error::other)?;
    fs::write(path, data)
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResolveProfile {
    /// Use the provided runtime inputs (maybe saved by the caller). (url, tls_ca)
    Direct(String, Option<String>),
    /// Loaded from an existing profile entry. (url, tls_ca)
    Loaded(String, Option<String>),
    /// Prompt the user to pick one of these profile names
    PromptSelect(Vec<String>),
    /// Prompt the user to create this profile
    PromptCreate(String),
    None,
}

pub struct ProfileRequest {
    pub profile_name: Option<String>,
    pub url: Option<String>,
    pub tls_ca: Option<String>,
}

impl ProfileRequest {
    pub fn resolve(self, pf: &ProfilesFile) -> ResolveProfile {
        match (self.url, self.profile_name) {
            (Some(url), _) => ResolveProfile::Direct(url, self.tls_ca),
            (None, Some(name)) => match pf.profiles.get(&name) {
                Some(entry) => ResolveProfile::Loaded(
                    entry.url.clone(),
                    self.tls_ca.or_else(|| entry.tls_ca.clone()),
                ),
                None => ResolveProfile::PromptCreate(name),
            },
            (None, None) if pf.profiles.is_empty() => ResolveProfile::None,
            (None, None) => ResolveProfile::PromptSelect(pf.profiles.keys().cloned().collect()),
        }
    }
}

/// Inserts or replaces `name`; returns whether the file content changed.
pub fn upsert(pf: &mut ProfilesFile, name: &str, entry: ProfileEntry) -> bool {
    if pf.profiles.get(name) == Some(&entry) {
        return false;
    }
    pf.profiles.insert(name.to_string(), entry);
    true
}
