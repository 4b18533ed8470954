//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How much the player buffers before starting playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BufferStrength {
    #[default]
    Fast,
    Balanced,
    Stable,
}

impl BufferStrength {
    /// Buffered media needed before playback starts
    pub fn playback_buffer_ms(&self) -> u64 {
        match self {
            BufferStrength::Fast => 500,
            BufferStrength::Balanced => 1500,
            BufferStrength::Stable => 2500,
        }
    }

    /// Buffer target while playing
    pub fn max_buffer_secs(&self) -> u32 {
        match self {
            BufferStrength::Fast => 30,
            BufferStrength::Balanced => 60,
            BufferStrength::Stable => 120,
        }
    }
}

/// Retry and timing policy of the failover controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_stability_delay")]
    pub stability_delay_ms: u64,
    #[serde(default = "default_indicator")]
    pub source_indicator_ms: u64,
    #[serde(default = "default_session_cache_ttl")]
    pub session_cache_ttl_secs: u64,
}

fn default_max_retries() -> u32 { 2 }
fn default_retry_delay() -> u64 { 500 }
fn default_stability_delay() -> u64 { 3000 }
fn default_indicator() -> u64 { 3000 }
fn default_session_cache_ttl() -> u64 { 5 * 60 }

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            stability_delay_ms: default_stability_delay(),
            source_indicator_ms: default_indicator(),
            session_cache_ttl_secs: default_session_cache_ttl(),
        }
    }
}

impl FailoverConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn stability_delay(&self) -> Duration {
        Duration::from_millis(self.stability_delay_ms)
    }

    pub fn source_indicator(&self) -> Duration {
        Duration::from_millis(self.source_indicator_ms)
    }

    pub fn session_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.session_cache_ttl_secs)
    }
}

/// Redirect resolution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_resolver_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_resolver_timeout")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_resolver_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_resolver_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// IPTV middleboxes routinely serve self-signed or mismatched certificates
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

fn default_max_depth() -> usize { 3 }
fn default_resolver_timeout() -> u64 { 2000 }
fn default_resolver_user_agent() -> String { "Wget/1.21.3".to_string() }
fn default_resolver_cache_ttl() -> u64 { 24 * 60 * 60 }
fn default_true() -> bool { true }

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            connect_timeout_ms: default_resolver_timeout(),
            read_timeout_ms: default_resolver_timeout(),
            user_agent: default_resolver_user_agent(),
            cache_ttl_secs: default_resolver_cache_ttl(),
            accept_invalid_certs: true,
        }
    }
}

impl ResolverConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Reachability probe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProberConfig {
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_probe_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_probe_timeout() -> u64 { 1500 }
fn default_probe_user_agent() -> String { "Mozilla/5.0".to_string() }

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout(),
            user_agent: default_probe_user_agent(),
            accept_invalid_certs: false,
        }
    }
}

impl ProberConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Player executable; empty means ffplay
    #[serde(default)]
    pub external_player: String,
    #[serde(default)]
    pub buffer_strength: BufferStrength,
    #[serde(default = "default_playlist_user_agent")]
    pub playlist_user_agent: String,
    #[serde(default = "default_true")]
    pub pass_user_agent_to_player: bool,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub prober: ProberConfig,
}

fn default_playlist_user_agent() -> String {
    "Mozilla/5.0 (Linux; Android 10) AppleWebKit/537.36".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            external_player: String::new(),
            buffer_strength: BufferStrength::Fast,
            playlist_user_agent: default_playlist_user_agent(),
            pass_user_agent_to_player: true,
            failover: FailoverConfig::default(),
            resolver: ResolverConfig::default(),
            prober: ProberConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("iptv_failover");
        path.push("config.json");
        path
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Read config from `path`, falling back to defaults when missing or malformed
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Ignoring malformed config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Cannot read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    /// Player executable to launch
    pub fn player_program(&self) -> &str {
        if self.external_player.trim().is_empty() {
            "ffplay"
        } else {
            self.external_player.trim()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_failover_policy() {
        let config = AppConfig::default();
        assert_eq!(config.failover.max_retries, 2);
        assert_eq!(config.failover.retry_delay(), Duration::from_millis(500));
        assert_eq!(config.failover.stability_delay(), Duration::from_secs(3));
        assert_eq!(config.resolver.max_depth, 3);
        assert_eq!(config.resolver.cache_ttl(), Duration::from_secs(86_400));
        assert!(config.failover.session_cache_ttl() < config.resolver.cache_ttl());
        assert_eq!(config.prober.timeout(), Duration::from_millis(1500));
        assert_eq!(config.player_program(), "ffplay");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "external_player": "mpv", "failover": { "max_retries": 4 } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.player_program(), "mpv");
        assert_eq!(config.failover.max_retries, 4);
        assert_eq!(config.failover.retry_delay_ms, 500);
        assert_eq!(config.resolver.user_agent, "Wget/1.21.3");
        assert!(config.resolver.accept_invalid_certs);
        assert!(!config.prober.accept_invalid_certs);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("iptv_failover_cfg_{}", std::process::id()));
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.buffer_strength = BufferStrength::Stable;
        config.failover.retry_delay_ms = 250;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded, config);
        assert_eq!(loaded.buffer_strength.playback_buffer_ms(), 2500);

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());

        let _ = fs::remove_dir_all(&dir);
    }
}
