//! Configuration Vault – reads/writes `~/.edgelink/config.toml`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use edgelink_monitor::MonitorConfig;
use serde::{Deserialize, Serialize};

/// Persisted daemon configuration stored in `~/.edgelink/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Period of the heartbeat snapshot sent to subscribed app nodes.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Name the monitor node is registered under.
    #[serde(default = "default_monitor_node")]
    pub monitor_node: String,

    /// Broker connection and topic layout.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

fn default_heartbeat_interval_ms() -> u64 {
    1_000
}
fn default_monitor_node() -> String {
    "monitor".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            monitor_node: default_monitor_node(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Config {
    /// Heartbeat period, never shorter than 1 ms.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }
}

/// Return the config path: `EDGELINK_CONFIG` when set, else
/// `~/.edgelink/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("EDGELINK_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".edgelink").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `EDGELINK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `EDGELINK_MQTT_HOST` | `monitor.host` |
/// | `EDGELINK_MQTT_PORT` | `monitor.port` |
/// | `EDGELINK_HEARTBEAT_MS` | `heartbeat_interval_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("EDGELINK_MQTT_HOST") {
        cfg.monitor.host = v;
    }
    if let Ok(v) = std::env::var("EDGELINK_MQTT_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.monitor.port = port;
    }
    if let Ok(v) = std::env::var("EDGELINK_HEARTBEAT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.heartbeat_interval_ms = ms;
    }
}

/// Save the config to disk, creating `~/.edgelink/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
