//! Configuration Vault – reads/writes `~/.quarry/config.toml`.
//!
//! ```toml
//! chests = [[-2, 64, 0]]
//!
//! [mining]
//! scan_horizontal_radius = 8
//! min_free_slots = 3
//!
//! [mining.priorities]
//! diamond_ore = 5
//! iron_ore = 3
//! ```

use quarry_runtime::MiningConfig;
use quarry_types::BlockPos;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted operator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Known storage chests, loaded into the chest registry at startup.
    #[serde(default)]
    pub chests: Vec<BlockPos>,

    #[serde(default)]
    pub mining: MiningConfig,
}

/// Return the path to `~/.quarry/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".quarry").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    cfg.mining.validate().map_err(|e| e.to_string())?;
    Ok(Some(cfg))
}

/// Apply `QUARRY_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `QUARRY_SCAN_RADIUS` | `mining.scan_horizontal_radius` |
/// | `QUARRY_MIN_FREE_SLOTS` | `mining.min_free_slots` |
/// | `QUARRY_SAFETY_BLOCK` | `mining.safety_block` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("QUARRY_SCAN_RADIUS")
        && let Ok(radius) = v.parse::<i32>()
    {
        cfg.mining.scan_horizontal_radius = radius;
    }
    if let Ok(v) = std::env::var("QUARRY_MIN_FREE_SLOTS")
        && let Ok(slots) = v.parse::<u32>()
    {
        cfg.mining.min_free_slots = slots;
    }
    if let Ok(v) = std::env::var("QUARRY_SAFETY_BLOCK")
        && !v.trim().is_empty()
    {
        cfg.mining.safety_block = v.trim().to_string();
    }
}

/// Save the config to disk, creating `~/.quarry/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner-only directory (rwx------) on Unix.
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
