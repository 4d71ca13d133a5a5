use crate::model::{Background, OverlayConfig};
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "loadscreen";
const CONFIG_FILE: &str = "overlay.json";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("LOADSCREEN_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_config(explicit: Option<&Path>) -> Result<OverlayConfig> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (config_path()?, false),
    };

    if !path.exists() {
        if required {
            anyhow::bail!("config file not found: {}", path.display());
        }
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(OverlayConfig::default());
    }

    let config = read_config(&path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    info!(path = %path.display(), tracks = config.list.len(), "loaded overlay config");
    Ok(resolve_assets(config, base))
}

pub fn read_config(path: &Path) -> Result<OverlayConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: OverlayConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

pub fn resolve_assets(mut config: OverlayConfig, base: &Path) -> OverlayConfig {
    let resolve = |path: &Path| -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    };

    config.background = Background {
        image: config.background.image.as_deref().map(resolve),
        video: config.background.video.as_deref().map(resolve),
    };
    config.logo = config.logo.as_deref().map(resolve);
    for track in &mut config.list {
        track.music = resolve(track.music.as_path());
        track.image = resolve(track.image.as_path());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn explicit_file_is_loaded_and_assets_resolved() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("overlay.json");
        fs::write(
            &path,
            r#"{
                "dark": false,
                "background": { "image": "bg.png", "video": null },
                "logo": null,
                "list": [
                    { "title": "One", "author": "A", "music": "m/1.ogg", "image": "m/1.png" }
                ]
            }"#,
        )
        .expect("write config");

        let config = load_config(Some(&path)).expect("load");

        assert!(!config.dark);
        assert_eq!(config.logo, None);
        assert_eq!(config.background.image, Some(dir.path().join("bg.png")));
        assert_eq!(config.background.video, None);
        assert_eq!(config.list.len(), 1);
        assert_eq!(config.list[0].music, dir.path().join("m/1.ogg"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        assert!(load_config(Some(&dir.path().join("absent.json"))).is_err());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("overlay.json");
        fs::write(&path, "{ not json").expect("write");

        let err = load_config(Some(&path)).expect_err("should fail");
        assert!(format!("{err:#}").contains("failed to parse config file"));
    }

    #[test]
    fn absolute_paths_are_left_alone() {
        let dir = tempdir().expect("tempdir");
        let absolute = dir.path().join("song.mp3");
        let mut config = OverlayConfig::default();
        config.list[0].music = absolute.clone();

        let resolved = resolve_assets(config, Path::new("/elsewhere"));
        assert_eq!(resolved.list[0].music, absolute);
        assert_eq!(
            resolved.list[1].music,
            Path::new("/elsewhere").join("assets/music/mercury.mp3")
        );
    }
}
