use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

use crate::behavior::BehaviorConfig;
use crate::model::Rules;
use crate::sigil::{SigilLayout, DEFAULT_SIGIL_COUNT};

/// Free-form, persisted settings: accessibility, audio and AI tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub name: String,
    pub audio_enabled: bool,
    pub reduced_motion: bool,
    pub sigil_count: usize,
    pub sigil_layout: SigilLayout,
    pub behavior: BehaviorConfig,
    pub rules: Rules,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: "Lumen".to_string(),
            audio_enabled: true,
            reduced_motion: false,
            sigil_count: DEFAULT_SIGIL_COUNT,
            sigil_layout: SigilLayout::default(),
            behavior: BehaviorConfig::default(),
            rules: Rules::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::CompanionError::config("name must not be empty"));
        }
        self.behavior.validate()?;
        self.sigil_layout.validate()?;
        self.rules.validate()?;
        Ok(())
    }
}

pub struct Paths {
    pub save_path: PathBuf,
    pub settings_path: PathBuf,
}

pub fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "sigilpet", "Sigilpet")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).ok();
    Ok(Paths {
        save_path: dir.join("save.json"),
        settings_path: dir.join("settings.json"),
    })
}

/// Reads settings, falling back to defaults on any problem.
pub fn load_settings(path: &Path) -> Settings {
    let Ok(s) = fs::read_to_string(path) else {
        return Settings::default();
    };
    let settings = match serde_json::from_str::<Settings>(&s) {
        Ok(v) => v,
        Err(err) => {
            warn!(path = %path.display(), %err, "settings unreadable, using defaults");
            return Settings::default();
        }
    };
    if let Err(err) = settings.validate() {
        warn!(path = %path.display(), %err, "settings rejected, using defaults");
        return Settings::default();
    }
    settings
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // rename-over-existing is not atomic everywhere; clear the target first
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)
        .with_context(|| format!("renaming {} to {}", from.display(), to.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::DurationRange;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings(&dir.path().join("nope.json"));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"name": "Vesper", "reduced_motion": true}"#).unwrap();
        let s = load_settings(&path);
        assert_eq!(s.name, "Vesper");
        assert!(s.reduced_motion);
        assert_eq!(s.sigil_count, DEFAULT_SIGIL_COUNT);
    }

    #[test]
    fn invalid_tuning_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = Settings {
            name: "Vesper".into(),
            ..Default::default()
        };
        s.behavior.idle = DurationRange::new(9_000, 10);
        save_settings_atomic(&path, &s).unwrap();
        assert_eq!(load_settings(&path), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let s = Settings {
            audio_enabled: false,
            sigil_count: 9,
            ..Default::default()
        };
        save_settings_atomic(&path, &s).unwrap();
        save_settings_atomic(&path, &s).unwrap();
        assert_eq!(load_settings(&path), s);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn blank_name_is_rejected() {
        let s = Settings {
            name: "  ".into(),
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn garbage_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(load_settings(&path), Settings::default());
    }
}
