use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

use crate::queue::DEFAULT_CAPACITY;

/// looked for in the working directory when no config file is given
pub const DEFAULT_CONFIG_FILE: &str = "slidebox.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// host directory standing in for the device's flash
    pub storage_root: PathBuf,
    pub queue_capacity: usize,
    /// device paths of the raw RGB565 pictures, shown in order
    pub slides: Vec<String>,
    /// drawn over each picture, the nth line at text size n
    pub captions: Vec<String>,
    /// how long each slide stays up
    pub slide_ms: u64,
    /// pause between engine runs when there are no slides
    pub idle_ms: u64,
    pub headless: bool,
    /// where logs go when the terminal is taken by the panel
    pub log_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_root: "./data".into(),
            queue_capacity: DEFAULT_CAPACITY,
            slides: vec!["/test.raw".into(), "/moveit.raw".into()],
            captions: vec![
                "Hello there!".into(),
                "Time to".into(),
                " Move it, Move it".into(),
            ],
            slide_ms: 1000,
            idle_ms: 100,
            headless: false,
            log_file: "slidebox.log".into(),
        }
    }
}

/// Load settings from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists,
/// then apply `SLIDEBOX_*` environment overrides. An explicitly named file
/// that can't be read is an error; a missing default file just means
/// defaults.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let raw = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read config '{}'", path.display()))?,
        ),
        None => match fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read config '{DEFAULT_CONFIG_FILE}'"))
            }
        },
    };

    let mut settings = match raw {
        Some(raw) => parse_settings(&raw)?,
        None => Settings::default(),
    };
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    toml::from_str(raw).context("invalid config")
}

/// Apply overrides from `lookup` (normally the process environment).
/// Values that don't parse are ignored.
pub fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("SLIDEBOX_STORAGE_ROOT") {
        settings.storage_root = v.into();
    }
    if let Some(v) = lookup("SLIDEBOX_QUEUE_CAPACITY") {
        if let Ok(parsed) = v.parse() {
            settings.queue_capacity = parsed;
        }
    }
    if let Some(v) = lookup("SLIDEBOX_SLIDE_MS") {
        if let Ok(parsed) = v.parse() {
            settings.slide_ms = parsed;
        }
    }
    if let Some(v) = lookup("SLIDEBOX_HEADLESS") {
        if let Ok(parsed) = v.parse() {
            settings.headless = parsed;
        }
    }
    if let Some(v) = lookup("SLIDEBOX_LOG_FILE") {
        settings.log_file = v.into();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn parses_partial_file_over_defaults() {
        let settings = parse_settings(
            r#"
            storage_root = "/srv/flash"
            slides = ["/a.raw"]
            slide_ms = 2500
            "#,
        )
        .expect("parse");
        assert_eq!(settings.storage_root, PathBuf::from("/srv/flash"));
        assert_eq!(settings.slides, vec!["/a.raw".to_string()]);
        assert_eq!(settings.slide_ms, 2500);
        assert_eq!(settings.queue_capacity, DEFAULT_CAPACITY);
        assert_eq!(settings.captions, Settings::default().captions);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(parse_settings("queue_capacity = \"lots\"").is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SLIDEBOX_STORAGE_ROOT", "/tmp/flash"),
            ("SLIDEBOX_QUEUE_CAPACITY", "8"),
            ("SLIDEBOX_HEADLESS", "true"),
            ("SLIDEBOX_SLIDE_MS", "not a number"),
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.storage_root, PathBuf::from("/tmp/flash"));
        assert_eq!(settings.queue_capacity, 8);
        assert!(settings.headless);
        assert_eq!(settings.slide_ms, 1000);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_settings(Some(dir.path().join("missing.toml").as_path())).is_err());
    }

    #[test]
    fn file_then_overrides() {
        let raw = "idle_ms = 5\nslide_ms = 2500\nheadless = true\n";
        let mut settings = parse_settings(raw).expect("parse");
        let env: HashMap<&str, &str> = HashMap::from([("SLIDEBOX_SLIDE_MS", "40")]);
        apply_overrides(&mut settings, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.idle_ms, 5);
        assert_eq!(settings.slide_ms, 40);
        assert!(settings.headless);
    }
}
