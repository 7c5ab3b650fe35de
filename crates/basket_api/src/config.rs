use std::{fs, io, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;

use crate::{DEFAULT_LATENCY, DEFAULT_SEED};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketSettings {
    pub latency_ms: u64,
    pub seed: Vec<String>,
}

impl Default for BasketSettings {
    fn default() -> Self {
        Self {
            latency_ms: DEFAULT_LATENCY.as_millis() as u64,
            seed: DEFAULT_SEED.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl BasketSettings {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    latency_ms: Option<u64>,
    seed: Option<Vec<String>>,
}

/// Defaults, then the TOML file at `path` if it exists, then environment overrides.
pub fn load_settings_from(path: &Path) -> anyhow::Result<BasketSettings> {
    let mut settings = BasketSettings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
            if let Some(v) = file_cfg.latency_ms {
                settings.latency_ms = v;
            }
            if let Some(v) = file_cfg.seed {
                settings.seed = v;
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_env_overrides(settings: &mut BasketSettings, lookup: impl Fn(&str) -> Option<String>) {
    for key in ["BASKET_LATENCY_MS", "APP__LATENCY_MS"] {
        if let Some(v) = lookup(key) {
            if let Ok(parsed) = v.trim().parse::<u64>() {
                settings.latency_ms = parsed;
            }
        }
    }

    for key in ["BASKET_SEED", "APP__SEED"] {
        if let Some(v) = lookup(key) {
            settings.seed = parse_seed_list(&v);
        }
    }
}

fn parse_seed_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
