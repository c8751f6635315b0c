use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::ledger::{
    CropStore, CsvLedgerStore, FilesystemCropStore, Ledger, LedgerStore, PolicyKind,
    SqliteLedgerStore,
};
use crate::session::{LoopOptions, DEFAULT_PACING_SCALE};

const DEFAULT_LEDGER_PATH: &str = "data.csv";
const DEFAULT_CROPS_DIR: &str = "license_plates";
const DEFAULT_ENGINE: &str = "stub";
const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PlateConfigFile {
    ledger: Option<LedgerConfigFile>,
    detection: Option<DetectionConfigFile>,
    capture: Option<CaptureConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LedgerConfigFile {
    path: Option<PathBuf>,
    backend: Option<String>,
    crops_dir: Option<PathBuf>,
    dedup_policy: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionConfigFile {
    engine: Option<String>,
    threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CaptureConfigFile {
    pacing_scale: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerBackend {
    Csv,
    Sqlite,
}

impl FromStr for LedgerBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(LedgerBackend::Csv),
            "sqlite" => Ok(LedgerBackend::Sqlite),
            other => Err(anyhow!("unknown ledger backend '{}' (expected csv or sqlite)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlateConfig {
    pub ledger: LedgerSettings,
    pub detection: DetectionSettings,
    pub pacing_scale: f64,
}

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub path: PathBuf,
    pub backend: LedgerBackend,
    pub crops_dir: PathBuf,
    pub dedup_policy: PolicyKind,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub engine: String,
    /// Minimum OCR score for a plate reading.
    pub threshold: f32,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerSettings {
                path: PathBuf::from(DEFAULT_LEDGER_PATH),
                backend: LedgerBackend::Csv,
                crops_dir: PathBuf::from(DEFAULT_CROPS_DIR),
                dedup_policy: PolicyKind::Global,
            },
            detection: DetectionSettings {
                engine: DEFAULT_ENGINE.to_string(),
                threshold: DEFAULT_THRESHOLD,
            },
            pacing_scale: DEFAULT_PACING_SCALE,
        }
    }
}

impl PlateConfig {
    /// Defaults, then the file named by `PLATE_CONFIG`, then `PLATE_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PLATE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PlateConfigFile) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(ledger) = file.ledger {
            if let Some(path) = ledger.path {
                cfg.ledger.path = path;
            }
            if let Some(backend) = ledger.backend {
                cfg.ledger.backend = backend.parse()?;
            }
            if let Some(dir) = ledger.crops_dir {
                cfg.ledger.crops_dir = dir;
            }
            if let Some(policy) = ledger.dedup_policy {
                cfg.ledger.dedup_policy = policy.parse()?;
            }
        }
        if let Some(detection) = file.detection {
            if let Some(engine) = detection.engine {
                cfg.detection.engine = engine;
            }
            if let Some(threshold) = detection.threshold {
                cfg.detection.threshold = threshold;
            }
        }
        if let Some(scale) = file.capture.and_then(|c| c.pacing_scale) {
            cfg.pacing_scale = scale;
        }
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_value("PLATE_LEDGER_PATH") {
            self.ledger.path = PathBuf::from(path);
        }
        if let Some(backend) = env_value("PLATE_LEDGER_BACKEND") {
            self.ledger.backend = backend.parse().context("PLATE_LEDGER_BACKEND")?;
        }
        if let Some(dir) = env_value("PLATE_CROPS_DIR") {
            self.ledger.crops_dir = PathBuf::from(dir);
        }
        if let Some(policy) = env_value("PLATE_DEDUP_POLICY") {
            self.ledger.dedup_policy = policy.parse().context("PLATE_DEDUP_POLICY")?;
        }
        if let Some(engine) = env_value("PLATE_ENGINE") {
            self.detection.engine = engine;
        }
        if let Some(threshold) = env_value("PLATE_THRESHOLD") {
            self.detection.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("PLATE_THRESHOLD must be a number between 0 and 1"))?;
        }
        if let Some(scale) = env_value("PLATE_PACING_SCALE") {
            self.pacing_scale = scale
                .parse()
                .map_err(|_| anyhow!("PLATE_PACING_SCALE must be a non-negative number"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.ledger.path.as_os_str().is_empty() {
            return Err(anyhow!("ledger path cannot be empty"));
        }
        if self.detection.engine.trim().is_empty() {
            return Err(anyhow!("detection engine name cannot be empty"));
        }
        if !(0.0..=1.0).contains(&self.detection.threshold) {
            return Err(anyhow!(
                "detection threshold must be within [0, 1], got {}",
                self.detection.threshold
            ));
        }
        if !self.pacing_scale.is_finite() || self.pacing_scale < 0.0 {
            return Err(anyhow!(
                "pacing scale must be a non-negative number, got {}",
                self.pacing_scale
            ));
        }
        Ok(())
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            pacing_scale: self.pacing_scale,
        }
    }

    /// Open the configured ledger, with crop storage when `with_crops` is set.
    pub fn open_ledger(&self, with_crops: bool) -> Result<Ledger> {
        let path = &self.ledger.path;
        let store: Box<dyn LedgerStore> = match self.ledger.backend {
            LedgerBackend::Csv => Box::new(
                CsvLedgerStore::open(path)
                    .with_context(|| format!("open ledger {}", path.display()))?,
            ),
            LedgerBackend::Sqlite => Box::new(
                SqliteLedgerStore::open(path)
                    .with_context(|| format!("open ledger {}", path.display()))?,
            ),
        };
        let crops: Option<Box<dyn CropStore>> = if with_crops {
            Some(Box::new(
                FilesystemCropStore::new(&self.ledger.crops_dir).with_context(|| {
                    format!("create crop directory {}", self.ledger.crops_dir.display())
                })?,
            ))
        } else {
            None
        };
        Ok(Ledger::open(store, self.ledger.dedup_policy.build(), crops)?)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<PlateConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
