use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::categories::{CategoryRule, RuleSet};

pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_DAY_BOUNDARY_HOUR: u32 = 7;

/// Settings as they are written on disk. Nothing here is validated, see [Settings].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsEntity {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub category_rules: Vec<CategoryRule>,
    #[serde(default)]
    pub focus_categories: Vec<String>,
    #[serde(default = "default_day_boundary_hour")]
    pub day_boundary_hour: u32,
    /// Days of data to keep. 0 keeps everything.
    #[serde(default)]
    pub data_retention_days: u32,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_day_boundary_hour() -> u32 {
    DEFAULT_DAY_BOUNDARY_HOUR
}

impl Default for SettingsEntity {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            category_rules: vec![],
            focus_categories: vec![],
            day_boundary_hour: DEFAULT_DAY_BOUNDARY_HOUR,
            data_retention_days: 0,
        }
    }
}

/// Validated settings with compiled rules.
#[derive(Debug, Clone)]
pub struct Settings {
    pub rules: RuleSet,
    pub focus_categories: Vec<String>,
    pub day_boundary_hour: u32,
    pub data_retention_days: u32,
}

impl TryFrom<SettingsEntity> for Settings {
    type Error = anyhow::Error;

    fn try_from(entity: SettingsEntity) -> Result<Self> {
        if entity.day_boundary_hour > 23 {
            bail!(
                "day boundary hour must be between 0 and 23, got {}",
                entity.day_boundary_hour
            );
        }
        Ok(Self {
            rules: RuleSet::new(entity.category_rules)?,
            focus_categories: entity.focus_categories,
            day_boundary_hour: entity.day_boundary_hour,
            data_retention_days: entity.data_retention_days,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rules: RuleSet::default(),
            focus_categories: vec![],
            day_boundary_hour: DEFAULT_DAY_BOUNDARY_HOUR,
            data_retention_days: 0,
        }
    }
}

impl Settings {
    pub fn to_entity(&self) -> SettingsEntity {
        SettingsEntity {
            schema_version: SCHEMA_VERSION,
            category_rules: self.rules.rules().to_vec(),
            focus_categories: self.focus_categories.clone(),
            day_boundary_hour: self.day_boundary_hour,
            data_retention_days: self.data_retention_days,
        }
    }
}

/// Source of the current settings for reports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn settings(&self) -> Result<Arc<Settings>>;
}

/// Keeps settings in a json file. Loaded settings are cached until the next save.
pub struct SettingsStore {
    path: PathBuf,
    cached: RwLock<Option<Arc<Settings>>>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cached: RwLock::new(None),
        }
    }

    /// Raw settings as stored. A missing file gives the defaults.
    pub async fn load_entity(&self) -> Result<SettingsEntity> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Corrupted settings file {:?}", self.path)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SettingsEntity::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", self.path)),
        }
    }

    /// Validates and stores `entity`. Invalid settings are rejected before anything is written.
    pub async fn save(&self, entity: SettingsEntity) -> Result<Arc<Settings>> {
        let settings = Arc::new(Settings::try_from(entity.clone())?);

        let temporary = self.path.with_extension("json.tmp");
        tokio::fs::write(&temporary, serde_json::to_vec_pretty(&entity)?).await?;
        tokio::fs::rename(&temporary, &self.path).await?;
        info!("Saved settings with {} category rules", settings.rules.len());

        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(settings)
    }

    /// Loads the stored settings, applies `change` and saves the result.
    pub async fn update(&self, change: impl FnOnce(&mut SettingsEntity)) -> Result<Arc<Settings>> {
        let mut entity = self.load_entity().await?;
        change(&mut entity);
        self.save(entity).await
    }
}

#[async_trait]
impl SettingsProvider for SettingsStore {
    async fn settings(&self) -> Result<Arc<Settings>> {
        let cached = self
            .cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(settings) = cached {
            return Ok(settings);
        }

        debug!("Loading settings from {:?}", self.path);
        let settings = Arc::new(
            Settings::try_from(self.load_entity().await?)
                .with_context(|| format!("Invalid settings in {:?}", self.path))?,
        );
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(settings)
    }
}
