use super::{
    factory::FactoryConfig,
    pipeline::PipelineConfig,
    sampling::SamplingConfig,
    traits::{ConfigManifest, ConfigSection},
};
use crate::error::Result;
use log::info;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Prefix of environment overrides, e.g. `EQFORGE__PIPELINE__POOL_SIZE=32`.
pub const ENV_PREFIX: &str = "EQFORGE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub factory: FactoryConfig,
    pub pipeline: PipelineConfig,
    pub sampling: SamplingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.factory.validate()?;
        self.pipeline.validate()?;
        self.sampling.validate()?;
        Ok(())
    }

    pub fn manifests(&self) -> Vec<ConfigManifest> {
        vec![
            self.factory.to_manifest(),
            self.pipeline.to_manifest(),
            self.sampling.to_manifest(),
        ]
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Loads a TOML file, layering `EQFORGE__SECTION__KEY` environment
    /// overrides on top.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;

        info!("Loaded configuration from {}", path.display());
        *self.config.write() = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(&*self.config.read())?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// Applies `f` and keeps the result only if it validates.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write();
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
