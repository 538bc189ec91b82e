use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides (`ADOPTLY_CENTER__MAX_PAGE_SIZE=50`).
pub const ENV_PREFIX: &str = "ADOPTLY_CENTER__";

/// Configuration for the adoption center module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdoptionCenterConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    #[serde(default = "max_page_size")]
    pub max_page_size: u64,

    /// Rule table layered over the embedded one.
    #[serde(default)]
    pub permissions_path: Option<PathBuf>,
}

impl Default for AdoptionCenterConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: max_page_size(),
            permissions_path: None,
        }
    }
}

fn default_page_size() -> u64 {
    50
}

fn max_page_size() -> u64 {
    1000
}

impl AdoptionCenterConfig {
    /// Defaults, then `path` (if any), then environment overrides.
    ///
    /// # Errors
    ///
    /// Fails when `path` does not exist, a layer does not deserialize, or the
    /// page limits are inconsistent.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                bail!("config file {} does not exist", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to load adoption center config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            bail!("page sizes must be positive");
        }
        if self.default_page_size > self.max_page_size {
            bail!(
                "default_page_size ({}) exceeds max_page_size ({})",
                self.default_page_size,
                self.max_page_size
            );
        }
        Ok(())
    }
}
