//! Configuration for the static access resolver plugin.

use std::collections::BTreeMap;
use std::path::Path;

use access_resolver_sdk::Rule;
use anyhow::{Context, bail};
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;

/// Rule table shipped with the plugin.
pub const DEFAULT_PERMISSIONS: &str = include_str!("../permissions.yaml");

/// Prefix of environment overrides (`ADOPTLY_ACCESS__PRIORITY=10`).
pub const ENV_PREFIX: &str = "ADOPTLY_ACCESS__";

/// Plugin configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticAccessPluginConfig {
    /// Vendor name reported by the plugin.
    pub vendor: String,

    /// Plugin priority (lower = higher priority).
    pub priority: i16,

    /// Ordered rules per resource name.
    pub resources: BTreeMap<String, Vec<Rule>>,
}

impl Default for StaticAccessPluginConfig {
    fn default() -> Self {
        Self {
            vendor: "adoptly".to_owned(),
            priority: 100,
            resources: BTreeMap::new(),
        }
    }
}

impl StaticAccessPluginConfig {
    /// Load the embedded table, then `path` (if any), then environment
    /// overrides. A resource listed in the file replaces the embedded rules
    /// of that resource as a whole.
    ///
    /// # Errors
    ///
    /// Fails when `path` does not exist or any layer does not deserialize.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Yaml::string(DEFAULT_PERMISSIONS));
        if let Some(path) = path {
            if !path.is_file() {
                bail!("access rules file {} does not exist", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to load access rules")
    }

    /// Parse a standalone YAML document, without defaults or environment.
    ///
    /// # Errors
    ///
    /// Fails when the document does not deserialize.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Figment::new()
            .merge(Yaml::string(yaml))
            .extract()
            .context("failed to parse access rules")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use access_resolver_sdk::{Action, RoleMatcher};
    use std::io::Write;

    #[test]
    fn embedded_table_parses() {
        let config = StaticAccessPluginConfig::from_yaml(DEFAULT_PERMISSIONS).unwrap();
        for resource in ["users", "shelters", "tutors", "pets", "adoptions"] {
            assert!(
                config.resources.contains_key(resource),
                "missing rules for {resource}"
            );
        }
    }

    #[test]
    fn file_replaces_resource_rules() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "resources:\n  pets:\n    - action: read\n      roles: NONE\n      attributes:\n        included: ['*']"
        )
        .unwrap();

        let config = StaticAccessPluginConfig::load(Some(file.path())).unwrap();
        let pets = &config.resources["pets"];
        assert_eq!(pets.len(), 1);
        assert_eq!(pets[0].action, Action::Read);
        assert_eq!(pets[0].roles, RoleMatcher::Anyone);
        assert!(config.resources.contains_key("shelters"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = StaticAccessPluginConfig::load(Some(Path::new("/nonexistent/rules.yaml")))
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn environment_overrides_scalars() {
        temp_env::with_vars(
            [
                ("ADOPTLY_ACCESS__PRIORITY", Some("7")),
                ("ADOPTLY_ACCESS__VENDOR", Some("acme")),
            ],
            || {
                let config = StaticAccessPluginConfig::load(None).unwrap();
                assert_eq!(config.priority, 7);
                assert_eq!(config.vendor, "acme");
            },
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(StaticAccessPluginConfig::from_yaml("mode: allow_all").is_err());
    }
}
