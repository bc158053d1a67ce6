//! Runtime configuration
//!
//! ```text
//! {
//!   "limits": {"maxDepth": 50, "maxComponents": 1000},
//!   "pipeline": {"capacity": 50},
//!   "loader": {"timeoutMs": 3000, "minTimeoutMs": 250, "failureThreshold": 3, "cooldownMs": 30000},
//!   "grantedPermissions": ["camera"]
//! }
//! ```
//!
//! Every field is optional.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use super::capability::{GrantedPermissions, Permission};
use super::error::ConfigError;
use super::loader::LoaderConfig;
use super::pipeline::PipelineConfig;
use super::validator::ValidationLimits;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "TUTORLY_CONFIG";

/// Deserialize permission names leniently, skipping ones we don't know
fn lenient_permissions<'de, D>(deserializer: D) -> Result<Vec<Permission>, D::Error>
where
    D: Deserializer<'de>,
{
    let names: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(names
        .unwrap_or_default()
        .iter()
        .filter_map(|name| {
            let permission = Permission::from_name(name);
            if permission.is_none() {
                ::log::warn!("[A2UI] Ignoring unknown permission {:?} in config", name);
            }
            permission
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    pub limits: ValidationLimits,
    pub pipeline: PipelineConfig,
    pub loader: LoaderConfig,
    #[serde(deserialize_with = "lenient_permissions")]
    pub granted_permissions: Vec<Permission>,
}

impl RuntimeConfig {
    pub fn from_json(json: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str::<RuntimeConfig>(json)
            .map(RuntimeConfig::sanitized)
            .map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json, path)
    }

    /// Resolve the configuration from, in order: an explicit path, the
    /// [`CONFIG_ENV`] variable, the platform default path, built-in defaults.
    ///
    /// Only the default path may be missing.
    pub fn resolve(explicit: Option<&Path>, default_path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::resolve_from(explicit, from_env.as_deref(), default_path)
    }

    fn resolve_from(
        explicit: Option<&Path>,
        from_env: Option<&Path>,
        default_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = explicit.or(from_env) {
            ::log::info!("[A2UI] Loading config from {}", path.display());
            return Self::from_file(path);
        }

        match default_path {
            Some(path) if path.is_file() => {
                ::log::info!("[A2UI] Loading config from {}", path.display());
                Self::from_file(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Clamp values into workable ranges
    pub fn sanitized(self) -> Self {
        let granted: BTreeSet<Permission> = self.granted_permissions.into_iter().collect();
        RuntimeConfig {
            limits: ValidationLimits {
                max_depth: self.limits.max_depth.max(1),
                max_components: self.limits.max_components.max(1),
            },
            pipeline: PipelineConfig {
                capacity: self.pipeline.capacity.max(1),
            },
            loader: self.loader.sanitized(),
            granted_permissions: granted.into_iter().collect(),
        }
    }

    /// Permission state seeded with the configured grants
    pub fn permissions(&self) -> GrantedPermissions {
        GrantedPermissions::new(self.granted_permissions.iter().copied())
    }
}
