use crate::container::DEFAULT_ENGINE;
use crate::errors::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const CONFIG_FILE: &str = "digest-pin.toml";

pub const DEFAULT_REPOSITORY: &str = "https://github.com/openshift-knative/serverless-operator.git";
pub const DEFAULT_MANIFEST: &str =
    "olm-catalog/serverless-operator/manifests/serverless-operator.clusterserviceversion.yaml";
pub const DEFAULT_BUILD_CONTEXT: &str = "olm-catalog/serverless-operator";
pub const DEFAULT_PREFIXES: &[&str] = &[
    "registry.ci.openshift.org/openshift/knative-",
    "registry.ci.openshift.org/knative/openshift-serverless-",
    "registry.ci.openshift.org/knative/release-",
];

/// Settings as written in the config file, every key is optional
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub repository: Option<String>,
    pub manifest: Option<PathBuf>,
    pub build_context: Option<PathBuf>,
    pub prefixes: Option<Vec<String>>,
    pub engine: Option<String>,
}

impl ConfigFile {
    pub fn deserialize(buf: &str) -> Result<Self> {
        let config = toml::from_str(buf).context("Failed to load config from toml")?;
        Ok(config)
    }

    /// Read `path`, or the default config file if it exists
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => {
                let path = Path::new(CONFIG_FILE);
                if !fs::try_exists(path).await.unwrap_or(false) {
                    debug!("No config file found at {path:?}, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };

        let buf = fs::read_to_string(path)
            .await
            .with_context(|| anyhow!("Failed to read config file: {path:?}"))?;
        let config = Self::deserialize(&buf)
            .with_context(|| anyhow!("Failed to parse config file: {path:?}"))?;
        debug!("Loaded config from file: {config:?}");
        Ok(config)
    }
}

/// Effective settings after applying defaults
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub repository: String,
    pub manifest: PathBuf,
    pub build_context: PathBuf,
    pub prefixes: Vec<String>,
    pub engine: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            repository: DEFAULT_REPOSITORY.to_string(),
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            build_context: PathBuf::from(DEFAULT_BUILD_CONTEXT),
            prefixes: DEFAULT_PREFIXES.iter().map(|s| s.to_string()).collect(),
            engine: DEFAULT_ENGINE.to_string(),
        }
    }
}

impl Config {
    /// Layer `overrides` on top of `self`, set values win
    pub fn merge(mut self, overrides: ConfigFile) -> Self {
        if let Some(repository) = overrides.repository {
            self.repository = repository;
        }
        if let Some(manifest) = overrides.manifest {
            self.manifest = manifest;
        }
        if let Some(build_context) = overrides.build_context {
            self.build_context = build_context;
        }
        if let Some(prefixes) = overrides.prefixes {
            self.prefixes = prefixes;
        }
        if let Some(engine) = overrides.engine {
            self.engine = engine;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefixes.is_empty() {
            bail!("No image prefixes configured");
        }
        if let Some(prefix) = self.prefixes.iter().find(|p| p.trim().is_empty()) {
            bail!("Image prefixes can not be empty: {prefix:?}");
        }
        if self.manifest.is_absolute() {
            bail!(
                "Manifest path needs to be relative to the checkout: {:?}",
                self.manifest
            );
        }
        if self.build_context.is_absolute() {
            bail!(
                "Build context needs to be relative to the checkout: {:?}",
                self.build_context
            );
        }
        Ok(())
    }
}
