//! Resolver configuration
//!
//! Defaults, optionally overridden by a YAML file and then by environment
//! variables:
//! - `REFGRAPH_REF_KEYWORD` - member name that marks a reference object
//! - `REFGRAPH_RECURSION_LIMIT` - back-edge expansions allowed when materializing
//! - `REFGRAPH_FAIL_FAST` - stop following references after the first failure

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ENV_REF_KEYWORD: &str = "REFGRAPH_REF_KEYWORD";
pub const ENV_RECURSION_LIMIT: &str = "REFGRAPH_RECURSION_LIMIT";
pub const ENV_FAIL_FAST: &str = "REFGRAPH_FAIL_FAST";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Member name of reference objects
    pub ref_keyword: String,
    /// How many times a cyclic node may be re-expanded by `SchemaGraph::materialize`
    pub recursion_limit: usize,
    /// Stop following references once one branch has failed
    pub fail_fast: bool,
    /// File name given to in-memory roots inside their base directory
    pub inline_root_name: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ref_keyword: "$ref".to_string(),
            recursion_limit: 5,
            fail_fast: false,
            inline_root_name: "__inline__.yaml".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load a YAML file; missing members keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading resolver configuration from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ResolverConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Override fields from `REFGRAPH_*` variables that are set
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(keyword) = var(ENV_REF_KEYWORD) {
            self.ref_keyword = keyword;
        }
        if let Some(limit) = var(ENV_RECURSION_LIMIT) {
            self.recursion_limit = limit
                .trim()
                .parse()
                .with_context(|| format!("{} must be a non-negative integer", ENV_RECURSION_LIMIT))?;
        }
        if let Some(flag) = var(ENV_FAIL_FAST) {
            self.fail_fast = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(())
    }
}
