use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use treedigest_core::DigestConfig;

/// Application directory name under the platform config root
const APP_CONFIG_DIR: &str = "treedigest";

const CONFIG_FILE: &str = "config.toml";

const ENV_PREFIX: &str = "TREEDIGEST_";

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub digest: DigestConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// `text` or `json`
    pub default_format: String,
    pub color_enabled: bool,
    /// Print the run summary on stderr
    pub summary_enabled: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: "text".to_string(),
            color_enabled: true,
            summary_enabled: true,
        }
    }
}

impl AppConfig {
    /// Apply command line overrides on top of the layered configuration
    pub fn apply_cli_overrides(&mut self, overrides: &DigestOverrides) {
        if !overrides.algorithms.is_empty() {
            self.digest.algorithms = overrides.algorithms.clone();
        }
        if let Some(size) = overrides.block_size {
            self.digest.block_size = size;
        }
        if let Some(buffers) = overrides.max_buffers {
            self.digest.max_buffers = buffers;
        }
        if let Some(jobs) = overrides.jobs {
            self.digest.max_concurrent_jobs = jobs;
        }
        if overrides.inline {
            self.digest.transport = treedigest_core::BufferTransport::Inline;
        }
    }
}

/// Digest settings given on the command line
#[derive(Debug, Default, Clone)]
pub struct DigestOverrides {
    pub algorithms: Vec<String>,
    pub block_size: Option<usize>,
    pub max_buffers: Option<usize>,
    pub jobs: Option<usize>,
    pub inline: bool,
}

/// Configuration manager that handles XDG-compliant paths and layered configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new ConfigManager with default XDG-compliant paths
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// `$XDG_CONFIG_HOME/treedigest/config.toml`, else the platform config dir
    fn default_config_path() -> PathBuf {
        #[cfg(not(target_os = "windows"))]
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
            && !xdg_config.is_empty()
        {
            return PathBuf::from(xdg_config).join(APP_CONFIG_DIR).join(CONFIG_FILE);
        }

        dirs::config_dir()
            .map(|d| d.join(APP_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".treedigest"))
            .join(CONFIG_FILE)
    }

    /// Load configuration with layered priority: ENV > File > Defaults
    ///
    /// Command line flags are applied afterwards by the caller.
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new();

        // Layer 1: Defaults
        figment = figment.merge(Serialized::defaults(AppConfig::default()));

        // Layer 2: Config file (if exists)
        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        // Layer 3: Environment variables, e.g. TREEDIGEST_DIGEST__BLOCK_SIZE
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().with_context(|| {
            format!(
                "Failed to load configuration from {}",
                self.config_path.display()
            )
        })
    }

    /// Every effective configuration value as `section.key = value`
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config).context("Failed to render configuration")?;
        let value: toml::Value = toml::from_str(&toml_string)?;

        let mut items = Vec::new();
        Self::collect_values(&value, String::new(), &mut items);
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let new_prefix = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::collect_values(val, new_prefix, items);
                }
            }
            toml::Value::Array(values) => {
                let rendered: Vec<String> = values
                    .iter()
                    .map(|v| match v {
                        toml::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                items.push((prefix, rendered.join(", ")));
            }
            toml::Value::String(s) => items.push((prefix, s.clone())),
            toml::Value::Integer(i) => items.push((prefix, i.to_string())),
            toml::Value::Float(f) => items.push((prefix, f.to_string())),
            toml::Value::Boolean(b) => items.push((prefix, b.to_string())),
            toml::Value::Datetime(d) => items.push((prefix, d.to_string())),
        }
    }
}
