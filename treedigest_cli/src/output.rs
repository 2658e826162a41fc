//! Per-file digest output

use anyhow::Result;
use colored::*;
use serde_json::json;
use std::path::Path;
use treedigest_core::FileDigest;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// `<algorithm> (<path>) = <hex>`, one line per digest
    Text,
    /// One JSON object per file
    Json,
}

impl OutputFormat {
    /// Parse the `output.default_format` config value
    pub fn from_config(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("Unknown output format '{other}' (expected text or json)"),
        }
    }
}

pub struct DigestFormatter {
    format: OutputFormat,
    use_color: bool,
    /// Algorithm names in the order lines are printed
    order: Vec<String>,
}

impl DigestFormatter {
    pub fn new(format: OutputFormat, use_color: bool, order: Vec<String>) -> Self {
        Self {
            format,
            use_color,
            order,
        }
    }

    fn colorize(&self, text: &str, color: fn(&str) -> ColoredString) -> String {
        if self.use_color {
            color(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn format(&self, path: &Path, digest: &FileDigest) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.format_text(path, digest)),
            OutputFormat::Json => {
                let value = json!({
                    "path": path.display().to_string(),
                    "size": digest.bytes_read,
                    "digests": digest.digests,
                });
                Ok(serde_json::to_string(&value)?)
            }
        }
    }

    fn format_text(&self, path: &Path, digest: &FileDigest) -> String {
        let path = path.display().to_string();
        self.order
            .iter()
            .filter_map(|name| digest.digests.get(name).map(|hex| (name, hex)))
            .map(|(name, hex)| {
                format!(
                    "{} ({}) = {}",
                    self.colorize(name, |s| s.yellow()),
                    path,
                    self.colorize(hex, |s| s.cyan())
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}
