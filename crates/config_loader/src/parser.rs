//! Configuration parsing module
//!
//! Supports the line-oriented relay format (primary), TOML and JSON.
//!
//! Line format: one `[proto@]host:port` spec per line, the first one being the
//! listen endpoint. `#` starts a trailing comment, blank lines are ignored and
//! surrounding whitespace is trimmed.

use std::path::Path;

use contracts::{ContractError, RelayTuning};
use serde::{Deserialize, Serialize};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// One spec per line (default)
    Lines,
    /// TOML document
    Toml,
    /// JSON document
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "conf" | "cfg" | "txt" => Some(Self::Lines),
            _ => None,
        }
    }

    /// Infer format from a path, falling back to the line format
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .unwrap_or(Self::Lines)
    }
}

/// Unresolved configuration, as written by the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayDocument {
    /// Listen spec
    pub listen: String,

    /// Destination specs
    #[serde(default)]
    pub destinations: Vec<String>,

    /// Tuning overrides
    #[serde(default)]
    pub tuning: RelayTuning,
}

impl RelayDocument {
    /// Build from a spec list: listen first, destinations after
    pub fn from_specs(specs: &[String]) -> Result<Self, ContractError> {
        let (listen, destinations) = specs
            .split_first()
            .ok_or_else(|| ContractError::config_parse("no listen spec given"))?;

        Ok(Self {
            listen: listen.trim().to_string(),
            destinations: destinations.iter().map(|d| d.trim().to_string()).collect(),
            tuning: RelayTuning::default(),
        })
    }

    /// Listen spec followed by destination specs
    pub fn specs(&self) -> Vec<String> {
        std::iter::once(self.listen.clone())
            .chain(self.destinations.iter().cloned())
            .collect()
    }
}

/// Strip comment and whitespace; `None` for lines carrying nothing
fn significant(line: &str) -> Option<&str> {
    let line = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let line = line.trim();
    (!line.is_empty()).then_some(line)
}

/// Parse the line format
pub fn parse_lines(content: &str) -> Result<RelayDocument, ContractError> {
    let specs: Vec<String> = content
        .lines()
        .filter_map(significant)
        .map(str::to_string)
        .collect();

    RelayDocument::from_specs(&specs)
}

/// Parse TOML format configuration
pub fn parse_toml(content: &str) -> Result<RelayDocument, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON format configuration
pub fn parse_json(content: &str) -> Result<RelayDocument, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse configuration according to format
pub fn parse(content: &str, format: ConfigFormat) -> Result<RelayDocument, ContractError> {
    match format {
        ConfigFormat::Lines => parse_lines(content),
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_comments_and_blanks() {
        let content = "
# relay listening on 9000
  127.0.0.1:9000   # listen

udp@127.0.0.1:10000
tcp@127.0.0.1:10001 # stream consumer
   # nothing here
";
        let doc = parse_lines(content).unwrap();
        assert_eq!(doc.listen, "127.0.0.1:9000");
        assert_eq!(
            doc.destinations,
            vec!["udp@127.0.0.1:10000", "tcp@127.0.0.1:10001"]
        );
        assert_eq!(doc.tuning, RelayTuning::default());
    }

    #[test]
    fn test_parse_lines_empty_is_error() {
        let err = parse_lines("# only comments\n\n").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_lines_listen_only() {
        let doc = parse_lines("0.0.0.0:9000\n").unwrap();
        assert!(doc.destinations.is_empty());
    }

    #[test]
    fn test_parse_toml_with_tuning() {
        let content = r#"
listen = "tcp@0.0.0.0:9000"
destinations = ["127.0.0.1:10000", "tcp@127.0.0.1:10001"]

[tuning]
queue_capacity = 64
reconnect_max_ms = 2000
"#;
        let doc = parse_toml(content).unwrap();
        assert_eq!(doc.listen, "tcp@0.0.0.0:9000");
        assert_eq!(doc.destinations.len(), 2);
        assert_eq!(doc.tuning.queue_capacity, 64);
        assert_eq!(doc.tuning.reconnect_max_ms, 2000);
        // untouched knobs keep defaults
        assert_eq!(doc.tuning.poll_interval_ms, RelayTuning::default().poll_interval_ms);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "listen": "127.0.0.1:9000", "destinations": ["127.0.0.1:10000"] }"#;
        let doc = parse_json(content).unwrap();
        assert_eq!(doc.destinations, vec!["127.0.0.1:10000"]);
    }

    #[test]
    fn test_parse_toml_missing_listen() {
        let err = parse_toml("destinations = []").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("relay.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("relay.JSON")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("relay.conf")), ConfigFormat::Lines);
        assert_eq!(ConfigFormat::from_path(Path::new("relay")), ConfigFormat::Lines);
    }
}
