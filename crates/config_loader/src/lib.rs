//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse relay configuration (spec lines, TOML or JSON)
//! - Resolve every `[proto@]host:port` spec
//! - Validate configuration legality
//! - Generate `RelayConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("relay.conf")).unwrap();
//! println!("Listen: {}", config.listen);
//! ```

mod parser;
mod validator;

pub use contracts::{ConfigSource, RelayConfig, RelayTuning};
pub use parser::{ConfigFormat, RelayDocument};
pub use validator::validate_tuning;

use contracts::{ContractError, DestinationSpec, Endpoint};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader
///
/// Provides static methods to load configuration from files, strings or the
/// command line.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Format is detected from the extension (.toml / .json, anything else is
    /// the line format).
    ///
    /// # Errors
    /// - File read failure
    /// - Parse failure
    /// - Resolution failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RelayConfig, ContractError> {
        let format = ConfigFormat::from_path(path);
        let content = Self::read_file(path)?;
        let document = parser::parse(&content, format)?;
        debug!(path = %path.display(), ?format, "loading config file");
        Self::resolve_and_validate(document, ConfigSource::File(path.to_path_buf()))
    }

    /// Load configuration from string
    ///
    /// The resulting config reloads from the spec list it was parsed into.
    #[cfg(test)]
    fn load_from_str(content: &str, format: ConfigFormat) -> Result<RelayConfig, ContractError> {
        let document = parser::parse(content, format)?;
        let source = ConfigSource::Args(document.specs());
        Self::resolve_and_validate(document, source)
    }

    /// Build configuration from a spec list (listen first)
    pub fn from_specs(specs: &[String]) -> Result<RelayConfig, ContractError> {
        let document = RelayDocument::from_specs(specs)?;
        Self::resolve_and_validate(document, ConfigSource::Args(specs.to_vec()))
    }

    /// Interpret positional command-line arguments
    ///
    /// A single argument names a config file; otherwise the arguments are the
    /// spec list itself.
    pub fn from_cli_args(args: &[String]) -> Result<RelayConfig, ContractError> {
        match args {
            [] => Err(ContractError::config_parse(
                "expected a config file or local-host:local-port followed by destinations",
            )),
            [file] => Self::load_from_path(&PathBuf::from(file)),
            specs => Self::from_specs(specs),
        }
    }

    /// Re-read the configuration from its original source
    ///
    /// Tuning is carried over from `current`; reload only changes the
    /// destination set.
    pub fn reload(current: &RelayConfig) -> Result<RelayConfig, ContractError> {
        let mut reloaded = match &current.source {
            ConfigSource::File(path) => Self::load_from_path(path)?,
            ConfigSource::Args(specs) => Self::from_specs(specs)?,
        };
        reloaded.tuning = current.tuning.clone();
        Ok(reloaded)
    }

    /// Serialize a configuration back into its document form
    pub fn to_toml(config: &RelayConfig) -> Result<String, ContractError> {
        let document = RelayDocument {
            listen: config.listen.to_string(),
            destinations: config.destinations.iter().map(ToString::to_string).collect(),
            tuning: config.tuning.clone(),
        };
        toml::to_string_pretty(&document)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        std::fs::read_to_string(path).map_err(|e| ContractError::ConfigParse {
            message: format!("cannot read {}: {e}", path.display()),
            source: Some(Box::new(e)),
        })
    }

    /// Resolve specs and validate the result
    fn resolve_and_validate(
        document: RelayDocument,
        source: ConfigSource,
    ) -> Result<RelayConfig, ContractError> {
        let listen = Endpoint::parse(&document.listen)?;
        let destinations = document
            .destinations
            .iter()
            .map(|spec| Endpoint::parse(spec))
            .collect::<Result<Vec<DestinationSpec>, _>>()?;

        let config = RelayConfig {
            listen,
            destinations,
            tuning: document.tuning,
            source,
        };
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Protocol;
    use std::io::Write;

    const LINES: &str = "
# local endpoint
127.0.0.1:9000
udp@127.0.0.1:10000   # datagram consumer
tcp@127.0.0.1:10001   # stream consumer
";

    fn specs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_load_from_str_lines() {
        let config = ConfigLoader::load_from_str(LINES, ConfigFormat::Lines).unwrap();
        assert_eq!(config.listen.protocol, Protocol::Datagram);
        assert_eq!(config.destinations.len(), 2);
        assert_eq!(config.destinations[1].protocol, Protocol::Stream);
        assert_eq!(
            config.source,
            ConfigSource::Args(specs(&[
                "127.0.0.1:9000",
                "udp@127.0.0.1:10000",
                "tcp@127.0.0.1:10001"
            ]))
        );
    }

    #[test]
    fn test_load_from_path_and_reload() {
        let mut file = tempfile::Builder::new().suffix(".conf").tempfile().unwrap();
        write!(file, "127.0.0.1:9000\n127.0.0.1:10000\n").unwrap();

        let mut config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.destinations.len(), 1);
        config.tuning.queue_capacity = 7;

        // rewrite with an extra destination
        std::fs::write(file.path(), "127.0.0.1:9000\n127.0.0.1:10000\ntcp@127.0.0.1:10002\n")
            .unwrap();
        let reloaded = ConfigLoader::reload(&config).unwrap();
        assert_eq!(reloaded.destinations.len(), 2);
        assert_eq!(reloaded.tuning.queue_capacity, 7);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            "listen = \"tcp@127.0.0.1:9000\"\ndestinations = [\"127.0.0.1:10000\"]\n[tuning]\nqueue_capacity = 16\n"
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert!(config.listen.is_stream());
        assert_eq!(config.tuning.queue_capacity, 16);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/relay.conf")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_from_cli_args() {
        let config =
            ConfigLoader::from_cli_args(&specs(&["127.0.0.1:9000", "127.0.0.1:10000"])).unwrap();
        assert_eq!(config.destinations.len(), 1);

        assert!(ConfigLoader::from_cli_args(&[]).is_err());
    }

    #[test]
    fn test_reload_from_args_is_stable() {
        let config = ConfigLoader::from_specs(&specs(&["127.0.0.1:9000", "127.0.0.1:10000"])).unwrap();
        let reloaded = ConfigLoader::reload(&config).unwrap();
        assert_eq!(config.destinations, reloaded.destinations);
    }

    #[test]
    fn test_validation_runs_after_resolve() {
        let err = ConfigLoader::from_specs(&specs(&[
            "127.0.0.1:9000",
            "127.0.0.1:10000",
            "127.0.0.1:10000",
        ]))
        .unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
    }

    #[test]
    fn test_to_toml_round_trip() {
        let config = ConfigLoader::load_from_str(LINES, ConfigFormat::Lines).unwrap();
        let toml = ConfigLoader::to_toml(&config).unwrap();
        let again = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.listen, again.listen);
        assert_eq!(config.destinations, again.destinations);
    }
}
