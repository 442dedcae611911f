//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::RelayConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    source: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
    /// Resolved configuration as a TOML document (`--toml`)
    #[serde(skip_serializing_if = "Option::is_none")]
    toml: Option<String>,
}

#[derive(Serialize)]
struct ConfigSummary {
    listen: String,
    destinations: Vec<String>,
    stream_destinations: usize,
    datagram_destinations: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(source = ?args.specs, "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let loaded = ConfigLoader::from_cli_args(&args.specs).and_then(|config| {
        let toml = if args.toml {
            Some(ConfigLoader::to_toml(&config)?)
        } else {
            None
        };
        Ok((config, toml))
    });

    match loaded {
        Ok((config, toml)) => {
            let warnings = collect_warnings(&config);
            let stream_destinations = config.destinations.iter().filter(|d| d.is_stream()).count();

            ValidationResult {
                valid: true,
                source: args.specs.clone(),
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    listen: config.listen.to_string(),
                    destinations: config.destinations.iter().map(ToString::to_string).collect(),
                    stream_destinations,
                    datagram_destinations: config.destinations.len() - stream_destinations,
                }),
                toml,
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            source: args.specs.clone(),
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
            toml: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RelayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.destinations.is_empty() {
        warnings.push("No destinations configured - received units will be discarded".to_string());
    }

    if config.tuning.stats_interval_ticks == 0 {
        warnings.push("tuning.stats_interval_ticks is 0 - periodic stats disabled".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.source.join(" "));

        if let Some(ref summary) = result.summary {
            println!("\n  Listen: {}", summary.listen);
            println!(
                "  Destinations: {} ({} stream, {} datagram)",
                summary.destinations.len(),
                summary.stream_destinations,
                summary.datagram_destinations
            );
            for destination in &summary.destinations {
                println!("    - {}", destination);
            }
        }

        if let Some(ref toml) = result.toml {
            println!("\n{}", toml);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.source.join(" "));
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_config_file() {
        let mut file = tempfile::Builder::new().suffix(".conf").tempfile().unwrap();
        writeln!(file, "127.0.0.1:9000  # listen").unwrap();
        writeln!(file, "127.0.0.1:10000").unwrap();
        writeln!(file, "tcp@127.0.0.1:10001").unwrap();

        let args = ValidateArgs {
            specs: vec![file.path().display().to_string()],
            json: true,
            toml: false,
        };
        let result = validate_config(&args);
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.stream_destinations, 1);
        assert_eq!(summary.datagram_destinations, 1);
    }

    #[test]
    fn test_validate_warns_without_destinations() {
        let args = ValidateArgs {
            specs: vec!["127.0.0.1:9000".to_string()],
            json: false,
            toml: false,
        };
        let result = validate_config(&args);
        assert!(result.valid);
        assert_eq!(result.warnings.unwrap().len(), 1);
    }

    #[test]
    fn test_validate_rejects_destination_equal_to_listen() {
        let args = ValidateArgs {
            specs: vec!["127.0.0.1:9000".to_string(), "127.0.0.1:9000".to_string()],
            json: false,
            toml: false,
        };
        assert!(!validate_config(&args).valid);
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_validate_prints_resolved_toml() {
        let args = ValidateArgs {
            specs: vec![
                "127.0.0.1:9000".to_string(),
                "tcp@127.0.0.1:10001".to_string(),
            ],
            json: true,
            toml: true,
        };
        let result = validate_config(&args);
        assert!(result.valid);
        let toml = result.toml.unwrap();
        assert!(toml.contains("listen = \"udp@127.0.0.1:9000\""));
        assert!(toml.contains("tcp@127.0.0.1:10001"));
        assert!(toml.contains("[tuning]"));
    }

    #[test]
    fn test_validate_bad_spec() {
        let args = ValidateArgs {
            specs: vec!["127.0.0.1:9000".to_string(), "sctp@127.0.0.1:1".to_string()],
            json: true,
            toml: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.is_some());
    }
}
