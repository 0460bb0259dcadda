//! Enrichment configuration via an optional TOML file
//!
//! Precedence is command-line flag, then config file, then built-in default.
//!
//! ```toml
//! [fields]
//! pkg_id = "pkg_id"
//! source_file = "ingestSourceFileName"
//!
//! [matching]
//! transaction_suffix = "transaction"
//! transaction_id_suffix = "transactionid"
//! missing_transaction = "error"   # or "skip"
//!
//! [sequence]
//! file = "__temp__.json"
//!
//! [output]
//! pretty = false
//! ```

use msgenrich_format::constants::SEQUENCE_FILE_NAME;
use msgenrich_io::{EnrichOptions, MissingTransactionBehavior, OutputFormat, SequenceSource};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "Invalid config file {}: {source}\n\
         \n\
         Recognised tables are [fields], [matching], [sequence] and [output].",
        path.display()
    )]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldsConfig {
    pub pkg_id: Option<String>,
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTransaction {
    Error,
    Skip,
}

impl From<MissingTransaction> for MissingTransactionBehavior {
    fn from(value: MissingTransaction) -> Self {
        match value {
            MissingTransaction::Error => MissingTransactionBehavior::Error,
            MissingTransaction::Skip => MissingTransactionBehavior::Skip,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    pub transaction_suffix: Option<String>,
    pub transaction_id_suffix: Option<String>,
    pub missing_transaction: Option<MissingTransaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceConfig {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub pretty: Option<bool>,
}

/// Contents of a config file; every setting is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichConfig {
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub sequence: SequenceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl EnrichConfig {
    /// Load `path`, or the empty config when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Settings given on the command line, which win over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub sequence_file: Option<PathBuf>,
    pub start: Option<u64>,
    pub pretty: bool,
    pub skip_missing_transaction: bool,
    pub transaction_suffix: Option<String>,
    pub transaction_id_suffix: Option<String>,
}

/// Everything an enrich run needs besides its input and output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub options: EnrichOptions,
    pub sequence: SequenceSource,
    pub format: OutputFormat,
}

impl Settings {
    pub fn resolve(config: EnrichConfig, overrides: Overrides) -> Self {
        let defaults = EnrichOptions::default();
        let EnrichConfig {
            fields,
            matching,
            sequence,
            output,
        } = config;

        let missing_transaction = if overrides.skip_missing_transaction {
            MissingTransactionBehavior::Skip
        } else {
            matching
                .missing_transaction
                .map(Into::into)
                .unwrap_or(defaults.missing_transaction)
        };

        let options = EnrichOptions {
            pkg_id_field: fields.pkg_id.unwrap_or(defaults.pkg_id_field),
            source_file_field: fields.source_file.unwrap_or(defaults.source_file_field),
            transaction_suffix: overrides
                .transaction_suffix
                .or(matching.transaction_suffix)
                .unwrap_or(defaults.transaction_suffix),
            transaction_id_suffix: overrides
                .transaction_id_suffix
                .or(matching.transaction_id_suffix)
                .unwrap_or(defaults.transaction_id_suffix),
            missing_transaction,
        };

        let sequence = match overrides.start {
            Some(start) => SequenceSource::Fixed(start),
            None => SequenceSource::File(sequence_path(overrides.sequence_file, sequence)),
        };

        let format = if overrides.pretty || output.pretty.unwrap_or(false) {
            OutputFormat::Pretty
        } else {
            OutputFormat::Compact
        };

        Self {
            options,
            sequence,
            format,
        }
    }
}

/// Sequence file location for commands that only touch the side file
pub fn sequence_path(flag: Option<PathBuf>, config: SequenceConfig) -> PathBuf {
    flag.or(config.file)
        .unwrap_or_else(|| PathBuf::from(SEQUENCE_FILE_NAME))
}
