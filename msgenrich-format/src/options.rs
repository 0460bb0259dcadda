//! Enrichment options

use crate::constants::{
    INGEST_SOURCE_FILE_NAME_FIELD, PKG_ID_FIELD, TRANSACTION_ID_SUFFIX, TRANSACTION_SUFFIX,
};
use crate::error::{EnrichError, Result};

/// What to do with a record whose transaction container or id cannot be found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingTransactionBehavior {
    /// Abort the run with `MissingTransactionContainer` / `MissingTransactionId`
    #[default]
    Error,
    /// Keep the record's pkg_id and source file tag, skip transaction id propagation
    Skip,
}

/// Field names and matching rules used during enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichOptions {
    /// Field receiving the package id at the record body root (default: `pkg_id`)
    pub pkg_id_field: String,
    /// Field carrying the record's source file name (default: `ingestSourceFileName`)
    pub source_file_field: String,
    /// Case-insensitive suffix of the transaction container field (default: `transaction`)
    pub transaction_suffix: String,
    /// Case-insensitive suffix of the transaction id field (default: `transactionid`)
    pub transaction_id_suffix: String,
    /// Handling of records without a transaction container or id
    pub missing_transaction: MissingTransactionBehavior,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            pkg_id_field: PKG_ID_FIELD.to_string(),
            source_file_field: INGEST_SOURCE_FILE_NAME_FIELD.to_string(),
            transaction_suffix: TRANSACTION_SUFFIX.to_string(),
            transaction_id_suffix: TRANSACTION_ID_SUFFIX.to_string(),
            missing_transaction: MissingTransactionBehavior::Error,
        }
    }
}

impl EnrichOptions {
    /// Validate that no field name or suffix is empty
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("pkg_id_field", &self.pkg_id_field),
            ("source_file_field", &self.source_file_field),
            ("transaction_suffix", &self.transaction_suffix),
            ("transaction_id_suffix", &self.transaction_id_suffix),
        ];

        for (name, value) in named {
            if value.trim().is_empty() {
                return Err(EnrichError::InvalidOptions {
                    reason: format!("{name} must not be empty"),
                });
            }
        }

        Ok(())
    }
}
