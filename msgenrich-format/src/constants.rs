//! Field names and defaults for message enrichment

/// Field stamped on every record body with its package id.
pub const PKG_ID_FIELD: &str = "pkg_id";

/// Field carrying the ingestion origin of a record.
pub const INGEST_SOURCE_FILE_NAME_FIELD: &str = "ingestSourceFileName";

/// Suffix identifying the transaction container of a record body.
pub const TRANSACTION_SUFFIX: &str = "transaction";

/// Suffix identifying the transaction id field inside the container.
pub const TRANSACTION_ID_SUFFIX: &str = "transactionid";

/// Package id handed out when no sequence state has been persisted yet.
pub const FIRST_PKG_ID: u64 = 1;

/// Default file name of the persisted sequence state.
pub const SEQUENCE_FILE_NAME: &str = "__temp__.json";
