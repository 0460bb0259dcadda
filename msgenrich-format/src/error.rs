//! Error types for message enrichment

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while enriching a message document
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Top-level document is not a JSON object
    #[error(
        "Document root type mismatch: found {found_type}, expected object.\n\
         \n\
         Message documents must be a JSON object whose array-valued fields\n\
         hold the wrapped transaction messages."
    )]
    DocumentNotObject {
        /// Actual type found at the root
        found_type: String,
    },

    /// Message array does not follow the single-wrapper-key layout
    #[error(
        "Malformed message array '{array}' at element {index}: {reason}\n\
         \n\
         Every element of a message array must be an object with one wrapper key,\n\
         and all elements must share the wrapper key of the first element.\n\
         Example: {{\"{array}\": [{{\"PolicyMessage\": {{...}}}}, {{\"PolicyMessage\": {{...}}}}]}}"
    )]
    MalformedMessageArray {
        /// Top-level key of the array
        array: String,
        /// Index of the offending element
        index: usize,
        /// Explanation of what is wrong with the element
        reason: String,
    },

    /// Wrapper key points at something other than an object
    #[error(
        "Record body type mismatch: '{array}[{index}].{wrapper_key}' is {found_type}, expected object."
    )]
    RecordBodyNotObject {
        /// Top-level key of the array
        array: String,
        /// Index of the record within the array
        index: usize,
        /// Wrapper key of the record
        wrapper_key: String,
        /// Actual type found
        found_type: String,
    },

    /// No field of the record body ends with the transaction suffix
    #[error(
        "Missing transaction container: record '{array}[{index}]' has no field ending with '{suffix}'.\n\
         \n\
         Available keys: {available_keys}\n\
         \n\
         Suggested fixes:\n\
         1. Check the record schema for the transaction element name\n\
         2. Change the match suffix: --transaction-suffix <suffix>\n\
         3. Skip such records: --skip-missing-transaction"
    )]
    MissingTransactionContainer {
        /// Top-level key of the array
        array: String,
        /// Index of the record within the array
        index: usize,
        /// Suffix that was searched for
        suffix: String,
        /// Comma-separated keys of the record body
        available_keys: String,
    },

    /// Transaction container holds no field ending with the id suffix
    #[error(
        "Missing transaction id: '{array}[{index}].{container}' has no field ending with '{suffix}'.\n\
         \n\
         Available keys: {available_keys}\n\
         \n\
         Suggested fixes:\n\
         1. Change the match suffix: --transaction-id-suffix <suffix>\n\
         2. Skip such records: --skip-missing-transaction"
    )]
    MissingTransactionId {
        /// Top-level key of the array
        array: String,
        /// Index of the record within the array
        index: usize,
        /// Name of the transaction container field
        container: String,
        /// Suffix that was searched for
        suffix: String,
        /// Comma-separated keys of the container (empty if not an object)
        available_keys: String,
    },

    /// Package id sequence cannot advance any further
    #[error("Package id sequence exhausted after {last}")]
    SequenceExhausted {
        /// Last id that was handed out
        last: u64,
    },

    /// Enrichment options are unusable
    #[error("Invalid enrichment options: {reason}")]
    InvalidOptions {
        /// Which option is invalid and why
        reason: String,
    },

    /// Input document could not be read
    #[error("Failed to read input document {}: {source}", path.display())]
    InputRead {
        /// Input path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Input document could not be parsed
    #[error("JSON parse error while reading {context}: {source}")]
    InputParse {
        /// Description of the input being parsed
        context: String,
        /// Underlying serde_json error
        source: serde_json::Error,
    },

    /// Enriched document could not be written
    #[error("Failed to write enriched document to {}: {source}", path.display())]
    OutputWrite {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Sequence state could not be written
    #[error(
        "Failed to persist next pkg_id to {}: {source}\n\
         \n\
         The enriched document was written; the next run will reuse ids\n\
         unless the sequence is set manually: msgenrich sequence set <value>",
        path.display()
    )]
    SequencePersist {
        /// Sequence file path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// I/O operation failed while reading or writing data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EnrichError>;

/// Human-readable type name of a JSON value
pub fn type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Comma-separated key list for error messages
pub fn join_keys(map: &serde_json::Map<String, serde_json::Value>) -> String {
    if map.is_empty() {
        return "<none>".to_string();
    }
    map.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}
