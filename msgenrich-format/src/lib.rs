//! msgenrich format - Core rules for transaction message enrichment
//!
//! This crate holds the I/O-free parts of the enrichment engine:
//!
//! - Field name constants and defaults
//! - Enrichment options
//! - Error types
//! - Transaction discovery by field-name suffix
//! - Recursive key propagation through JSON trees

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod annotate;
pub mod constants;
pub mod error;
pub mod locate;
pub mod options;

// Re-export commonly used types
pub use annotate::{annotate, annotate_map, insert_if_absent, AnnotateStats};
pub use error::{EnrichError, Result};
pub use locate::{find_by_suffix, SuffixMatch, TransactionLocator};
pub use options::{EnrichOptions, MissingTransactionBehavior};
