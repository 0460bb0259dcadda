//! Durable package id sequence
//!
//! The next pkg_id to hand out lives in a small side file (`{"pkg_id": 42}`)
//! that is read once before a run and overwritten once after it. Reading never
//! fails: a missing, unreadable or malformed file yields [`FIRST_PKG_ID`], and
//! the reason is reported through [`SequenceOrigin`].

use crate::publish::publish_file;
use msgenrich_format::constants::{FIRST_PKG_ID, PKG_ID_FIELD};
use msgenrich_format::{EnrichError, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Next package id to assign, carried through a run by value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PkgIdSequence {
    next: u64,
}

impl Default for PkgIdSequence {
    fn default() -> Self {
        Self::starting_at(FIRST_PKG_ID)
    }
}

impl PkgIdSequence {
    /// Sequence whose first assigned id is `next`
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// Id that the next call to [`assign`](Self::assign) returns
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Hand out the current id and advance by one
    pub fn assign(&mut self) -> Result<u64> {
        let current = self.next;
        self.next = current
            .checked_add(1)
            .ok_or(EnrichError::SequenceExhausted { last: current })?;
        Ok(current)
    }
}

/// Why a loaded sequence value was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOrigin {
    /// Value read from the side file
    Stored,
    /// No side file yet
    Absent,
    /// Side file exists but could not be read
    Unreadable(String),
    /// Side file was read but holds no usable integer
    Malformed(String),
}

impl fmt::Display for SequenceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceOrigin::Stored => write!(f, "stored"),
            SequenceOrigin::Absent => write!(f, "absent (default)"),
            SequenceOrigin::Unreadable(reason) => write!(f, "unreadable (default): {reason}"),
            SequenceOrigin::Malformed(reason) => write!(f, "malformed (default): {reason}"),
        }
    }
}

/// Result of reading the side file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceLoad {
    /// Next pkg_id to assign
    pub value: u64,
    /// Where `value` came from
    pub origin: SequenceOrigin,
}

impl SequenceLoad {
    fn fallback(origin: SequenceOrigin) -> Self {
        Self {
            value: FIRST_PKG_ID,
            origin,
        }
    }
}

/// Side file holding the next pkg_id between runs
#[derive(Debug, Clone)]
pub struct SequenceStore {
    path: PathBuf,
    field: String,
}

impl SequenceStore {
    /// Store at `path` using the default `pkg_id` key
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_field(path, PKG_ID_FIELD)
    }

    /// Store at `path` keeping the value under `field`
    pub fn with_field(path: impl Into<PathBuf>, field: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            field: field.into(),
        }
    }

    /// Location of the side file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next pkg_id, or 1 when no usable state exists
    pub fn next(&self) -> u64 {
        self.load().value
    }

    /// Read the side file, reporting why the default was used if it was
    pub fn load(&self) -> SequenceLoad {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), start = FIRST_PKG_ID, "no sequence file");
                return SequenceLoad::fallback(SequenceOrigin::Absent);
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, start = FIRST_PKG_ID, "sequence file unreadable");
                return SequenceLoad::fallback(SequenceOrigin::Unreadable(err.to_string()));
            }
        };

        match parse_sequence(&text, &self.field) {
            Ok(value) => {
                tracing::debug!(path = %self.path.display(), value, "loaded sequence");
                SequenceLoad {
                    value,
                    origin: SequenceOrigin::Stored,
                }
            }
            Err(reason) => {
                tracing::warn!(path = %self.path.display(), %reason, start = FIRST_PKG_ID, "sequence file malformed");
                SequenceLoad::fallback(SequenceOrigin::Malformed(reason))
            }
        }
    }

    /// Replace the side file contents with `value`
    pub fn persist(&self, value: u64) -> Result<()> {
        let mut state = Map::new();
        state.insert(self.field.clone(), Value::from(value));
        let body = serde_json::to_vec_pretty(&Value::Object(state))?;

        publish_file(&self.path, |out| out.write_all(&body)).map_err(|source| {
            EnrichError::SequencePersist {
                path: self.path.clone(),
                source,
            }
        })?;

        tracing::debug!(path = %self.path.display(), value, "persisted sequence");
        Ok(())
    }
}

fn parse_sequence(text: &str, field: &str) -> std::result::Result<u64, String> {
    let document: Value =
        serde_json::from_str(text).map_err(|err| format!("invalid JSON: {err}"))?;
    let state = document
        .as_object()
        .ok_or_else(|| "root is not an object".to_string())?;
    let value = state
        .get(field)
        .ok_or_else(|| format!("missing '{field}' field"))?;

    match value {
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| format!("'{field}' is not a non-negative integer: {number}")),
        Value::String(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("'{field}' is not an integer: {raw:?}")),
        other => Err(format!(
            "'{field}' has type {}",
            msgenrich_format::error::type_name(other)
        )),
    }
}
