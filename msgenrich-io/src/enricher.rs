//! Document enrichment
//!
//! Walks every message array of a document and, for each wrapped record:
//!
//! 1. stamps the next pkg_id on the record body root,
//! 2. finds the transaction container and its id field by suffix,
//! 3. propagates the transaction id through the whole body,
//! 4. propagates the body's source file name through the whole body.
//!
//! Top-level entries that are not non-empty arrays pass through untouched.

use crate::sequence::PkgIdSequence;
use msgenrich_format::error::{join_keys, type_name};
use msgenrich_format::{
    annotate_map, insert_if_absent, EnrichError, EnrichOptions, MissingTransactionBehavior,
    Result, SuffixMatch, TransactionLocator,
};
use serde_json::{Map, Value};

/// Counters collected over one enrichment pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichMetrics {
    /// Message arrays that were enriched
    pub arrays_processed: usize,
    /// Records that received a pkg_id
    pub records_enriched: usize,
    /// Records enriched without transaction id propagation
    pub records_skipped: usize,
    /// Records that already carried a pkg_id, which was kept
    pub pkg_ids_preserved: usize,
    /// Keys written into mapping nodes, pkg_id included
    pub keys_inserted: usize,
    /// Suffix lookups that matched more than one field
    pub ambiguous_matches: usize,
    /// First pkg_id handed out in this pass
    pub first_pkg_id: u64,
    /// Next pkg_id after this pass
    pub next_pkg_id: u64,
}

/// Output of a successful enrichment pass
#[derive(Debug, Clone)]
pub struct Enriched {
    /// Document with every message array enriched
    pub document: Value,
    /// Sequence positioned after the last assigned pkg_id
    pub sequence: PkgIdSequence,
    /// Pass counters
    pub metrics: EnrichMetrics,
}

/// Applies pkg_id, transaction id and source file propagation to documents
#[derive(Debug, Clone)]
pub struct DocumentEnricher {
    options: EnrichOptions,
    locator: TransactionLocator,
}

/// Position of a record, for errors and logs
struct RecordAt<'a> {
    array: &'a str,
    index: usize,
}

impl DocumentEnricher {
    /// Create an enricher, rejecting unusable options
    pub fn new(options: EnrichOptions) -> Result<Self> {
        options.validate()?;
        let locator = TransactionLocator::from_options(&options);
        Ok(Self { options, locator })
    }

    /// Options in effect
    pub fn options(&self) -> &EnrichOptions {
        &self.options
    }

    /// Enrich `document`, assigning pkg_ids from `sequence`
    ///
    /// All-or-nothing: on error the partially enriched document is dropped and
    /// the caller's sequence value is still the one it passed in.
    pub fn enrich(&self, mut document: Value, sequence: PkgIdSequence) -> Result<Enriched> {
        let mut sequence = sequence;
        let mut metrics = EnrichMetrics {
            first_pkg_id: sequence.peek(),
            ..EnrichMetrics::default()
        };

        let root = match &mut document {
            Value::Object(root) => root,
            other => {
                return Err(EnrichError::DocumentNotObject {
                    found_type: type_name(other).to_string(),
                })
            }
        };

        for (array, value) in root.iter_mut() {
            let records = match value {
                Value::Array(records) if !records.is_empty() => records,
                _ => continue,
            };

            let wrapper_key = wrapper_key(array, records)?;
            for (index, record) in records.iter_mut().enumerate() {
                let at = RecordAt { array, index };
                let body = record_body(&at, &wrapper_key, record)?;
                self.enrich_record(&at, body, &mut sequence, &mut metrics)?;
            }

            metrics.arrays_processed += 1;
            tracing::debug!(
                array = %array,
                wrapper_key = %wrapper_key,
                records = records.len(),
                "message array enriched"
            );
        }

        metrics.next_pkg_id = sequence.peek();
        Ok(Enriched {
            document,
            sequence,
            metrics,
        })
    }

    fn enrich_record(
        &self,
        at: &RecordAt<'_>,
        body: &mut Map<String, Value>,
        sequence: &mut PkgIdSequence,
        metrics: &mut EnrichMetrics,
    ) -> Result<()> {
        let pkg_id = sequence.assign()?;
        if insert_if_absent(body, &self.options.pkg_id_field, &Value::from(pkg_id)) {
            metrics.keys_inserted += 1;
        } else {
            metrics.pkg_ids_preserved += 1;
            tracing::debug!(
                array = %at.array,
                index = at.index,
                pkg_id,
                "record already has a pkg_id, keeping it"
            );
        }

        let source_file = body
            .get(&self.options.source_file_field)
            .cloned()
            .unwrap_or(Value::Null);

        match self.transaction_ref(at, body, metrics)? {
            Some((field, transaction_id)) => {
                let stats = annotate_map(body, &field, &transaction_id);
                metrics.keys_inserted += stats.inserted;
            }
            None => metrics.records_skipped += 1,
        }

        let stats = annotate_map(body, &self.options.source_file_field, &source_file);
        metrics.keys_inserted += stats.inserted;
        metrics.records_enriched += 1;
        Ok(())
    }

    /// Transaction id field and value of a record body
    ///
    /// `Ok(None)` only when records without a transaction are being skipped.
    fn transaction_ref(
        &self,
        at: &RecordAt<'_>,
        body: &Map<String, Value>,
        metrics: &mut EnrichMetrics,
    ) -> Result<Option<(String, Value)>> {
        let container = match self.locator.find_transaction_container(body) {
            Some(found) => {
                note_ambiguity(at, &found, "transaction container", metrics);
                found.key()
            }
            None => {
                return self.missing(
                    at,
                    EnrichError::MissingTransactionContainer {
                        array: at.array.to_string(),
                        index: at.index,
                        suffix: self.locator.container_suffix().to_string(),
                        available_keys: join_keys(body),
                    },
                )
            }
        };

        let found = match body.get(container) {
            Some(Value::Object(inner)) => self
                .locator
                .find_transaction_id(inner)
                .ok_or_else(|| join_keys(inner)),
            Some(other) => Err(format!("<{} is not an object>", type_name(other))),
            None => Err("<none>".to_string()),
        };

        match found {
            Ok((field, value)) => {
                note_ambiguity(at, &field, "transaction id", metrics);
                Ok(Some((field.key().to_string(), value.clone())))
            }
            Err(available_keys) => self.missing(
                at,
                EnrichError::MissingTransactionId {
                    array: at.array.to_string(),
                    index: at.index,
                    container: container.to_string(),
                    suffix: self.locator.id_suffix().to_string(),
                    available_keys,
                },
            ),
        }
    }

    fn missing<T>(&self, at: &RecordAt<'_>, err: EnrichError) -> Result<Option<T>> {
        match self.options.missing_transaction {
            MissingTransactionBehavior::Error => Err(err),
            MissingTransactionBehavior::Skip => {
                let reason = match err {
                    EnrichError::MissingTransactionContainer { .. } => "no transaction container",
                    _ => "no transaction id",
                };
                tracing::warn!(
                    array = %at.array,
                    index = at.index,
                    reason,
                    "skipping transaction id propagation"
                );
                Ok(None)
            }
        }
    }
}

fn note_ambiguity(
    at: &RecordAt<'_>,
    found: &SuffixMatch<'_>,
    what: &str,
    metrics: &mut EnrichMetrics,
) {
    if let SuffixMatch::Ambiguous { chosen, candidates } = found {
        metrics.ambiguous_matches += 1;
        tracing::warn!(
            array = %at.array,
            index = at.index,
            chosen = %chosen,
            candidates = %candidates.join(", "),
            "several fields match the {what} suffix"
        );
    }
}

/// Wrapper key shared by every record of a message array
fn wrapper_key(array: &str, records: &[Value]) -> Result<String> {
    let malformed = |reason: String| EnrichError::MalformedMessageArray {
        array: array.to_string(),
        index: 0,
        reason,
    };

    match records.first() {
        Some(Value::Object(first)) if first.len() == 1 => first
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| malformed("record has no wrapper key".to_string())),
        Some(Value::Object(first)) if first.is_empty() => {
            Err(malformed("record has no wrapper key".to_string()))
        }
        Some(Value::Object(first)) => Err(malformed(format!(
            "record has {} keys ({}), expected exactly one wrapper key",
            first.len(),
            join_keys(first)
        ))),
        Some(other) => Err(malformed(format!(
            "expected object, found {}",
            type_name(other)
        ))),
        None => Err(malformed("array is empty".to_string())),
    }
}

/// Mutable body of a wrapped record
fn record_body<'r>(
    at: &RecordAt<'_>,
    wrapper_key: &str,
    record: &'r mut Value,
) -> Result<&'r mut Map<String, Value>> {
    let malformed = |reason: String| EnrichError::MalformedMessageArray {
        array: at.array.to_string(),
        index: at.index,
        reason,
    };

    let wrapper = match record {
        Value::Object(wrapper) => wrapper,
        other => {
            return Err(malformed(format!(
                "expected object, found {}",
                type_name(other)
            )))
        }
    };

    if !wrapper.contains_key(wrapper_key) {
        return Err(malformed(format!(
            "missing wrapper key '{wrapper_key}' (found: {})",
            join_keys(wrapper)
        )));
    }

    match wrapper.get_mut(wrapper_key) {
        Some(Value::Object(body)) => Ok(body),
        Some(other) => Err(EnrichError::RecordBodyNotObject {
            array: at.array.to_string(),
            index: at.index,
            wrapper_key: wrapper_key.to_string(),
            found_type: type_name(other).to_string(),
        }),
        None => Err(malformed(format!("missing wrapper key '{wrapper_key}'"))),
    }
}
