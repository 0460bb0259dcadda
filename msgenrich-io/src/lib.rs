//! msgenrich I/O - Sequence persistence and high-level enrichment runs
//!
//! This crate provides the stateful layer on top of `msgenrich-format`:
//!
//! - The durable pkg_id sequence store
//! - The document enricher
//! - A request/summary API that reads, enriches and writes in one call

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod enricher;
mod publish;
pub mod sequence;

// Re-export commonly used types
pub use enricher::{DocumentEnricher, EnrichMetrics, Enriched};
pub use msgenrich_format::{EnrichError, EnrichOptions, MissingTransactionBehavior, Result};
pub use sequence::{PkgIdSequence, SequenceLoad, SequenceOrigin, SequenceStore};

use publish::publish_file;
use serde::Deserialize;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Where the input document comes from
pub enum InputSource {
    /// JSON file on disk
    Path(PathBuf),
    /// Arbitrary reader yielding a JSON document
    Reader(Box<dyn Read>),
}

/// Where the enriched document goes
pub enum OutputSink {
    /// File on disk, replaced only once fully written
    Path(PathBuf),
    /// Arbitrary writer
    Writer(Box<dyn Write>),
}

/// Where the first pkg_id comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSource {
    /// Side file read before the run and overwritten after it
    File(PathBuf),
    /// Fixed starting id; nothing is persisted
    Fixed(u64),
}

/// Serialization style of the enriched document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// No whitespace between tokens
    #[default]
    Compact,
    /// Two-space indented
    Pretty,
}

/// Everything needed for one enrichment run
pub struct EnrichRequest {
    /// Input document
    pub input: InputSource,
    /// Output destination
    pub output: OutputSink,
    /// Sequence state
    pub sequence: SequenceSource,
    /// Field names and matching rules
    pub options: EnrichOptions,
    /// Output serialization style
    pub format: OutputFormat,
}

/// Timing figures for a run
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichRuntimeStats {
    /// Elapsed time from request start to sequence persisted
    pub wall_time: Duration,
    /// Portion of `wall_time` spent enriching the parsed document
    pub enrich_time: Duration,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct EnrichSummary {
    /// Enrichment counters
    pub metrics: EnrichMetrics,
    /// Origin of the starting pkg_id (`None` for a fixed start)
    pub sequence_origin: Option<SequenceOrigin>,
    /// Bytes read from the input
    pub input_bytes: u64,
    /// Bytes written to the output
    pub output_bytes: u64,
    /// Timing figures
    pub runtime: EnrichRuntimeStats,
}

/// Read, enrich and write a document, then persist the next pkg_id
///
/// Nothing is written when reading, parsing or enrichment fails. The sequence
/// file is only updated after the output has been written in full.
pub fn execute_enrich(request: EnrichRequest) -> Result<EnrichSummary> {
    let started = Instant::now();
    let enricher = DocumentEnricher::new(request.options)?;

    let (document, input_bytes) = read_document(request.input)?;

    let (sequence, store, sequence_origin) = match request.sequence {
        SequenceSource::File(path) => {
            let store = SequenceStore::with_field(path, &enricher.options().pkg_id_field);
            let load = store.load();
            (
                PkgIdSequence::starting_at(load.value),
                Some(store),
                Some(load.origin),
            )
        }
        SequenceSource::Fixed(start) => (PkgIdSequence::starting_at(start), None, None),
    };

    let enrich_started = Instant::now();
    let enriched = enricher.enrich(document, sequence)?;
    let enrich_time = enrich_started.elapsed();
    let output_bytes = write_document(request.output, &enriched.document, request.format)?;

    if let Some(store) = &store {
        store.persist(enriched.sequence.peek())?;
    }

    let runtime = EnrichRuntimeStats {
        wall_time: started.elapsed(),
        enrich_time,
    };
    let metrics = enriched.metrics;
    tracing::info!(
        arrays = metrics.arrays_processed,
        records = metrics.records_enriched,
        skipped = metrics.records_skipped,
        first_pkg_id = metrics.first_pkg_id,
        next_pkg_id = metrics.next_pkg_id,
        input_bytes,
        output_bytes,
        elapsed_ms = runtime.wall_time.as_millis() as u64,
        enrich_ms = runtime.enrich_time.as_millis() as u64,
        "enrichment complete"
    );

    Ok(EnrichSummary {
        metrics,
        sequence_origin,
        input_bytes,
        output_bytes,
        runtime,
    })
}

fn read_document(input: InputSource) -> Result<(Value, u64)> {
    let (bytes, context) = match input {
        InputSource::Path(path) => match std::fs::read(&path) {
            Ok(bytes) => (bytes, path.display().to_string()),
            Err(source) => return Err(EnrichError::InputRead { path, source }),
        },
        InputSource::Reader(mut reader) => {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            (buf, "input stream".to_string())
        }
    };

    let document =
        parse_document(&bytes).map_err(|source| EnrichError::InputParse { context, source })?;
    Ok((document, bytes.len() as u64))
}

/// Parse a whole document with no nesting limit
///
/// The recursion limit is lifted and the parser runs on a stack that grows on
/// demand, so depth is bounded by memory rather than the thread stack.
fn parse_document(bytes: &[u8]) -> serde_json::Result<Value> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    deserializer.disable_recursion_limit();
    let document = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(document)
}

fn write_document(output: OutputSink, document: &Value, format: OutputFormat) -> Result<u64> {
    match output {
        OutputSink::Path(path) => publish_file(&path, |out| {
            serialize(&mut *out, document, format)?;
            Ok(())
        })
        .map_err(|source| EnrichError::OutputWrite { path, source }),
        OutputSink::Writer(mut writer) => {
            let mut buf = Vec::new();
            serialize(&mut buf, document, format)?;
            writer.write_all(&buf)?;
            writer.flush()?;
            Ok(buf.len() as u64)
        }
    }
}

fn serialize<W: Write>(out: W, document: &Value, format: OutputFormat) -> serde_json::Result<()> {
    match format {
        OutputFormat::Compact => serde_json::to_writer(out, document),
        OutputFormat::Pretty => serde_json::to_writer_pretty(out, document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// Writer that keeps its bytes reachable after being boxed
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn request(input: &Value, sink: SharedBuf, start: u64) -> EnrichRequest {
        EnrichRequest {
            input: InputSource::Reader(Box::new(Cursor::new(serde_json::to_vec(input).unwrap()))),
            output: OutputSink::Writer(Box::new(sink)),
            sequence: SequenceSource::Fixed(start),
            options: EnrichOptions::default(),
            format: OutputFormat::Compact,
        }
    }

    #[test]
    fn reader_to_writer_run_is_compact() {
        let input = json!({"Msgs": [{"W": {"ATransaction": {"ATransactionId": "x"}}}]});
        let sink = SharedBuf::default();
        let summary = execute_enrich(request(&input, sink.clone(), 5)).unwrap();

        let bytes = sink.0.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains(' '));
        assert!(!text.contains('\n'));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["Msgs"][0]["W"]["pkg_id"], 5);
        assert_eq!(summary.output_bytes, text.len() as u64);
        assert!(summary.sequence_origin.is_none());
        assert_eq!(summary.metrics.next_pkg_id, 6);
    }

    #[test]
    fn parse_errors_name_the_input() {
        let req = EnrichRequest {
            input: InputSource::Reader(Box::new(Cursor::new(b"{not json".to_vec()))),
            output: OutputSink::Writer(Box::new(SharedBuf::default())),
            sequence: SequenceSource::Fixed(1),
            options: EnrichOptions::default(),
            format: OutputFormat::Pretty,
        };
        let err = execute_enrich(req).unwrap_err();
        assert!(matches!(err, EnrichError::InputParse { ref context, .. } if context == "input stream"));
    }

    #[test]
    fn failed_enrichment_writes_nothing() {
        let input = json!({"Msgs": [{"W": {"NoTx": {}}}]});
        let sink = SharedBuf::default();
        let err = execute_enrich(request(&input, sink.clone(), 1)).unwrap_err();
        assert!(matches!(err, EnrichError::MissingTransactionContainer { .. }));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn parse_document_has_no_depth_limit() {
        let depth = 2_000;
        let text = format!("{}1{}", "[".repeat(depth), "]".repeat(depth));
        let mut value = parse_document(text.as_bytes()).unwrap();
        for _ in 0..depth {
            value = match value {
                Value::Array(mut items) => items.pop().unwrap(),
                other => panic!("expected array, found {other}"),
            };
        }
        assert_eq!(value, 1);
    }

    #[test]
    fn parse_document_rejects_trailing_data() {
        assert!(parse_document(b"{} {}").is_err());
        assert!(parse_document(b"{}\n").is_ok());
    }
}
