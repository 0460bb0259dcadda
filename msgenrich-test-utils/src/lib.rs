//! msgenrich Test Utilities
//!
//! Builders and generators for wrapped transaction message documents shared by
//! the msgenrich crates' tests and benches.

use serde_json::{Map, Value};

/// Builder for a single JSON object with common field patterns
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    fields: Map<String, Value>,
}

impl RecordBuilder {
    /// Create a new record builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field with a string value
    pub fn string(mut self, key: &str, value: &str) -> Self {
        self.fields
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// Add a field with an integer value
    pub fn int(mut self, key: &str, value: i64) -> Self {
        self.fields.insert(key.to_string(), Value::from(value));
        self
    }

    /// Add a field with a boolean value
    pub fn bool(mut self, key: &str, value: bool) -> Self {
        self.fields.insert(key.to_string(), Value::Bool(value));
        self
    }

    /// Add a field with a null value
    pub fn null(mut self, key: &str) -> Self {
        self.fields.insert(key.to_string(), Value::Null);
        self
    }

    /// Add a field with an arbitrary value
    pub fn value(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Add a field holding another record
    pub fn object(self, key: &str, record: RecordBuilder) -> Self {
        self.value(key, record.build())
    }

    /// Add a field with an array value
    pub fn array(self, key: &str, items: Vec<Value>) -> Self {
        self.value(key, Value::Array(items))
    }

    /// Build the record
    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }

    /// Build the record as a bare map
    pub fn build_map(self) -> Map<String, Value> {
        self.fields
    }
}

/// Builder for one wrapped transaction message
///
/// Produces `{"<wrapper>": {"<prefix>Transaction": {"<prefix>TransactionId": ...}, ...}}`.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    wrapper: String,
    prefix: String,
    transaction_id: Option<Value>,
    source_file: Option<String>,
    pkg_id: Option<Value>,
    with_container: bool,
    transaction_fields: RecordBuilder,
    body_fields: RecordBuilder,
}

impl MessageBuilder {
    /// Message wrapped under `wrapper` with a `Policy`-prefixed transaction
    pub fn new(wrapper: &str) -> Self {
        Self {
            wrapper: wrapper.to_string(),
            prefix: "Policy".to_string(),
            transaction_id: None,
            source_file: None,
            pkg_id: None,
            with_container: true,
            transaction_fields: RecordBuilder::new(),
            body_fields: RecordBuilder::new(),
        }
    }

    /// Prefix of the transaction container and id field names
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Transaction id value
    pub fn transaction_id(mut self, id: impl Into<Value>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    /// Set `ingestSourceFileName` on the record body
    pub fn source_file(mut self, name: &str) -> Self {
        self.source_file = Some(name.to_string());
        self
    }

    /// Pre-existing `pkg_id` on the record body
    pub fn pkg_id(mut self, id: impl Into<Value>) -> Self {
        self.pkg_id = Some(id.into());
        self
    }

    /// Leave out the transaction container entirely
    pub fn without_transaction(mut self) -> Self {
        self.with_container = false;
        self
    }

    /// Extra field inside the transaction container
    pub fn transaction_field(mut self, key: &str, value: Value) -> Self {
        self.transaction_fields = self.transaction_fields.value(key, value);
        self
    }

    /// Extra field on the record body
    pub fn body_field(mut self, key: &str, value: Value) -> Self {
        self.body_fields = self.body_fields.value(key, value);
        self
    }

    /// Name of the transaction container field
    pub fn container_key(&self) -> String {
        format!("{}Transaction", self.prefix)
    }

    /// Name of the transaction id field
    pub fn id_key(&self) -> String {
        format!("{}TransactionId", self.prefix)
    }

    /// Build the wrapped message
    pub fn build(self) -> Value {
        let container_key = self.container_key();
        let id_key = self.id_key();

        let mut body = self.body_fields.build_map();
        if self.with_container {
            let mut container = self.transaction_fields.build_map();
            if let Some(id) = self.transaction_id {
                container.insert(id_key, id);
            }
            body.insert(container_key, Value::Object(container));
        }
        if let Some(name) = self.source_file {
            body.insert("ingestSourceFileName".to_string(), Value::String(name));
        }
        if let Some(pkg_id) = self.pkg_id {
            body.insert("pkg_id".to_string(), pkg_id);
        }

        let mut wrapped = Map::new();
        wrapped.insert(self.wrapper, Value::Object(body));
        Value::Object(wrapped)
    }
}

/// Builder for a whole message document
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    fields: Map<String, Value>,
}

impl DocumentBuilder {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message array under `key`
    pub fn messages(mut self, key: &str, messages: Vec<MessageBuilder>) -> Self {
        let items = messages.into_iter().map(MessageBuilder::build).collect();
        self.fields.insert(key.to_string(), Value::Array(items));
        self
    }

    /// Add a non-array top-level field
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Build the document
    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Generate test documents with various patterns
pub struct TestDataGenerator;

impl TestDataGenerator {
    /// The two-record document used throughout the docs
    pub fn policy_document() -> Value {
        DocumentBuilder::new()
            .messages(
                "PolicyMessages",
                vec![
                    MessageBuilder::new("PolicyMessage")
                        .transaction_id("T1")
                        .source_file("a.xml"),
                    MessageBuilder::new("PolicyMessage")
                        .transaction_id("T2")
                        .source_file("b.xml"),
                ],
            )
            .build()
    }

    /// Document whose transactions carry deeply nested data
    ///
    /// Each record's transaction holds `depth` levels of objects, with an array
    /// of two objects at every level.
    pub fn deeply_nested_document(depth: usize) -> Value {
        let mut nested = RecordBuilder::new().string("leaf", "value").build();
        for level in 0..depth {
            nested = RecordBuilder::new()
                .int("level", level as i64)
                .value("child", nested)
                .array(
                    "items",
                    vec![
                        RecordBuilder::new().int("n", 0).build(),
                        RecordBuilder::new().int("n", 1).build(),
                    ],
                )
                .build();
        }

        DocumentBuilder::new()
            .messages(
                "Msgs",
                vec![MessageBuilder::new("Wrapper")
                    .transaction_id("deep")
                    .source_file("deep.xml")
                    .transaction_field("Detail", nested)],
            )
            .build()
    }

    /// Document with `arrays` message arrays of `per_array` records each
    pub fn large_document(arrays: usize, per_array: usize) -> Value {
        let mut document = DocumentBuilder::new();
        for a in 0..arrays {
            let messages = (0..per_array)
                .map(|i| {
                    MessageBuilder::new(&format!("Wrapper{a}"))
                        .prefix(if i % 2 == 0 { "Policy" } else { "Claim" })
                        .transaction_id(format!("T{a}-{i}"))
                        .source_file(&format!("batch_{}.xml", i % 10))
                        .transaction_field(
                            "Party",
                            RecordBuilder::new()
                                .string("name", &format!("party_{i}"))
                                .int("seq", i as i64)
                                .build(),
                        )
                        .transaction_field(
                            "Lines",
                            Value::Array(
                                (0..3)
                                    .map(|n| RecordBuilder::new().int("line", n).build())
                                    .collect(),
                            ),
                        )
                })
                .collect();
            document = document.messages(&format!("Messages{a}"), messages);
        }
        document.build()
    }
}

/// Utility functions for test assertions
pub mod assertions {
    use serde_json::Value;

    /// Assert that two JSON values are semantically equal (ignoring formatting)
    pub fn assert_json_equal(actual: &Value, expected: &Value, context: &str) {
        if actual != expected {
            panic!(
                "JSON assertion failed in {}:\nExpected: {}\nActual: {}",
                context,
                serde_json::to_string_pretty(expected).unwrap_or_default(),
                serde_json::to_string_pretty(actual).unwrap_or_default()
            );
        }
    }

    /// `pkg_id` of every record in document order
    ///
    /// Arrays are visited in key order, records in array order. Records without
    /// a `pkg_id` contribute `Value::Null`.
    pub fn collect_pkg_ids(document: &Value) -> Vec<Value> {
        let Some(root) = document.as_object() else {
            return Vec::new();
        };
        root.values()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|element| element.as_object()?.values().next())
            .map(|body| body.get("pkg_id").cloned().unwrap_or(Value::Null))
            .collect()
    }
}
