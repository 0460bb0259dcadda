//! Transaction discovery by field-name suffix
//!
//! Message schemas name their transaction element and its id field
//! differently (`PolicyTransaction` / `PolicyStatusTransaction`,
//! `ns0107_TransactionId` / `ns0478_TransactionID`), so both are found by a
//! case-insensitive suffix match over the keys of a mapping.
//!
//! When several keys match, candidates are sorted by byte order and the first
//! one wins. The result still reports the ambiguity so callers can surface it.

use crate::options::EnrichOptions;
use serde_json::{Map, Value};

/// Outcome of a successful suffix lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuffixMatch<'a> {
    /// Exactly one key matched
    Unique(&'a str),
    /// Several keys matched; `chosen` is the first of the sorted `candidates`
    Ambiguous {
        /// Key selected by the tie-break
        chosen: &'a str,
        /// All matching keys in sorted order
        candidates: Vec<&'a str>,
    },
}

impl<'a> SuffixMatch<'a> {
    /// Key selected by the lookup
    pub fn key(&self) -> &'a str {
        match self {
            SuffixMatch::Unique(key) => *key,
            SuffixMatch::Ambiguous { chosen, .. } => *chosen,
        }
    }

    /// Whether more than one key matched
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, SuffixMatch::Ambiguous { .. })
    }
}

/// Find the key of `map` ending with `suffix`, ignoring case
///
/// `suffix` is compared in lower case; callers may pass it in any case.
pub fn find_by_suffix<'a>(map: &'a Map<String, Value>, suffix: &str) -> Option<SuffixMatch<'a>> {
    let suffix = suffix.to_lowercase();
    let mut candidates: Vec<&'a str> = map
        .keys()
        .filter(|key| key.to_lowercase().ends_with(&suffix))
        .map(String::as_str)
        .collect();

    match candidates.len() {
        0 => None,
        1 => Some(SuffixMatch::Unique(candidates[0])),
        _ => {
            candidates.sort_unstable();
            Some(SuffixMatch::Ambiguous {
                chosen: candidates[0],
                candidates,
            })
        }
    }
}

/// Locates the transaction container of a record body and the id inside it
#[derive(Debug, Clone)]
pub struct TransactionLocator {
    container_suffix: String,
    id_suffix: String,
}

impl Default for TransactionLocator {
    fn default() -> Self {
        Self::from_options(&EnrichOptions::default())
    }
}

impl TransactionLocator {
    /// Create a locator with explicit suffixes
    pub fn new(container_suffix: impl Into<String>, id_suffix: impl Into<String>) -> Self {
        Self {
            container_suffix: container_suffix.into().to_lowercase(),
            id_suffix: id_suffix.into().to_lowercase(),
        }
    }

    /// Create a locator using the suffixes configured in `opts`
    pub fn from_options(opts: &EnrichOptions) -> Self {
        Self::new(&opts.transaction_suffix, &opts.transaction_id_suffix)
    }

    /// Suffix matched against record body keys
    pub fn container_suffix(&self) -> &str {
        &self.container_suffix
    }

    /// Suffix matched against container keys
    pub fn id_suffix(&self) -> &str {
        &self.id_suffix
    }

    /// Name of the record body field holding the transaction
    pub fn find_transaction_container<'a>(
        &self,
        body: &'a Map<String, Value>,
    ) -> Option<SuffixMatch<'a>> {
        find_by_suffix(body, &self.container_suffix)
    }

    /// Transaction id field name and value inside `container`
    pub fn find_transaction_id<'a>(
        &self,
        container: &'a Map<String, Value>,
    ) -> Option<(SuffixMatch<'a>, &'a Value)> {
        let found = find_by_suffix(container, &self.id_suffix)?;
        let value = container.get(found.key())?;
        Some((found, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().expect("object").clone()
    }

    #[test]
    fn finds_container_ignoring_case() {
        let body = obj(json!({
            "PolicyStatusTRANSACTION": {},
            "ingestSourceFileName": "a.xml"
        }));
        let locator = TransactionLocator::default();
        let found = locator.find_transaction_container(&body).unwrap();
        assert_eq!(found, SuffixMatch::Unique("PolicyStatusTRANSACTION"));
    }

    #[test]
    fn container_requires_suffix_not_substring() {
        let body = obj(json!({"TransactionDetails": {}, "Other": 1}));
        let locator = TransactionLocator::default();
        assert!(locator.find_transaction_container(&body).is_none());
    }

    #[test]
    fn transaction_id_field_does_not_match_container_suffix() {
        let body = obj(json!({"ns1_TransactionId": "abc"}));
        let locator = TransactionLocator::default();
        assert!(locator.find_transaction_container(&body).is_none());
    }

    #[test]
    fn finds_transaction_id_with_value() {
        let container = obj(json!({
            "ns0478_TransactionID": "aa342cfe",
            "Amount": 10
        }));
        let locator = TransactionLocator::default();
        let (field, value) = locator.find_transaction_id(&container).unwrap();
        assert_eq!(field.key(), "ns0478_TransactionID");
        assert!(!field.is_ambiguous());
        assert_eq!(value, &json!("aa342cfe"));
    }

    #[test]
    fn ambiguous_matches_pick_smallest_key() {
        let body = obj(json!({
            "ZetaTransaction": {},
            "AlphaTransaction": {},
            "MidTransaction": {}
        }));
        let found = find_by_suffix(&body, "TRANSACTION").unwrap();
        assert!(found.is_ambiguous());
        assert_eq!(found.key(), "AlphaTransaction");
        match found {
            SuffixMatch::Ambiguous { candidates, .. } => assert_eq!(
                candidates,
                vec!["AlphaTransaction", "MidTransaction", "ZetaTransaction"]
            ),
            SuffixMatch::Unique(_) => panic!("expected ambiguity"),
        }
    }

    #[test]
    fn custom_suffixes_are_honoured() {
        let locator = TransactionLocator::new("Envelope", "Ref");
        let body = obj(json!({"OrderEnvelope": {"orderRef": 7}}));
        let container = locator.find_transaction_container(&body).unwrap();
        assert_eq!(container.key(), "OrderEnvelope");
        let inner = body[container.key()].as_object().unwrap();
        let (field, value) = locator.find_transaction_id(inner).unwrap();
        assert_eq!(field.key(), "orderRef");
        assert_eq!(value, &json!(7));
    }

    #[test]
    fn empty_map_matches_nothing() {
        let locator = TransactionLocator::default();
        assert!(locator.find_transaction_container(&Map::new()).is_none());
        assert!(locator.find_transaction_id(&Map::new()).is_none());
    }
}
