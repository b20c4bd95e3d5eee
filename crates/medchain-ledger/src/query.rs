//! # Block Queries
//!
//! Point and multi-value lookups into block payloads. All matching is exact
//! equality or set membership; there is no partial or fuzzy matching.
//! Backends return matches in ascending index order.

use medchain_core::{Block, Timestamp};
use serde::{Deserialize, Serialize};

/// Combined record search. Dimensions are ANDed; labels and tags each match
/// if the block carries *any* of the given values. An absent (or empty)
/// dimension imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Exact subject (patient) identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    /// Match blocks carrying at least one of these labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Match blocks carrying at least one of these tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Exact `metadata.recordType`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    /// Inclusive lower bound on the block timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<Timestamp>,
    /// Inclusive upper bound on the block timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<Timestamp>,
}

impl SearchFilters {
    /// No constraints: matches every block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain to one subject.
    pub fn subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Add an accepted label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Add an accepted tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Constrain to one record type.
    pub fn record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = Some(record_type.into());
        self
    }

    /// Inclusive lower time bound.
    pub fn from(mut self, ts: Timestamp) -> Self {
        self.date_from = Some(ts);
        self
    }

    /// Inclusive upper time bound.
    pub fn to(mut self, ts: Timestamp) -> Self {
        self.date_to = Some(ts);
        self
    }

    /// Whether `block` satisfies every provided dimension.
    pub fn matches(&self, block: &Block) -> bool {
        let p = &block.payload;
        if let Some(subject) = &self.subject_id {
            if p.subject_id.as_deref() != Some(subject.as_str()) {
                return false;
            }
        }
        if !self.labels.is_empty() && !self.labels.iter().any(|l| p.has_label(l)) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| p.has_tag(t)) {
            return false;
        }
        if let Some(record_type) = &self.record_type {
            if p.record_type() != Some(record_type.as_str()) {
                return false;
            }
        }
        if self.date_from.is_some_and(|from| block.timestamp < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| block.timestamp > to) {
            return false;
        }
        true
    }
}

/// A lookup the persistence contract must answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockQuery {
    /// `payload.objectId == id`.
    ObjectId(String),
    /// `payload.contentDigest == digest`.
    ContentDigest(String),
    /// `payload.subjectId == subject`.
    Subject(String),
    /// `label ∈ payload.labels`.
    Label(String),
    /// `tag ∈ payload.tags`.
    Tag(String),
    /// Combined filter.
    Search(SearchFilters),
}

impl BlockQuery {
    /// Whether `block` matches this query.
    pub fn matches(&self, block: &Block) -> bool {
        let p = &block.payload;
        match self {
            Self::ObjectId(id) => p.object_id == *id,
            Self::ContentDigest(digest) => p.content_digest == *digest,
            Self::Subject(subject) => p.subject_id.as_deref() == Some(subject.as_str()),
            Self::Label(label) => p.has_label(label),
            Self::Tag(tag) => p.has_tag(tag),
            Self::Search(filters) => filters.matches(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_core::PayloadDraft;

    fn block(ts: i64, draft: PayloadDraft) -> Block {
        let t = Timestamp::from_millis(ts);
        Block::seal(1, "0", t, draft.into_payload(t)).unwrap()
    }

    fn xray() -> Block {
        block(
            5_000,
            PayloadDraft::new("o1", "5000-chest.png", "d1")
                .with_subject("p1")
                .with_label("xray")
                .with_label("chest")
                .with_tag("urgent")
                .with_metadata("recordType", "imaging"),
        )
    }

    #[test]
    fn empty_filters_match_everything() {
        assert!(SearchFilters::new().matches(&xray()));
    }

    #[test]
    fn labels_are_ored_dimensions_are_anded() {
        let b = xray();
        assert!(SearchFilters::new().label("mri").label("chest").matches(&b));
        assert!(!SearchFilters::new().label("mri").matches(&b));
        assert!(SearchFilters::new().subject("p1").tag("urgent").matches(&b));
        assert!(!SearchFilters::new().subject("p1").tag("routine").matches(&b));
        assert!(!SearchFilters::new().subject("p2").label("xray").matches(&b));
    }

    #[test]
    fn record_type_is_exact() {
        let b = xray();
        assert!(SearchFilters::new().record_type("imaging").matches(&b));
        assert!(!SearchFilters::new().record_type("imag").matches(&b));
    }

    #[test]
    fn date_range_is_inclusive_and_bounds_independent() {
        let b = xray();
        let at = Timestamp::from_millis(5_000);
        assert!(SearchFilters::new().from(at).to(at).matches(&b));
        assert!(SearchFilters::new().from(Timestamp::from_millis(4_999)).matches(&b));
        assert!(!SearchFilters::new().from(Timestamp::from_millis(5_001)).matches(&b));
        assert!(SearchFilters::new().to(Timestamp::from_millis(5_000)).matches(&b));
        assert!(!SearchFilters::new().to(Timestamp::from_millis(4_999)).matches(&b));
    }

    #[test]
    fn point_queries_use_exact_equality() {
        let b = xray();
        assert!(BlockQuery::ObjectId("o1".into()).matches(&b));
        assert!(!BlockQuery::ObjectId("o".into()).matches(&b));
        assert!(BlockQuery::ContentDigest("d1".into()).matches(&b));
        assert!(BlockQuery::Subject("p1".into()).matches(&b));
        assert!(BlockQuery::Label("chest".into()).matches(&b));
        assert!(!BlockQuery::Tag("chest".into()).matches(&b));
    }

    #[test]
    fn subject_filter_rejects_blocks_without_subject() {
        let b = block(1, PayloadDraft::new("o2", "n", "d2"));
        assert!(!SearchFilters::new().subject("p1").matches(&b));
        assert!(!BlockQuery::Subject("p1".into()).matches(&b));
    }

    #[test]
    fn filters_deserialize_from_camel_case() {
        let f: SearchFilters =
            serde_json::from_str(r#"{"subjectId":"p1","labels":["a"],"dateFrom":10}"#).unwrap();
        assert_eq!(f, SearchFilters::new().subject("p1").label("a").from(Timestamp::from_millis(10)));
    }
}
