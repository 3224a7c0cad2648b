//! Annotations: highlights, notes and the records that hang off them.

pub mod service;
pub mod storage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{errors::StoreResult, url::normalize_url};

pub use service::{AnnotationService, CreateAnnotationParams};
pub use storage::AnnotationStorage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Primary key, relative to the page: `{page url}/#{epoch millis}`.
    pub url: String,
    pub page_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Highlighted text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Opaque anchoring data from the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Value>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_when: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_edited: DateTime<Utc>,

    #[serde(default)]
    pub body_terms: Vec<String>,
    #[serde(default)]
    pub comment_terms: Vec<String>,
}

impl Annotation {
    /// Highlights carry a body; notes carry only a comment.
    pub fn is_highlight(&self) -> bool {
        self.body.as_deref().is_some_and(|body| !body.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationCreate {
    /// Caller-chosen primary key; generated from the page url when absent.
    #[serde(default)]
    pub url: Option<String>,
    pub page_url: String,
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub selector: Option<Value>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_when: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotBookmark {
    pub url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotListEntry {
    pub list_id: i64,
    pub url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// A tag on a page or on an annotation, told apart by the url.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub url: String,
}

/// Annotation as returned by searches, with its joined state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationView {
    #[serde(flatten)]
    pub annotation: Annotation,
    pub tags: Vec<String>,
    pub lists: Vec<i64>,
    pub has_bookmark: bool,
    pub is_shared: bool,
    pub is_bulk_share_protected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Runs inside the delete cascade, after the annotation's bookmark, list
/// entries and tags are gone and before its row is deleted. Must tolerate
/// being called again for the same annotation.
pub trait PreAnnotationDelete: Send + Sync {
    fn pre_annotation_delete(&self, annotation_url: &str) -> StoreResult<()>;
}

impl PreAnnotationDelete for () {
    fn pre_annotation_delete(&self, _annotation_url: &str) -> StoreResult<()> {
        Ok(())
    }
}

pub fn generate_annotation_url(page_url: &str, now: DateTime<Utc>) -> String {
    format!("{}/#{}", normalize_url(page_url), now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_annotation_url() {
        let now = Utc.timestamp_millis_opt(1548000000000).unwrap();
        assert_eq!(
            generate_annotation_url("https://www.lorem.com/ipsum/", now),
            "lorem.com/ipsum/#1548000000000"
        );
    }

    #[test]
    fn test_view_flattens_annotation() {
        let now = Utc.timestamp_millis_opt(1).unwrap();
        let view = AnnotationView {
            annotation: Annotation {
                url: "lorem.com/#1".to_string(),
                page_url: "lorem.com".to_string(),
                page_title: None,
                comment: Some("note".to_string()),
                body: None,
                selector: None,
                created_when: now,
                last_edited: now,
                body_terms: vec![],
                comment_terms: vec!["note".to_string()],
            },
            tags: vec!["rust".to_string()],
            lists: vec![],
            has_bookmark: true,
            is_shared: false,
            is_bulk_share_protected: false,
        };

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["url"], "lorem.com/#1");
        assert_eq!(value["has_bookmark"], true);
        assert!(!view.annotation.is_highlight());
    }
}
