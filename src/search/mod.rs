//! Search over pages and annotations.
//!
//! Both searches run the same stages over the annotation + owning page
//! tuple: candidates, date range, bookmarks, tags, domains, lists. The
//! matches are then grouped, decorated with sharing state and paginated.

pub mod annots;
pub mod filters;
pub mod pages;
pub mod paginate;
pub mod terms;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    annotations::AnnotationView,
    db::ObjectStore,
    errors::{StoreError, StoreResult},
    sharing::SharingLookup,
};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_ANNOTS_BY_URL_LIMIT: usize = 1000;

/// Inclusive and exclusive value sets of one filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncExc {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl IncExc {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypes {
    pub highlights: bool,
    pub notes: bool,
    pub pages: bool,
}

impl Default for ContentTypes {
    fn default() -> Self {
        ContentTypes {
            highlights: true,
            notes: true,
            pages: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub bookmarks_only: bool,
    pub tags: IncExc,
    pub domains: IncExc,
    pub lists: Vec<i64>,
    pub content_types: ContentTypes,
    pub limit: usize,
    pub skip: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            query: String::new(),
            start_date: None,
            end_date: None,
            bookmarks_only: false,
            tags: IncExc::default(),
            domains: IncExc::default(),
            lists: vec![],
            content_types: ContentTypes::default(),
            limit: DEFAULT_SEARCH_LIMIT,
            skip: 0,
        }
    }
}

impl SearchParams {
    pub fn query_terms(&self) -> Vec<String> {
        terms::query_terms(&self.query)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(StoreError::validation("start date is after end date"));
            }
        }
        if self.limit == 0 {
            return Err(StoreError::validation("limit must be positive"));
        }
        Ok(())
    }
}

/// Wire form of a search. Accepts the historical parameter names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "bookmarks")]
    pub bookmarks_only: bool,

    #[serde(default, alias = "tags")]
    pub tags_inc: Vec<String>,
    #[serde(default)]
    pub tags_exc: Vec<String>,

    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub domains_inc: Vec<String>,
    #[serde(default, alias = "domainsExclude")]
    pub domains_exc: Vec<String>,

    #[serde(default)]
    pub lists: Vec<i64>,
    /// Older name of `lists`.
    #[serde(default)]
    pub collections: Vec<i64>,

    #[serde(default)]
    pub content_types: Option<ContentTypes>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: Option<usize>,
}

fn union<T: PartialEq + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let mut merged = a.to_vec();
    for item in b {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

impl SearchRequest {
    pub fn into_params(self, default_limit: usize) -> StoreResult<SearchParams> {
        let params = SearchParams {
            query: self.query.unwrap_or_default().trim().to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            bookmarks_only: self.bookmarks_only,
            tags: IncExc {
                include: self.tags_inc,
                exclude: self.tags_exc,
            },
            domains: IncExc {
                include: union(&self.domains, &self.domains_inc),
                exclude: self.domains_exc,
            },
            lists: union(&self.lists, &self.collections),
            content_types: self.content_types.unwrap_or_default(),
            limit: self.limit.unwrap_or(default_limit),
            skip: self.skip.unwrap_or_default(),
        };
        params.validate()?;
        Ok(params)
    }
}

/// Annotation lookup for a single page.
#[derive(Debug, Clone)]
pub struct AnnotSearchParams {
    pub url: String,
    pub limit: usize,
    pub skip: usize,
    /// Only the filter fields are used; its own limit and skip are ignored.
    pub filters: SearchParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDoc {
    pub url: String,
    pub full_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub hostname: String,
    pub domain: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub display_time: DateTime<Utc>,
    pub has_bookmark: bool,
    pub tags: Vec<String>,
    pub lists: Vec<i64>,
    pub annotations: Vec<AnnotationView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBucket {
    pub page_url: String,
    pub annotations: Vec<AnnotationView>,
}

/// Annotations created on one UTC calendar day, grouped by page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBucket {
    pub day: NaiveDate,
    pub pages: Vec<PageBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationsSearchResult {
    Docs {
        docs: Vec<PageDoc>,
        total_count: usize,
        results_exhausted: bool,
    },
    ByDay {
        annots_by_day: Vec<DayBucket>,
        results_exhausted: bool,
    },
}

impl AnnotationsSearchResult {
    pub fn results_exhausted(&self) -> bool {
        match self {
            AnnotationsSearchResult::Docs {
                results_exhausted, ..
            }
            | AnnotationsSearchResult::ByDay {
                results_exhausted, ..
            } => *results_exhausted,
        }
    }

    /// Every annotation in the result, in result order.
    pub fn annotations(&self) -> Vec<&AnnotationView> {
        match self {
            AnnotationsSearchResult::Docs { docs, .. } => {
                docs.iter().flat_map(|doc| doc.annotations.iter()).collect()
            }
            AnnotationsSearchResult::ByDay { annots_by_day, .. } => annots_by_day
                .iter()
                .flat_map(|day| day.pages.iter())
                .flat_map(|page| page.annotations.iter())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSearchResult {
    pub docs: Vec<PageDoc>,
    pub total_count: usize,
    pub results_exhausted: bool,
}

/// Read side over the object store.
pub struct Searcher {
    store: Arc<dyn ObjectStore>,
    sharing: Arc<dyn SharingLookup>,
}

impl Searcher {
    pub fn new(store: Arc<dyn ObjectStore>, sharing: Arc<dyn SharingLookup>) -> Self {
        Self { store, sharing }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_request_legacy_names() {
        let request: SearchRequest = serde_json::from_value(serde_json::json!({
            "query": " bla ",
            "tagsInc": ["tag1"],
            "tagsExc": ["tag2"],
            "domains": ["annotation.url"],
            "domainsExclude": ["other.com"],
            "collections": [1],
            "lists": [2],
            "bookmarks": true,
            "startDate": 1548374400000i64,
        }))
        .unwrap();

        let params = request.into_params(DEFAULT_SEARCH_LIMIT).unwrap();
        assert_eq!(params.query, "bla");
        assert_eq!(params.tags.include, vec!["tag1"]);
        assert_eq!(params.tags.exclude, vec!["tag2"]);
        assert_eq!(params.domains.include, vec!["annotation.url"]);
        assert_eq!(params.domains.exclude, vec!["other.com"]);
        assert_eq!(params.lists, vec![2, 1]);
        assert!(params.bookmarks_only);
        assert_eq!(
            params.start_date,
            Some(Utc.with_ymd_and_hms(2019, 1, 25, 0, 0, 0).unwrap())
        );
        assert_eq!(params.limit, DEFAULT_SEARCH_LIMIT);
        assert_eq!(params.content_types, ContentTypes::default());
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let request = SearchRequest {
            start_date: Some(Utc.with_ymd_and_hms(2019, 2, 1, 0, 0, 0).unwrap()),
            end_date: Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(matches!(
            request.into_params(DEFAULT_SEARCH_LIMIT),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_result_shape_is_tagged() {
        let result = AnnotationsSearchResult::ByDay {
            annots_by_day: vec![],
            results_exhausted: true,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "by_day");
        assert!(result.results_exhausted());
        assert!(result.annotations().is_empty());
    }
}
