use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::{terms::matches_all, SearchParams};
use crate::{
    annotations::{AnnotBookmark, AnnotListEntry, Annotation, Tag},
    bookmarks::Bookmark,
    db::{Collection, Filter, ObjectStore},
    errors::StoreResult,
    lists::PageListEntry,
    pages::Visit,
    url::{extract_domain, extract_hostname},
};

/// Records joined onto a set of annotations and pages, loaded once per search.
#[derive(Debug, Default)]
pub struct Joins {
    tags: HashMap<String, Vec<String>>,
    annot_lists: HashMap<String, Vec<i64>>,
    page_lists: HashMap<String, Vec<i64>>,
    annot_bookmarks: HashSet<String>,
    page_bookmarks: HashMap<String, DateTime<Utc>>,
    latest_visits: HashMap<String, DateTime<Utc>>,
}

impl Joins {
    pub fn load(store: &dyn ObjectStore, annot_urls: &[String], page_urls: &[String]) -> StoreResult<Self> {
        let mut joins = Joins::default();
        let all_urls = annot_urls.iter().chain(page_urls).cloned();

        let tags: Vec<Tag> = store.find_all(Collection::Tags, &Filter::all().and_in("url", all_urls))?;
        for tag in tags {
            let names = joins.tags.entry(tag.url).or_default();
            if !names.contains(&tag.name) {
                names.push(tag.name);
            }
        }

        let by_annot = Filter::all().and_in("url", annot_urls.iter().cloned());
        let entries: Vec<AnnotListEntry> = store.find_all(Collection::AnnotListEntries, &by_annot)?;
        for entry in entries {
            joins.annot_lists.entry(entry.url).or_default().push(entry.list_id);
        }
        let bookmarks: Vec<AnnotBookmark> = store.find_all(Collection::AnnotBookmarks, &by_annot)?;
        joins.annot_bookmarks = bookmarks.into_iter().map(|b| b.url).collect();

        let entries: Vec<PageListEntry> = store.find_all(
            Collection::PageListEntries,
            &Filter::all().and_in("page_url", page_urls.iter().cloned()),
        )?;
        for entry in entries {
            joins.page_lists.entry(entry.page_url).or_default().push(entry.list_id);
        }

        let by_page = Filter::all().and_in("url", page_urls.iter().cloned());
        let bookmarks: Vec<Bookmark> = store.find_all(Collection::Bookmarks, &by_page)?;
        joins.page_bookmarks = bookmarks.into_iter().map(|b| (b.url, b.time)).collect();

        let visits: Vec<Visit> = store.find_all(Collection::Visits, &by_page)?;
        for visit in visits {
            let latest = joins.latest_visits.entry(visit.url).or_insert(visit.time);
            if visit.time > *latest {
                *latest = visit.time;
            }
        }

        Ok(joins)
    }

    pub fn tags(&self, url: &str) -> &[String] {
        self.tags.get(url).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn annot_lists(&self, url: &str) -> &[i64] {
        self.annot_lists.get(url).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn page_lists(&self, url: &str) -> &[i64] {
        self.page_lists.get(url).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn annot_bookmarked(&self, url: &str) -> bool {
        self.annot_bookmarks.contains(url)
    }

    pub fn page_bookmark(&self, url: &str) -> Option<DateTime<Utc>> {
        self.page_bookmarks.get(url).copied()
    }

    pub fn latest_visit(&self, url: &str) -> Option<DateTime<Utc>> {
        self.latest_visits.get(url).copied()
    }
}

/// The filter stages of one search.
pub struct Filters<'a> {
    params: &'a SearchParams,
    terms: Vec<String>,
    include_domains: Vec<String>,
    exclude_domains: Vec<String>,
}

fn clean_domains(domains: &[String]) -> Vec<String> {
    domains
        .iter()
        .map(|domain| extract_hostname(domain))
        .filter(|domain| !domain.is_empty())
        .collect()
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl<'a> Filters<'a> {
    pub fn new(params: &'a SearchParams) -> Self {
        Filters {
            terms: params.query_terms(),
            include_domains: clean_domains(&params.domains.include),
            exclude_domains: clean_domains(&params.domains.exclude),
            params,
        }
    }

    pub fn params(&self) -> &SearchParams {
        self.params
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether the query leaves any searchable term. A query made only of
    /// stop words or one-letter tokens has none and constrains nothing.
    pub fn has_query(&self) -> bool {
        !self.terms.is_empty()
    }

    /// Whether the caller sent query text at all, searchable or not.
    pub fn query_given(&self) -> bool {
        !self.params.query.trim().is_empty()
    }

    pub fn in_date_range(&self, time: DateTime<Utc>) -> bool {
        self.params.start_date.map_or(true, |start| time >= start)
            && self.params.end_date.map_or(true, |end| time <= end)
    }

    /// Every included tag present, no excluded tag present.
    pub fn tags_pass(&self, tags: &[String]) -> bool {
        let tags_filter = &self.params.tags;
        tags_filter.include.iter().all(|tag| tags.contains(tag))
            && !tags_filter.exclude.iter().any(|tag| tags.contains(tag))
    }

    /// Any included domain matches, no excluded domain matches. A domain
    /// matches on the page's hostname or its registrable domain.
    pub fn domains_pass(&self, page_url: &str) -> bool {
        let hostname = extract_hostname(page_url);
        let domain = extract_domain(page_url);
        let matches = |candidate: &String| *candidate == hostname || *candidate == domain;

        (self.include_domains.is_empty() || self.include_domains.iter().any(matches))
            && !self.exclude_domains.iter().any(matches)
    }

    /// Each requested list holds the annotation or its page.
    pub fn lists_pass(&self, annot_lists: &[i64], page_lists: &[i64]) -> bool {
        self.params
            .lists
            .iter()
            .all(|list| annot_lists.contains(list) || page_lists.contains(list))
    }

    /// Query terms against the enabled annotation fields. Without a query,
    /// annotations of the enabled kinds match.
    pub fn annotation_text_matches(&self, annotation: &Annotation, with_query: bool) -> bool {
        let types = self.params.content_types;

        if !with_query || self.terms.is_empty() {
            return (types.highlights && has_text(&annotation.body))
                || (types.notes && has_text(&annotation.comment));
        }

        let mut fields: Vec<&[String]> = vec![];
        if types.highlights {
            fields.push(&annotation.body_terms);
        }
        if types.notes {
            fields.push(&annotation.comment_terms);
        }
        !fields.is_empty() && matches_all(&self.terms, &fields)
    }

    /// Runs every annotation stage in order. `with_query = false` skips the
    /// term match but keeps the content type restriction.
    pub fn annotation_passes(&self, annotation: &Annotation, joins: &Joins, with_query: bool) -> bool {
        self.annotation_text_matches(annotation, with_query)
            && self.in_date_range(annotation.created_when)
            && (!self.params.bookmarks_only || joins.annot_bookmarked(&annotation.url))
            && self.tags_pass(joins.tags(&annotation.url))
            && self.domains_pass(&annotation.page_url)
            && self.lists_pass(
                joins.annot_lists(&annotation.url),
                joins.page_lists(&annotation.page_url),
            )
    }

    /// Annotations that can possibly match, fetched through the term arrays
    /// of the enabled fields.
    pub fn annotation_candidates(&self, store: &dyn ObjectStore) -> StoreResult<Vec<Annotation>> {
        let Some(first_term) = self.terms.first() else {
            return store.find_all(Collection::Annotations, &Filter::all());
        };

        let types = self.params.content_types;
        let mut fields = vec![];
        if types.highlights {
            fields.push("body_terms");
        }
        if types.notes {
            fields.push("comment_terms");
        }

        let mut seen = HashSet::new();
        let mut candidates = vec![];
        for field in fields {
            let found: Vec<Annotation> = store.find_all(
                Collection::Annotations,
                &Filter::all().and_contains(field, first_term.as_str()),
            )?;
            for annotation in found {
                if seen.insert(annotation.url.clone()) {
                    candidates.push(annotation);
                }
            }
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::IncExc;
    use chrono::TimeZone;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tags_inc_all_exc_none() {
        let params = SearchParams {
            tags: IncExc {
                include: strings(&["tag1", "tag2"]),
                exclude: strings(&["tag3"]),
            },
            ..Default::default()
        };
        let filters = Filters::new(&params);

        assert!(filters.tags_pass(&strings(&["tag1", "tag2"])));
        assert!(!filters.tags_pass(&strings(&["tag1"])));
        assert!(!filters.tags_pass(&strings(&["tag1", "tag2", "tag3"])));
    }

    #[test]
    fn test_domains_inc_any_exc_none() {
        let params = SearchParams {
            domains: IncExc {
                include: strings(&["bbc.co.uk", "lorem.com"]),
                exclude: strings(&["sport.bbc.co.uk"]),
            },
            ..Default::default()
        };
        let filters = Filters::new(&params);

        assert!(filters.domains_pass("news.bbc.co.uk/story"));
        assert!(filters.domains_pass("lorem.com/ipsum"));
        assert!(!filters.domains_pass("sport.bbc.co.uk/match"));
        assert!(!filters.domains_pass("other.com"));

        // no filter passes everything
        let params = SearchParams::default();
        assert!(Filters::new(&params).domains_pass("other.com"));
    }

    #[test]
    fn test_lists_need_every_list() {
        let params = SearchParams {
            lists: vec![1, 2],
            ..Default::default()
        };
        let filters = Filters::new(&params);

        assert!(filters.lists_pass(&[1], &[2]));
        assert!(filters.lists_pass(&[1, 2], &[]));
        assert!(!filters.lists_pass(&[1], &[1]));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2019, 1, 25, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2019, 1, 28, 0, 0, 0).unwrap();
        let params = SearchParams {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        };
        let filters = Filters::new(&params);

        assert!(filters.in_date_range(start));
        assert!(filters.in_date_range(end));
        assert!(!filters.in_date_range(end + chrono::Duration::milliseconds(1)));
    }
}
