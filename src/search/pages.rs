use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::{
    filters::{Filters, Joins},
    paginate::paginate,
    terms::matches_all,
    PageDoc, PageSearchResult, SearchParams, Searcher,
};
use crate::{
    annotations::Annotation,
    db::{Collection, Filter},
    errors::StoreResult,
    pages::Page,
    url::{extract_domain, extract_hostname},
};

/// A page that made it into the results, before decoration.
pub struct PageHit {
    pub page_url: String,
    /// Missing when the page was only ever annotated.
    pub page: Option<Page>,
    pub display_time: DateTime<Utc>,
    pub annotations: Vec<Annotation>,
}

/// Latest of the page's last visit, its bookmark and its newest annotation.
pub fn display_time(page_url: &str, joins: &Joins, annotations: &[Annotation]) -> DateTime<Utc> {
    [
        joins.latest_visit(page_url),
        joins.page_bookmark(page_url),
        annotations.iter().map(|a| a.created_when).max(),
    ]
    .into_iter()
    .flatten()
    .max()
    .unwrap_or_default()
}

fn page_text_matches(page: &Page, terms: &[String]) -> bool {
    matches_all(
        terms,
        &[
            page.terms.as_slice(),
            page.title_terms.as_slice(),
            page.url_terms.as_slice(),
        ],
    )
}

impl Searcher {
    pub(super) fn load_pages(&self, urls: &[String]) -> StoreResult<HashMap<String, Page>> {
        let pages: Vec<Page> = self.store.find_all(
            Collection::Pages,
            &Filter::all().and_in("url", urls.iter().cloned()),
        )?;
        Ok(pages.into_iter().map(|page| (page.url.clone(), page)).collect())
    }

    pub(super) fn page_doc(&self, hit: PageHit, joins: &Joins) -> StoreResult<PageDoc> {
        let title = match &hit.page {
            Some(page) => page.title.clone(),
            None => hit.annotations.iter().find_map(|a| a.page_title.clone()),
        };
        let (full_url, hostname, domain) = match hit.page {
            Some(page) => (page.full_url, page.hostname, page.domain),
            None => (
                hit.page_url.clone(),
                extract_hostname(&hit.page_url),
                extract_domain(&hit.page_url),
            ),
        };

        Ok(PageDoc {
            tags: joins.tags(&hit.page_url).to_vec(),
            lists: joins.page_lists(&hit.page_url).to_vec(),
            has_bookmark: joins.page_bookmark(&hit.page_url).is_some(),
            annotations: self.annotation_views(hit.annotations, joins)?,
            display_time: hit.display_time,
            url: hit.page_url,
            full_url,
            title,
            hostname,
            domain,
        })
    }

    /// Pages whose own terms match the query. A blank query takes every page.
    fn pages_matching_terms(&self, filters: &Filters) -> StoreResult<Vec<Page>> {
        let Some(first_term) = filters.terms().first() else {
            return self.store.find_all(Collection::Pages, &Filter::all());
        };
        if !filters.params().content_types.pages {
            return Ok(vec![]);
        }

        let mut seen = HashSet::new();
        let mut found = vec![];
        for field in ["terms", "title_terms", "url_terms"] {
            let pages: Vec<Page> = self.store.find_all(
                Collection::Pages,
                &Filter::all().and_contains(field, first_term.as_str()),
            )?;
            for page in pages {
                if page_text_matches(&page, filters.terms()) && seen.insert(page.url.clone()) {
                    found.push(page);
                }
            }
        }
        Ok(found)
    }

    /// Pages matching `params`, most recently active first.
    ///
    /// A page matches through its own terms (when pages are searched) or
    /// through its annotations. Each doc carries the annotations that
    /// matched, or else every annotation that passes the filters.
    pub fn search_pages(&self, params: &SearchParams) -> StoreResult<PageSearchResult> {
        params.validate()?;
        let filters = Filters::new(params);
        // bookmarks, tags and lists are decided per page below
        let annot_params = SearchParams {
            bookmarks_only: false,
            tags: Default::default(),
            lists: vec![],
            ..params.clone()
        };
        let annot_filters = Filters::new(&annot_params);

        let mut pages: HashMap<String, Page> = HashMap::new();
        let mut page_urls: Vec<String> = vec![];
        for page in self.pages_matching_terms(&filters)? {
            page_urls.push(page.url.clone());
            pages.insert(page.url.clone(), page);
        }
        let matched_by_text: HashSet<String> = page_urls.iter().cloned().collect();

        if filters.has_query() {
            for annotation in filters.annotation_candidates(&*self.store)? {
                if !page_urls.contains(&annotation.page_url) {
                    page_urls.push(annotation.page_url);
                }
            }
        }

        let mut annotations: Vec<Annotation> = self.store.find_all(
            Collection::Annotations,
            &Filter::all().and_in("page_url", page_urls.iter().cloned()),
        )?;
        annotations.sort_by(|a, b| b.created_when.cmp(&a.created_when));
        let annot_urls: Vec<String> = annotations.iter().map(|a| a.url.clone()).collect();
        let joins = Joins::load(&*self.store, &annot_urls, &page_urls)?;

        let missing: Vec<String> = page_urls
            .iter()
            .filter(|url| !pages.contains_key(*url))
            .cloned()
            .collect();
        pages.extend(self.load_pages(&missing)?);

        let mut by_page: HashMap<String, Vec<Annotation>> = HashMap::new();
        for annotation in annotations {
            by_page
                .entry(annotation.page_url.clone())
                .or_default()
                .push(annotation);
        }

        let mut hits = vec![];
        for page_url in page_urls {
            let page_annotations = by_page.remove(&page_url).unwrap_or_default();
            let display_time = display_time(&page_url, &joins, &page_annotations);

            let (matched, passing): (Vec<Annotation>, Vec<Annotation>) = page_annotations
                .into_iter()
                .filter(|a| annot_filters.annotation_passes(a, &joins, false))
                .partition(|a| filters.has_query() && filters.annotation_text_matches(a, true));

            let via_text = matched_by_text.contains(&page_url);
            if filters.has_query() && !via_text && matched.is_empty() {
                continue;
            }

            let mut tags = joins.tags(&page_url).to_vec();
            let mut lists = joins.page_lists(&page_url).to_vec();
            for annotation in matched.iter().chain(&passing) {
                tags.extend_from_slice(joins.tags(&annotation.url));
                lists.extend_from_slice(joins.annot_lists(&annotation.url));
            }

            let passes = filters.in_date_range(display_time)
                && (!params.bookmarks_only || joins.page_bookmark(&page_url).is_some())
                && filters.tags_pass(&tags)
                && filters.domains_pass(&page_url)
                && filters.lists_pass(&lists, &[]);
            if !passes {
                continue;
            }

            let annotations = if matched.is_empty() { passing } else { matched };

            hits.push(PageHit {
                page: pages.remove(&page_url),
                page_url,
                display_time,
                annotations,
            });
        }

        hits.sort_by(|a, b| {
            b.display_time
                .cmp(&a.display_time)
                .then_with(|| a.page_url.cmp(&b.page_url))
        });
        log::debug!("{} pages matched \"{}\"", hits.len(), params.query);

        let total_count = hits.len();
        let page = paginate(hits, params.skip, params.limit);
        let docs = page
            .items
            .into_iter()
            .map(|hit| self.page_doc(hit, &joins))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(PageSearchResult {
            docs,
            total_count,
            results_exhausted: page.results_exhausted,
        })
    }
}
