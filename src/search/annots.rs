use std::collections::HashMap;

use super::{
    filters::{Filters, Joins},
    pages::{display_time, PageHit},
    paginate::paginate,
    AnnotSearchParams, AnnotationsSearchResult, DayBucket, PageBucket, SearchParams, Searcher,
};
use crate::{
    annotations::{Annotation, AnnotationView},
    db::{Collection, Filter, FindOpts, Order},
    errors::StoreResult,
    url::normalize_url,
};

fn newest_first(a: &Annotation, b: &Annotation) -> std::cmp::Ordering {
    b.created_when
        .cmp(&a.created_when)
        .then_with(|| a.url.cmp(&b.url))
}

fn unique_page_urls<'a>(annotations: impl IntoIterator<Item = &'a Annotation>) -> Vec<String> {
    let mut urls: Vec<String> = vec![];
    for annotation in annotations {
        if !urls.contains(&annotation.page_url) {
            urls.push(annotation.page_url.clone());
        }
    }
    urls
}

/// Groups annotations, already ordered newest first, into UTC days and then
/// pages. Days and pages keep the order of their newest annotation.
pub fn bucket_by_day(annotations: Vec<AnnotationView>) -> Vec<DayBucket> {
    let mut days: Vec<DayBucket> = vec![];

    for view in annotations {
        let day = view.annotation.created_when.date_naive();
        if days.last().map_or(true, |bucket| bucket.day != day) {
            days.push(DayBucket { day, pages: vec![] });
        }
        let Some(bucket) = days.last_mut() else {
            continue;
        };

        match bucket
            .pages
            .iter_mut()
            .find(|page| page.page_url == view.annotation.page_url)
        {
            Some(page) => page.annotations.push(view),
            None => bucket.pages.push(PageBucket {
                page_url: view.annotation.page_url.clone(),
                annotations: vec![view],
            }),
        }
    }

    days
}

impl Searcher {
    pub(super) fn annotation_view(&self, annotation: Annotation, joins: &Joins) -> StoreResult<AnnotationView> {
        Ok(AnnotationView {
            tags: joins.tags(&annotation.url).to_vec(),
            lists: joins.annot_lists(&annotation.url).to_vec(),
            has_bookmark: joins.annot_bookmarked(&annotation.url),
            is_shared: self.sharing.is_shared(&annotation.url)?,
            is_bulk_share_protected: self.sharing.is_bulk_share_protected(&annotation.url)?,
            annotation,
        })
    }

    pub(super) fn annotation_views(
        &self,
        annotations: Vec<Annotation>,
        joins: &Joins,
    ) -> StoreResult<Vec<AnnotationView>> {
        annotations
            .into_iter()
            .map(|annotation| self.annotation_view(annotation, joins))
            .collect()
    }

    /// Annotations matching `params`. A query groups them into page docs; a
    /// blank query groups them by day, with limit and skip counted in
    /// annotations.
    pub fn search_annotations(&self, params: &SearchParams) -> StoreResult<AnnotationsSearchResult> {
        params.validate()?;
        let filters = Filters::new(params);

        let candidates = filters.annotation_candidates(&*self.store)?;
        let annot_urls: Vec<String> = candidates.iter().map(|a| a.url.clone()).collect();
        let page_urls = unique_page_urls(&candidates);
        let joins = Joins::load(&*self.store, &annot_urls, &page_urls)?;

        let mut matched: Vec<Annotation> = candidates
            .into_iter()
            .filter(|annotation| filters.annotation_passes(annotation, &joins, true))
            .collect();
        matched.sort_by(newest_first);
        log::debug!("{} annotations matched \"{}\"", matched.len(), params.query);

        // the shape follows the request: day buckets only for a blank query
        if !filters.query_given() {
            let page = paginate(matched, params.skip, params.limit);
            let views = self.annotation_views(page.items, &joins)?;
            return Ok(AnnotationsSearchResult::ByDay {
                annots_by_day: bucket_by_day(views),
                results_exhausted: page.results_exhausted,
            });
        }

        let mut by_page: HashMap<String, Vec<Annotation>> = HashMap::new();
        let page_order = unique_page_urls(&matched);
        for annotation in matched {
            by_page
                .entry(annotation.page_url.clone())
                .or_default()
                .push(annotation);
        }

        let total_count = page_order.len();
        let page = paginate(page_order, params.skip, params.limit);
        let mut pages = self.load_pages(&page.items)?;

        let mut docs = vec![];
        for page_url in page.items {
            let annotations = by_page.remove(&page_url).unwrap_or_default();
            let hit = PageHit {
                display_time: display_time(&page_url, &joins, &annotations),
                page: pages.remove(&page_url),
                page_url,
                annotations,
            };
            docs.push(self.page_doc(hit, &joins)?);
        }

        Ok(AnnotationsSearchResult::Docs {
            docs,
            total_count,
            results_exhausted: page.results_exhausted,
        })
    }

    /// The page's annotations that pass the filters, newest first. Included
    /// tags are required per annotation, excluded tags are checked against
    /// every tag on the page.
    pub fn get_all_annotations_by_url(&self, params: &AnnotSearchParams) -> StoreResult<Vec<AnnotationView>> {
        let page_url = normalize_url(&params.url);
        let annotations: Vec<Annotation> = self.store.find_sorted(
            Collection::Annotations,
            &Filter::eq("page_url", page_url.as_str()),
            &FindOpts::sorted("created_when", Order::Desc),
        )?;

        let filters = Filters::new(&params.filters);
        let annot_urls: Vec<String> = annotations.iter().map(|a| a.url.clone()).collect();
        let joins = Joins::load(&*self.store, &annot_urls, &[page_url.clone()])?;

        // excluded tags rule out the page as a whole
        let excluded = &params.filters.tags.exclude;
        let page_tagged_excluded = annot_urls
            .iter()
            .chain(std::iter::once(&page_url))
            .any(|url| joins.tags(url).iter().any(|tag| excluded.contains(tag)));
        if page_tagged_excluded {
            return Ok(vec![]);
        }

        let passing: Vec<Annotation> = annotations
            .into_iter()
            .filter(|annotation| filters.annotation_passes(annotation, &joins, true))
            .collect();

        let page = paginate(passing, params.skip, params.limit);
        self.annotation_views(page.items, &joins)
    }
}
