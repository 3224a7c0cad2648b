use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{
    ContentFingerprint, ContentIdentifier, FavIcon, Locator, Page, ResolvedIdentity, Visit,
    VisitInteraction,
};
use crate::{
    db::{Collection, Filter, FindOpts, ObjectStore, Order},
    errors::StoreResult,
    search::terms::merge_terms,
    url::normalize_url,
};

/// Text fields that carry a term array, paired with that array's field.
const TERM_FIELDS: [(&str, &str); 3] = [
    ("text", "terms"),
    ("title", "title_terms"),
    ("full_url", "url_terms"),
];

/// Fields never taken from an update: the identity and the term arrays,
/// which are only written as merges of their source field.
const UPDATE_SKIPPED: [&str; 4] = ["url", "terms", "title_terms", "url_terms"];

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn as_terms(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Field-by-field update set for `new` over `existing`.
///
/// Term-backed fields change only when the new value is present and differs,
/// and then their term arrays are merged rather than replaced. Plain strings
/// change on inequality. Any other field takes the new value when present.
pub fn page_updates(new: &Page, existing: &Page) -> StoreResult<Map<String, Value>> {
    let new = serde_json::to_value(new)?;
    let existing = serde_json::to_value(existing)?;
    let mut updates = Map::new();

    let Some(new_fields) = new.as_object() else {
        return Ok(updates);
    };

    for (field, new_value) in new_fields {
        if UPDATE_SKIPPED.contains(&field.as_str()) {
            continue;
        }
        let existing_value = existing.get(field);

        if let Some((_, terms_field)) = TERM_FIELDS.iter().find(|(f, _)| *f == field.as_str()) {
            if is_blank(Some(new_value)) || existing_value == Some(new_value) {
                continue;
            }
            let merged = merge_terms(
                &as_terms(existing.get(*terms_field)),
                &as_terms(new.get(*terms_field)),
            );
            updates.insert(field.clone(), new_value.clone());
            updates.insert(terms_field.to_string(), Value::from(merged));
        } else if new_value.is_string() || existing_value.is_some_and(Value::is_string) {
            if existing_value != Some(new_value) {
                updates.insert(field.clone(), new_value.clone());
            }
        } else if !new_value.is_null() {
            updates.insert(field.clone(), new_value.clone());
        }
    }

    Ok(updates)
}

pub struct PageStorage {
    store: Arc<dyn ObjectStore>,
}

impl PageStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn create_page(&self, page: &Page) -> StoreResult<()> {
        let page = Page {
            url: normalize_url(&page.url),
            ..page.clone()
        };
        self.store.create(Collection::Pages, &page)
    }

    /// Returns whether a page was created.
    pub fn create_page_if_not_exists(&self, page: &Page) -> StoreResult<bool> {
        if self.page_exists(&page.url)? {
            return Ok(false);
        }
        self.create_page(page)?;
        Ok(true)
    }

    /// Like [`Self::create_page_if_not_exists`], but a stub page is replaced
    /// by the new content. Returns whether a page was written.
    pub fn create_page_if_not_exists_or_is_stub(&self, page: &Page) -> StoreResult<bool> {
        match self.get_page(&page.url)? {
            Some(existing) if existing.is_stub() => {
                log::debug!("re-indexing stub page {}", existing.url);
                self.store
                    .delete_one(Collection::Pages, &Filter::eq("url", existing.url))?;
                self.create_page(page)?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => {
                self.create_page(page)?;
                Ok(true)
            }
        }
    }

    /// Merges `new` into `existing`. Returns whether anything was written.
    pub fn update_page(&self, new: &Page, existing: &Page) -> StoreResult<bool> {
        let updates = page_updates(new, existing)?;
        if updates.is_empty() {
            return Ok(false);
        }

        log::debug!("updating page {} fields {:?}", existing.url, updates.keys());
        self.store.update_one(
            Collection::Pages,
            &Filter::eq("url", normalize_url(&existing.url)),
            &updates,
        )?;
        Ok(true)
    }

    pub fn page_exists(&self, url: &str) -> StoreResult<bool> {
        self.store
            .exists(Collection::Pages, &Filter::eq("url", normalize_url(url)))
    }

    pub fn get_page(&self, url: &str) -> StoreResult<Option<Page>> {
        self.store
            .find_one(Collection::Pages, &Filter::eq("url", normalize_url(url)))
    }

    pub fn get_pages(&self, urls: &[String]) -> StoreResult<Vec<Page>> {
        self.store
            .find_all(Collection::Pages, &Filter::all().and_in("url", urls.iter().cloned()))
    }

    /// Records the visits not stored yet. Returns how many were added.
    pub fn create_visits_if_needed(&self, url: &str, times: &[DateTime<Utc>]) -> StoreResult<usize> {
        let normalized_url = normalize_url(url);
        let mut added = 0;
        for time in times {
            let visit = Filter::eq("url", normalized_url.as_str()).and_eq("time", time.timestamp_millis());
            if self.store.exists(Collection::Visits, &visit)? {
                continue;
            }
            self.add_page_visit(&normalized_url, *time)?;
            added += 1;
        }
        Ok(added)
    }

    pub fn add_page_visit(&self, url: &str, time: DateTime<Utc>) -> StoreResult<()> {
        let visit = Visit {
            url: normalize_url(url),
            time,
            interaction: VisitInteraction::default(),
        };
        self.store.create(Collection::Visits, &visit)
    }

    /// Records a first visit only; later calls for the same page are no-ops.
    pub fn add_page_visit_if_has_none(&self, url: &str, time: DateTime<Utc>) -> StoreResult<bool> {
        if self.page_has_visits(url)? {
            return Ok(false);
        }
        self.add_page_visit(url, time)?;
        Ok(true)
    }

    pub fn page_has_visits(&self, url: &str) -> StoreResult<bool> {
        self.store
            .exists(Collection::Visits, &Filter::eq("url", normalize_url(url)))
    }

    pub fn get_visits(&self, url: &str) -> StoreResult<Vec<Visit>> {
        self.store.find_sorted(
            Collection::Visits,
            &Filter::eq("url", normalize_url(url)),
            &FindOpts::sorted("time", Order::Desc),
        )
    }

    pub fn get_latest_visit(&self, url: &str) -> StoreResult<Option<Visit>> {
        let visits = self.store.find_sorted(
            Collection::Visits,
            &Filter::eq("url", normalize_url(url)),
            &FindOpts::sorted("time", Order::Desc).limit(1),
        )?;
        Ok(visits.into_iter().next())
    }

    pub fn update_visit_metadata(
        &self,
        url: &str,
        time: DateTime<Utc>,
        interaction: &VisitInteraction,
    ) -> StoreResult<usize> {
        let updates = match serde_json::to_value(interaction)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        if updates.is_empty() {
            return Ok(0);
        }

        self.store.update_objects(
            Collection::Visits,
            &Filter::eq("url", normalize_url(url)).and_eq("time", time.timestamp_millis()),
            &updates,
            false,
        )
    }

    /// Deletes the page unless a visit or a bookmark still references it.
    /// Returns whether the page was deleted.
    pub fn delete_page_if_orphaned(&self, url: &str) -> StoreResult<bool> {
        let normalized_url = normalize_url(url);
        let by_url = Filter::eq("url", normalized_url.as_str());

        if self.store.count_objects(Collection::Visits, &by_url)? > 0 {
            return Ok(false);
        }
        if self.store.count_objects(Collection::Bookmarks, &by_url)? > 0 {
            return Ok(false);
        }

        log::info!("deleting orphaned page {normalized_url}");
        Ok(self.store.delete_one(Collection::Pages, &by_url)? > 0)
    }

    /// Returns whether a new favicon row was created.
    pub fn create_fav_icon_if_needed(&self, hostname: &str, fav_icon: &str) -> StoreResult<bool> {
        let by_host = Filter::eq("hostname", hostname);
        if self.store.exists(Collection::FavIcons, &by_host)? {
            return Ok(false);
        }

        self.store.create(
            Collection::FavIcons,
            &FavIcon {
                hostname: hostname.to_string(),
                fav_icon: fav_icon.to_string(),
            },
        )?;
        Ok(true)
    }

    pub fn create_or_update_fav_icon(&self, hostname: &str, fav_icon: &str) -> StoreResult<()> {
        if !self.create_fav_icon_if_needed(hostname, fav_icon)? {
            let mut updates = Map::new();
            updates.insert("fav_icon".to_string(), Value::from(fav_icon));
            self.store
                .update_one(Collection::FavIcons, &Filter::eq("hostname", hostname), &updates)?;
        }
        Ok(())
    }

    pub fn get_fav_icon(&self, hostname: &str) -> StoreResult<Option<FavIcon>> {
        self.store
            .find_one(Collection::FavIcons, &Filter::eq("hostname", hostname))
    }

    /// Resolves the page that any of `fingerprints` belongs to.
    ///
    /// `None` means no stored locator matches and the caller should create a
    /// new page.
    pub fn get_content_identifier(
        &self,
        fingerprints: &[ContentFingerprint],
    ) -> StoreResult<Option<ResolvedIdentity>> {
        let mut candidates: Vec<Locator> = vec![];
        for fingerprint in fingerprints {
            candidates.extend(self.store.find_all::<Locator>(
                Collection::Locators,
                &Filter::eq("fingerprint", fingerprint.fingerprint.as_str()),
            )?);
        }

        let Some(locator) = candidates
            .iter()
            .find(|locator| fingerprints.iter().any(|fp| locator.fingerprint_matches(fp)))
        else {
            return Ok(None);
        };

        let Some(page) = self.get_page(&locator.normalized_url)? else {
            log::warn!("locator points at missing page {}", locator.normalized_url);
            return Ok(None);
        };

        Ok(Some(ResolvedIdentity {
            locators: self.find_locators_by_normalized_url(&page.url)?,
            identifier: ContentIdentifier {
                normalized_url: page.url,
                full_url: page.full_url,
            },
        }))
    }

    pub fn find_locators_by_normalized_url(&self, normalized_url: &str) -> StoreResult<Vec<Locator>> {
        self.store
            .find_all(Collection::Locators, &Filter::eq("normalized_url", normalized_url))
    }

    /// Stores the locators not already known for the identifier (same
    /// fingerprint and same original location). Returns how many were stored.
    pub fn store_locators(
        &self,
        identifier: &ContentIdentifier,
        locators: &[Locator],
    ) -> StoreResult<usize> {
        let mut known = self.find_locators_by_normalized_url(&identifier.normalized_url)?;
        let mut stored = 0;

        for locator in locators {
            let locator = Locator {
                normalized_url: identifier.normalized_url.clone(),
                ..locator.clone()
            };
            if known.iter().any(|existing| existing.same_as(&locator)) {
                continue;
            }
            self.store.create(Collection::Locators, &locator)?;
            known.push(locator);
            stored += 1;
        }

        Ok(stored)
    }
}
