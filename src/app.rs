use std::{
    collections::BTreeSet,
    path::Path,
    sync::{Arc, RwLock, RwLockReadGuard},
    time::Instant,
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    annotations::{
        Annotation, AnnotationService, AnnotationStorage, AnnotationView, CreateAnnotationParams,
        Tag, TagDiff,
    },
    bookmarks::BookmarksStorage,
    config::Config,
    db::{Collection, Filter, MemoryStore, ObjectStore},
    errors::{StoreError, StoreResult},
    lists::{CustomList, ListsStorage, SpecialList},
    pages::{
        build_page, ContentFingerprint, ContentIdentifier, Locator, Page, PageData, PageStorage,
        ResolvedIdentity,
    },
    search::{
        AnnotSearchParams, AnnotationsSearchResult, PageSearchResult, SearchParams,
        SearchRequest, Searcher,
    },
    sharing::SharingStorage,
    storage::{BackendLocal, StorageManager},
    url::{is_full_url, normalize_url},
};

const DB_DIR: &str = "db";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexOpts {
    /// Put newly created pages into the Inbox list.
    #[serde(default)]
    pub add_inbox_entry_on_create: bool,
    /// Data URL of the page's favicon.
    #[serde(default)]
    pub fav_icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub page: Page,
    /// No page existed under this url before.
    pub created: bool,
}

/// Every operation exposed to the CLI and the daemon.
pub struct App {
    store: Arc<dyn ObjectStore>,
    memory: Option<MemoryStore>,
    config: Arc<RwLock<Config>>,

    pub pages: PageStorage,
    pub bookmarks: BookmarksStorage,
    pub lists: ListsStorage,
    pub sharing: Arc<SharingStorage>,
    pub annotations: AnnotationService,
    search: Searcher,
}

impl App {
    pub fn new(store: Arc<dyn ObjectStore>, config: Arc<RwLock<Config>>) -> Self {
        let sharing = Arc::new(SharingStorage::new(store.clone()));

        Self {
            pages: PageStorage::new(store.clone()),
            bookmarks: BookmarksStorage::new(store.clone()),
            lists: ListsStorage::new(store.clone()),
            annotations: AnnotationService::new(
                AnnotationStorage::new(store.clone()),
                sharing.clone(),
                sharing.clone(),
            ),
            search: Searcher::new(store.clone(), sharing.clone()),
            sharing,
            store,
            memory: None,
            config,
        }
    }

    /// Opens the collections under the configured base path, or an empty
    /// in-memory store when persistence is off.
    pub fn load(config: Arc<RwLock<Config>>) -> anyhow::Result<Self> {
        let now = Instant::now();
        let (persist, base_path) = {
            let config = config
                .read()
                .map_err(|err| anyhow::anyhow!("config lock poisoned: {err}"))?;
            (config.persist, config.base_path().to_string())
        };

        let memory = if persist {
            let db_path = Path::new(&base_path).join(DB_DIR);
            let backend: Arc<dyn StorageManager> = Arc::new(
                BackendLocal::new(&db_path)
                    .with_context(|| format!("couldn't open {}", db_path.display()))?,
            );
            MemoryStore::load(backend)?
        } else {
            log::warn!("persistence is off, nothing will be saved");
            MemoryStore::new()
        };

        log::debug!(
            "took {}ms to open the store",
            now.elapsed().as_micros() as f64 / 1000.0
        );

        let mut app = App::new(Arc::new(memory.clone()), config);
        app.memory = Some(memory);
        Ok(app)
    }

    pub fn flush(&self) -> StoreResult<()> {
        match &self.memory {
            Some(memory) => memory.flush(),
            None => Ok(()),
        }
    }

    fn config(&self) -> StoreResult<RwLockReadGuard<'_, Config>> {
        self.config
            .read()
            .map_err(|err| StoreError::Storage(format!("config lock poisoned: {err}")))
    }

    pub fn get_config(&self) -> StoreResult<Config> {
        Ok(self.config()?.clone())
    }

    /// Converts a wire request, filling in the configured page size.
    pub fn search_params(&self, request: SearchRequest) -> StoreResult<SearchParams> {
        let limit = self.config()?.default_search_limit;
        request.into_params(limit)
    }

    /// Creates the page, re-indexes a stub, or merges new content into an
    /// existing page. Records a visit when `visit_time` is given.
    pub fn index_page(
        &self,
        data: PageData,
        visit_time: Option<DateTime<Utc>>,
        opts: IndexOpts,
    ) -> StoreResult<IndexOutcome> {
        let page = build_page(&data);
        let created = match self.pages.get_page(&page.url)? {
            None => {
                self.pages.create_page(&page)?;
                true
            }
            Some(existing) if existing.is_stub() => {
                self.pages.create_page_if_not_exists_or_is_stub(&page)?;
                false
            }
            Some(existing) => {
                self.pages.update_page(&page, &existing)?;
                false
            }
        };

        if let Some(time) = visit_time {
            self.pages.create_visits_if_needed(&page.url, &[time])?;
        }
        if let Some(fav_icon) = &opts.fav_icon {
            self.pages.create_fav_icon_if_needed(&page.hostname, fav_icon)?;
        }
        if created && opts.add_inbox_entry_on_create {
            let inbox = self.lists.ensure_special_list(SpecialList::Inbox)?;
            self.lists.insert_page_to_list(inbox, &page.full_url)?;
        }

        log::info!(
            "{} {}",
            if created { "indexed" } else { "re-indexed" },
            page.url
        );

        let stored = self
            .pages
            .get_page(&page.url)?
            .ok_or_else(|| StoreError::not_found(format!("page {}", page.url)))?;
        Ok(IndexOutcome {
            page: stored,
            created,
        })
    }

    /// Bookmarks the page, creating a stub for unknown pages. The first
    /// bookmark of a page also files it into the Inbox.
    pub fn add_page_bookmark(&self, full_url: &str, time: Option<DateTime<Utc>>) -> StoreResult<()> {
        let time = time.unwrap_or_else(Utc::now);
        let page = build_page(&PageData::stub(full_url));

        self.pages.create_page_if_not_exists(&page)?;
        self.pages.create_visits_if_needed(&page.url, &[time])?;

        if !self.bookmarks.create_bookmark_if_needed(&page.url, time)? {
            log::debug!("{} is already bookmarked", page.url);
            return Ok(());
        }

        let inbox = self.lists.ensure_special_list(SpecialList::Inbox)?;
        if !self.lists.get_list_ids_for_page(&page.url)?.contains(&inbox) {
            self.lists.insert_page_to_list(inbox, full_url)?;
        }

        log::info!("bookmarked {}", page.url);
        Ok(())
    }

    /// Returns whether the page itself was deleted along with the bookmark.
    pub fn del_page_bookmark(&self, url: &str) -> StoreResult<bool> {
        self.bookmarks.del_bookmark(url)?;
        self.pages.delete_page_if_orphaned(url)
    }

    /// `None` when no stored locator carries any of the fingerprints; the
    /// caller indexes a new page then.
    pub fn resolve_content_identity(
        &self,
        fingerprints: &[ContentFingerprint],
    ) -> StoreResult<Option<ResolvedIdentity>> {
        self.pages.get_content_identifier(fingerprints)
    }

    /// Ties the locators to an indexed page. Returns how many were new.
    pub fn store_locators(&self, full_url: &str, locators: &[Locator]) -> StoreResult<usize> {
        let normalized_url = normalize_url(full_url);
        if !self.pages.page_exists(&normalized_url)? {
            return Err(StoreError::not_found(format!("page {normalized_url}")));
        }

        let stored = self.pages.store_locators(
            &ContentIdentifier {
                normalized_url,
                full_url: full_url.to_string(),
            },
            locators,
        )?;
        log::debug!("stored {stored} new locators for {full_url}");
        Ok(stored)
    }

    /// Indexes the annotated page first unless told otherwise.
    pub fn create_annotation(&self, params: CreateAnnotationParams) -> StoreResult<Annotation> {
        if !is_full_url(&params.page_url) {
            return Err(StoreError::validation(format!(
                "annotated page needs a full url, got {}",
                params.page_url
            )));
        }
        if params.is_empty() {
            return Err(StoreError::validation(
                "annotation must have a comment or a highlighted body",
            ));
        }
        if !params.skip_page_indexing && !self.pages.page_exists(&params.page_url)? {
            self.index_page(
                PageData {
                    full_url: params.page_url.clone(),
                    title: params.title.clone(),
                    ..Default::default()
                },
                None,
                IndexOpts::default(),
            )?;
        }
        self.annotations.create_annotation(params)
    }

    pub fn edit_annotation(&self, url: &str, comment: &str) -> StoreResult<()> {
        self.annotations.storage.edit_annotation(url, comment)
    }

    pub fn delete_annotation(&self, url: &str) -> StoreResult<()> {
        self.annotations.delete_annotation(url)
    }

    pub fn update_annotation_tags(&self, url: &str, tags: &[String]) -> StoreResult<TagDiff> {
        self.annotations.update_annotation_tags(url, tags)
    }

    pub fn set_annotation_bookmark(&self, url: &str, is_bookmarked: bool) -> StoreResult<()> {
        self.annotations
            .storage
            .update_annotation_bookmark(url, is_bookmarked)
    }

    /// Returns the remote id the annotation is shared under.
    pub fn share_annotation(&self, url: &str, list_ids: &[i64]) -> StoreResult<String> {
        self.annotations.share_annotation_to_lists(url, list_ids)
    }

    pub fn unshare_annotation(&self, url: &str) -> StoreResult<bool> {
        self.sharing.unshare_annotation(url)
    }

    pub fn search_pages(&self, params: &SearchParams) -> StoreResult<PageSearchResult> {
        self.search.search_pages(params)
    }

    pub fn search_annotations(&self, params: &SearchParams) -> StoreResult<AnnotationsSearchResult> {
        self.search.search_annotations(params)
    }

    /// The page's annotations that pass `request`'s filters, newest first.
    /// Without a limit, the configured by-url limit applies.
    pub fn get_all_annotations_by_url(
        &self,
        url: &str,
        request: SearchRequest,
    ) -> StoreResult<Vec<AnnotationView>> {
        let default_limit = self.config()?.default_annots_by_url_limit;
        let filters = request.into_params(default_limit)?;
        self.search.get_all_annotations_by_url(&AnnotSearchParams {
            url: url.to_string(),
            limit: filters.limit,
            skip: filters.skip,
            filters,
        })
    }

    /// Every tag name in use, sorted.
    pub fn tags(&self) -> StoreResult<Vec<String>> {
        let tags: Vec<Tag> = self.store.find_all(Collection::Tags, &Filter::all())?;
        Ok(tags
            .into_iter()
            .map(|tag| tag.name)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    pub fn create_list(&self, name: &str) -> StoreResult<i64> {
        self.lists.create_custom_list(name)
    }

    pub fn get_lists(&self) -> StoreResult<Vec<CustomList>> {
        self.lists.get_lists()
    }

    pub fn remove_list(&self, list_id: i64) -> StoreResult<()> {
        self.lists.remove_list(list_id)
    }

    pub fn add_page_to_list(&self, list_id: i64, full_url: &str) -> StoreResult<bool> {
        if let Some(special) = SpecialList::from_id(list_id) {
            self.lists.ensure_special_list(special)?;
        }
        self.lists.insert_page_to_list(list_id, full_url)
    }
}
