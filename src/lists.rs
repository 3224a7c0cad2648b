//! Custom lists (collections) of pages and annotations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::{Collection, Filter, FindOpts, ObjectStore, Order},
    errors::{StoreError, StoreResult},
    url::normalize_url,
};

/// Lists the system creates on demand. Their ids are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialList {
    Inbox,
    Mobile,
    SavedFromMobile,
}

impl SpecialList {
    pub const ALL: [SpecialList; 3] = [
        SpecialList::Inbox,
        SpecialList::Mobile,
        SpecialList::SavedFromMobile,
    ];

    pub fn id(&self) -> i64 {
        match self {
            SpecialList::Inbox => 20201014,
            SpecialList::Mobile => 20201015,
            SpecialList::SavedFromMobile => 20201016,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpecialList::Inbox => "Inbox",
            SpecialList::Mobile => "Mobile",
            SpecialList::SavedFromMobile => "Saved from Mobile",
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|list| list.id() == id)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|list| list.name().eq_ignore_ascii_case(name.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomList {
    pub id: i64,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deletable: bool,
    #[serde(default)]
    pub is_nestable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageListEntry {
    pub list_id: i64,
    pub page_url: String,
    pub full_url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

pub struct ListsStorage {
    store: Arc<dyn ObjectStore>,
}

impl ListsStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Creates a user list. Ids are creation epoch millis, bumped past any
    /// existing id.
    pub fn create_custom_list(&self, name: &str) -> StoreResult<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::validation("list name cannot be empty"));
        }
        if SpecialList::from_name(name).is_some() {
            return Err(StoreError::validation(format!(
                "list name \"{name}\" is reserved"
            )));
        }

        let now = Utc::now();
        let mut id = now.timestamp_millis();
        while self.get_list_by_id(id)?.is_some() {
            id += 1;
        }

        self.store.create(
            Collection::CustomLists,
            &CustomList {
                id,
                name: name.to_string(),
                created_at: now,
                is_deletable: true,
                is_nestable: true,
            },
        )?;
        log::info!("created list \"{name}\" ({id})");
        Ok(id)
    }

    pub fn ensure_special_list(&self, list: SpecialList) -> StoreResult<i64> {
        if self.get_list_by_id(list.id())?.is_none() {
            log::debug!("creating special list {}", list.name());
            self.store.create(
                Collection::CustomLists,
                &CustomList {
                    id: list.id(),
                    name: list.name().to_string(),
                    created_at: Utc::now(),
                    is_deletable: false,
                    is_nestable: false,
                },
            )?;
        }
        Ok(list.id())
    }

    pub fn get_list_by_id(&self, id: i64) -> StoreResult<Option<CustomList>> {
        self.store.find_one(Collection::CustomLists, &Filter::eq("id", id))
    }

    pub fn get_lists(&self) -> StoreResult<Vec<CustomList>> {
        self.store.find_sorted(
            Collection::CustomLists,
            &Filter::all(),
            &FindOpts::sorted("created_at", Order::Desc),
        )
    }

    /// Removes a user list along with its page and annotation entries.
    pub fn remove_list(&self, id: i64) -> StoreResult<()> {
        if let Some(special) = SpecialList::from_id(id) {
            return Err(StoreError::validation(format!(
                "{} list cannot be removed",
                special.name()
            )));
        }
        if self
            .store
            .delete_one(Collection::CustomLists, &Filter::eq("id", id))?
            == 0
        {
            return Err(StoreError::not_found(format!("list {id}")));
        }

        let by_list = Filter::eq("list_id", id);
        let pages = self.store.delete_all(Collection::PageListEntries, &by_list)?;
        let annots = self.store.delete_all(Collection::AnnotListEntries, &by_list)?;
        log::info!("removed list {id} with {pages} page and {annots} annotation entries");
        Ok(())
    }

    /// Returns whether a new entry was written.
    pub fn insert_page_to_list(&self, list_id: i64, full_url: &str) -> StoreResult<bool> {
        if self.get_list_by_id(list_id)?.is_none() {
            return Err(StoreError::not_found(format!("list {list_id}")));
        }

        let page_url = normalize_url(full_url);
        let entry_filter = Filter::eq("list_id", list_id).and_eq("page_url", page_url.as_str());
        if self.store.exists(Collection::PageListEntries, &entry_filter)? {
            return Ok(false);
        }

        self.store.create(
            Collection::PageListEntries,
            &PageListEntry {
                list_id,
                page_url,
                full_url: full_url.trim().to_string(),
                created_at: Utc::now(),
            },
        )?;
        Ok(true)
    }

    pub fn remove_page_from_list(&self, list_id: i64, url: &str) -> StoreResult<usize> {
        self.store.delete_all(
            Collection::PageListEntries,
            &Filter::eq("list_id", list_id).and_eq("page_url", normalize_url(url)),
        )
    }

    pub fn get_list_ids_for_page(&self, url: &str) -> StoreResult<Vec<i64>> {
        let entries: Vec<PageListEntry> = self.store.find_all(
            Collection::PageListEntries,
            &Filter::eq("page_url", normalize_url(url)),
        )?;
        Ok(entries.into_iter().map(|entry| entry.list_id).collect())
    }

    pub fn page_list_entries(&self, list_id: i64) -> StoreResult<Vec<PageListEntry>> {
        self.store.find_sorted(
            Collection::PageListEntries,
            &Filter::eq("list_id", list_id),
            &FindOpts::sorted("created_at", Order::Desc),
        )
    }
}
