use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::{Collection, Filter, ObjectStore},
    errors::{StoreError, StoreResult},
    url::normalize_url,
};

/// At most one bookmark exists per page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
}

pub struct BookmarksStorage {
    store: Arc<dyn ObjectStore>,
}

impl BookmarksStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fails with a storage error when the page is already bookmarked.
    pub fn add_bookmark(&self, url: &str, time: DateTime<Utc>) -> StoreResult<()> {
        self.store.create(
            Collection::Bookmarks,
            &Bookmark {
                url: normalize_url(url),
                time,
            },
        )
    }

    pub fn create_bookmark_if_needed(&self, url: &str, time: DateTime<Utc>) -> StoreResult<bool> {
        if self.page_has_bookmark(url)? {
            return Ok(false);
        }
        self.add_bookmark(url, time)?;
        Ok(true)
    }

    pub fn del_bookmark(&self, url: &str) -> StoreResult<()> {
        let url = normalize_url(url);
        if self
            .store
            .delete_one(Collection::Bookmarks, &Filter::eq("url", url.as_str()))?
            == 0
        {
            return Err(StoreError::not_found(format!("bookmark for {url}")));
        }
        Ok(())
    }

    pub fn page_has_bookmark(&self, url: &str) -> StoreResult<bool> {
        self.store
            .exists(Collection::Bookmarks, &Filter::eq("url", normalize_url(url)))
    }

    pub fn get_bookmark(&self, url: &str) -> StoreResult<Option<Bookmark>> {
        self.store
            .find_one(Collection::Bookmarks, &Filter::eq("url", normalize_url(url)))
    }

    /// Bookmark state for each of the given tab URLs, keyed by the URL as
    /// passed in.
    pub fn find_tab_bookmarks(&self, urls: &[String]) -> StoreResult<HashMap<String, bool>> {
        let normalized: Vec<String> = urls.iter().map(|url| normalize_url(url)).collect();
        let found: Vec<Bookmark> = self.store.find_all(
            Collection::Bookmarks,
            &Filter::all().and_in("url", normalized.iter().cloned()),
        )?;

        Ok(urls
            .iter()
            .zip(normalized)
            .map(|(url, normalized)| {
                let bookmarked = found.iter().any(|bookmark| bookmark.url == normalized);
                (url.clone(), bookmarked)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::TimeZone;

    fn setup() -> BookmarksStorage {
        BookmarksStorage::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_add_and_delete_bookmark() {
        let bookmarks = setup();
        let time = Utc.timestamp_millis_opt(5_000).unwrap();

        bookmarks.add_bookmark("https://www.lorem.com/ipsum", time).unwrap();
        assert!(bookmarks.page_has_bookmark("lorem.com/ipsum").unwrap());
        assert_eq!(bookmarks.get_bookmark("lorem.com/ipsum").unwrap().unwrap().time, time);

        // one bookmark per page
        assert!(matches!(
            bookmarks.add_bookmark("lorem.com/ipsum", time),
            Err(StoreError::Storage(_))
        ));
        assert!(!bookmarks.create_bookmark_if_needed("lorem.com/ipsum", time).unwrap());

        bookmarks.del_bookmark("http://lorem.com/ipsum/").unwrap();
        assert!(!bookmarks.page_has_bookmark("lorem.com/ipsum").unwrap());
        assert!(matches!(
            bookmarks.del_bookmark("lorem.com/ipsum"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_tab_bookmarks_keeps_input_urls() {
        let bookmarks = setup();
        bookmarks
            .add_bookmark("lorem.com", Utc.timestamp_millis_opt(1).unwrap())
            .unwrap();

        let tabs = vec![
            "https://www.lorem.com/".to_string(),
            "https://ipsum.com".to_string(),
        ];
        let found = bookmarks.find_tab_bookmarks(&tabs).unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found["https://www.lorem.com/"], true);
        assert_eq!(found["https://ipsum.com"], false);
    }
}
