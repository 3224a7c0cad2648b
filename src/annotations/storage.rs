use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use serde_json::{Map, Value};

use super::{generate_annotation_url, AnnotBookmark, AnnotListEntry, Annotation, AnnotationCreate, Tag};
use crate::{
    db::{Collection, Filter, FindOpts, ObjectStore, Order},
    errors::{StoreError, StoreResult},
    search::terms::extract_terms,
    url::{is_full_url, normalize_url},
};

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn clean_tag(tag: &str) -> Option<String> {
    let tag = tag.trim();
    (!tag.is_empty()).then(|| tag.to_string())
}

pub struct AnnotationStorage {
    store: Arc<dyn ObjectStore>,
}

impl AnnotationStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Validates before anything is written.
    pub fn create_annotation(&self, create: AnnotationCreate) -> StoreResult<Annotation> {
        let comment = non_empty(&create.comment).map(String::from);
        let body = non_empty(&create.body).map(String::from);
        if comment.is_none() && body.is_none() {
            return Err(StoreError::validation(
                "annotation must have a comment or a highlighted body",
            ));
        }

        let now = Utc::now();
        let created_when = create.created_when.unwrap_or(now);
        let url = match create.url {
            Some(url) if is_full_url(&url) => {
                return Err(StoreError::validation(format!(
                    "annotation id must be relative, got {url}"
                )))
            }
            Some(url) => url,
            None => generate_annotation_url(&create.page_url, created_when),
        };

        let annotation = Annotation {
            url,
            page_url: normalize_url(&create.page_url),
            page_title: create.page_title,
            body_terms: body.as_deref().map(extract_terms).unwrap_or_default(),
            comment_terms: comment.as_deref().map(extract_terms).unwrap_or_default(),
            comment,
            body,
            selector: create.selector,
            created_when,
            last_edited: created_when,
        };

        self.store.create(Collection::Annotations, &annotation)?;
        log::debug!("created annotation {}", annotation.url);
        Ok(annotation)
    }

    pub fn get_annotation_by_pk(&self, url: &str) -> StoreResult<Option<Annotation>> {
        self.store
            .find_one(Collection::Annotations, &Filter::eq("url", url))
    }

    pub fn get_annotations_by_pks(&self, urls: &[String]) -> StoreResult<Vec<Annotation>> {
        self.store.find_all(
            Collection::Annotations,
            &Filter::all().and_in("url", urls.iter().cloned()),
        )
    }

    /// Newest first.
    pub fn list_annotations_by_page_url(&self, page_url: &str) -> StoreResult<Vec<Annotation>> {
        self.store.find_sorted(
            Collection::Annotations,
            &Filter::eq("page_url", normalize_url(page_url)),
            &FindOpts::sorted("created_when", Order::Desc),
        )
    }

    /// Replaces the comment. Clearing it is only allowed on highlights, and
    /// stores no comment at all.
    pub fn edit_annotation(&self, url: &str, comment: &str) -> StoreResult<()> {
        let Some(existing) = self.get_annotation_by_pk(url)? else {
            return Err(StoreError::not_found(format!("annotation {url}")));
        };

        let comment = comment.trim();
        let has_body = existing.body.as_deref().is_some_and(|body| !body.trim().is_empty());
        if comment.is_empty() && !has_body {
            return Err(StoreError::validation(format!(
                "annotation {url} would have neither a comment nor a highlighted body"
            )));
        }

        let mut updates = Map::new();
        let comment_value = if comment.is_empty() {
            Value::Null
        } else {
            Value::from(comment)
        };
        updates.insert("comment".to_string(), comment_value);
        updates.insert("comment_terms".to_string(), Value::from(extract_terms(comment)));
        updates.insert(
            "last_edited".to_string(),
            Value::from(Utc::now().timestamp_millis()),
        );

        if self
            .store
            .update_one(Collection::Annotations, &Filter::eq("url", url), &updates)?
            == 0
        {
            return Err(StoreError::not_found(format!("annotation {url}")));
        }
        Ok(())
    }

    pub fn delete_annotation(&self, url: &str) -> StoreResult<usize> {
        self.store
            .delete_all(Collection::Annotations, &Filter::eq("url", url))
    }

    pub fn annot_has_bookmark(&self, url: &str) -> StoreResult<bool> {
        self.store
            .exists(Collection::AnnotBookmarks, &Filter::eq("url", url))
    }

    /// Sets the bookmark flag. A no-op when it already has that value.
    pub fn update_annotation_bookmark(&self, url: &str, is_bookmarked: bool) -> StoreResult<()> {
        if self.get_annotation_by_pk(url)?.is_none() {
            return Err(StoreError::not_found(format!("annotation {url}")));
        }

        if is_bookmarked == self.annot_has_bookmark(url)? {
            return Ok(());
        }
        if is_bookmarked {
            self.store.create(
                Collection::AnnotBookmarks,
                &AnnotBookmark {
                    url: url.to_string(),
                    created_at: Utc::now(),
                },
            )
        } else {
            self.delete_bookmark_by_url(url).map(|_| ())
        }
    }

    /// Returns the new flag.
    pub fn toggle_annot_bookmark(&self, url: &str) -> StoreResult<bool> {
        let flag = !self.annot_has_bookmark(url)?;
        self.update_annotation_bookmark(url, flag)?;
        Ok(flag)
    }

    pub fn delete_bookmark_by_url(&self, url: &str) -> StoreResult<usize> {
        self.store
            .delete_all(Collection::AnnotBookmarks, &Filter::eq("url", url))
    }

    /// Returns whether a new entry was written.
    pub fn insert_annot_to_list(&self, list_id: i64, url: &str) -> StoreResult<bool> {
        if !self
            .store
            .exists(Collection::CustomLists, &Filter::eq("id", list_id))?
        {
            return Err(StoreError::not_found(format!("list {list_id}")));
        }

        let entry = Filter::eq("list_id", list_id).and_eq("url", url);
        if self.store.exists(Collection::AnnotListEntries, &entry)? {
            return Ok(false);
        }

        self.store.create(
            Collection::AnnotListEntries,
            &AnnotListEntry {
                list_id,
                url: url.to_string(),
                created_at: Utc::now(),
            },
        )?;
        Ok(true)
    }

    pub fn remove_annot_from_list(&self, list_id: i64, url: &str) -> StoreResult<usize> {
        self.store.delete_all(
            Collection::AnnotListEntries,
            &Filter::eq("list_id", list_id).and_eq("url", url),
        )
    }

    pub fn find_list_entries_by_url(&self, url: &str) -> StoreResult<Vec<AnnotListEntry>> {
        self.store
            .find_all(Collection::AnnotListEntries, &Filter::eq("url", url))
    }

    pub fn delete_list_entries_by_url(&self, url: &str) -> StoreResult<usize> {
        self.store
            .delete_all(Collection::AnnotListEntries, &Filter::eq("url", url))
    }

    pub fn get_list_ids_for_annotation(&self, url: &str) -> StoreResult<Vec<i64>> {
        Ok(self
            .find_list_entries_by_url(url)?
            .into_iter()
            .map(|entry| entry.list_id)
            .collect())
    }

    /// Adds or removes a single tag. Adding an existing tag and removing a
    /// missing one are no-ops.
    pub fn modify_tags(&self, add: bool, tag: &str, url: &str) -> StoreResult<()> {
        let Some(name) = clean_tag(tag) else {
            return Err(StoreError::validation("tag cannot be empty"));
        };
        let filter = Filter::eq("name", name.as_str()).and_eq("url", url);

        if add {
            if !self.store.exists(Collection::Tags, &filter)? {
                self.store.create(
                    Collection::Tags,
                    &Tag {
                        name,
                        url: url.to_string(),
                    },
                )?;
            }
        } else {
            self.store.delete_all(Collection::Tags, &filter)?;
        }
        Ok(())
    }

    pub fn edit_annotation_tags(&self, add: &[String], del: &[String], url: &str) -> StoreResult<()> {
        for tag in add {
            self.modify_tags(true, tag, url)?;
        }
        for tag in del {
            self.modify_tags(false, tag, url)?;
        }
        Ok(())
    }

    /// Tag names in insertion order, without duplicates.
    pub fn get_tags_by_annotation_url(&self, url: &str) -> StoreResult<Vec<String>> {
        let tags: Vec<Tag> = self.store.find_all(Collection::Tags, &Filter::eq("url", url))?;
        let mut seen = HashSet::new();
        Ok(tags
            .into_iter()
            .map(|tag| tag.name)
            .filter(|name| seen.insert(name.clone()))
            .collect())
    }

    pub fn delete_tags_by_url(&self, url: &str) -> StoreResult<usize> {
        self.store.delete_all(Collection::Tags, &Filter::eq("url", url))
    }
}
