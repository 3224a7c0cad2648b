use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Annotation, AnnotationCreate, AnnotationStorage, PreAnnotationDelete, TagDiff};
use crate::{
    errors::{StoreError, StoreResult},
    sharing::SharingStorage,
    url::is_full_url,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAnnotationParams {
    #[serde(default)]
    pub url: Option<String>,
    /// Full url of the annotated page.
    pub page_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub selector: Option<Value>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_when: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub skip_page_indexing: bool,
}

impl CreateAnnotationParams {
    /// Neither a comment nor a highlighted body.
    pub fn is_empty(&self) -> bool {
        [&self.comment, &self.body]
            .into_iter()
            .all(|text| text.as_deref().map_or(true, |text| text.trim().is_empty()))
    }
}

pub struct AnnotationService {
    pub storage: AnnotationStorage,
    sharing: Arc<SharingStorage>,
    pre_delete: Arc<dyn PreAnnotationDelete>,
}

impl AnnotationService {
    pub fn new(
        storage: AnnotationStorage,
        sharing: Arc<SharingStorage>,
        pre_delete: Arc<dyn PreAnnotationDelete>,
    ) -> Self {
        Self {
            storage,
            sharing,
            pre_delete,
        }
    }

    pub fn create_annotation(&self, params: CreateAnnotationParams) -> StoreResult<Annotation> {
        if !is_full_url(&params.page_url) {
            return Err(StoreError::validation(format!(
                "annotated page needs a full url, got {}",
                params.page_url
            )));
        }

        let annotation = self.storage.create_annotation(AnnotationCreate {
            url: params.url,
            page_url: params.page_url,
            page_title: params.title,
            comment: params.comment,
            body: params.body,
            selector: params.selector,
            created_when: params.created_when,
        })?;

        if params.is_bookmarked {
            self.storage.update_annotation_bookmark(&annotation.url, true)?;
        }

        log::info!("annotated {}", annotation.page_url);
        Ok(annotation)
    }

    /// Deletes an annotation together with everything that references it.
    ///
    /// Steps run in order and each one only removes what is still there, so
    /// a cascade stopped by a failing step completes when called again.
    pub fn delete_annotation(&self, url: &str) -> StoreResult<()> {
        let exists = self.storage.get_annotation_by_pk(url)?.is_some();
        let has_refs = self.storage.annot_has_bookmark(url)?
            || !self.storage.find_list_entries_by_url(url)?.is_empty()
            || !self.storage.get_tags_by_annotation_url(url)?.is_empty();
        if !exists && !has_refs {
            return Err(StoreError::not_found(format!("annotation {url}")));
        }

        self.storage.delete_bookmark_by_url(url)?;
        self.storage.delete_list_entries_by_url(url)?;
        self.storage.delete_tags_by_url(url)?;
        self.pre_delete.pre_annotation_delete(url)?;
        self.storage.delete_annotation(url)?;

        log::info!("deleted annotation {url}");
        Ok(())
    }

    /// Replaces the annotation's tags with `tags`, touching only the
    /// difference.
    pub fn update_annotation_tags(&self, url: &str, tags: &[String]) -> StoreResult<TagDiff> {
        if self.storage.get_annotation_by_pk(url)?.is_none() {
            return Err(StoreError::not_found(format!("annotation {url}")));
        }

        let existing = self.storage.get_tags_by_annotation_url(url)?;
        let mut seen = HashSet::new();
        let incoming: Vec<String> = tags
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
            .collect();

        let diff = TagDiff {
            added: incoming
                .iter()
                .filter(|tag| !existing.contains(tag))
                .cloned()
                .collect(),
            removed: existing
                .iter()
                .filter(|tag| !incoming.contains(tag))
                .cloned()
                .collect(),
        };

        self.storage
            .edit_annotation_tags(&diff.added, &diff.removed, url)?;
        Ok(diff)
    }

    /// Removes every annotation of the page from the list. Returns how many
    /// entries were removed.
    pub fn remove_child_annotations_from_list(&self, page_url: &str, list_id: i64) -> StoreResult<usize> {
        let mut removed = 0;
        for annotation in self.storage.list_annotations_by_page_url(page_url)? {
            removed += self.storage.remove_annot_from_list(list_id, &annotation.url)?;
        }
        Ok(removed)
    }

    /// Shares the annotation and adds it to each list.
    pub fn share_annotation_to_lists(&self, url: &str, list_ids: &[i64]) -> StoreResult<String> {
        if self.storage.get_annotation_by_pk(url)?.is_none() {
            return Err(StoreError::not_found(format!("annotation {url}")));
        }

        let remote_id = self.sharing.share_annotation(url, false)?;
        for list_id in list_ids {
            self.storage.insert_annot_to_list(*list_id, url)?;
        }
        Ok(remote_id)
    }
}
