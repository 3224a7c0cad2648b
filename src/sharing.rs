//! Local view of annotation sharing: share metadata and privacy levels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    annotations::PreAnnotationDelete,
    db::{Collection, Filter, ObjectStore},
    eid::Eid,
    errors::StoreResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationPrivacyLevels {
    #[default]
    Private,
    Shared,
    SharedProtected,
    Protected,
}

impl AnnotationPrivacyLevels {
    /// Protected annotations are skipped by bulk share/unshare of a page.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            AnnotationPrivacyLevels::Protected | AnnotationPrivacyLevels::SharedProtected
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedAnnotationMetadata {
    pub local_id: String,
    pub remote_id: String,
    #[serde(default)]
    pub exclude_from_lists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPrivacyLevel {
    pub annotation: String,
    pub privacy_level: AnnotationPrivacyLevels,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_when: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_when: Option<DateTime<Utc>>,
}

/// Sharing state consulted when assembling search results.
pub trait SharingLookup: Send + Sync {
    /// Shared and visible in shared lists.
    fn is_shared(&self, annotation_url: &str) -> StoreResult<bool>;

    fn is_bulk_share_protected(&self, annotation_url: &str) -> StoreResult<bool>;
}

pub struct SharingStorage {
    store: Arc<dyn ObjectStore>,
}

impl SharingStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn get_metadata(&self, annotation_url: &str) -> StoreResult<Option<SharedAnnotationMetadata>> {
        self.store.find_one(
            Collection::SharedAnnotationMetadata,
            &Filter::eq("local_id", annotation_url),
        )
    }

    /// Marks the annotation as shared and returns its remote id. Sharing an
    /// already shared annotation only updates `exclude_from_lists`.
    pub fn share_annotation(&self, annotation_url: &str, exclude_from_lists: bool) -> StoreResult<String> {
        if let Some(existing) = self.get_metadata(annotation_url)? {
            if existing.exclude_from_lists != exclude_from_lists {
                let mut updates = Map::new();
                updates.insert("exclude_from_lists".to_string(), Value::from(exclude_from_lists));
                self.store.update_one(
                    Collection::SharedAnnotationMetadata,
                    &Filter::eq("local_id", annotation_url),
                    &updates,
                )?;
            }
            return Ok(existing.remote_id);
        }

        let remote_id = Eid::new().to_string();
        self.store.create(
            Collection::SharedAnnotationMetadata,
            &SharedAnnotationMetadata {
                local_id: annotation_url.to_string(),
                remote_id: remote_id.clone(),
                exclude_from_lists,
            },
        )?;

        if self.get_privacy_level(annotation_url)? == AnnotationPrivacyLevels::Private {
            self.set_annotation_privacy_level(annotation_url, AnnotationPrivacyLevels::Shared)?;
        }

        log::debug!("shared annotation {annotation_url} as {remote_id}");
        Ok(remote_id)
    }

    /// Returns whether the annotation was shared.
    pub fn unshare_annotation(&self, annotation_url: &str) -> StoreResult<bool> {
        let removed = self.store.delete_all(
            Collection::SharedAnnotationMetadata,
            &Filter::eq("local_id", annotation_url),
        )?;

        match self.get_privacy_level(annotation_url)? {
            AnnotationPrivacyLevels::Shared => {
                self.set_annotation_privacy_level(annotation_url, AnnotationPrivacyLevels::Private)?
            }
            AnnotationPrivacyLevels::SharedProtected => {
                self.set_annotation_privacy_level(annotation_url, AnnotationPrivacyLevels::Protected)?
            }
            _ => {}
        }

        Ok(removed > 0)
    }

    /// Private when no level was ever set.
    pub fn get_privacy_level(&self, annotation_url: &str) -> StoreResult<AnnotationPrivacyLevels> {
        let level: Option<AnnotationPrivacyLevel> = self.store.find_one(
            Collection::AnnotationPrivacyLevels,
            &Filter::eq("annotation", annotation_url),
        )?;
        Ok(level.map(|level| level.privacy_level).unwrap_or_default())
    }

    pub fn set_annotation_privacy_level(
        &self,
        annotation_url: &str,
        privacy_level: AnnotationPrivacyLevels,
    ) -> StoreResult<()> {
        let filter = Filter::eq("annotation", annotation_url);
        let now = Utc::now();

        if self.store.exists(Collection::AnnotationPrivacyLevels, &filter)? {
            let mut updates = Map::new();
            updates.insert(
                "privacy_level".to_string(),
                serde_json::to_value(privacy_level)?,
            );
            updates.insert("updated_when".to_string(), Value::from(now.timestamp_millis()));
            self.store
                .update_one(Collection::AnnotationPrivacyLevels, &filter, &updates)?;
            return Ok(());
        }

        self.store.create(
            Collection::AnnotationPrivacyLevels,
            &AnnotationPrivacyLevel {
                annotation: annotation_url.to_string(),
                privacy_level,
                created_when: now,
                updated_when: None,
            },
        )
    }
}

impl SharingLookup for SharingStorage {
    fn is_shared(&self, annotation_url: &str) -> StoreResult<bool> {
        Ok(self
            .get_metadata(annotation_url)?
            .is_some_and(|metadata| !metadata.exclude_from_lists))
    }

    fn is_bulk_share_protected(&self, annotation_url: &str) -> StoreResult<bool> {
        Ok(self.get_privacy_level(annotation_url)?.is_protected())
    }
}

/// Share metadata and privacy level go with the annotation.
impl PreAnnotationDelete for SharingStorage {
    fn pre_annotation_delete(&self, annotation_url: &str) -> StoreResult<()> {
        self.store.delete_all(
            Collection::SharedAnnotationMetadata,
            &Filter::eq("local_id", annotation_url),
        )?;
        self.store.delete_all(
            Collection::AnnotationPrivacyLevels,
            &Filter::eq("annotation", annotation_url),
        )?;
        Ok(())
    }
}
