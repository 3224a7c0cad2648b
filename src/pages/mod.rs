//! Saved pages, their visits, favicons and content locators.

pub mod pipeline;
pub mod storage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use pipeline::{build_page, PageData};
pub use storage::PageStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Html,
    Pdf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Normalized URL, the page identity.
    pub url: String,
    pub full_url: String,
    pub hostname: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,

    /// Body terms.
    #[serde(default)]
    pub terms: Vec<String>,
    #[serde(default)]
    pub title_terms: Vec<String>,
    #[serde(default)]
    pub url_terms: Vec<String>,
}

impl Page {
    /// Placeholder pages (e.g. created by a bookmark) have no indexed content.
    pub fn is_stub(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty) && self.terms.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitInteraction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_px: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_perc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_max_px: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_max_perc: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub interaction: VisitInteraction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavIcon {
    pub hostname: String,
    /// Data URL of the icon.
    pub fav_icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintScheme {
    PdfV1,
    PdfV2,
    HtmlV1,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint {
    pub fingerprint_scheme: FingerprintScheme,
    pub fingerprint: String,
}

/// SHA-256 fingerprint of raw content bytes.
pub fn fingerprint_content(scheme: FingerprintScheme, content: &[u8]) -> ContentFingerprint {
    ContentFingerprint {
        fingerprint_scheme: scheme,
        fingerprint: hex::encode(Sha256::digest(content)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Remote,
    Local,
}

/// Where a piece of content was found, tied to the page it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    /// Set from the owning page when stored.
    #[serde(default)]
    pub normalized_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_scheme: Option<FingerprintScheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub location: String,
    pub original_location: String,
    pub location_type: LocationType,
    #[serde(default)]
    pub primary: bool,
    #[serde(default = "default_valid")]
    pub valid: bool,
    #[serde(default)]
    pub version: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_when: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_checked: Option<DateTime<Utc>>,
}

fn default_valid() -> bool {
    true
}

impl Locator {
    pub fn fingerprint(&self) -> Option<ContentFingerprint> {
        Some(ContentFingerprint {
            fingerprint_scheme: self.fingerprint_scheme?,
            fingerprint: self.fingerprint.clone()?,
        })
    }

    pub fn fingerprint_matches(&self, other: &ContentFingerprint) -> bool {
        self.fingerprint().as_ref() == Some(other)
    }

    /// Same fingerprint (both absent counts as equal) and same original location.
    pub fn same_as(&self, other: &Locator) -> bool {
        self.fingerprint() == other.fingerprint() && self.original_location == other.original_location
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIdentifier {
    pub normalized_url: String,
    pub full_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    pub identifier: ContentIdentifier,
    pub locators: Vec<Locator>,
}
