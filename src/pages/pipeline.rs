use serde::{Deserialize, Serialize};

use super::{ContentType, Page};
use crate::{
    search::terms::{extract_terms, extract_url_terms},
    url::{extract_domain, extract_hostname, normalize_url},
};

/// Raw content extracted from a resource, before indexing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageData {
    pub full_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content_type: Option<ContentType>,
}

impl PageData {
    pub fn stub(full_url: &str) -> Self {
        PageData {
            full_url: full_url.to_string(),
            ..Default::default()
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Turns extracted content into an indexable page record.
pub fn build_page(data: &PageData) -> Page {
    let title = non_empty(&data.title);
    let text = non_empty(&data.text);

    Page {
        url: normalize_url(&data.full_url),
        full_url: data.full_url.trim().to_string(),
        hostname: extract_hostname(&data.full_url),
        domain: extract_domain(&data.full_url),
        terms: text.as_deref().map(extract_terms).unwrap_or_default(),
        title_terms: title.as_deref().map(extract_terms).unwrap_or_default(),
        url_terms: extract_url_terms(&data.full_url),
        title,
        text,
        content_type: data.content_type,
    }
}
