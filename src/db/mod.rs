//! Collection-scoped object store.
//!
//! Records are JSON documents grouped into named collections. Storage modules
//! talk to the store through [`ObjectStore`] and convert records to their own
//! types with serde.

mod memory;

use std::cmp::Ordering;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::StoreResult;

pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Pages,
    Visits,
    Bookmarks,
    FavIcons,
    Locators,
    Annotations,
    AnnotBookmarks,
    AnnotListEntries,
    Tags,
    CustomLists,
    PageListEntries,
    SharedAnnotationMetadata,
    AnnotationPrivacyLevels,
}

impl Collection {
    pub const ALL: [Collection; 13] = [
        Collection::Pages,
        Collection::Visits,
        Collection::Bookmarks,
        Collection::FavIcons,
        Collection::Locators,
        Collection::Annotations,
        Collection::AnnotBookmarks,
        Collection::AnnotListEntries,
        Collection::Tags,
        Collection::CustomLists,
        Collection::PageListEntries,
        Collection::SharedAnnotationMetadata,
        Collection::AnnotationPrivacyLevels,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Pages => "pages",
            Collection::Visits => "visits",
            Collection::Bookmarks => "bookmarks",
            Collection::FavIcons => "favIcons",
            Collection::Locators => "locators",
            Collection::Annotations => "annotations",
            Collection::AnnotBookmarks => "annotBookmarks",
            Collection::AnnotListEntries => "annotListEntries",
            Collection::Tags => "tags",
            Collection::CustomLists => "customLists",
            Collection::PageListEntries => "pageListEntries",
            Collection::SharedAnnotationMetadata => "sharedAnnotationMetadata",
            Collection::AnnotationPrivacyLevels => "annotationPrivacyLevels",
        }
    }

    /// Fields that together identify a record. Empty means no constraint.
    pub fn unique_key(&self) -> &'static [&'static str] {
        match self {
            Collection::Pages => &["url"],
            Collection::Visits => &["url", "time"],
            Collection::Bookmarks => &["url"],
            Collection::FavIcons => &["hostname"],
            Collection::Locators => &[],
            Collection::Annotations => &["url"],
            Collection::AnnotBookmarks => &["url"],
            Collection::AnnotListEntries => &["list_id", "url"],
            Collection::Tags => &["name", "url"],
            Collection::CustomLists => &["id"],
            Collection::PageListEntries => &["list_id", "page_url"],
            Collection::SharedAnnotationMetadata => &["local_id"],
            Collection::AnnotationPrivacyLevels => &["annotation"],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Eq(Value),
    In(Vec<Value>),
    /// Array field holds the value.
    Contains(Value),
}

impl Cond {
    fn matches(&self, field: Option<&Value>) -> bool {
        match self {
            Cond::Eq(expected) => field == Some(expected),
            Cond::In(options) => field.is_some_and(|value| options.contains(value)),
            Cond::Contains(expected) => field
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(expected)),
        }
    }
}

/// Conjunction of field conditions. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Vec<(String, Cond)>);

impl Filter {
    pub fn all() -> Self {
        Filter(vec![])
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::all().and_eq(field, value)
    }

    pub fn and_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.push((field.to_string(), Cond::Eq(value.into())));
        self
    }

    pub fn and_in<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.0.push((field.to_string(), Cond::In(values)));
        self
    }

    pub fn and_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.push((field.to_string(), Cond::Contains(value.into())));
        self
    }

    pub fn matches(&self, object: &Value) -> bool {
        self.0
            .iter()
            .all(|(field, cond)| cond.matches(object.get(field)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct FindOpts {
    pub sort: Option<(String, Order)>,
    pub limit: Option<usize>,
    pub skip: usize,
}

impl FindOpts {
    pub fn sorted(field: &str, order: Order) -> Self {
        FindOpts {
            sort: Some((field.to_string(), order)),
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Orders JSON scalars: numbers numerically, strings lexically, missing last.
pub fn cmp_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Generic object-storage backend with collection-scoped CRUD.
pub trait ObjectStore: Send + Sync {
    fn create_object(&self, collection: Collection, object: Value) -> StoreResult<()>;

    fn find_objects(
        &self,
        collection: Collection,
        filter: &Filter,
        opts: &FindOpts,
    ) -> StoreResult<Vec<Value>>;

    /// Merges `updates` into matching records. Returns the number updated.
    fn update_objects(
        &self,
        collection: Collection,
        filter: &Filter,
        updates: &Map<String, Value>,
        first_only: bool,
    ) -> StoreResult<usize>;

    fn delete_objects(
        &self,
        collection: Collection,
        filter: &Filter,
        first_only: bool,
    ) -> StoreResult<usize>;

    fn count_objects(&self, collection: Collection, filter: &Filter) -> StoreResult<usize>;
}

/// Typed conveniences shared by the storage modules.
impl<'s> dyn ObjectStore + 's {
    pub fn create<T: Serialize>(&self, collection: Collection, record: &T) -> StoreResult<()> {
        self.create_object(collection, serde_json::to_value(record)?)
    }

    pub fn find_one<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<T>> {
        let found = self.find_objects(collection, filter, &FindOpts::default().limit(1))?;
        match found.into_iter().next() {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn find_all<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Vec<T>> {
        self.find_sorted(collection, filter, &FindOpts::default())
    }

    pub fn find_sorted<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filter: &Filter,
        opts: &FindOpts,
    ) -> StoreResult<Vec<T>> {
        self.find_objects(collection, filter, opts)?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    pub fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        updates: &Map<String, Value>,
    ) -> StoreResult<usize> {
        self.update_objects(collection, filter, updates, true)
    }

    pub fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<usize> {
        self.delete_objects(collection, filter, true)
    }

    pub fn delete_all(&self, collection: Collection, filter: &Filter) -> StoreResult<usize> {
        self.delete_objects(collection, filter, false)
    }

    pub fn exists(&self, collection: Collection, filter: &Filter) -> StoreResult<bool> {
        Ok(self.count_objects(collection, filter)? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_conditions() {
        let page = json!({
            "url": "test.com/a",
            "terms": ["rust", "guide"],
            "time": 10,
        });

        assert!(Filter::all().matches(&page));
        assert!(Filter::eq("url", "test.com/a").matches(&page));
        assert!(!Filter::eq("url", "test.com/b").matches(&page));
        assert!(Filter::all().and_contains("terms", "rust").matches(&page));
        assert!(!Filter::all().and_contains("terms", "python").matches(&page));
        assert!(Filter::all()
            .and_in("url", ["test.com/b", "test.com/a"])
            .matches(&page));
        assert!(!Filter::eq("url", "test.com/a")
            .and_eq("time", 11)
            .matches(&page));
        assert!(!Filter::eq("missing", "x").matches(&page));
    }

    #[test]
    fn test_cmp_values() {
        assert_eq!(
            cmp_values(Some(&json!(1)), Some(&json!(2))),
            Ordering::Less
        );
        assert_eq!(
            cmp_values(Some(&json!("b")), Some(&json!("a"))),
            Ordering::Greater
        );
        assert_eq!(cmp_values(Some(&json!(1)), None), Ordering::Less);
    }
}
