use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Instant,
};

use serde_json::{Map, Value};

use super::{cmp_values, Collection, Filter, FindOpts, ObjectStore, Order};
use crate::{
    errors::{StoreError, StoreResult},
    storage::StorageManager,
};

type Tables = HashMap<Collection, Vec<Value>>;

/// In-memory object store, optionally snapshotted to disk.
///
/// Every mutation rewrites the snapshot of the touched collection when a
/// [`StorageManager`] is attached. Mutations are applied to a copy of the
/// collection and committed only once its snapshot is written, so a failed
/// write leaves memory untouched.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    persist: Option<Arc<dyn StorageManager>>,
}

fn snapshot_name(collection: Collection) -> String {
    format!("{}.json", collection.name())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every collection snapshot found in `persist`.
    pub fn load(persist: Arc<dyn StorageManager>) -> StoreResult<Self> {
        let now = Instant::now();
        let mut tables = Tables::new();

        for collection in Collection::ALL {
            let ident = snapshot_name(collection);
            if !persist.exists(&ident) {
                continue;
            }
            let bytes = persist.read(&ident)?;
            let records: Vec<Value> = serde_json::from_slice(&bytes)?;
            log::debug!("loaded {} {} records", records.len(), collection.name());
            tables.insert(collection, records);
        }

        log::debug!(
            "took {}ms to load collections",
            now.elapsed().as_micros() as f64 / 1000.0
        );

        Ok(MemoryStore {
            tables: Arc::new(RwLock::new(tables)),
            persist: Some(persist),
        })
    }

    /// Rewrites every collection snapshot.
    pub fn flush(&self) -> StoreResult<()> {
        let tables = self.read()?;
        for collection in Collection::ALL {
            let records = tables.get(&collection).map(Vec::as_slice).unwrap_or_default();
            self.save(collection, records)?;
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|err| StoreError::Storage(format!("lock poisoned: {err}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|err| StoreError::Storage(format!("lock poisoned: {err}")))
    }

    fn save(&self, collection: Collection, records: &[Value]) -> StoreResult<()> {
        let Some(persist) = &self.persist else {
            return Ok(());
        };
        let data = serde_json::to_vec_pretty(records)?;
        persist.write(&snapshot_name(collection), &data)?;
        Ok(())
    }
}

fn same_key(collection: Collection, a: &Value, b: &Value) -> bool {
    let key = collection.unique_key();
    !key.is_empty() && key.iter().all(|field| a.get(field) == b.get(field))
}

impl ObjectStore for MemoryStore {
    fn create_object(&self, collection: Collection, object: Value) -> StoreResult<()> {
        if !object.is_object() {
            return Err(StoreError::Storage(format!(
                "{} records must be objects",
                collection.name()
            )));
        }

        let mut tables = self.write()?;
        let mut records = tables.get(&collection).cloned().unwrap_or_default();

        if records.iter().any(|existing| same_key(collection, existing, &object)) {
            return Err(StoreError::Storage(format!(
                "unique constraint violated on {} {:?}",
                collection.name(),
                collection.unique_key()
            )));
        }

        records.push(object);
        self.save(collection, &records)?;
        tables.insert(collection, records);
        Ok(())
    }

    fn find_objects(
        &self,
        collection: Collection,
        filter: &Filter,
        opts: &FindOpts,
    ) -> StoreResult<Vec<Value>> {
        let tables = self.read()?;
        let mut found: Vec<Value> = tables
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        if let Some((field, order)) = &opts.sort {
            found.sort_by(|a, b| {
                let ord = cmp_values(a.get(field), b.get(field));
                match order {
                    Order::Asc => ord,
                    Order::Desc => ord.reverse(),
                }
            });
        }

        let limit = opts.limit.unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(opts.skip).take(limit).collect())
    }

    fn update_objects(
        &self,
        collection: Collection,
        filter: &Filter,
        updates: &Map<String, Value>,
        first_only: bool,
    ) -> StoreResult<usize> {
        let mut tables = self.write()?;
        let Some(mut records) = tables.get(&collection).cloned() else {
            return Ok(0);
        };

        let mut count = 0;
        for record in records.iter_mut().filter(|record| filter.matches(record)) {
            if let Some(fields) = record.as_object_mut() {
                for (key, value) in updates {
                    fields.insert(key.clone(), value.clone());
                }
            }
            count += 1;
            if first_only {
                break;
            }
        }

        if count > 0 {
            self.save(collection, &records)?;
            tables.insert(collection, records);
        }
        Ok(count)
    }

    fn delete_objects(
        &self,
        collection: Collection,
        filter: &Filter,
        first_only: bool,
    ) -> StoreResult<usize> {
        let mut tables = self.write()?;
        let Some(mut records) = tables.get(&collection).cloned() else {
            return Ok(0);
        };

        let before = records.len();
        if first_only {
            if let Some(idx) = records.iter().position(|record| filter.matches(record)) {
                records.remove(idx);
            }
        } else {
            records.retain(|record| !filter.matches(record));
        }
        let count = before - records.len();

        if count > 0 {
            self.save(collection, &records)?;
            tables.insert(collection, records);
        }
        Ok(count)
    }

    fn count_objects(&self, collection: Collection, filter: &Filter) -> StoreResult<usize> {
        let tables = self.read()?;
        Ok(tables
            .get(&collection)
            .map(|records| records.iter().filter(|record| filter.matches(record)).count())
            .unwrap_or_default())
    }
}
