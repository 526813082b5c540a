use async_trait::async_trait;
use core_types::{Hit, PartialRecord, SearchOptions, SearchPage};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::{IndexError, IndexService};

/// Default page size of the hosted index.
pub const DEFAULT_HITS_PER_PAGE: usize = 20;

/// A call observed by [`InMemoryIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCall {
    Search { query: String, page: Option<u32> },
    PartialUpdate { records: usize },
}

/// Index held in memory: records are raw JSON objects keyed by `objectID`.
///
/// Searches page through the records in insertion order and answer `None`
/// past the last page. An empty index still reports one (empty) page.
#[derive(Debug)]
pub struct InMemoryIndex {
    records: Mutex<Vec<Value>>,
    calls: Mutex<Vec<IndexCall>>,
    hits_per_page: usize,
}

impl InMemoryIndex {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records: Mutex::new(records),
            calls: Mutex::new(Vec::new()),
            hits_per_page: DEFAULT_HITS_PER_PAGE,
        }
    }

    #[must_use]
    pub fn with_hits_per_page(mut self, hits_per_page: usize) -> Self {
        self.hits_per_page = hits_per_page.max(1);
        self
    }

    /// Snapshot of the stored records.
    pub fn contents(&self) -> Vec<Value> {
        self.records.lock().clone()
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().clone()
    }

    /// Pages requested so far; `None` stands for the default first page.
    pub fn searched_pages(&self) -> Vec<Option<u32>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                IndexCall::Search { page, .. } => Some(*page),
                IndexCall::PartialUpdate { .. } => None,
            })
            .collect()
    }

    fn matches(record: &Value, query: &str) -> bool {
        query.is_empty()
            || record
                .get("path")
                .and_then(Value::as_str)
                .is_some_and(|path| path.contains(query))
    }
}

#[async_trait]
impl IndexService for InMemoryIndex {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Option<SearchPage>, IndexError> {
        self.calls.lock().push(IndexCall::Search {
            query: query.to_string(),
            page: options.page,
        });

        let records = self.records.lock();
        let matching: Vec<&Value> = records
            .iter()
            .filter(|record| Self::matches(record, query))
            .collect();

        let nb_pages = matching.len().div_ceil(self.hits_per_page).max(1);
        let page = options.page.unwrap_or(0) as usize;
        if page >= nb_pages {
            return Ok(None);
        }

        let hits = matching
            .iter()
            .skip(page * self.hits_per_page)
            .take(self.hits_per_page)
            .map(|record| project(record, &options.attributes_to_retrieve))
            .map(serde_json::from_value::<Hit>)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(SearchPage {
            nb_pages: u32::try_from(nb_pages).unwrap_or(u32::MAX),
            nb_hits: matching.len() as u64,
            hits,
        }))
    }

    async fn partial_update_objects(&self, records: Vec<PartialRecord>) -> Result<(), IndexError> {
        self.calls.lock().push(IndexCall::PartialUpdate {
            records: records.len(),
        });

        let mut stored = self.records.lock();
        for record in records {
            let Value::Object(fields) = serde_json::to_value(&record)? else {
                continue;
            };
            let target = stored.iter_mut().find(|item| {
                item.get("objectID").and_then(Value::as_str) == Some(record.object_id.as_str())
            });
            if let Some(Value::Object(existing)) = target {
                existing.extend(fields);
            }
        }
        Ok(())
    }
}

/// Keep only the requested attributes (`objectID` is always returned).
fn project(record: &Value, attributes: &[String]) -> Value {
    let mut out = Map::new();
    if let Value::Object(fields) = record {
        for (key, value) in fields {
            if key == "objectID" || attributes.iter().any(|a| a == key || a == "*") {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(out)
}
