//! Testing utilities for WEX workspace
//!
//! Shared fixtures: an in-memory record store with scripted loading
//! phases and failure injection, plus record/scenario builders.

#![allow(missing_docs)]

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use wex_record::{
    AsyncRecord, FetchState, FunctionArgument, IdVersion, Record, RecordStore, Scenario,
    ScenarioValue,
};

/// In-memory [`RecordStore`]. Non-blocking and idempotent like the real
/// storage collaborator; ids can be scripted to report `Loading` for a
/// number of polls or to fail outright.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<IdVersion, Record>,
    loading_polls: DashMap<IdVersion, u32>,
    failing: DashMap<IdVersion, String>,
    fetch_log: Mutex<Vec<Vec<IdVersion>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn insert(&self, record: Record) {
        self.records.insert(record.id, record);
    }

    /// Make `id` report `Loading` for the next `polls` fetches
    pub fn set_loading(&self, id: IdVersion, polls: u32) {
        self.loading_polls.insert(id, polls);
    }

    /// Make `id` fail every fetch with the given message
    pub fn set_failing(&self, id: IdVersion, message: impl Into<String>) {
        self.failing.insert(id, message.into());
    }

    /// Every batch of ids ever fetched, in call order
    pub fn fetch_log(&self) -> Vec<Vec<IdVersion>> {
        self.fetch_log.lock().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_records(&self, ids: &[IdVersion]) -> Vec<AsyncRecord> {
        self.fetch_log.lock().push(ids.to_vec());
        ids.iter()
            .map(|id| {
                if let Some(mut left) = self.loading_polls.get_mut(id) {
                    if *left > 0 {
                        *left -= 1;
                        return AsyncRecord::new(*id, FetchState::Loading);
                    }
                }
                if let Some(message) = self.failing.get(id) {
                    return AsyncRecord::new(*id, FetchState::Error(message.clone()));
                }
                let state = match self.records.get(id) {
                    Some(record) => FetchState::Loaded(record.clone()),
                    None => FetchState::NotFound,
                };
                AsyncRecord::new(*id, state)
            })
            .collect()
    }
}

/// A value record: title and body, no arguments.
pub fn value_record(id: u64, version: u32, title: &str, body: &str) -> Record {
    Record::new(IdVersion::new(id, version), title, body)
}

/// A function record with named number arguments; `args` pairs are
/// `(name, default)` with an empty default meaning none.
pub fn function_record(
    id: u64,
    version: u32,
    title: &str,
    args: &[(&str, &str)],
    body: &str,
) -> Record {
    let mut record = Record::new(IdVersion::new(id, version), title, body);
    record.arguments = args
        .iter()
        .map(|(name, default)| {
            let arg = FunctionArgument::new(format!("t-{name}"), *name);
            if default.is_empty() {
                arg
            } else {
                arg.with_default(*default)
            }
        })
        .collect();
    record
}

/// A scenario assigning plain entered values by argument name (temp ids
/// follow the `t-<name>` convention of [`function_record`]).
pub fn scenario_with_values(values: &[(&str, &str)]) -> Scenario {
    let mut scenario = Scenario::new("s-test");
    for (name, value) in values {
        scenario = scenario.with_value(format!("t-{name}"), ScenarioValue::entered(*value));
    }
    scenario
}
