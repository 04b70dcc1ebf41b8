use serde::Deserialize;

use crate::config::StoreConfig;
use crate::store::RecordStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: StoreConfig,
    pub store: RecordStore,
}

impl AppState {
    pub fn new(config: StoreConfig) -> Self {
        let store = RecordStore::open(&config);
        AppState { config, store }
    }

    /// Points the sidecar at another records file.
    pub fn retarget(&mut self, config: StoreConfig) {
        self.store = RecordStore::open(&config);
        self.config = config;
    }
}
