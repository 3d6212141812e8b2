use crate::models::UtmParams;
use crate::storage::KeyValueStore;

/// Storage key holding the JSON-encoded attribution mapping.
pub const UTM_STORAGE_KEY: &str = "utm_params";

/// Captures campaign attribution from landing-page URLs and remembers it.
///
/// Captured values never expire; they live as long as the backing store
/// keeps them.
pub struct UtmTracker<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> UtmTracker<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// Reads the stored mapping. Malformed data is logged and treated as empty.
    pub fn current(&self) -> UtmParams {
        let Some(raw) = self.store.get(UTM_STORAGE_KEY) else {
            return UtmParams::default();
        };

        match serde_json::from_str::<UtmParams>(&raw) {
            Ok(params) => params,
            Err(e) => {
                tracing::error!("Failed to load stored UTM parameters: {}", e);
                UtmParams::default()
            }
        }
    }

    /// Merges the UTM keys found in `query` over the stored mapping and
    /// returns the result.
    ///
    /// The store is only written when the query carried at least one
    /// recognized key.
    pub fn capture(&self, query: &str) -> UtmParams {
        let incoming = UtmParams::from_query(query);
        let stored = self.current();

        if incoming.is_empty() {
            return stored;
        }

        let merged = stored.merge(incoming);
        match serde_json::to_string(&merged) {
            Ok(json) => self.store.set(UTM_STORAGE_KEY, json),
            Err(e) => tracing::error!("Failed to persist UTM parameters: {}", e),
        }

        tracing::debug!("Captured UTM parameters: {:?}", merged);
        merged
    }
}
