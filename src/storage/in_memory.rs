use super::{apply_find, FindOptions, RecallFilter, RecallStore, StoredDocument, UpsertOutcome};
use crate::domain::NormalizedRecall;
use crate::error::{RecallError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// In-memory store for development and testing. Documents are kept as
/// written so legacy shapes can be seeded and re-normalized.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    documents: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw documents keyed by their `recallId` (or position when absent)
    pub fn with_documents(documents: Vec<Value>) -> Self {
        let map = documents
            .into_iter()
            .enumerate()
            .map(|(i, doc)| {
                let key = doc
                    .get("recallId")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("legacy-{i}"));
                (key, doc)
            })
            .collect();
        Self {
            documents: Arc::new(Mutex::new(map)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Value>>> {
        self.documents
            .lock()
            .map_err(|_| RecallError::StoreUnavailable("in-memory store lock poisoned".into()))
    }

    fn typed(&self) -> Result<Vec<NormalizedRecall>> {
        let docs = self.lock()?;
        Ok(docs
            .iter()
            .filter_map(|(key, doc)| match serde_json::from_value(doc.clone()) {
                Ok(recall) => Some(recall),
                Err(e) => {
                    warn!(recall_id = %key, error = %e, "Skipping document that is not a normalized recall");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl RecallStore for InMemoryStore {
    async fn find(&self, filter: &RecallFilter, options: &FindOptions) -> Result<Vec<NormalizedRecall>> {
        Ok(apply_find(self.typed()?, filter, options))
    }

    async fn find_one(&self, recall_id: &str) -> Result<Option<NormalizedRecall>> {
        let docs = self.lock()?;
        match docs.get(recall_id) {
            Some(doc) => Ok(serde_json::from_value(doc.clone()).ok()),
            None => Ok(None),
        }
    }

    async fn upsert(&self, recall: &NormalizedRecall) -> Result<UpsertOutcome> {
        let doc = serde_json::to_value(recall)?;
        let mut docs = self.lock()?;
        let outcome = match docs.insert(recall.recall_id.clone(), doc) {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        };
        debug!(recall_id = %recall.recall_id, ?outcome, "Upserted recall in memory");
        Ok(outcome)
    }

    async fn count(&self, filter: &RecallFilter) -> Result<usize> {
        Ok(self.typed()?.iter().filter(|r| filter.matches(r)).count())
    }

    async fn delete_many(&self, filter: &RecallFilter) -> Result<usize> {
        let doomed: Vec<String> = self
            .typed()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.recall_id)
            .collect();
        let mut docs = self.lock()?;
        Ok(doomed.iter().filter(|id| docs.remove(id.as_str()).is_some()).count())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn all(&self) -> Result<Vec<StoredDocument>> {
        Ok(self
            .lock()?
            .iter()
            .map(|(key, document)| StoredDocument {
                key: key.clone(),
                document: document.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::recall;

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = InMemoryStore::new();
        let mut r = recall("F-1", "Hummus", 1);
        assert_eq!(store.upsert(&r).await.unwrap(), UpsertOutcome::Created);
        r.reason = "Listeria".into();
        assert_eq!(store.upsert(&r).await.unwrap(), UpsertOutcome::Updated);

        assert_eq!(store.count(&RecallFilter::default()).await.unwrap(), 1);
        let stored = store.find_one("F-1").await.unwrap().unwrap();
        assert_eq!(stored.reason, "Listeria");
    }

    #[tokio::test]
    async fn test_delete_many_by_filter() {
        let store = InMemoryStore::new();
        let mut old = recall("A", "Salsa", 1);
        old.is_active = false;
        store.upsert(&old).await.unwrap();
        store.upsert(&recall("B", "Salsa Verde", 2)).await.unwrap();

        let inactive = RecallFilter { search: Some("salsa".into()), ..Default::default() };
        assert_eq!(store.count(&inactive).await.unwrap(), 2);
        assert_eq!(store.count(&RecallFilter::active()).await.unwrap(), 1);

        let removed = store.delete_many(&RecallFilter::default()).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_documents_are_visible_to_all_only() {
        let store = InMemoryStore::with_documents(vec![
            serde_json::json!({"recallId": "OLD-1", "product": "Tofu"}),
            serde_json::json!({"product": "Tempeh"}),
        ]);
        let keys: Vec<String> = store.all().await.unwrap().into_iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["OLD-1", "legacy-1"]);
        assert!(store.remove("legacy-1").await.unwrap());
        assert!(!store.remove("legacy-1").await.unwrap());
        assert!(store.find(&RecallFilter::default(), &FindOptions::default()).await.unwrap().is_empty());
    }
}
