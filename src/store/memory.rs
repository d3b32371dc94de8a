use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::data::index::LocationId;
use crate::models::{Identity, ResultDocument, ResultWrite};

use super::{
    CollectionEvent, CollectionSubscription, DocumentEvent, DocumentSubscription, ResultStore,
    StoreError,
};

/// In-process implementation of the result-store contract, used for local
/// operation and tests. Documents are raw field maps, as the hosted store
/// keeps them; decoding to typed results happens on the way out.
pub struct MemoryStore {
    collection: String,
    auth_uid: Option<String>,
    inner: Mutex<Inner>,
}

struct Inner {
    docs: BTreeMap<LocationId, Map<String, Value>>,
    doc_subs: Vec<(LocationId, mpsc::UnboundedSender<DocumentEvent>)>,
    coll_subs: Vec<mpsc::UnboundedSender<CollectionEvent>>,
    offline: bool,
}

impl MemoryStore {
    pub fn new(config: &AppConfig) -> Self {
        info!(
            "opening in-process result store (app {}, collection {})",
            config.app_id, config.results_collection
        );
        Self {
            collection: config.results_collection.clone(),
            auth_uid: config.initial_auth_token.clone(),
            inner: Mutex::new(Inner {
                docs: BTreeMap::new(),
                doc_subs: Vec::new(),
                coll_subs: Vec::new(),
                offline: false,
            }),
        }
    }

    /// Simulates losing the connection to the hosted service. While offline
    /// every operation fails with `Unavailable` and live listeners receive
    /// an error event; going back online re-delivers current snapshots.
    pub fn set_offline(&self, offline: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.offline = offline;
        if offline {
            inner.doc_subs.retain(|(_, tx)| {
                tx.send(DocumentEvent::Error(StoreError::Unavailable)).is_ok()
            });
            inner.coll_subs.retain(|tx| {
                tx.send(CollectionEvent::Error(StoreError::Unavailable)).is_ok()
            });
        } else {
            let snapshot = Self::decoded_snapshot(&inner.docs);
            inner.coll_subs.retain(|tx| {
                tx.send(CollectionEvent::Snapshot(snapshot.clone())).is_ok()
            });
            let docs = inner.docs.clone();
            inner.doc_subs.retain(|(id, tx)| {
                let doc = docs.get(id).map(ResultDocument::decode);
                tx.send(DocumentEvent::Snapshot(doc)).is_ok()
            });
        }
    }

    fn decoded_snapshot(
        docs: &BTreeMap<LocationId, Map<String, Value>>,
    ) -> HashMap<LocationId, ResultDocument> {
        docs.iter()
            .map(|(id, fields)| (id.clone(), ResultDocument::decode(fields)))
            .collect()
    }

    /// Fans the current state out to every live listener, pruning any whose
    /// receiving side has been dropped.
    fn notify(inner: &mut Inner, changed: &[LocationId]) {
        let snapshot = Self::decoded_snapshot(&inner.docs);
        inner.coll_subs.retain(|tx| {
            tx.send(CollectionEvent::Snapshot(snapshot.clone())).is_ok()
        });
        let docs = inner.docs.clone();
        inner.doc_subs.retain(|(id, tx)| {
            if !changed.contains(id) {
                return !tx.is_closed();
            }
            let doc = docs.get(id).map(ResultDocument::decode);
            tx.send(DocumentEvent::Snapshot(doc)).is_ok()
        });
    }

    fn check_online(inner: &Inner) -> Result<(), StoreError> {
        if inner.offline {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn sign_in_anonymously(&self) -> Result<Identity, StoreError> {
        Self::check_online(&self.inner.lock().unwrap())?;
        let uid = self
            .auth_uid
            .clone()
            .unwrap_or_else(|| format!("anon-{}", Uuid::new_v4()));
        info!("signed in as {}", uid);
        Ok(Identity { uid })
    }

    async fn get(&self, id: &LocationId) -> Result<Option<ResultDocument>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check_online(&inner)?;
        Ok(inner.docs.get(id).map(ResultDocument::decode))
    }

    async fn upsert(&self, id: &LocationId, write: ResultWrite) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_online(&inner)?;

        let mut fields = write.into_fields();
        fields.insert(
            "timestamp".to_string(),
            Value::from(Utc::now().to_rfc3339()),
        );

        // Merge semantics: incoming fields replace, everything else stays.
        let doc = inner.docs.entry(id.clone()).or_default();
        for (key, value) in fields {
            doc.insert(key, value);
        }
        debug!("upserted {}/{}", self.collection, id);

        Self::notify(&mut inner, &[id.clone()]);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<LocationId>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check_online(&inner)?;
        Ok(inner.docs.keys().cloned().collect())
    }

    async fn batch_delete(&self, ids: &[LocationId]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_online(&inner)?;
        for id in ids {
            inner.docs.remove(id);
        }
        info!("batch-deleted {} document(s)", ids.len());
        Self::notify(&mut inner, ids);
        Ok(())
    }

    fn subscribe(&self, id: &LocationId) -> DocumentSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        let current = inner.docs.get(id).map(ResultDocument::decode);
        let _ = tx.send(DocumentEvent::Snapshot(current));
        inner.doc_subs.push((id.clone(), tx));
        DocumentSubscription::new(rx)
    }

    fn subscribe_collection(&self) -> CollectionSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        let _ = tx.send(CollectionEvent::Snapshot(Self::decoded_snapshot(&inner.docs)));
        inner.coll_subs.push(tx);
        CollectionSubscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoteTally;

    fn store() -> MemoryStore {
        MemoryStore::new(&AppConfig::default())
    }

    fn write(upf: u64, null_and_void: u64) -> ResultWrite {
        let mut tally = VoteTally::zeroed();
        tally.set("UPF", upf);
        ResultWrite {
            tally,
            null_and_void,
            last_updated_by: "anon-test".to_string(),
            region: "Northern".to_string(),
            district: "Rumphi".to_string(),
            constituency: "Rumphi East".to_string(),
        }
    }

    fn rumphi_east() -> LocationId {
        LocationId::derive("Northern", "Rumphi", "Rumphi East")
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = store();
        let id = rumphi_east();
        store.upsert(&id, write(120, 4)).await.unwrap();

        let doc = store.get(&id).await.unwrap().expect("document exists");
        assert_eq!(doc.tally.get("UPF"), 120);
        assert_eq!(doc.null_and_void, 4);
        assert_eq!(doc.last_updated_by.as_deref(), Some("anon-test"));
        assert!(doc.timestamp.is_some());
    }

    #[tokio::test]
    async fn upsert_merges_instead_of_replacing() {
        let store = store();
        let id = rumphi_east();
        store.upsert(&id, write(120, 4)).await.unwrap();
        let first = store.get(&id).await.unwrap().unwrap();

        store.upsert(&id, write(90, 1)).await.unwrap();
        let second = store.get(&id).await.unwrap().unwrap();

        assert_eq!(second.tally.get("UPF"), 90);
        assert_eq!(second.null_and_void, 1);
        // Metadata written by the first submission survives the merge.
        assert_eq!(second.region.as_deref(), Some("Northern"));
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn document_subscription_fires_immediately_and_on_change() {
        let store = store();
        let id = rumphi_east();
        let mut sub = store.subscribe(&id);

        match sub.recv().await {
            Some(DocumentEvent::Snapshot(None)) => {}
            other => panic!("expected absent initial snapshot, got {:?}", other),
        }

        store.upsert(&id, write(7, 0)).await.unwrap();
        match sub.recv().await {
            Some(DocumentEvent::Snapshot(Some(doc))) => assert_eq!(doc.tally.get("UPF"), 7),
            other => panic!("expected live snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_pruned() {
        let store = store();
        let id = rumphi_east();
        let sub = store.subscribe(&id);
        drop(sub);

        store.upsert(&id, write(1, 0)).await.unwrap();
        assert!(store.inner.lock().unwrap().doc_subs.is_empty());
    }

    #[tokio::test]
    async fn batch_delete_removes_exactly_the_enumerated_set() {
        let store = store();
        let east = rumphi_east();
        let west = LocationId::derive("Northern", "Rumphi", "Rumphi West");
        store.upsert(&east, write(10, 0)).await.unwrap();
        store.upsert(&west, write(20, 0)).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        store.batch_delete(&all).await.unwrap();

        assert!(store.get(&east).await.unwrap().is_none());
        assert!(store.get(&west).await.unwrap().is_none());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_store_errors_and_listeners_recover() {
        let store = store();
        let id = rumphi_east();
        store.upsert(&id, write(5, 0)).await.unwrap();

        let mut sub = store.subscribe_collection();
        assert!(matches!(
            sub.recv().await,
            Some(CollectionEvent::Snapshot(_))
        ));

        store.set_offline(true);
        assert!(matches!(
            store.upsert(&id, write(6, 0)).await,
            Err(StoreError::Unavailable)
        ));
        assert!(matches!(
            sub.recv().await,
            Some(CollectionEvent::Error(StoreError::Unavailable))
        ));

        store.set_offline(false);
        match sub.recv().await {
            Some(CollectionEvent::Snapshot(map)) => {
                assert_eq!(map.get(&id).unwrap().tally.get("UPF"), 5)
            }
            other => panic!("expected recovery snapshot, got {:?}", other),
        }
    }
}
