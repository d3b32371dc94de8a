pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::data::index::LocationId;
use crate::models::{Identity, ResultDocument, ResultWrite};

/// Error codes surfaced by the result store, mirroring the hosted service's
/// code set. Each known code maps to exactly one operator-facing message.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("store unavailable")]
    Unavailable,
    #[error("request timed out")]
    Timeout,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("document not found")]
    NotFound,
    #[error("store error: {0}")]
    Unknown(String),
}

impl StoreError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "You do not have permission to perform this action.",
            Self::Unavailable => {
                "The results service is unreachable. Check the connection and try again."
            }
            Self::Timeout => "The request timed out. Please try again.",
            Self::Unauthenticated => "This session is not signed in. Restart the console.",
            Self::NotFound => "The requested record does not exist.",
            Self::Unknown(_) => "An unexpected error occurred talking to the results service.",
        }
    }
}

/// One delivery from a single-document subscription: the full current
/// document, its absence, or a listener error.
#[derive(Debug, Clone)]
pub enum DocumentEvent {
    Snapshot(Option<ResultDocument>),
    Error(StoreError),
}

/// One delivery from the collection subscription: the full set of current
/// documents keyed by location id, or a listener error.
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    Snapshot(HashMap<LocationId, ResultDocument>),
    Error(StoreError),
}

/// Live handle to a single-document subscription. Dropping it unsubscribes.
pub struct DocumentSubscription {
    rx: mpsc::UnboundedReceiver<DocumentEvent>,
}

impl DocumentSubscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<DocumentEvent>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<DocumentEvent> {
        self.rx.recv().await
    }
}

/// Live handle to the collection subscription. Dropping it unsubscribes.
pub struct CollectionSubscription {
    rx: mpsc::UnboundedReceiver<CollectionEvent>,
}

impl CollectionSubscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<CollectionEvent>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<CollectionEvent> {
        self.rx.recv().await
    }
}

/// Contract of the shared real-time result store. The console only ever
/// reads documents, requests merge-upserts, or requests a bulk delete;
/// write timestamps are assigned by the store, never by the caller.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<Identity, StoreError>;

    /// One-shot read of a single result document.
    async fn get(&self, id: &LocationId) -> Result<Option<ResultDocument>, StoreError>;

    /// Create-or-merge write. Fields absent from the write are preserved on
    /// the stored document; concurrent writers race at field level and the
    /// later write wins.
    async fn upsert(&self, id: &LocationId, write: ResultWrite) -> Result<(), StoreError>;

    async fn list_all(&self) -> Result<Vec<LocationId>, StoreError>;

    /// Deletes exactly the given set of documents in one atomic batch.
    async fn batch_delete(&self, ids: &[LocationId]) -> Result<(), StoreError>;

    /// Subscribes to one document. Fires immediately with the current state
    /// and again on every change.
    fn subscribe(&self, id: &LocationId) -> DocumentSubscription;

    /// Subscribes to the whole result collection. Fires immediately with
    /// the current snapshot and again on every change.
    fn subscribe_collection(&self) -> CollectionSubscription;
}
