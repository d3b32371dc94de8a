use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::data;
use crate::data::index::{LocationId, INDEX};
use crate::models::{Identity, LocalDraft, ResultDocument, ResultWrite, ViewMode};
use crate::store::{CollectionEvent, DocumentEvent, ResultStore, StoreError};
use crate::tally::aggregate::aggregate;
use crate::tally::reconcile::reconcile;
use crate::tally::{AggregatedView, Scope};

/// Everything delivered to the console loop besides operator input:
/// forwarded store snapshots and completions of in-flight writes.
#[derive(Debug)]
pub enum SessionEvent {
    Collection(CollectionEvent),
    Document(LocationId, DocumentEvent),
    SubmissionFinished {
        id: LocationId,
        constituency: String,
        result: Result<(), StoreError>,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown region '{0}'")]
    UnknownRegion(String),
    #[error("unknown district '{0}' in {1}")]
    UnknownDistrict(String, String),
    #[error("unknown constituency '{0}' in {1}")]
    UnknownConstituency(String, String),
    #[error("select a region first")]
    NoRegion,
    #[error("select a district first")]
    NoDistrict,
    #[error("select a constituency first")]
    NoConstituency,
    #[error("vote entry only works in the constituency view")]
    NotEntryView,
    #[error("unknown candidate code '{0}'")]
    UnknownCandidate(String),
    #[error("a submission is already in progress")]
    SubmissionInFlight,
    #[error("total votes cast ({cast}) exceed registered voters ({registered})")]
    QuotaExceeded { cast: u64, registered: u64 },
    #[error("no reset is pending")]
    NoPendingReset,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// All mutable console state. Owned by the main loop; store snapshots reach
/// it only through `SessionEvent`s, so every mutation happens on one task.
pub struct Session {
    store: Arc<dyn ResultStore>,
    identity: Identity,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    view_mode: ViewMode,
    region: Option<String>,
    district: Option<String>,
    constituency: Option<String>,
    /// Latest full snapshot of the shared result collection.
    results: HashMap<LocationId, ResultDocument>,
    /// One cached draft per visited location, so switching away and back
    /// does not lose unsubmitted work.
    drafts: HashMap<LocationId, LocalDraft>,
    subscribed_id: Option<LocationId>,
    loading: bool,
    submitting: bool,
    reset_armed: bool,
    listener_notice: Option<String>,
    collection_task: Option<JoinHandle<()>>,
    document_task: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(
        store: Arc<dyn ResultStore>,
        identity: Identity,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            store,
            identity,
            events_tx,
            view_mode: ViewMode::Constituency,
            region: None,
            district: None,
            constituency: None,
            results: HashMap::new(),
            drafts: HashMap::new(),
            subscribed_id: None,
            loading: true,
            submitting: false,
            reset_armed: false,
            listener_notice: None,
            collection_task: None,
            document_task: None,
        }
    }

    /// Opens the collection-wide listener and starts forwarding its
    /// snapshots into the event channel.
    pub fn start(&mut self) {
        let mut sub = self.store.subscribe_collection();
        let tx = self.events_tx.clone();
        self.collection_task = Some(tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                if tx.send(SessionEvent::Collection(event)).is_err() {
                    break;
                }
            }
        }));
    }

    pub fn shutdown(&mut self) {
        if let Some(task) = self.collection_task.take() {
            task.abort();
        }
        if let Some(task) = self.document_task.take() {
            task.abort();
        }
    }

    // --- selection -------------------------------------------------------

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn district(&self) -> Option<&str> {
        self.district.as_deref()
    }

    pub fn constituency(&self) -> Option<&str> {
        self.constituency.as_deref()
    }

    /// Key of the currently selected constituency, when all three levels
    /// are chosen.
    pub fn selected_id(&self) -> Option<LocationId> {
        match (&self.region, &self.district, &self.constituency) {
            (Some(r), Some(d), Some(c)) => Some(LocationId::derive(r, d, c)),
            _ => None,
        }
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> Result<String, SessionError> {
        self.reset_armed = false;
        match mode {
            ViewMode::District => {
                if self.district.is_none() {
                    return Err(SessionError::NoDistrict);
                }
                self.constituency = None;
            }
            ViewMode::National => {
                self.region = None;
                self.district = None;
                self.constituency = None;
            }
            ViewMode::Constituency => {}
        }
        self.view_mode = mode;
        self.refresh_document_subscription();
        Ok(format!("Switched to {} view.", mode.label()))
    }

    pub fn select_region(&mut self, name: &str) -> Result<String, SessionError> {
        self.reset_armed = false;
        let canonical = INDEX
            .resolve_region(name)
            .ok_or_else(|| SessionError::UnknownRegion(name.to_string()))?
            .to_string();
        self.region = Some(canonical.clone());
        self.district = None;
        self.constituency = None;
        self.refresh_document_subscription();
        Ok(format!("Region: {}.", canonical))
    }

    pub fn select_district(&mut self, name: &str) -> Result<String, SessionError> {
        self.reset_armed = false;
        let region = self.region.clone().ok_or(SessionError::NoRegion)?;
        let canonical = INDEX
            .resolve_district(&region, name)
            .ok_or_else(|| SessionError::UnknownDistrict(name.to_string(), region.clone()))?
            .to_string();
        self.district = Some(canonical.clone());
        self.constituency = None;
        self.refresh_document_subscription();
        Ok(format!("District: {}, {}.", canonical, region))
    }

    pub fn select_constituency(&mut self, name: &str) -> Result<String, SessionError> {
        self.reset_armed = false;
        let region = self.region.clone().ok_or(SessionError::NoRegion)?;
        let district = self.district.clone().ok_or(SessionError::NoDistrict)?;
        let canonical = INDEX
            .resolve_constituency(&region, &district, name)
            .ok_or_else(|| {
                SessionError::UnknownConstituency(name.to_string(), district.clone())
            })?
            .to_string();
        self.constituency = Some(canonical.clone());
        self.refresh_document_subscription();
        Ok(format!("Constituency: {} ({}).", canonical, district))
    }

    /// Tears down the old document listener before opening the one for the
    /// new selection, so a listener for a stale selection can never mutate
    /// state after the operator has moved on.
    fn refresh_document_subscription(&mut self) {
        let wanted = match self.view_mode {
            ViewMode::Constituency => self.selected_id(),
            _ => None,
        };
        if wanted == self.subscribed_id {
            return;
        }
        if let Some(task) = self.document_task.take() {
            task.abort();
        }
        self.subscribed_id = wanted.clone();
        if let Some(id) = wanted {
            debug!("subscribing to document {}", id);
            let mut sub = self.store.subscribe(&id);
            let tx = self.events_tx.clone();
            let task_id = id;
            self.document_task = Some(tokio::spawn(async move {
                while let Some(event) = sub.recv().await {
                    if tx
                        .send(SessionEvent::Document(task_id.clone(), event))
                        .is_err()
                    {
                        break;
                    }
                }
            }));
        }
    }

    // --- vote entry ------------------------------------------------------

    pub fn enter_votes(&mut self, abbreviation: &str, count: u64) -> Result<String, SessionError> {
        self.reset_armed = false;
        let (id, constituency) = self.entry_target()?;
        if !data::candidates().iter().any(|c| c.abbreviation == abbreviation) {
            return Err(SessionError::UnknownCandidate(abbreviation.to_string()));
        }
        let draft = self.drafts.entry(id).or_insert_with(LocalDraft::zeroed);
        draft.tally.set(abbreviation, count);
        Ok(format!("{} = {} for {}.", abbreviation, count, constituency))
    }

    pub fn enter_null_and_void(&mut self, count: u64) -> Result<String, SessionError> {
        self.reset_armed = false;
        let (id, constituency) = self.entry_target()?;
        let draft = self.drafts.entry(id).or_insert_with(LocalDraft::zeroed);
        draft.null_and_void = count;
        Ok(format!("Null & void = {} for {}.", count, constituency))
    }

    fn entry_target(&self) -> Result<(LocationId, String), SessionError> {
        if self.view_mode != ViewMode::Constituency {
            return Err(SessionError::NotEntryView);
        }
        if self.region.is_none() {
            return Err(SessionError::NoRegion);
        }
        if self.district.is_none() {
            return Err(SessionError::NoDistrict);
        }
        match (&self.constituency, self.selected_id()) {
            (Some(name), Some(id)) => Ok((id, name.clone())),
            _ => Err(SessionError::NoConstituency),
        }
    }

    // --- submission gate -------------------------------------------------

    /// Validates the current draft and, if it passes, starts the upsert.
    /// The write runs in the background and reports back through
    /// `SessionEvent::SubmissionFinished`; a second submit while one is in
    /// flight is refused.
    pub fn submit(&mut self) -> Result<String, SessionError> {
        self.reset_armed = false;
        let (id, constituency) = self.entry_target()?;
        if self.submitting {
            return Err(SessionError::SubmissionInFlight);
        }

        let draft = self.drafts.get(&id).cloned().unwrap_or_else(LocalDraft::zeroed);
        let registered = INDEX.registered_voters_for(&id);
        let cast = draft.total_votes_cast();
        if registered > 0 && cast > registered {
            return Err(SessionError::QuotaExceeded { cast, registered });
        }

        let write = ResultWrite {
            tally: draft.tally,
            null_and_void: draft.null_and_void,
            last_updated_by: self.identity.uid.clone(),
            region: self.region.clone().unwrap_or_default(),
            district: self.district.clone().unwrap_or_default(),
            constituency: constituency.clone(),
        };

        self.submitting = true;
        let store = Arc::clone(&self.store);
        let tx = self.events_tx.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            let result = store.upsert(&task_id, write).await;
            let _ = tx.send(SessionEvent::SubmissionFinished {
                id: task_id,
                constituency,
                result,
            });
        });
        Ok(format!("Submitting results for {}...", self.constituency.as_deref().unwrap_or("?")))
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    // --- reset operation -------------------------------------------------

    pub fn arm_reset(&mut self) -> String {
        self.reset_armed = true;
        "This will permanently delete ALL submitted results for every location.\n\
         Type 'confirm' to proceed or 'cancel' to keep the data."
            .to_string()
    }

    pub fn cancel_reset(&mut self) -> Result<String, SessionError> {
        if !self.reset_armed {
            return Err(SessionError::NoPendingReset);
        }
        self.reset_armed = false;
        Ok("Reset cancelled; no data was deleted.".to_string())
    }

    /// Enumerates every stored result, deletes exactly that set in one
    /// batch, then drops all cached drafts so the reconciled view cannot
    /// resurrect deleted data.
    pub async fn confirm_reset(&mut self) -> Result<String, SessionError> {
        if !self.reset_armed {
            return Err(SessionError::NoPendingReset);
        }
        self.reset_armed = false;

        let ids = self.store.list_all().await?;
        if !ids.is_empty() {
            self.store.batch_delete(&ids).await?;
        }
        self.drafts.clear();
        info!("reset removed {} stored result(s)", ids.len());
        Ok(format!(
            "Deleted {} submitted result(s) and cleared all local drafts.",
            ids.len()
        ))
    }

    pub fn is_reset_armed(&self) -> bool {
        self.reset_armed
    }

    // --- store events ----------------------------------------------------

    /// Applies one forwarded store event, returning a line to show the
    /// operator when the event warrants one.
    pub fn apply_event(&mut self, event: SessionEvent) -> Option<String> {
        match event {
            SessionEvent::Collection(CollectionEvent::Snapshot(map)) => {
                let first = self.loading;
                let recovered = self.listener_notice.take().is_some();
                self.loading = false;
                self.results = map;
                if first {
                    Some(format!(
                        "Live results connected ({} location(s) reporting).",
                        self.results.len()
                    ))
                } else if recovered {
                    Some("Live results restored.".to_string())
                } else {
                    None
                }
            }
            SessionEvent::Collection(CollectionEvent::Error(err)) => {
                error!("collection listener error: {}", err);
                let notice = format!(
                    "Warning: live updates interrupted. {} Last known data is still shown; 'dismiss' to hide.",
                    err.user_message()
                );
                self.listener_notice = Some(notice.clone());
                Some(notice)
            }
            SessionEvent::Document(id, event) => {
                if self.subscribed_id.as_ref() != Some(&id) {
                    debug!("ignoring snapshot for stale selection {}", id);
                    return None;
                }
                match event {
                    DocumentEvent::Snapshot(Some(doc)) => {
                        // The shared store is authoritative once data
                        // exists; it replaces whatever was drafted locally.
                        self.drafts.insert(id, LocalDraft::from_document(&doc));
                        None
                    }
                    DocumentEvent::Snapshot(None) => {
                        // Nothing submitted yet: seed a zeroed entry form,
                        // but never clobber counts already keyed in.
                        self.drafts.entry(id).or_insert_with(LocalDraft::zeroed);
                        None
                    }
                    DocumentEvent::Error(err) => {
                        error!("document listener error for {}: {}", id, err);
                        let notice = format!(
                            "Warning: live updates interrupted. {} Last known data is still shown; 'dismiss' to hide.",
                            err.user_message()
                        );
                        self.listener_notice = Some(notice.clone());
                        Some(notice)
                    }
                }
            }
            SessionEvent::SubmissionFinished {
                id,
                constituency,
                result,
            } => {
                self.submitting = false;
                match result {
                    Ok(()) => {
                        info!("submitted results for {}", id);
                        Some(format!(
                            "Results for {} have been successfully submitted.",
                            constituency
                        ))
                    }
                    Err(err) => {
                        error!("submission for {} failed: {}", id, err);
                        Some(format!(
                            "Failed to submit results for {}. {} The entered values were kept; submit again to retry.",
                            constituency,
                            err.user_message()
                        ))
                    }
                }
            }
        }
    }

    pub fn dismiss_notice(&mut self) -> String {
        match self.listener_notice.take() {
            Some(_) => "Warning dismissed.".to_string(),
            None => "No active warning.".to_string(),
        }
    }

    pub fn listener_notice(&self) -> Option<&str> {
        self.listener_notice.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    // --- derived views ---------------------------------------------------

    /// Scope of the statistics the current view mode asks for.
    pub fn current_scope(&self) -> Result<Scope, SessionError> {
        match self.view_mode {
            ViewMode::National => Ok(Scope::National),
            ViewMode::District => match (&self.region, &self.district) {
                (Some(region), Some(district)) => Ok(Scope::District {
                    region: region.clone(),
                    district: district.clone(),
                }),
                (None, _) => Err(SessionError::NoRegion),
                _ => Err(SessionError::NoDistrict),
            },
            ViewMode::Constituency => match self.selected_id() {
                Some(id) => Ok(Scope::Constituency { id }),
                None => Err(SessionError::NoConstituency),
            },
        }
    }

    /// Stored-plus-drafts view the aggregator runs over.
    pub fn reconciled(&self) -> HashMap<LocationId, ResultDocument> {
        reconcile(&self.results, &self.drafts)
    }

    pub fn aggregated(&self, scope: &Scope) -> AggregatedView {
        aggregate(scope, &INDEX, &self.reconciled())
    }

    /// The authoritative stored result for a location, if any.
    pub fn stored_result(&self, id: &LocationId) -> Option<&ResultDocument> {
        self.results.get(id)
    }

    pub fn draft(&self, id: &LocationId) -> Option<&LocalDraft> {
        self.drafts.get(id)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
