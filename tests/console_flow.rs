//! End-to-end console scenarios over the in-process store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use tally_console::config::AppConfig;
use tally_console::data::index::LocationId;
use tally_console::models::{Identity, ResultWrite, ViewMode, VoteTally};
use tally_console::session::{Session, SessionError, SessionEvent};
use tally_console::store::memory::MemoryStore;
use tally_console::store::ResultStore;
use tally_console::tally::Scope;

fn new_session(store: Arc<MemoryStore>) -> (Session, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut session = Session::new(
        store,
        Identity {
            uid: "anon-operator".to_string(),
        },
        tx,
    );
    session.start();
    (session, rx)
}

/// Applies every pending store event, waiting briefly for the forwarder
/// tasks to deliver.
async fn pump(session: &mut Session, rx: &mut mpsc::UnboundedReceiver<SessionEvent>) {
    loop {
        match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            Ok(Some(event)) => {
                session.apply_event(event);
            }
            _ => break,
        }
    }
}

#[tokio::test]
async fn enter_submit_and_aggregate_one_constituency() {
    let store = Arc::new(MemoryStore::new(&AppConfig::default()));
    let (mut session, mut rx) = new_session(Arc::clone(&store));

    session.select_region("Northern").unwrap();
    session.select_district("Rumphi").unwrap();
    session.select_constituency("Rumphi West").unwrap();
    session.enter_votes("UPF", 200).unwrap();
    session.enter_votes("NDA", 150).unwrap();
    session.enter_null_and_void(10).unwrap();

    session.submit().unwrap();
    pump(&mut session, &mut rx).await;
    assert!(!session.is_submitting());

    // The write landed in the shared store, tagged with the operator.
    let id = session.selected_id().unwrap();
    let stored = store.get(&id).await.unwrap().expect("stored result");
    assert_eq!(stored.tally.get("UPF"), 200);
    assert_eq!(stored.tally.get("NDA"), 150);
    assert_eq!(stored.null_and_void, 10);
    assert_eq!(stored.last_updated_by.as_deref(), Some("anon-operator"));
    assert!(stored.timestamp.is_some());

    // Rumphi West holds 500 registered voters: 360 cast is 72.00% turnout.
    let view = session.aggregated(&Scope::Constituency { id });
    assert_eq!(view.registered_voters, 500);
    assert_eq!(view.total_votes_cast, 360);
    assert!((view.turnout - 72.0).abs() < 1e-9);
    assert!(!view.validation_error);
    assert_eq!(view.constituencies_reporting, 1);
}

#[tokio::test]
async fn district_rollup_mixes_submitted_and_drafted_results() {
    let store = Arc::new(MemoryStore::new(&AppConfig::default()));

    // Another operator already submitted Rumphi West.
    let west = LocationId::derive("Northern", "Rumphi", "Rumphi West");
    let mut tally = VoteTally::zeroed();
    tally.set("UPF", 200);
    tally.set("NDA", 150);
    store
        .upsert(
            &west,
            ResultWrite {
                tally,
                null_and_void: 10,
                last_updated_by: "anon-other".to_string(),
                region: "Northern".to_string(),
                district: "Rumphi".to_string(),
                constituency: "Rumphi West".to_string(),
            },
        )
        .await
        .unwrap();

    let (mut session, mut rx) = new_session(Arc::clone(&store));
    pump(&mut session, &mut rx).await;

    // This operator drafts Rumphi East without submitting.
    session.select_region("Northern").unwrap();
    session.select_district("Rumphi").unwrap();
    session.select_constituency("Rumphi East").unwrap();
    session.enter_votes("UPF", 100).unwrap();
    session.enter_votes("NDA", 90).unwrap();
    session.enter_null_and_void(5).unwrap();
    pump(&mut session, &mut rx).await;

    session.set_view_mode(ViewMode::District).unwrap();
    let view = session.aggregated(&session.current_scope().unwrap());

    assert_eq!(view.registered_voters, 1000);
    assert_eq!(view.total_constituencies, 2);
    assert_eq!(view.constituencies_reporting, 2);
    assert_eq!(view.tally.get("UPF"), 300);
    assert_eq!(view.tally.get("NDA"), 240);
    assert_eq!(view.null_and_void, 15);
    assert_eq!(view.total_votes_cast, 555);
    assert!((view.turnout - 55.5).abs() < 1e-9);
}

#[tokio::test]
async fn quota_violation_never_reaches_the_store() {
    let store = Arc::new(MemoryStore::new(&AppConfig::default()));
    let (mut session, mut rx) = new_session(Arc::clone(&store));

    session.select_region("Northern").unwrap();
    session.select_district("Likoma").unwrap();
    session.select_constituency("Likoma Island").unwrap();
    session.enter_votes("UPF", 101).unwrap();

    assert!(matches!(
        session.submit(),
        Err(SessionError::QuotaExceeded {
            cast: 101,
            registered: 100
        })
    ));
    pump(&mut session, &mut rx).await;

    let id = session.selected_id().unwrap();
    assert!(store.get(&id).await.unwrap().is_none());
    // Correcting the draft makes the same submission pass.
    session.enter_votes("UPF", 99).unwrap();
    session.submit().unwrap();
    pump(&mut session, &mut rx).await;
    assert_eq!(
        store.get(&id).await.unwrap().unwrap().tally.get("UPF"),
        99
    );
}

#[tokio::test]
async fn reset_leaves_every_location_absent() {
    let store = Arc::new(MemoryStore::new(&AppConfig::default()));
    let (mut session, mut rx) = new_session(Arc::clone(&store));

    session.select_region("Northern").unwrap();
    session.select_district("Rumphi").unwrap();
    session.select_constituency("Rumphi West").unwrap();
    session.enter_votes("UPF", 40).unwrap();
    session.submit().unwrap();
    pump(&mut session, &mut rx).await;

    let id = session.selected_id().unwrap();
    assert!(store.get(&id).await.unwrap().is_some());

    // Step back to the national view, then run the two-step reset.
    session.set_view_mode(ViewMode::National).unwrap();
    session.arm_reset();
    let message = session.confirm_reset().await.unwrap();
    assert!(message.contains("Deleted 1"));
    pump(&mut session, &mut rx).await;

    assert!(store.get(&id).await.unwrap().is_none());
    assert!(store.list_all().await.unwrap().is_empty());

    let view = session.aggregated(&Scope::National);
    assert_eq!(view.constituencies_reporting, 0);
    assert_eq!(view.total_votes_cast, 0);
}

#[tokio::test]
async fn listener_outage_is_survivable_and_recovers() {
    let store = Arc::new(MemoryStore::new(&AppConfig::default()));
    let (mut session, mut rx) = new_session(Arc::clone(&store));
    pump(&mut session, &mut rx).await;
    assert!(!session.is_loading());

    store.set_offline(true);
    pump(&mut session, &mut rx).await;
    assert!(session.listener_notice().is_some());

    // Submissions fail while offline but the draft stays editable.
    session.select_region("Southern").unwrap();
    session.select_district("Zomba").unwrap();
    session.select_constituency("Zomba Central").unwrap();
    session.enter_votes("PRM", 55).unwrap();
    session.submit().unwrap();
    pump(&mut session, &mut rx).await;
    assert!(!session.is_submitting());
    let id = session.selected_id().unwrap();
    assert_eq!(session.draft(&id).unwrap().tally.get("PRM"), 55);

    // Back online: the banner clears on the recovery snapshot and the
    // retried submission goes through.
    store.set_offline(false);
    pump(&mut session, &mut rx).await;
    assert!(session.listener_notice().is_none());

    session.submit().unwrap();
    pump(&mut session, &mut rx).await;
    assert_eq!(
        store.get(&id).await.unwrap().unwrap().tally.get("PRM"),
        55
    );
}
