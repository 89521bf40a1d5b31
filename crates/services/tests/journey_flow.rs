use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use journey_core::model::{
    ClaimError, Journey, SessionId, SessionStatus, StudentId, TherapySession,
};
use journey_core::time::fixed_now;
use services::{
    AppServices, Clock, JourneyDraft, JourneyService, JourneyServiceError, StepDraft, TrophyDraft,
};
use storage::repository::{JourneyRepository, Storage, StorageError};
use tokio::sync::{Barrier, Mutex};

fn sid(raw: &str) -> SessionId {
    SessionId::new(raw).expect("session id")
}

fn two_step_draft() -> JourneyDraft {
    let mut draft = JourneyDraft::new("Talking tiger");
    let mut first = StepDraft::titled("Warm up");
    first.session_ids = vec![sid("s1"), sid("s2"), sid("s3")];
    first.required_count = 2;
    first.trophy = Some(TrophyDraft::named("Bronze paw"));
    draft.add_step(first);

    let mut second = StepDraft::titled("Full sentences");
    second.session_ids = vec![sid("s4"), sid("s5")];
    second.required_count = 2;
    second.trophy = Some(TrophyDraft::named("Silver paw"));
    draft.add_step(second);
    draft
}

#[tokio::test]
async fn journey_flow_sessions_unlock_and_claim() {
    let services = AppServices::new_sqlite(
        "sqlite:file:memdb_journey_flow?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
    )
    .await
    .expect("connect sqlite");
    let journeys = services.journeys();
    let sessions = services.sessions();
    let student = StudentId::new("kid-7").expect("student id");

    for id in ["s1", "s2", "s3", "s4", "s5"] {
        sessions
            .record_session(sid(id), student.clone(), SessionStatus::Scheduled)
            .await
            .expect("record session");
    }
    journeys
        .create_journey(&student, &two_step_draft())
        .await
        .expect("create journey");

    sessions
        .set_status(&sid("s1"), SessionStatus::Completed)
        .await
        .expect("complete s1");
    let view = journeys
        .journey_progress(&student)
        .await
        .expect("progress")
        .expect("journey exists");
    assert_eq!(view.progress.steps[0].progress_percentage, 50);
    assert!(!view.progress.steps[1].is_unlocked);

    sessions
        .set_status(&sid("s3"), SessionStatus::Completed)
        .await
        .expect("complete s3");
    let stored = journeys
        .get_journey(&student)
        .await
        .expect("load")
        .expect("journey exists");
    assert!(stored.steps()[0].is_completed());
    assert!(stored.steps()[1].is_unlocked());
    assert!(stored.steps()[0].trophy().expect("trophy").is_earned());

    let err = journeys
        .claim_trophy(&student, 2)
        .await
        .expect_err("step 2 is incomplete");
    assert!(matches!(
        err,
        JourneyServiceError::Claim(ClaimError::StepNotCompleted { ordinal: 2 })
    ));

    let trophy = journeys.claim_trophy(&student, 1).await.expect("claim");
    assert_eq!(trophy.name(), "Bronze paw");

    let view = journeys
        .journey_progress(&student)
        .await
        .expect("progress")
        .expect("journey exists");
    assert_eq!(view.progress.trophies_claimed, 1);
    assert!(!view.progress.steps[0].can_claim);
    assert_eq!(view.progress.current_step, Some(2));
}

#[tokio::test]
async fn journey_flow_replace_and_reset() {
    let services = AppServices::new_sqlite(
        "sqlite:file:memdb_journey_replace?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
    )
    .await
    .expect("connect sqlite");
    let journeys = services.journeys();
    let sessions = services.sessions();
    let student = StudentId::new("kid-8").expect("student id");

    let created = journeys
        .create_journey(&student, &two_step_draft())
        .await
        .expect("create journey");
    sessions
        .record_session(sid("s1"), student.clone(), SessionStatus::Completed)
        .await
        .expect("record s1");
    sessions
        .record_session(sid("s2"), student.clone(), SessionStatus::Completed)
        .await
        .expect("record s2");

    let mut edited = JourneyDraft::from_journey(&created);
    edited.steps[1].title = "Stories".into();
    edited
        .assign_session(2, sid("s6"))
        .expect("assign new session");
    let replaced = journeys
        .replace_journey(&student, &edited)
        .await
        .expect("replace");
    assert_eq!(replaced.id(), created.id());
    assert!(replaced.steps()[0].is_completed());
    assert_eq!(replaced.steps()[1].title(), "Stories");
    assert!(replaced.steps()[1].is_unlocked());

    let mut overlapping = edited.clone();
    overlapping.steps[0].session_ids.push(sid("s6"));
    let err = journeys
        .replace_journey(&student, &overlapping)
        .await
        .expect_err("overlap rejected");
    assert!(matches!(err, JourneyServiceError::Journey(_)));

    assert!(journeys.reset_journey(&student).await.expect("reset"));
    assert!(journeys
        .get_journey(&student)
        .await
        .expect("load")
        .is_none());
    let err = journeys
        .replace_journey(&student, &edited)
        .await
        .expect_err("nothing to replace");
    assert!(matches!(err, JourneyServiceError::NoJourney { .. }));
}

/// Holds the first two loads at a barrier so both callers work from the same
/// stored revision, and runs saves one at a time.
struct RacingLoads {
    inner: Arc<dyn JourneyRepository>,
    gate: Barrier,
    gated: AtomicUsize,
    writes: Mutex<()>,
}

impl RacingLoads {
    fn new(inner: Arc<dyn JourneyRepository>) -> Self {
        Self {
            inner,
            gate: Barrier::new(2),
            gated: AtomicUsize::new(0),
            writes: Mutex::new(()),
        }
    }
}

#[async_trait]
impl JourneyRepository for RacingLoads {
    async fn insert_journey(&self, journey: &Journey) -> Result<Journey, StorageError> {
        self.inner.insert_journey(journey).await
    }

    async fn save_journey(&self, journey: &Journey) -> Result<Journey, StorageError> {
        let _write = self.writes.lock().await;
        self.inner.save_journey(journey).await
    }

    async fn get_journey_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Option<Journey>, StorageError> {
        let loaded = self.inner.get_journey_for_student(student).await;
        if self.gated.fetch_add(1, Ordering::SeqCst) < 2 {
            self.gate.wait().await;
        }
        loaded
    }

    async fn delete_journey_for_student(&self, student: &StudentId) -> Result<bool, StorageError> {
        self.inner.delete_journey_for_student(student).await
    }
}

async fn racing_service(name: &str, student: &StudentId) -> (Storage, JourneyService) {
    let storage = Storage::sqlite(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect sqlite");
    let setup = JourneyService::new(
        Clock::fixed(fixed_now()),
        Arc::clone(&storage.journeys),
        Arc::clone(&storage.sessions),
    );
    setup
        .create_journey(student, &two_step_draft())
        .await
        .expect("create journey");

    // Completed behind the journey's back so both racers have stamps to write.
    for id in ["s1", "s2"] {
        storage
            .sessions
            .upsert_session(&TherapySession::new(
                sid(id),
                student.clone(),
                SessionStatus::Completed,
                fixed_now(),
            ))
            .await
            .expect("record session");
    }

    let racing = JourneyService::new(
        Clock::fixed(fixed_now()),
        Arc::new(RacingLoads::new(Arc::clone(&storage.journeys))),
        Arc::clone(&storage.sessions),
    );
    (storage, racing)
}

async fn stored_claim(storage: &Storage, student: &StudentId) -> bool {
    storage
        .journeys
        .get_journey_for_student(student)
        .await
        .expect("load")
        .expect("journey exists")
        .steps()[0]
        .trophy()
        .expect("trophy")
        .is_claimed()
}

#[tokio::test]
async fn journey_flow_concurrent_claims_on_sqlite() {
    let student = StudentId::new("kid-9").expect("student id");
    let (storage, journeys) = racing_service("memdb_journey_claim_race", &student).await;

    let (first, second) = tokio::join!(
        journeys.claim_trophy(&student, 1),
        journeys.claim_trophy(&student, 1)
    );
    let wins = [first.is_ok(), second.is_ok()];
    assert_eq!(wins.iter().filter(|ok| **ok).count(), 1);
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(
        loser,
        Err(JourneyServiceError::Claim(ClaimError::AlreadyClaimed { ordinal: 1 }))
    ));
    assert!(stored_claim(&storage, &student).await);
}

#[tokio::test]
async fn journey_flow_sync_never_erases_claim_on_sqlite() {
    let student = StudentId::new("kid-10").expect("student id");
    let (storage, journeys) = racing_service("memdb_journey_sync_race", &student).await;

    let (view, claim) = tokio::join!(
        journeys.journey_progress(&student),
        journeys.claim_trophy(&student, 1)
    );
    assert!(view.expect("progress").is_some());
    assert_eq!(claim.expect("claim").name(), "Bronze paw");
    assert!(stored_claim(&storage, &student).await);

    let view = journeys
        .journey_progress(&student)
        .await
        .expect("progress")
        .expect("journey exists");
    assert_eq!(view.progress.trophies_claimed, 1);
    assert!(view.progress.steps[1].is_unlocked);
}
