use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::journey_service::JourneyService;
use crate::session_service::SessionService;

/// Wires the journey and session services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    journeys: Arc<JourneyService>,
    sessions: Arc<SessionService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, running migrations.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let journeys = Arc::new(JourneyService::new(
            clock,
            Arc::clone(&storage.journeys),
            Arc::clone(&storage.sessions),
        ));
        let sessions = Arc::new(
            SessionService::new(clock, Arc::clone(&storage.sessions))
                .with_journeys(Arc::clone(&journeys)),
        );
        Self { journeys, sessions }
    }

    #[must_use]
    pub fn journeys(&self) -> Arc<JourneyService> {
        Arc::clone(&self.journeys)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionService> {
        Arc::clone(&self.sessions)
    }
}
