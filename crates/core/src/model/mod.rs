mod ids;
mod journey;
mod session;
mod step;
mod trophy;

pub use ids::{JourneyId, ParseIdError, SessionId, StudentId, UserId};
pub use journey::{ClaimError, Journey, JourneyError};
pub use session::{SessionStatus, SessionStatusError, TherapySession};
pub use step::{Step, StepError};
pub use trophy::{Trophy, TrophyError};
