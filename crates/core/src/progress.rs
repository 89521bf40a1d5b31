//! Journey progress evaluation.
//!
//! Progress is re-derived from the student's completed sessions on every
//! read. [`apply_completions`] folds the result back into the journey so
//! completion, trophy, and unlock timestamps are stamped exactly once.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Journey, SessionId, Step};

/// Set of session ids whose status is `completed` for one student.
pub type CompletedSessions = HashSet<SessionId>;

//
// ─── STEP PROGRESS ─────────────────────────────────────────────────────────────
//

/// Evaluation of a single step against the completed-session set.
///
/// # Examples
///
/// ```
/// # use journey_core::model::{SessionId, Step};
/// # use journey_core::progress::{evaluate_step, CompletedSessions};
/// let ids = ["a", "b", "c"].map(|s| SessionId::new(s).unwrap());
/// let step = Step::new(1, "First words", ids.to_vec(), 2).unwrap();
/// let done: CompletedSessions = [ids[0].clone()].into_iter().collect();
///
/// let progress = evaluate_step(&step, &done);
/// assert_eq!(progress.completed_count, 1);
/// assert_eq!(progress.progress_percentage, 50);
/// assert!(!progress.is_completed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepProgress {
    pub ordinal: u32,
    pub completed_count: u32,
    pub required_count: u32,
    pub progress_percentage: u8,
    pub is_completed: bool,
    pub is_unlocked: bool,
    pub can_claim: bool,
}

/// Evaluate one step.
///
/// `is_completed` reflects the current session set only; a step already
/// stamped completed in storage stays completed through
/// [`apply_completions`] even if sessions are later reverted.
#[must_use]
pub fn evaluate_step(step: &Step, completed: &CompletedSessions) -> StepProgress {
    let completed_count = step
        .session_ids()
        .iter()
        .filter(|id| completed.contains(*id))
        .count();
    // Bounded by the step's own session list.
    let completed_count = u32::try_from(completed_count).unwrap_or(u32::MAX);
    let required_count = step.required_count();
    let is_completed = completed_count >= required_count;
    let can_claim = is_completed && step.trophy().is_some_and(|t| !t.is_claimed());

    StepProgress {
        ordinal: step.ordinal(),
        completed_count,
        required_count,
        progress_percentage: percentage(completed_count, required_count),
        is_completed,
        is_unlocked: step.is_unlocked(),
        can_claim,
    }
}

fn percentage(count: u32, required: u32) -> u8 {
    if required == 0 {
        return 100;
    }
    let pct = (u64::from(count) * 100 / u64::from(required)).min(100);
    u8::try_from(pct).unwrap_or(100)
}

//
// ─── JOURNEY PROGRESS ──────────────────────────────────────────────────────────
//

/// Aggregate view over every step of a journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JourneyProgress {
    pub steps: Vec<StepProgress>,
    pub completed_steps: u32,
    pub total_steps: u32,
    pub trophies_earned: u32,
    pub trophies_claimed: u32,
    pub overall_percentage: u8,
    /// Lowest-ordinal step not yet completed; `None` once all are done.
    pub current_step: Option<u32>,
}

/// Evaluate every step of `journey`.
///
/// Steps already stamped completed count as completed regardless of the
/// session set, matching the no-regression rule.
#[must_use]
pub fn evaluate_journey(journey: &Journey, completed: &CompletedSessions) -> JourneyProgress {
    let mut steps = Vec::with_capacity(journey.steps().len());
    let mut completed_steps = 0_u32;
    let mut trophies_earned = 0_u32;
    let mut trophies_claimed = 0_u32;
    let mut current_step = None;

    for step in journey.steps() {
        let mut progress = evaluate_step(step, completed);
        if step.is_completed() && !progress.is_completed {
            progress.is_completed = true;
            progress.progress_percentage = 100;
            progress.can_claim = step.trophy().is_some_and(|t| !t.is_claimed());
        }

        if progress.is_completed {
            completed_steps += 1;
        } else if current_step.is_none() {
            current_step = Some(step.ordinal());
        }
        if let Some(trophy) = step.trophy() {
            if trophy.is_earned() || progress.is_completed {
                trophies_earned += 1;
            }
            if trophy.is_claimed() {
                trophies_claimed += 1;
            }
        }
        steps.push(progress);
    }

    let total_steps = u32::try_from(steps.len()).unwrap_or(u32::MAX);
    JourneyProgress {
        steps,
        completed_steps,
        total_steps,
        trophies_earned,
        trophies_claimed,
        overall_percentage: percentage(completed_steps, total_steps),
        current_step,
    }
}

//
// ─── STATE TRANSITIONS ─────────────────────────────────────────────────────────
//

/// Stamp newly completed steps on `journey`.
///
/// For each step that the session set satisfies and that is not yet marked
/// completed: stamp its completion, mark its trophy earned, and unlock the
/// next step if it is still locked. Steps are never un-completed and earlier
/// steps are never touched.
///
/// Returns `true` if anything changed.
pub fn apply_completions(
    journey: &mut Journey,
    completed: &CompletedSessions,
    now: DateTime<Utc>,
) -> bool {
    let mut changed = false;
    let steps = journey.steps_mut();

    for idx in 0..steps.len() {
        let step = &mut steps[idx];
        if step.is_completed() || !evaluate_step(step, completed).is_completed {
            continue;
        }

        step.mark_completed(now);
        if let Some(trophy) = step.trophy_mut() {
            trophy.mark_earned(now);
        }
        if let Some(next) = steps.get_mut(idx + 1) {
            next.unlock(now);
        }
        changed = true;
    }

    if changed {
        journey.touch(now);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StudentId, Trophy};
    use crate::time::fixed_now;

    fn sid(raw: &str) -> SessionId {
        SessionId::new(raw).unwrap()
    }

    fn done(ids: &[&str]) -> CompletedSessions {
        ids.iter().map(|s| sid(s)).collect()
    }

    fn step(ordinal: u32, sessions: &[&str], required: u32, trophy: bool) -> Step {
        let step = Step::new(
            ordinal,
            format!("Step {ordinal}"),
            sessions.iter().map(|s| sid(s)).collect(),
            required,
        )
        .unwrap();
        if trophy {
            step.with_trophy(Some(Trophy::new("Star").unwrap()))
        } else {
            step
        }
    }

    fn journey(steps: Vec<Step>) -> Journey {
        Journey::new(
            StudentId::new("stu").unwrap(),
            "Sounds",
            None,
            steps,
            None,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn threshold_met_with_two_of_three() {
        let s = step(1, &["a", "b", "c"], 2, false);
        let p = evaluate_step(&s, &done(&["a", "c"]));
        assert_eq!(p.completed_count, 2);
        assert_eq!(p.progress_percentage, 100);
        assert!(p.is_completed);
    }

    #[test]
    fn one_of_two_required_is_half() {
        let s = step(1, &["a", "b", "c"], 2, false);
        let p = evaluate_step(&s, &done(&["a"]));
        assert_eq!(p.completed_count, 1);
        assert_eq!(p.progress_percentage, 50);
        assert!(!p.is_completed);
    }

    #[test]
    fn percentage_is_clamped_when_over_threshold() {
        let s = step(1, &["a", "b", "c", "d"], 2, false);
        let p = evaluate_step(&s, &done(&["a", "b", "c", "d"]));
        assert_eq!(p.completed_count, 4);
        assert_eq!(p.progress_percentage, 100);
    }

    #[test]
    fn count_ignores_sessions_outside_the_step() {
        let s = step(1, &["a"], 3, false);
        let p = evaluate_step(&s, &done(&["a", "x", "y", "z"]));
        assert_eq!(p.completed_count, 1);
        assert!(p.completed_count as usize <= s.session_ids().len());
        assert_eq!(p.progress_percentage, 33);
    }

    #[test]
    fn completion_matches_threshold_across_counts() {
        let s = step(1, &["a", "b", "c"], 2, true);
        let all = ["a", "b", "c"];
        for n in 0..=all.len() {
            let p = evaluate_step(&s, &done(&all[..n]));
            assert_eq!(p.is_completed, p.completed_count >= p.required_count);
            assert!(p.progress_percentage <= 100);
        }
    }

    #[test]
    fn cannot_claim_without_trophy() {
        let s = step(1, &["a"], 1, false);
        let p = evaluate_step(&s, &done(&["a"]));
        assert!(p.is_completed);
        assert!(!p.can_claim);
    }

    #[test]
    fn cannot_claim_twice() {
        let mut j = journey(vec![step(1, &["a"], 1, true)]);
        assert!(apply_completions(&mut j, &done(&["a"]), fixed_now()));
        assert!(evaluate_step(&j.steps()[0], &done(&["a"])).can_claim);

        j.claim_trophy(1, fixed_now()).unwrap();
        assert!(!evaluate_step(&j.steps()[0], &done(&["a"])).can_claim);
    }

    #[test]
    fn completing_step_unlocks_only_the_next() {
        let mut j = journey(vec![
            step(1, &["a"], 1, true),
            step(2, &["b"], 1, true),
            step(3, &["c"], 1, true),
        ]);
        let later = fixed_now() + chrono::Duration::hours(2);

        // Step 2 satisfied out of order.
        assert!(apply_completions(&mut j, &done(&["b"]), later));
        let steps = j.steps();
        assert_eq!(steps[0].unlocked_at(), Some(fixed_now()));
        assert!(!steps[0].is_completed());
        assert!(steps[1].is_completed());
        assert_eq!(steps[1].completed_at(), Some(later));
        assert!(steps[1].trophy().unwrap().is_earned());
        assert_eq!(steps[2].unlocked_at(), Some(later));
        assert_eq!(j.updated_at(), later);
    }

    #[test]
    fn apply_is_idempotent_and_never_regresses() {
        let mut j = journey(vec![step(1, &["a"], 1, true), step(2, &["b"], 1, false)]);
        assert!(apply_completions(&mut j, &done(&["a"]), fixed_now()));
        assert!(!apply_completions(&mut j, &done(&["a"]), fixed_now()));

        // Session "a" reverted: step stays completed.
        assert!(!apply_completions(&mut j, &done(&[]), fixed_now()));
        assert!(j.steps()[0].is_completed());

        let progress = evaluate_journey(&j, &done(&[]));
        assert!(progress.steps[0].is_completed);
        assert_eq!(progress.steps[0].progress_percentage, 100);
        assert_eq!(progress.current_step, Some(2));
    }

    #[test]
    fn journey_totals() {
        let mut j = journey(vec![
            step(1, &["a"], 1, true),
            step(2, &["b", "c"], 2, true),
            step(3, &["d"], 1, false),
        ]);
        let sessions = done(&["a", "b"]);
        apply_completions(&mut j, &sessions, fixed_now());
        j.claim_trophy(1, fixed_now()).unwrap();

        let p = evaluate_journey(&j, &sessions);
        assert_eq!(p.total_steps, 3);
        assert_eq!(p.completed_steps, 1);
        assert_eq!(p.trophies_earned, 1);
        assert_eq!(p.trophies_claimed, 1);
        assert_eq!(p.overall_percentage, 33);
        assert_eq!(p.current_step, Some(2));
        assert_eq!(p.steps[1].progress_percentage, 50);
    }
}
