//! Stepping through the sets of a workout while it is performed.
//!
//! The tracker works on a local copy of the workout and never reads the clock
//! itself. Every transition receives the current time, so the same state can be
//! computed by a client ticking every second or by the server on request.

use chrono::{DateTime, Duration, Utc};

use crate::{RPE, Reps, Weight, Workout, WorkoutSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Exercising { set_started_at: DateTime<Utc> },
    Resting { until: DateTime<Utc>, next: usize },
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Values recorded when finishing a set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetValues {
    pub reps: Reps,
    pub weight: Option<Weight>,
    pub rpe: Option<RPE>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveWorkout {
    workout: Workout,
    cursor: Option<usize>,
    phase: Phase,
}

impl ActiveWorkout {
    /// Resumes a workout from its persisted sets.
    ///
    /// The cursor is placed on the first uncompleted set. If the most recently
    /// completed set has a rest target that has not elapsed at `now`, the
    /// tracker starts in the resting phase.
    #[must_use]
    pub fn new(workout: Workout, now: DateTime<Utc>) -> Self {
        let cursor = first_uncompleted(&workout.sets, 0);
        let last_completed = workout
            .sets
            .iter()
            .filter_map(|s| s.completed_at.map(|completed_at| (completed_at, s)))
            .max_by_key(|(completed_at, _)| *completed_at);
        let rest_end = last_completed
            .map(|(completed_at, s)| completed_at + s.target_rest.unwrap_or_default().duration());

        let phase = match (cursor, rest_end) {
            (None, _) if !workout.sets.is_empty() => Phase::Completed,
            (Some(next), Some(until)) if until > now => Phase::Resting { until, next },
            _ => Phase::Exercising {
                set_started_at: rest_end.unwrap_or(workout.started_at).min(now),
            },
        };

        Self {
            workout,
            cursor,
            phase,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    /// The set being performed, or the next one while resting.
    #[must_use]
    pub fn current(&self) -> Option<&WorkoutSet> {
        self.cursor.and_then(|index| self.workout.sets.get(index))
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.workout.completed_sets().count(),
            total: self.workout.sets.len(),
        }
    }

    /// Records the values of the current set and moves on.
    ///
    /// Returns the completed set so that it can be persisted.
    pub fn complete_current(
        &mut self,
        values: SetValues,
        now: DateTime<Utc>,
    ) -> Result<&WorkoutSet, TrackerError> {
        if matches!(self.phase, Phase::Completed) {
            return Err(TrackerError::AlreadyCompleted);
        }
        let index = self.cursor.ok_or(TrackerError::NoSet)?;
        let set = self
            .workout
            .sets
            .get_mut(index)
            .ok_or(TrackerError::NoSet)?;
        set.reps = Some(values.reps);
        set.weight = values.weight;
        set.rpe = values.rpe;
        set.completed_at = Some(now);
        let rest = set.target_rest.unwrap_or_default();

        match first_uncompleted(&self.workout.sets, index + 1) {
            None => {
                self.cursor = None;
                self.phase = Phase::Completed;
            }
            Some(next) => {
                self.cursor = Some(next);
                self.phase = if rest.is_zero() {
                    Phase::Exercising {
                        set_started_at: now,
                    }
                } else {
                    Phase::Resting {
                        until: now + rest.duration(),
                        next,
                    }
                };
            }
        }

        Ok(&self.workout.sets[index])
    }

    /// Ends the rest once its time is up. Returns whether the phase changed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        match self.phase {
            Phase::Resting { until, .. } if now >= until => {
                self.phase = Phase::Exercising {
                    set_started_at: until,
                };
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn rest_remaining(&self, now: DateTime<Utc>) -> Duration {
        match self.phase {
            Phase::Resting { until, .. } => (until - now).max(Duration::zero()),
            _ => Duration::zero(),
        }
    }

    pub fn skip_rest(&mut self, now: DateTime<Utc>) {
        if let Phase::Resting { .. } = self.phase {
            self.phase = Phase::Exercising {
                set_started_at: now,
            };
        }
    }

    /// Jumps to an uncompleted set, cancelling a running rest.
    pub fn select(&mut self, index: usize, now: DateTime<Utc>) -> Result<(), TrackerError> {
        let set = self
            .workout
            .sets
            .get(index)
            .ok_or(TrackerError::NoSet)?;
        if set.is_completed() {
            return Err(TrackerError::SetCompleted);
        }
        self.cursor = Some(index);
        self.phase = Phase::Exercising {
            set_started_at: now,
        };
        Ok(())
    }

    /// Time since the start of the workout, up to its finish if it has one.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.workout.finished_at.unwrap_or(now);
        (end - self.workout.started_at).max(Duration::zero())
    }
}

/// Searches from `start` to the end and then wraps around, so skipped sets are
/// picked up again after the last one.
fn first_uncompleted(sets: &[WorkoutSet], start: usize) -> Option<usize> {
    (start..sets.len())
        .chain(0..start.min(sets.len()))
        .find(|i| !sets[*i].is_completed())
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TrackerError {
    #[error("Workout is already completed")]
    AlreadyCompleted,
    #[error("Set does not exist")]
    NoSet,
    #[error("Set is already completed")]
    SetCompleted,
}
