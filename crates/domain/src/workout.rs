use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::{
    CreateError, DeleteError, Exercise, ExerciseID, MuscleID, Name, RPE, ReadError, Reps,
    RoutineDay, RoutineExercise, RoutineID, Stimulus, Time, UpdateError, UserID, Weight,
    id::uuid_id, routine::SECONDS_PER_REP,
};

#[async_trait]
pub trait WorkoutService: Send + Sync + 'static {
    async fn get_workouts(
        &self,
        user_id: UserID,
        filter: &WorkoutFilter,
    ) -> Result<Vec<Workout>, ReadError>;
    async fn get_workout(&self, user_id: UserID, id: WorkoutID) -> Result<Workout, ReadError>;
    async fn get_active_workout(&self, user_id: UserID) -> Result<Option<Workout>, ReadError>;
    async fn start_workout(
        &self,
        user_id: UserID,
        start: StartWorkout,
        now: DateTime<Utc>,
    ) -> Result<Workout, CreateError>;
    async fn modify_workout(
        &self,
        user_id: UserID,
        id: WorkoutID,
        changes: WorkoutChanges,
    ) -> Result<Workout, UpdateError>;
    async fn finish_workout(
        &self,
        user_id: UserID,
        id: WorkoutID,
        now: DateTime<Utc>,
    ) -> Result<Workout, UpdateError>;
    async fn delete_workout(&self, user_id: UserID, id: WorkoutID)
    -> Result<WorkoutID, DeleteError>;
    async fn add_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set: NewWorkoutSet,
    ) -> Result<Workout, CreateError>;
    async fn modify_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set_id: WorkoutSetID,
        changes: SetChanges,
    ) -> Result<Workout, UpdateError>;
    async fn delete_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set_id: WorkoutSetID,
    ) -> Result<Workout, DeleteError>;
}

#[async_trait]
pub trait WorkoutRepository: Send + Sync + 'static {
    /// Returns the matching workouts, most recently started first.
    async fn read_workouts(
        &self,
        user_id: UserID,
        filter: &WorkoutFilter,
    ) -> Result<Vec<Workout>, ReadError>;
    async fn read_workout(&self, user_id: UserID, id: WorkoutID) -> Result<Workout, ReadError>;
    async fn read_active_workout(&self, user_id: UserID) -> Result<Option<Workout>, ReadError>;
    async fn create_workout(
        &self,
        user_id: UserID,
        workout: NewWorkout,
    ) -> Result<Workout, CreateError>;
    /// Stores name, notes and finish time. Sets are left untouched.
    async fn replace_workout(
        &self,
        user_id: UserID,
        workout: Workout,
    ) -> Result<Workout, UpdateError>;
    async fn delete_workout(&self, user_id: UserID, id: WorkoutID)
    -> Result<WorkoutID, DeleteError>;
    /// Appends a set after the last position.
    async fn create_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set: NewWorkoutSet,
    ) -> Result<Workout, CreateError>;
    async fn replace_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set: WorkoutSet,
    ) -> Result<Workout, UpdateError>;
    /// Removes a set and closes the gap in the positions of the following sets.
    async fn delete_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set_id: WorkoutSetID,
    ) -> Result<Workout, DeleteError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workout {
    pub id: WorkoutID,
    pub owner: UserID,
    pub routine_id: Option<RoutineID>,
    pub routine_day: Option<u32>,
    pub name: Name,
    pub notes: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sets: Vec<WorkoutSet>,
}

impl Workout {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.started_at.date_naive()
    }

    #[must_use]
    pub fn exercises(&self) -> BTreeSet<ExerciseID> {
        self.sets.iter().map(|s| s.exercise_id).collect()
    }

    pub fn completed_sets(&self) -> impl Iterator<Item = &WorkoutSet> {
        self.sets.iter().filter(|s| s.is_completed())
    }

    #[must_use]
    pub fn set(&self, id: WorkoutSetID) -> Option<&WorkoutSet> {
        self.sets.iter().find(|s| s.id == id)
    }

    /// Time between start and finish, `None` while the workout is in progress.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.finished_at
            .map(|finished_at| (finished_at - self.started_at).max(Duration::zero()))
    }

    #[must_use]
    pub fn avg_rpe(&self) -> Option<RPE> {
        RPE::avg(&self.completed_sets().filter_map(|s| s.rpe).collect::<Vec<_>>())
    }

    #[must_use]
    pub fn load(&self) -> u32 {
        self.completed_sets().map(WorkoutSet::load).sum()
    }

    #[must_use]
    pub fn set_volume(&self) -> u32 {
        u32::try_from(self.completed_sets().filter(|s| s.is_effective()).count())
            .unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn volume_load(&self) -> u64 {
        self.completed_sets()
            .map(|s| u64::from(s.volume_load()))
            .sum()
    }

    /// Estimated time under tension in seconds.
    #[must_use]
    pub fn tut(&self) -> u32 {
        self.completed_sets()
            .filter_map(|s| s.reps)
            .map(|reps| u32::from(reps) * SECONDS_PER_REP)
            .sum()
    }

    #[must_use]
    pub fn stimulus_per_muscle(
        &self,
        exercises: &BTreeMap<ExerciseID, Exercise>,
    ) -> BTreeMap<MuscleID, Stimulus> {
        let mut result: BTreeMap<MuscleID, Stimulus> = BTreeMap::new();
        for set in self.completed_sets().filter(|s| s.is_effective()) {
            if let Some(exercise) = exercises.get(&set.exercise_id) {
                for (muscle_id, stimulus) in exercise.muscle_stimulus() {
                    *result.entry(muscle_id).or_insert(Stimulus::NONE) += stimulus;
                }
            }
        }
        result
    }
}

uuid_id!(WorkoutID);

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSet {
    pub id: WorkoutSetID,
    pub exercise_id: ExerciseID,
    pub position: u32,
    pub target_reps: Option<Reps>,
    pub target_weight: Option<Weight>,
    pub target_rpe: Option<RPE>,
    pub target_rest: Option<Time>,
    pub reps: Option<Reps>,
    pub weight: Option<Weight>,
    pub rpe: Option<RPE>,
    pub notes: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkoutSet {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// A set close enough to failure to count towards the training volume.
    #[must_use]
    pub fn is_effective(&self) -> bool {
        self.is_completed() && self.rpe.unwrap_or(RPE::TEN) >= RPE::SEVEN
    }

    #[must_use]
    pub fn load(&self) -> u32 {
        match self.rpe {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Some(rpe) if rpe > RPE::FIVE => (2.0_f32).powf(f32::from(rpe) - 5.0).round() as u32,
            _ => 1,
        }
    }

    #[must_use]
    pub fn volume_load(&self) -> u32 {
        match (self.reps, self.weight) {
            (Some(reps), Some(weight)) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let volume_load = (reps * weight).round() as u32;
                volume_load
            }
            (Some(reps), None) => u32::from(reps),
            (None, _) => 0,
        }
    }

    pub fn validate(&self) -> Result<(), WorkoutError> {
        if self.is_completed() && self.reps.is_none() {
            return Err(WorkoutError::MissingReps);
        }
        Ok(())
    }
}

uuid_id!(WorkoutSetID);

/// The request to begin a workout, either from a routine day or ad hoc.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StartWorkout {
    pub routine_id: Option<RoutineID>,
    pub day: Option<u32>,
    pub name: Option<Name>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkout {
    pub routine_id: Option<RoutineID>,
    pub routine_day: Option<u32>,
    pub name: Name,
    pub notes: String,
    pub started_at: DateTime<Utc>,
    pub sets: Vec<NewWorkoutSet>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NewWorkoutSet {
    pub exercise_id: ExerciseID,
    pub target_reps: Option<Reps>,
    pub target_weight: Option<Weight>,
    pub target_rpe: Option<RPE>,
    pub target_rest: Option<Time>,
    pub reps: Option<Reps>,
    pub weight: Option<Weight>,
    pub rpe: Option<RPE>,
    pub notes: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl NewWorkoutSet {
    #[must_use]
    pub fn planned(exercise: &RoutineExercise) -> Self {
        Self {
            exercise_id: exercise.exercise_id,
            target_reps: (exercise.reps > Reps::default()).then_some(exercise.reps),
            target_weight: exercise.weight,
            target_rpe: exercise.rpe,
            target_rest: Some(exercise.rest),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn into_set(self, id: WorkoutSetID, position: u32) -> WorkoutSet {
        WorkoutSet {
            id,
            exercise_id: self.exercise_id,
            position,
            target_reps: self.target_reps,
            target_weight: self.target_weight,
            target_rpe: self.target_rpe,
            target_rest: self.target_rest,
            reps: self.reps,
            weight: self.weight,
            rpe: self.rpe,
            notes: self.notes,
            completed_at: self.completed_at,
        }
    }

    pub fn validate(&self) -> Result<(), WorkoutError> {
        if self.exercise_id.is_nil() {
            return Err(WorkoutError::MissingExercise);
        }
        if self.completed_at.is_some() && self.reps.is_none() {
            return Err(WorkoutError::MissingReps);
        }
        Ok(())
    }
}

/// One planned set per prescribed set of the day, in prescription order.
#[must_use]
pub fn planned_sets(day: &RoutineDay) -> Vec<NewWorkoutSet> {
    day.exercises
        .iter()
        .flat_map(|e| (0..e.sets).map(|_| NewWorkoutSet::planned(e)))
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WorkoutChanges {
    pub name: Option<Name>,
    pub notes: Option<String>,
}

impl WorkoutChanges {
    pub fn apply(self, workout: &mut Workout) {
        if let Some(name) = self.name {
            workout.name = name;
        }
        if let Some(notes) = self.notes {
            workout.notes = notes;
        }
    }
}

/// Changes to a logged set. The outer `Option` marks whether a field is changed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SetChanges {
    pub reps: Option<Option<Reps>>,
    pub weight: Option<Option<Weight>>,
    pub rpe: Option<Option<RPE>>,
    pub notes: Option<String>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl SetChanges {
    pub fn apply(self, set: &mut WorkoutSet) -> Result<(), WorkoutError> {
        if let Some(reps) = self.reps {
            set.reps = reps;
        }
        if let Some(weight) = self.weight {
            set.weight = weight;
        }
        if let Some(rpe) = self.rpe {
            set.rpe = rpe;
        }
        if let Some(notes) = self.notes {
            set.notes = notes;
        }
        if let Some(completed_at) = self.completed_at {
            // keep the original completion time when a completed set is corrected
            set.completed_at = match (set.completed_at, completed_at) {
                (Some(previous), Some(_)) => Some(previous),
                (_, completed_at) => completed_at,
            };
        }
        set.validate()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkoutFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl WorkoutFilter {
    /// Start of `from` and start of the day after `to`, both in UTC.
    #[must_use]
    pub fn range(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (
            self.from.map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc()),
            self.to
                .and_then(|d| d.succ_opt())
                .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc()),
        )
    }

    #[must_use]
    pub fn matches(&self, workout: &Workout) -> bool {
        let (from, to) = self.range();
        from.is_none_or(|from| workout.started_at >= from)
            && to.is_none_or(|to| workout.started_at < to)
    }

    pub fn validate(&self) -> Result<(), WorkoutError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(WorkoutError::InvalidRange);
            }
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum WorkoutError {
    #[error("A completed set must have reps")]
    MissingReps,
    #[error("Exercise must be set")]
    MissingExercise,
    #[error("Start date must not be after end date")]
    InvalidRange,
}
