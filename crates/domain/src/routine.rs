use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{
    CreateError, DeleteError, Exercise, ExerciseID, MuscleID, Name, RPE, ReadError, Reps,
    Stimulus, Time, UpdateError, UserID, Weight, id::uuid_id,
};

#[async_trait]
pub trait RoutineService: Send + Sync + 'static {
    async fn get_routines(
        &self,
        user_id: UserID,
        include_archived: bool,
    ) -> Result<Vec<Routine>, ReadError>;
    async fn get_routine(&self, user_id: UserID, id: RoutineID) -> Result<Routine, ReadError>;
    async fn create_routine(
        &self,
        user_id: UserID,
        routine: NewRoutine,
    ) -> Result<Routine, CreateError>;
    async fn modify_routine(
        &self,
        user_id: UserID,
        id: RoutineID,
        changes: RoutineChanges,
    ) -> Result<Routine, UpdateError>;
    async fn delete_routine(&self, user_id: UserID, id: RoutineID)
    -> Result<RoutineID, DeleteError>;
}

#[async_trait]
pub trait RoutineRepository: Send + Sync + 'static {
    async fn read_routines(&self, user_id: UserID) -> Result<Vec<Routine>, ReadError>;
    async fn read_routine(&self, user_id: UserID, id: RoutineID) -> Result<Routine, ReadError>;
    async fn create_routine(
        &self,
        user_id: UserID,
        routine: NewRoutine,
    ) -> Result<Routine, CreateError>;
    async fn modify_routine(
        &self,
        user_id: UserID,
        id: RoutineID,
        changes: RoutineChanges,
    ) -> Result<Routine, UpdateError>;
    async fn delete_routine(&self, user_id: UserID, id: RoutineID)
    -> Result<RoutineID, DeleteError>;
}

pub const MAX_DAYS: usize = 14;
pub const MAX_EXERCISES_PER_DAY: usize = 30;
pub const MAX_SETS: u32 = 20;
/// Assumed tempo for time estimates.
pub const SECONDS_PER_REP: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    pub id: RoutineID,
    pub owner: UserID,
    pub name: Name,
    pub notes: String,
    pub archived: bool,
    pub days: Vec<RoutineDay>,
    pub created_at: DateTime<Utc>,
}

impl Routine {
    pub fn duration(&self) -> Duration {
        self.days.iter().map(RoutineDay::duration).sum()
    }

    pub fn num_sets(&self) -> u32 {
        self.days.iter().map(RoutineDay::num_sets).sum()
    }

    #[must_use]
    pub fn day(&self, index: usize) -> Option<&RoutineDay> {
        self.days.get(index)
    }

    #[must_use]
    pub fn stimulus_per_muscle(
        &self,
        exercises: &BTreeMap<ExerciseID, Exercise>,
    ) -> BTreeMap<MuscleID, Stimulus> {
        let mut result: BTreeMap<MuscleID, Stimulus> =
            MuscleID::muscles().map(|m| (m, Stimulus::NONE)).collect();
        for day in &self.days {
            for (muscle_id, stimulus) in day.stimulus_per_muscle(exercises) {
                if let Some(total) = result.get_mut(&muscle_id) {
                    *total += stimulus;
                }
            }
        }
        result
    }

    pub fn exercises(&self) -> BTreeSet<ExerciseID> {
        self.days
            .iter()
            .flat_map(RoutineDay::exercises)
            .collect::<BTreeSet<_>>()
    }
}

uuid_id!(RoutineID);

#[derive(Debug, Clone, PartialEq)]
pub struct NewRoutine {
    pub name: Name,
    pub notes: String,
    pub days: Vec<RoutineDay>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RoutineChanges {
    pub name: Option<Name>,
    pub notes: Option<String>,
    pub archived: Option<bool>,
    pub days: Option<Vec<RoutineDay>>,
}

impl RoutineChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.notes.is_none() && self.archived.is_none() && self.days.is_none()
    }

    pub fn apply(self, routine: &mut Routine) {
        if let Some(name) = self.name {
            routine.name = name;
        }
        if let Some(notes) = self.notes {
            routine.notes = notes;
        }
        if let Some(archived) = self.archived {
            routine.archived = archived;
        }
        if let Some(days) = self.days {
            routine.days = days;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutineDay {
    pub name: Name,
    pub exercises: Vec<RoutineExercise>,
}

impl RoutineDay {
    pub fn duration(&self) -> Duration {
        self.exercises.iter().map(RoutineExercise::duration).sum()
    }

    pub fn num_sets(&self) -> u32 {
        self.exercises.iter().map(|e| e.sets).sum()
    }

    #[must_use]
    pub fn stimulus_per_muscle(
        &self,
        exercises: &BTreeMap<ExerciseID, Exercise>,
    ) -> BTreeMap<MuscleID, Stimulus> {
        let mut result: BTreeMap<MuscleID, Stimulus> = BTreeMap::new();
        for e in &self.exercises {
            if let Some(exercise) = exercises.get(&e.exercise_id) {
                for (muscle_id, stimulus) in exercise.muscle_stimulus() {
                    *result.entry(muscle_id).or_insert(Stimulus::NONE) += stimulus * e.sets;
                }
            }
        }
        result
    }

    fn exercises(&self) -> BTreeSet<ExerciseID> {
        self.exercises.iter().map(|e| e.exercise_id).collect()
    }
}

/// A prescribed exercise within a routine day.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineExercise {
    pub exercise_id: ExerciseID,
    pub sets: u32,
    pub reps: Reps,
    pub weight: Option<Weight>,
    pub rpe: Option<RPE>,
    pub rest: Time,
}

impl RoutineExercise {
    /// Estimated time for all sets including the rest after each set.
    pub fn duration(&self) -> Duration {
        let reps = if self.reps > Reps::default() {
            self.reps
        } else {
            Reps::ONE
        };
        let per_set = Duration::seconds(i64::from(u32::from(reps) * SECONDS_PER_REP))
            + self.rest.duration();
        per_set * i32::try_from(self.sets).unwrap_or(i32::MAX)
    }
}

/// Checks the structural limits of routine days.
pub fn validate_days(days: &[RoutineDay]) -> Result<(), RoutineError> {
    if days.len() > MAX_DAYS {
        return Err(RoutineError::TooManyDays(days.len()));
    }
    for day in days {
        if day.exercises.len() > MAX_EXERCISES_PER_DAY {
            return Err(RoutineError::TooManyExercises(day.exercises.len()));
        }
        for e in &day.exercises {
            if e.exercise_id.is_nil() {
                return Err(RoutineError::MissingExercise);
            }
            if !(1..=MAX_SETS).contains(&e.sets) {
                return Err(RoutineError::InvalidSets(e.sets));
            }
        }
    }
    Ok(())
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RoutineError {
    #[error("A routine must have 14 days or fewer ({0} > 14)")]
    TooManyDays(usize),
    #[error("A day must have 30 exercises or fewer ({0} > 30)")]
    TooManyExercises(usize),
    #[error("Sets must be in the range 1 to 20 ({0})")]
    InvalidSets(u32),
    #[error("Exercise must be set")]
    MissingExercise,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::ExerciseMuscle;

    use super::*;

    static ROUTINE: std::sync::LazyLock<Routine> = std::sync::LazyLock::new(|| Routine {
        id: 1.into(),
        owner: 1.into(),
        name: Name::new("Upper Lower").unwrap(),
        notes: String::from("B"),
        archived: false,
        days: vec![
            RoutineDay {
                name: Name::new("Upper").unwrap(),
                exercises: vec![RoutineExercise {
                    exercise_id: 1.into(),
                    sets: 3,
                    reps: Reps::new(10).unwrap(),
                    weight: Some(Weight::new(30.0).unwrap()),
                    rpe: Some(RPE::EIGHT),
                    rest: Time::new(60).unwrap(),
                }],
            },
            RoutineDay {
                name: Name::new("Lower").unwrap(),
                exercises: vec![
                    RoutineExercise {
                        exercise_id: 2.into(),
                        sets: 2,
                        reps: Reps::default(),
                        weight: None,
                        rpe: None,
                        rest: Time::new(30).unwrap(),
                    },
                    RoutineExercise {
                        exercise_id: 1.into(),
                        sets: 1,
                        reps: Reps::new(5).unwrap(),
                        weight: None,
                        rpe: None,
                        rest: Time::default(),
                    },
                ],
            },
        ],
        created_at: DateTime::UNIX_EPOCH,
    });

    static EXERCISES: std::sync::LazyLock<BTreeMap<ExerciseID, Exercise>> =
        std::sync::LazyLock::new(|| {
            BTreeMap::from([(
                1.into(),
                Exercise {
                    id: 1.into(),
                    owner: None,
                    name: Name::new("A").unwrap(),
                    description: String::new(),
                    muscles: vec![
                        ExerciseMuscle {
                            muscle_id: MuscleID::Pecs,
                            stimulus: Stimulus::PRIMARY,
                        },
                        ExerciseMuscle {
                            muscle_id: MuscleID::FrontDelts,
                            stimulus: Stimulus::SECONDARY,
                        },
                    ],
                    force: None,
                    mechanic: None,
                    equipment: vec![],
                    category: crate::Category::Strength,
                },
            )])
        });

    #[test]
    fn test_routine_duration() {
        // 3 * (40 + 60) + 2 * (4 + 30) + 1 * 20
        assert_eq!(ROUTINE.duration(), Duration::seconds(388));
    }

    #[test]
    fn test_routine_num_sets() {
        assert_eq!(ROUTINE.num_sets(), 6);
        assert_eq!(ROUTINE.day(1).map(RoutineDay::num_sets), Some(3));
        assert_eq!(ROUTINE.day(2), None);
    }

    #[test]
    fn test_routine_stimulus_per_muscle() {
        let stimulus = ROUTINE.stimulus_per_muscle(&EXERCISES);
        assert_eq!(stimulus.len(), 18);
        assert_eq!(stimulus[&MuscleID::Pecs], Stimulus::PRIMARY * 4);
        assert_eq!(stimulus[&MuscleID::FrontDelts], Stimulus::PRIMARY * 2);
        assert_eq!(stimulus[&MuscleID::Lats], Stimulus::NONE);
    }

    #[test]
    fn test_routine_exercises() {
        assert_eq!(ROUTINE.exercises(), BTreeSet::from([1.into(), 2.into()]));
    }

    #[test]
    fn test_routine_changes_apply() {
        let mut routine = ROUTINE.clone();
        let changes = RoutineChanges {
            name: Some(Name::new("Full Body").unwrap()),
            archived: Some(true),
            ..RoutineChanges::default()
        };
        assert!(!changes.is_empty());
        changes.apply(&mut routine);
        assert_eq!(routine.name.as_ref(), "Full Body");
        assert!(routine.archived);
        assert_eq!(routine.notes, "B");
        assert_eq!(routine.days, ROUTINE.days);
        assert!(RoutineChanges::default().is_empty());
    }

    #[rstest]
    #[case(ROUTINE.days.clone(), Ok(()))]
    #[case(
        vec![ROUTINE.days[0].clone(); 15],
        Err(RoutineError::TooManyDays(15))
    )]
    #[case(
        vec![RoutineDay {
            name: Name::new("A").unwrap(),
            exercises: vec![ROUTINE.days[0].exercises[0].clone(); 31],
        }],
        Err(RoutineError::TooManyExercises(31))
    )]
    #[case(
        vec![RoutineDay {
            name: Name::new("A").unwrap(),
            exercises: vec![RoutineExercise { sets: 0, ..ROUTINE.days[0].exercises[0].clone() }],
        }],
        Err(RoutineError::InvalidSets(0))
    )]
    #[case(
        vec![RoutineDay {
            name: Name::new("A").unwrap(),
            exercises: vec![RoutineExercise {
                exercise_id: ExerciseID::nil(),
                ..ROUTINE.days[0].exercises[0].clone()
            }],
        }],
        Err(RoutineError::MissingExercise)
    )]
    fn test_validate_days(#[case] days: Vec<RoutineDay>, #[case] expected: Result<(), RoutineError>) {
        assert_eq!(validate_days(&days), expected);
    }

    #[test]
    fn test_routine_id_nil() {
        assert!(RoutineID::nil().is_nil());
        assert_eq!(RoutineID::nil(), RoutineID::default());
    }
}
