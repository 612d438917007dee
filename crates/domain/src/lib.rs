#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod active_workout;
pub mod catalog;
mod error;
mod exercise;
mod id;
mod measure;
mod name;
mod preferences;
mod routine;
mod service;
mod session;
mod statistics;
mod user;
mod workout;

pub use active_workout::{ActiveWorkout, Phase, Progress, SetValues, TrackerError};
pub use error::{
    BoxError, CreateError, DeleteError, ReadError, StorageError, UpdateError, ValidationError,
};
pub use exercise::{
    Category, Equipment, Exercise, ExerciseError, ExerciseFilter, ExerciseID, ExerciseMuscle,
    ExerciseRepository, ExerciseService, Force, MAX_DESCRIPTION_LENGTH, Mechanic, MuscleID,
    MuscleIDError, NewExercise, Property, Stimulus, StimulusError, validate_muscles,
};
pub use measure::{RIR, RPE, RPEError, Reps, RepsError, Time, TimeError, Weight, WeightError};
pub use name::{MAX_NAME_LENGTH, Name, NameError};
pub use preferences::{Preferences, PreferencesError, PreferencesRepository, Theme, WeightUnit};
pub use routine::{
    MAX_DAYS, MAX_EXERCISES_PER_DAY, MAX_SETS, NewRoutine, Routine, RoutineChanges, RoutineDay,
    RoutineError, RoutineExercise, RoutineID, RoutineRepository, RoutineService, validate_days,
};
pub use service::Service;
pub use session::{Session, SessionKind, SessionRepository};
pub use statistics::{
    PersonalRecord, Statistics, StatisticsService, Summary, TrainingLoad, estimated_one_rep_max,
    personal_records, sets_per_muscle, statistics, summary, training_load,
};
pub use user::{
    Email, EmailError, Identity, NewUser, Password, PasswordError, Provider, Role, User, UserID,
    UserRepository, UserService,
};
pub use workout::{
    NewWorkout, NewWorkoutSet, SetChanges, StartWorkout, Workout, WorkoutChanges, WorkoutError,
    WorkoutFilter, WorkoutID, WorkoutRepository, WorkoutService, WorkoutSet, WorkoutSetID,
    planned_sets,
};
