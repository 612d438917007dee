use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error};

use crate::{
    CreateError, DeleteError, Email, Exercise, ExerciseFilter, ExerciseID, ExerciseRepository,
    ExerciseService, Name, NewExercise, NewRoutine, NewUser, NewWorkout, NewWorkoutSet,
    ReadError, Routine, RoutineChanges, RoutineDay, RoutineID, RoutineRepository, RoutineService,
    SetChanges, StartWorkout, Statistics, StatisticsService, UpdateError, User, UserID,
    UserRepository, UserService, ValidationError, Workout, WorkoutChanges, WorkoutFilter,
    WorkoutID, WorkoutRepository, WorkoutService, WorkoutSetID, planned_sets, statistics,
    validate_days,
};

pub struct Service<R> {
    repository: R,
}

impl<R> Service<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }
}

macro_rules! log_on_error {
    ($func: expr, $error: ident, $action: literal, $entity: literal) => {{
        let result = $func.await;
        match result {
            Ok(_) => {}
            Err(ref err) => match err {
                $error::Storage(crate::StorageError::Unavailable) => {
                    debug!("failed to {} {}: {err}", $action, $entity);
                }
                $error::Storage(_) | $error::Other(_) => {
                    error!("failed to {} {}: {err}", $action, $entity);
                }
                _ => {
                    debug!("could not {} {}: {err}", $action, $entity);
                }
            },
        }
        result
    }};
}

#[async_trait]
impl<R: UserRepository> UserService for Service<R> {
    async fn get_user(&self, id: UserID) -> Result<User, ReadError> {
        log_on_error!(self.repository.read_user(id), ReadError, "get", "user")
    }

    async fn get_users(&self) -> Result<Vec<User>, ReadError> {
        log_on_error!(self.repository.read_users(), ReadError, "get", "users")
    }

    async fn create_user(&self, user: NewUser) -> Result<User, CreateError> {
        log_on_error!(
            self.repository.create_user(user),
            CreateError,
            "create",
            "user"
        )
    }

    async fn modify_user(
        &self,
        id: UserID,
        name: Option<Name>,
        email: Option<Email>,
    ) -> Result<User, UpdateError> {
        log_on_error!(
            self.modify_user_inner(id, name, email),
            UpdateError,
            "modify",
            "user"
        )
    }

    async fn delete_user(&self, id: UserID) -> Result<UserID, DeleteError> {
        log_on_error!(
            self.repository.delete_user(id),
            DeleteError,
            "delete",
            "user"
        )
    }

    async fn validate_user_email(&self, email: &str, id: UserID) -> Result<Email, ValidationError> {
        let email = Email::new(email).map_err(|err| ValidationError::invalid("email", err))?;
        match self.repository.read_user_by_email(&email).await {
            Ok(user) if user.id != id => Err(ValidationError::Conflict("email".to_string())),
            Ok(_) | Err(ReadError::NotFound) => Ok(email),
            Err(err) => {
                error!("failed to validate email: {err}");
                Err(ValidationError::Other(err.into()))
            }
        }
    }
}

impl<R: UserRepository> Service<R> {
    async fn modify_user_inner(
        &self,
        id: UserID,
        name: Option<Name>,
        email: Option<Email>,
    ) -> Result<User, UpdateError> {
        let mut user = self.repository.read_user(id).await?;
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(email) = email {
            match self.repository.read_user_by_email(&email).await {
                Ok(other) if other.id != id => return Err(UpdateError::Conflict),
                Ok(_) | Err(ReadError::NotFound) => {}
                Err(err) => return Err(err.into()),
            }
            user.email = email;
        }
        self.repository.replace_user(user).await
    }
}

#[async_trait]
impl<R: ExerciseRepository> ExerciseService for Service<R> {
    async fn get_exercises(
        &self,
        user_id: UserID,
        filter: &ExerciseFilter,
    ) -> Result<Vec<Exercise>, ReadError> {
        let exercises = log_on_error!(
            self.repository.read_exercises(user_id),
            ReadError,
            "get",
            "exercises"
        )?;
        Ok(exercises.into_iter().filter(|e| filter.matches(e)).collect())
    }

    async fn get_exercise(&self, user_id: UserID, id: ExerciseID) -> Result<Exercise, ReadError> {
        log_on_error!(
            self.repository.read_exercise(user_id, id),
            ReadError,
            "get",
            "exercise"
        )
    }

    async fn create_exercise(
        &self,
        user_id: UserID,
        exercise: NewExercise,
    ) -> Result<Exercise, CreateError> {
        exercise
            .validate()
            .map_err(|err| ValidationError::invalid("exercise", err))?;
        log_on_error!(
            self.repository.create_exercise(user_id, exercise),
            CreateError,
            "create",
            "exercise"
        )
    }

    async fn replace_exercise(
        &self,
        user_id: UserID,
        exercise: Exercise,
    ) -> Result<Exercise, UpdateError> {
        log_on_error!(
            self.replace_exercise_inner(user_id, exercise),
            UpdateError,
            "replace",
            "exercise"
        )
    }

    async fn delete_exercise(
        &self,
        user_id: UserID,
        id: ExerciseID,
    ) -> Result<ExerciseID, DeleteError> {
        log_on_error!(
            self.delete_exercise_inner(user_id, id),
            DeleteError,
            "delete",
            "exercise"
        )
    }
}

impl<R: ExerciseRepository> Service<R> {
    /// Reads an exercise the user may change. Catalog exercises are read-only.
    async fn own_exercise(&self, user_id: UserID, id: ExerciseID) -> Result<Exercise, ReadError> {
        let exercise = self.repository.read_exercise(user_id, id).await?;
        if exercise.owner != Some(user_id) {
            return Err(ReadError::NotFound);
        }
        Ok(exercise)
    }

    async fn replace_exercise_inner(
        &self,
        user_id: UserID,
        exercise: Exercise,
    ) -> Result<Exercise, UpdateError> {
        NewExercise::from(exercise.clone())
            .validate()
            .map_err(|err| ValidationError::invalid("exercise", err))?;
        self.own_exercise(user_id, exercise.id).await?;
        self.repository
            .replace_exercise(
                user_id,
                Exercise {
                    owner: Some(user_id),
                    ..exercise
                },
            )
            .await
    }

    async fn delete_exercise_inner(
        &self,
        user_id: UserID,
        id: ExerciseID,
    ) -> Result<ExerciseID, DeleteError> {
        self.own_exercise(user_id, id).await?;
        self.repository.delete_exercise(user_id, id).await
    }

    async fn check_exercises_visible(
        &self,
        user_id: UserID,
        exercise_ids: BTreeSet<ExerciseID>,
    ) -> Result<(), UpdateError> {
        let visible = self
            .repository
            .read_exercises(user_id)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect::<BTreeSet<_>>();
        if let Some(unknown) = exercise_ids.difference(&visible).next() {
            return Err(ValidationError::invalid("days", format!("unknown exercise {unknown}")).into());
        }
        Ok(())
    }
}

fn routine_day_exercises(days: &[RoutineDay]) -> BTreeSet<ExerciseID> {
    days.iter()
        .flat_map(|d| d.exercises.iter().map(|e| e.exercise_id))
        .collect()
}

#[async_trait]
impl<R: RoutineRepository + ExerciseRepository> RoutineService for Service<R> {
    async fn get_routines(
        &self,
        user_id: UserID,
        include_archived: bool,
    ) -> Result<Vec<Routine>, ReadError> {
        let routines = log_on_error!(
            self.repository.read_routines(user_id),
            ReadError,
            "get",
            "routines"
        )?;
        Ok(routines
            .into_iter()
            .filter(|r| include_archived || !r.archived)
            .collect())
    }

    async fn get_routine(&self, user_id: UserID, id: RoutineID) -> Result<Routine, ReadError> {
        log_on_error!(
            self.repository.read_routine(user_id, id),
            ReadError,
            "get",
            "routine"
        )
    }

    async fn create_routine(
        &self,
        user_id: UserID,
        routine: NewRoutine,
    ) -> Result<Routine, CreateError> {
        log_on_error!(
            self.create_routine_inner(user_id, routine),
            CreateError,
            "create",
            "routine"
        )
    }

    async fn modify_routine(
        &self,
        user_id: UserID,
        id: RoutineID,
        changes: RoutineChanges,
    ) -> Result<Routine, UpdateError> {
        log_on_error!(
            self.modify_routine_inner(user_id, id, changes),
            UpdateError,
            "modify",
            "routine"
        )
    }

    async fn delete_routine(
        &self,
        user_id: UserID,
        id: RoutineID,
    ) -> Result<RoutineID, DeleteError> {
        log_on_error!(
            self.repository.delete_routine(user_id, id),
            DeleteError,
            "delete",
            "routine"
        )
    }
}

impl<R: RoutineRepository + ExerciseRepository> Service<R> {
    async fn validate_routine_days(
        &self,
        user_id: UserID,
        days: &[RoutineDay],
    ) -> Result<(), UpdateError> {
        validate_days(days).map_err(|err| ValidationError::invalid("days", err))?;
        self.check_exercises_visible(user_id, routine_day_exercises(days))
            .await
    }

    async fn create_routine_inner(
        &self,
        user_id: UserID,
        routine: NewRoutine,
    ) -> Result<Routine, CreateError> {
        self.validate_routine_days(user_id, &routine.days).await?;
        self.repository.create_routine(user_id, routine).await
    }

    async fn modify_routine_inner(
        &self,
        user_id: UserID,
        id: RoutineID,
        changes: RoutineChanges,
    ) -> Result<Routine, UpdateError> {
        if let Some(days) = &changes.days {
            self.validate_routine_days(user_id, days).await?;
        }
        self.repository.modify_routine(user_id, id, changes).await
    }
}

#[async_trait]
impl<R: WorkoutRepository + RoutineRepository + ExerciseRepository> WorkoutService for Service<R> {
    async fn get_workouts(
        &self,
        user_id: UserID,
        filter: &WorkoutFilter,
    ) -> Result<Vec<Workout>, ReadError> {
        log_on_error!(
            self.repository.read_workouts(user_id, filter),
            ReadError,
            "get",
            "workouts"
        )
    }

    async fn get_workout(&self, user_id: UserID, id: WorkoutID) -> Result<Workout, ReadError> {
        log_on_error!(
            self.repository.read_workout(user_id, id),
            ReadError,
            "get",
            "workout"
        )
    }

    async fn get_active_workout(&self, user_id: UserID) -> Result<Option<Workout>, ReadError> {
        log_on_error!(
            self.repository.read_active_workout(user_id),
            ReadError,
            "get",
            "active workout"
        )
    }

    async fn start_workout(
        &self,
        user_id: UserID,
        start: StartWorkout,
        now: DateTime<Utc>,
    ) -> Result<Workout, CreateError> {
        log_on_error!(
            self.start_workout_inner(user_id, start, now),
            CreateError,
            "start",
            "workout"
        )
    }

    async fn modify_workout(
        &self,
        user_id: UserID,
        id: WorkoutID,
        changes: WorkoutChanges,
    ) -> Result<Workout, UpdateError> {
        log_on_error!(
            self.modify_workout_inner(user_id, id, changes),
            UpdateError,
            "modify",
            "workout"
        )
    }

    async fn finish_workout(
        &self,
        user_id: UserID,
        id: WorkoutID,
        now: DateTime<Utc>,
    ) -> Result<Workout, UpdateError> {
        log_on_error!(
            self.finish_workout_inner(user_id, id, now),
            UpdateError,
            "finish",
            "workout"
        )
    }

    async fn delete_workout(
        &self,
        user_id: UserID,
        id: WorkoutID,
    ) -> Result<WorkoutID, DeleteError> {
        log_on_error!(
            self.repository.delete_workout(user_id, id),
            DeleteError,
            "delete",
            "workout"
        )
    }

    async fn add_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set: NewWorkoutSet,
    ) -> Result<Workout, CreateError> {
        log_on_error!(
            self.add_set_inner(user_id, workout_id, set),
            CreateError,
            "add",
            "set"
        )
    }

    async fn modify_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set_id: WorkoutSetID,
        changes: SetChanges,
    ) -> Result<Workout, UpdateError> {
        log_on_error!(
            self.modify_set_inner(user_id, workout_id, set_id, changes),
            UpdateError,
            "modify",
            "set"
        )
    }

    async fn delete_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set_id: WorkoutSetID,
    ) -> Result<Workout, DeleteError> {
        log_on_error!(
            self.repository.delete_set(user_id, workout_id, set_id),
            DeleteError,
            "delete",
            "set"
        )
    }
}

const DEFAULT_WORKOUT_NAME: &str = "Workout";

impl<R: WorkoutRepository + RoutineRepository + ExerciseRepository> Service<R> {
    async fn start_workout_inner(
        &self,
        user_id: UserID,
        start: StartWorkout,
        now: DateTime<Utc>,
    ) -> Result<Workout, CreateError> {
        if self.repository.read_active_workout(user_id).await?.is_some() {
            return Err(CreateError::Conflict);
        }

        let workout = match start.routine_id {
            Some(routine_id) => {
                let routine = self.repository.read_routine(user_id, routine_id).await?;
                let index = start.day.unwrap_or(0);
                let day = usize::try_from(index)
                    .ok()
                    .and_then(|i| routine.day(i))
                    .ok_or_else(|| {
                        ValidationError::invalid(
                            "day",
                            format!("routine has {} days", routine.days.len()),
                        )
                    })?;
                let name = match start.name {
                    Some(name) => name,
                    None => Name::truncated(&format!("{} - {}", routine.name, day.name))
                        .map_err(|err| CreateError::Other(err.into()))?,
                };
                NewWorkout {
                    routine_id: Some(routine.id),
                    routine_day: Some(index),
                    name,
                    notes: String::new(),
                    started_at: now,
                    sets: planned_sets(day),
                }
            }
            None => NewWorkout {
                routine_id: None,
                routine_day: None,
                name: match start.name {
                    Some(name) => name,
                    None => Name::new(DEFAULT_WORKOUT_NAME)
                        .map_err(|err| CreateError::Other(err.into()))?,
                },
                notes: String::new(),
                started_at: now,
                sets: vec![],
            },
        };

        self.repository.create_workout(user_id, workout).await
    }

    async fn modify_workout_inner(
        &self,
        user_id: UserID,
        id: WorkoutID,
        changes: WorkoutChanges,
    ) -> Result<Workout, UpdateError> {
        let mut workout = self.repository.read_workout(user_id, id).await?;
        changes.apply(&mut workout);
        self.repository.replace_workout(user_id, workout).await
    }

    async fn finish_workout_inner(
        &self,
        user_id: UserID,
        id: WorkoutID,
        now: DateTime<Utc>,
    ) -> Result<Workout, UpdateError> {
        let mut workout = self.repository.read_workout(user_id, id).await?;
        if workout.is_finished() {
            return Err(UpdateError::Conflict);
        }
        workout.finished_at = Some(now.max(workout.started_at));
        self.repository.replace_workout(user_id, workout).await
    }

    async fn add_set_inner(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set: NewWorkoutSet,
    ) -> Result<Workout, CreateError> {
        set.validate()
            .map_err(|err| ValidationError::invalid("set", err))?;
        self.repository.read_workout(user_id, workout_id).await?;
        match self
            .repository
            .read_exercise(user_id, set.exercise_id)
            .await
        {
            Ok(_) => {}
            Err(ReadError::NotFound) => {
                return Err(ValidationError::invalid(
                    "exercise_id",
                    format!("unknown exercise {}", set.exercise_id),
                )
                .into());
            }
            Err(err) => return Err(err.into()),
        }
        self.repository.create_set(user_id, workout_id, set).await
    }

    async fn modify_set_inner(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set_id: WorkoutSetID,
        changes: SetChanges,
    ) -> Result<Workout, UpdateError> {
        let workout = self.repository.read_workout(user_id, workout_id).await?;
        let mut set = workout.set(set_id).cloned().ok_or(UpdateError::NotFound)?;
        changes
            .apply(&mut set)
            .map_err(|err| ValidationError::invalid("set", err))?;
        self.repository.replace_set(user_id, workout_id, set).await
    }
}

#[async_trait]
impl<R: WorkoutRepository + ExerciseRepository> StatisticsService for Service<R> {
    async fn get_statistics(
        &self,
        user_id: UserID,
        filter: &WorkoutFilter,
        today: NaiveDate,
    ) -> Result<Statistics, ReadError> {
        log_on_error!(
            self.get_statistics_inner(user_id, filter, today),
            ReadError,
            "get",
            "statistics"
        )
    }
}

impl<R: WorkoutRepository + ExerciseRepository> Service<R> {
    async fn get_statistics_inner(
        &self,
        user_id: UserID,
        filter: &WorkoutFilter,
        today: NaiveDate,
    ) -> Result<Statistics, ReadError> {
        let filter = WorkoutFilter {
            limit: None,
            offset: 0,
            ..*filter
        };
        let workouts = self.repository.read_workouts(user_id, &filter).await?;
        let exercises = self
            .repository
            .read_exercises(user_id)
            .await?
            .into_iter()
            .map(|e| (e.id, e))
            .collect::<BTreeMap<_, _>>();
        Ok(statistics(&workouts, &exercises, today))
    }
}
