use async_trait::async_trait;
use liftlog_domain::{
    CreateError, DeleteError, Name, NewWorkout, NewWorkoutSet, RPE, ReadError, Reps, Time,
    UpdateError, UserID, Weight, Workout, WorkoutFilter, WorkoutID, WorkoutRepository, WorkoutSet,
    WorkoutSetID,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::{
    Storage,
    db::{
        DbError, affected, conversion_error, datetime_to_text, parse_datetime, parse_uuid,
    },
};

const COLUMNS: &str = "id, owner_id, routine_id, routine_day, name, notes, started_at, finished_at";
const SET_COLUMNS: &str = "id, exercise_id, position, target_reps, target_weight, target_rpe, \
                           target_rest, reps, weight, rpe, notes, completed_at";

fn workout_from_row(row: &Row) -> rusqlite::Result<Workout> {
    let id: String = row.get(0)?;
    let owner_id: String = row.get(1)?;
    let routine_id: Option<String> = row.get(2)?;
    let name: String = row.get(4)?;
    let started_at: String = row.get(6)?;
    let finished_at: Option<String> = row.get(7)?;
    Ok(Workout {
        id: parse_uuid(0, &id)?.into(),
        owner: parse_uuid(1, &owner_id)?.into(),
        routine_id: routine_id
            .map(|routine_id| parse_uuid(2, &routine_id).map(Into::into))
            .transpose()?,
        routine_day: row.get(3)?,
        name: Name::new(&name).map_err(|err| conversion_error(4, err))?,
        notes: row.get(5)?,
        started_at: parse_datetime(6, &started_at)?,
        finished_at: finished_at
            .map(|finished_at| parse_datetime(7, &finished_at))
            .transpose()?,
        sets: vec![],
    })
}

#[allow(clippy::cast_possible_truncation)]
fn weight_from_column(index: usize, value: Option<f64>) -> rusqlite::Result<Option<Weight>> {
    value
        .map(|w| Weight::new(w as f32).map_err(|err| conversion_error(index, err)))
        .transpose()
}

fn rpe_from_column(index: usize, value: Option<u8>) -> rusqlite::Result<Option<RPE>> {
    value
        .map(|r| RPE::from_tenths(r).map_err(|err| conversion_error(index, err)))
        .transpose()
}

fn reps_from_column(index: usize, value: Option<u32>) -> rusqlite::Result<Option<Reps>> {
    value
        .map(|r| Reps::new(r).map_err(|err| conversion_error(index, err)))
        .transpose()
}

fn set_from_row(row: &Row) -> rusqlite::Result<WorkoutSet> {
    let id: String = row.get(0)?;
    let exercise_id: String = row.get(1)?;
    let target_rest: Option<u32> = row.get(6)?;
    let completed_at: Option<String> = row.get(11)?;
    Ok(WorkoutSet {
        id: parse_uuid(0, &id)?.into(),
        exercise_id: parse_uuid(1, &exercise_id)?.into(),
        position: row.get(2)?,
        target_reps: reps_from_column(3, row.get(3)?)?,
        target_weight: weight_from_column(4, row.get(4)?)?,
        target_rpe: rpe_from_column(5, row.get(5)?)?,
        target_rest: target_rest
            .map(|t| Time::new(t).map_err(|err| conversion_error(6, err)))
            .transpose()?,
        reps: reps_from_column(7, row.get(7)?)?,
        weight: weight_from_column(8, row.get(8)?)?,
        rpe: rpe_from_column(9, row.get(9)?)?,
        notes: row.get(10)?,
        completed_at: completed_at
            .map(|completed_at| parse_datetime(11, &completed_at))
            .transpose()?,
    })
}

fn weight_to_column(weight: Option<Weight>) -> Option<f64> {
    weight.map(|w| f64::from(f32::from(w)))
}

fn read_sets(conn: &Connection, workout_id: WorkoutID) -> Result<Vec<WorkoutSet>, DbError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {SET_COLUMNS} FROM workout_sets WHERE workout_id = ?1 ORDER BY position"
    ))?;
    let sets = stmt
        .query_map([workout_id.to_string()], set_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sets)
}

fn with_sets(conn: &Connection, mut workout: Workout) -> Result<Workout, DbError> {
    workout.sets = read_sets(conn, workout.id)?;
    Ok(workout)
}

fn read_workout(conn: &Connection, user_id: UserID, id: WorkoutID) -> Result<Workout, DbError> {
    let workout = conn.query_row(
        &format!("SELECT {COLUMNS} FROM workouts WHERE id = ?1 AND owner_id = ?2"),
        [id.to_string(), user_id.to_string()],
        workout_from_row,
    )?;
    with_sets(conn, workout)
}

fn insert_set(
    conn: &Connection,
    workout_id: WorkoutID,
    set: &WorkoutSet,
) -> Result<(), DbError> {
    conn.execute(
        &format!(
            "INSERT INTO workout_sets (workout_id, {SET_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            workout_id.to_string(),
            set.id.to_string(),
            set.exercise_id.to_string(),
            set.position,
            set.target_reps.map(u32::from),
            weight_to_column(set.target_weight),
            set.target_rpe.map(RPE::tenths),
            set.target_rest.map(u32::from),
            set.reps.map(u32::from),
            weight_to_column(set.weight),
            set.rpe.map(RPE::tenths),
            set.notes,
            set.completed_at.map(datetime_to_text),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl WorkoutRepository for Storage {
    async fn read_workouts(
        &self,
        user_id: UserID,
        filter: &WorkoutFilter,
    ) -> Result<Vec<Workout>, ReadError> {
        let filter = *filter;
        Ok(self
            .db
            .call(move |conn| {
                let (from, to) = filter.range();
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM workouts
                     WHERE owner_id = ?1
                        AND (?2 IS NULL OR started_at >= ?2)
                        AND (?3 IS NULL OR started_at < ?3)
                     ORDER BY started_at DESC, id
                     LIMIT ?4 OFFSET ?5"
                ))?;
                let workouts = stmt
                    .query_map(
                        params![
                            user_id.to_string(),
                            from.map(datetime_to_text),
                            to.map(datetime_to_text),
                            filter.limit.map_or(-1, i64::from),
                            filter.offset,
                        ],
                        workout_from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                workouts
                    .into_iter()
                    .map(|workout| with_sets(conn, workout))
                    .collect()
            })
            .await?)
    }

    async fn read_workout(&self, user_id: UserID, id: WorkoutID) -> Result<Workout, ReadError> {
        Ok(self
            .db
            .call(move |conn| read_workout(conn, user_id, id))
            .await?)
    }

    async fn read_active_workout(&self, user_id: UserID) -> Result<Option<Workout>, ReadError> {
        Ok(self
            .db
            .call(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM workouts
                         WHERE owner_id = ?1 AND finished_at IS NULL"
                    ),
                    [user_id.to_string()],
                    workout_from_row,
                )
                .optional()?
                .map(|workout| with_sets(conn, workout))
                .transpose()
            })
            .await?)
    }

    async fn create_workout(
        &self,
        user_id: UserID,
        workout: NewWorkout,
    ) -> Result<Workout, CreateError> {
        Ok(self
            .db
            .call(move |conn| {
                let id = WorkoutID::random();
                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    &format!(
                        "INSERT INTO workouts ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)"
                    ),
                    params![
                        id.to_string(),
                        user_id.to_string(),
                        workout.routine_id.map(|r| r.to_string()),
                        workout.routine_day,
                        workout.name.as_ref(),
                        workout.notes,
                        datetime_to_text(workout.started_at),
                    ],
                )?;
                for (position, set) in (0..).zip(workout.sets) {
                    insert_set(&tx, id, &set.into_set(WorkoutSetID::random(), position))?;
                }
                let workout = read_workout(&tx, user_id, id)?;
                tx.commit()?;
                Ok(workout)
            })
            .await?)
    }

    async fn replace_workout(
        &self,
        user_id: UserID,
        workout: Workout,
    ) -> Result<Workout, UpdateError> {
        Ok(self
            .db
            .call(move |conn| {
                affected(conn.execute(
                    "UPDATE workouts SET name = ?3, notes = ?4, finished_at = ?5
                     WHERE id = ?1 AND owner_id = ?2",
                    params![
                        workout.id.to_string(),
                        user_id.to_string(),
                        workout.name.as_ref(),
                        workout.notes,
                        workout.finished_at.map(datetime_to_text),
                    ],
                )?)?;
                read_workout(conn, user_id, workout.id)
            })
            .await?)
    }

    async fn delete_workout(
        &self,
        user_id: UserID,
        id: WorkoutID,
    ) -> Result<WorkoutID, DeleteError> {
        Ok(self
            .db
            .call(move |conn| {
                affected(conn.execute(
                    "DELETE FROM workouts WHERE id = ?1 AND owner_id = ?2",
                    [id.to_string(), user_id.to_string()],
                )?)?;
                Ok(id)
            })
            .await?)
    }

    async fn create_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set: NewWorkoutSet,
    ) -> Result<Workout, CreateError> {
        Ok(self
            .db
            .call(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let workout = read_workout(&tx, user_id, workout_id)?;
                let position = workout.sets.last().map_or(0, |s| s.position + 1);
                insert_set(&tx, workout_id, &set.into_set(WorkoutSetID::random(), position))?;
                let workout = with_sets(&tx, workout)?;
                tx.commit()?;
                Ok(workout)
            })
            .await?)
    }

    async fn replace_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set: WorkoutSet,
    ) -> Result<Workout, UpdateError> {
        Ok(self
            .db
            .call(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let workout = read_workout(&tx, user_id, workout_id)?;
                affected(tx.execute(
                    "UPDATE workout_sets SET
                        exercise_id = ?3, target_reps = ?4, target_weight = ?5, target_rpe = ?6,
                        target_rest = ?7, reps = ?8, weight = ?9, rpe = ?10, notes = ?11,
                        completed_at = ?12
                     WHERE id = ?1 AND workout_id = ?2",
                    params![
                        set.id.to_string(),
                        workout_id.to_string(),
                        set.exercise_id.to_string(),
                        set.target_reps.map(u32::from),
                        weight_to_column(set.target_weight),
                        set.target_rpe.map(RPE::tenths),
                        set.target_rest.map(u32::from),
                        set.reps.map(u32::from),
                        weight_to_column(set.weight),
                        set.rpe.map(RPE::tenths),
                        set.notes,
                        set.completed_at.map(datetime_to_text),
                    ],
                )?)?;
                let workout = with_sets(&tx, workout)?;
                tx.commit()?;
                Ok(workout)
            })
            .await?)
    }

    async fn delete_set(
        &self,
        user_id: UserID,
        workout_id: WorkoutID,
        set_id: WorkoutSetID,
    ) -> Result<Workout, DeleteError> {
        Ok(self
            .db
            .call(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let workout = read_workout(&tx, user_id, workout_id)?;
                let position = workout
                    .set(set_id)
                    .map(|s| s.position)
                    .ok_or(DbError::NotFound)?;
                tx.execute(
                    "DELETE FROM workout_sets WHERE id = ?1",
                    [set_id.to_string()],
                )?;
                tx.execute(
                    "UPDATE workout_sets SET position = position - 1
                     WHERE workout_id = ?1 AND position > ?2",
                    params![workout_id.to_string(), position],
                )?;
                let workout = with_sets(&tx, workout)?;
                tx.commit()?;
                Ok(workout)
            })
            .await?)
    }
}
