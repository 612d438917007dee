use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use liftlog_domain::{
    self as domain, BoxError, CreateError, DeleteError, ExerciseID, Name, NewRoutine, RPE,
    ReadError, Reps, RoutineChanges, RoutineID, RoutineRepository, Time, UpdateError, UserID,
    Weight,
};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Storage,
    db::{
        DbError, affected, conversion_error, datetime_to_text, parse_datetime, parse_uuid,
    },
};

const COLUMNS: &str = "id, owner_id, name, notes, archived, days, created_at";

#[derive(Debug, Serialize, Deserialize)]
struct RoutineDay {
    name: String,
    exercises: Vec<RoutineExercise>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RoutineExercise {
    exercise_id: Uuid,
    sets: u32,
    reps: u32,
    weight: Option<f32>,
    rpe: Option<u8>,
    rest: u32,
}

impl From<&domain::RoutineDay> for RoutineDay {
    fn from(value: &domain::RoutineDay) -> Self {
        Self {
            name: value.name.to_string(),
            exercises: value
                .exercises
                .iter()
                .map(|e| RoutineExercise {
                    exercise_id: *e.exercise_id,
                    sets: e.sets,
                    reps: u32::from(e.reps),
                    weight: e.weight.map(f32::from),
                    rpe: e.rpe.map(RPE::tenths),
                    rest: u32::from(e.rest),
                })
                .collect(),
        }
    }
}

impl TryFrom<RoutineDay> for domain::RoutineDay {
    type Error = BoxError;

    fn try_from(value: RoutineDay) -> Result<Self, Self::Error> {
        Ok(Self {
            name: Name::new(&value.name)?,
            exercises: value
                .exercises
                .into_iter()
                .map(domain::RoutineExercise::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

impl TryFrom<RoutineExercise> for domain::RoutineExercise {
    type Error = BoxError;

    fn try_from(value: RoutineExercise) -> Result<Self, Self::Error> {
        Ok(Self {
            exercise_id: value.exercise_id.into(),
            sets: value.sets,
            reps: Reps::new(value.reps)?,
            weight: value.weight.map(Weight::new).transpose()?,
            rpe: value.rpe.map(RPE::from_tenths).transpose()?,
            rest: Time::new(value.rest)?,
        })
    }
}

fn days_to_json(days: &[domain::RoutineDay]) -> Result<String, DbError> {
    Ok(serde_json::to_string(
        &days.iter().map(RoutineDay::from).collect::<Vec<_>>(),
    )?)
}

fn routine_from_row(row: &Row) -> rusqlite::Result<domain::Routine> {
    let id: String = row.get(0)?;
    let owner_id: String = row.get(1)?;
    let name: String = row.get(2)?;
    let days: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    Ok(domain::Routine {
        id: parse_uuid(0, &id)?.into(),
        owner: parse_uuid(1, &owner_id)?.into(),
        name: Name::new(&name).map_err(|err| conversion_error(2, err))?,
        notes: row.get(3)?,
        archived: row.get(4)?,
        days: serde_json::from_str::<Vec<RoutineDay>>(&days)
            .map_err(|err| conversion_error(5, err))?
            .into_iter()
            .map(domain::RoutineDay::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| conversion_error(5, err))?,
        created_at: parse_datetime(6, &created_at)?,
    })
}

fn read_routine(
    conn: &Connection,
    user_id: UserID,
    id: RoutineID,
) -> Result<domain::Routine, DbError> {
    Ok(conn.query_row(
        &format!("SELECT {COLUMNS} FROM routines WHERE id = ?1 AND owner_id = ?2"),
        [id.to_string(), user_id.to_string()],
        routine_from_row,
    )?)
}

/// Keeps the exercise references of a routine in sync with its days.
fn write_routine_exercises(
    conn: &Connection,
    id: RoutineID,
    days: &[domain::RoutineDay],
) -> Result<(), DbError> {
    conn.execute(
        "DELETE FROM routine_exercises WHERE routine_id = ?1",
        [id.to_string()],
    )?;
    let exercise_ids = days
        .iter()
        .flat_map(|d| d.exercises.iter().map(|e| e.exercise_id))
        .collect::<BTreeSet<ExerciseID>>();
    let mut stmt =
        conn.prepare("INSERT INTO routine_exercises (routine_id, exercise_id) VALUES (?1, ?2)")?;
    for exercise_id in exercise_ids {
        stmt.execute([id.to_string(), exercise_id.to_string()])?;
    }
    Ok(())
}

#[async_trait]
impl RoutineRepository for Storage {
    async fn read_routines(&self, user_id: UserID) -> Result<Vec<domain::Routine>, ReadError> {
        Ok(self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM routines WHERE owner_id = ?1 ORDER BY created_at, id"
                ))?;
                let routines = stmt
                    .query_map([user_id.to_string()], routine_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(routines)
            })
            .await?)
    }

    async fn read_routine(
        &self,
        user_id: UserID,
        id: RoutineID,
    ) -> Result<domain::Routine, ReadError> {
        Ok(self
            .db
            .call(move |conn| read_routine(conn, user_id, id))
            .await?)
    }

    async fn create_routine(
        &self,
        user_id: UserID,
        routine: NewRoutine,
    ) -> Result<domain::Routine, CreateError> {
        Ok(self
            .db
            .call(move |conn| {
                let id = RoutineID::random();
                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    &format!("INSERT INTO routines ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)"),
                    params![
                        id.to_string(),
                        user_id.to_string(),
                        routine.name.as_ref(),
                        routine.notes,
                        days_to_json(&routine.days)?,
                        datetime_to_text(Utc::now()),
                    ],
                )?;
                write_routine_exercises(&tx, id, &routine.days)?;
                let routine = read_routine(&tx, user_id, id)?;
                tx.commit()?;
                Ok(routine)
            })
            .await?)
    }

    async fn modify_routine(
        &self,
        user_id: UserID,
        id: RoutineID,
        changes: RoutineChanges,
    ) -> Result<domain::Routine, UpdateError> {
        Ok(self
            .db
            .call(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let mut routine = read_routine(&tx, user_id, id)?;
                let days_changed = changes.days.is_some();
                changes.apply(&mut routine);
                tx.execute(
                    "UPDATE routines SET name = ?2, notes = ?3, archived = ?4, days = ?5
                     WHERE id = ?1",
                    params![
                        id.to_string(),
                        routine.name.as_ref(),
                        routine.notes,
                        routine.archived,
                        days_to_json(&routine.days)?,
                    ],
                )?;
                if days_changed {
                    write_routine_exercises(&tx, id, &routine.days)?;
                }
                tx.commit()?;
                Ok(routine)
            })
            .await?)
    }

    async fn delete_routine(
        &self,
        user_id: UserID,
        id: RoutineID,
    ) -> Result<RoutineID, DeleteError> {
        Ok(self
            .db
            .call(move |conn| {
                affected(conn.execute(
                    "DELETE FROM routines WHERE id = ?1 AND owner_id = ?2",
                    [id.to_string(), user_id.to_string()],
                )?)?;
                Ok(id)
            })
            .await?)
    }
}
