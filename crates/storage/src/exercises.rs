use async_trait::async_trait;
use liftlog_domain::{
    self as domain, BoxError, Category, CreateError, DeleteError, Equipment, ExerciseID,
    ExerciseRepository, Force, Mechanic, MuscleID, Name, NewExercise, Property, ReadError,
    Stimulus, UpdateError, UserID,
};
use log::info;
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::{
    Storage,
    db::{DbError, affected, conversion_error, parse_uuid},
};

const COLUMNS: &str =
    "id, owner_id, name, description, muscles, force, mechanic, equipment, category";

#[derive(Debug, Serialize, Deserialize)]
struct ExerciseMuscle {
    muscle_id: u8,
    stimulus: u32,
}

impl From<&domain::ExerciseMuscle> for ExerciseMuscle {
    fn from(value: &domain::ExerciseMuscle) -> Self {
        Self {
            muscle_id: value.muscle_id as u8,
            stimulus: *value.stimulus,
        }
    }
}

impl TryFrom<ExerciseMuscle> for domain::ExerciseMuscle {
    type Error = BoxError;

    fn try_from(value: ExerciseMuscle) -> Result<Self, Self::Error> {
        Ok(Self {
            muscle_id: MuscleID::try_from(value.muscle_id)?,
            stimulus: Stimulus::new(value.stimulus)?,
        })
    }
}

fn muscles_to_json(muscles: &[domain::ExerciseMuscle]) -> Result<String, DbError> {
    Ok(serde_json::to_string(
        &muscles.iter().map(ExerciseMuscle::from).collect::<Vec<_>>(),
    )?)
}

fn equipment_to_json(equipment: &[Equipment]) -> Result<String, DbError> {
    Ok(serde_json::to_string(
        &equipment.iter().map(|e| e.slug()).collect::<Vec<_>>(),
    )?)
}

fn from_slug<P: Property>(index: usize, slug: &str) -> rusqlite::Result<P> {
    P::from_slug(slug).ok_or_else(|| conversion_error(index, format!("unknown value {slug}")))
}

fn exercise_from_row(row: &Row) -> rusqlite::Result<domain::Exercise> {
    let id: String = row.get(0)?;
    let owner_id: Option<String> = row.get(1)?;
    let name: String = row.get(2)?;
    let muscles: String = row.get(4)?;
    let force: Option<String> = row.get(5)?;
    let mechanic: Option<String> = row.get(6)?;
    let equipment: String = row.get(7)?;
    let category: String = row.get(8)?;

    let muscles = serde_json::from_str::<Vec<ExerciseMuscle>>(&muscles)
        .map_err(|err| conversion_error(4, err))?
        .into_iter()
        .map(domain::ExerciseMuscle::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| conversion_error(4, err))?;
    let equipment = serde_json::from_str::<Vec<String>>(&equipment)
        .map_err(|err| conversion_error(7, err))?
        .iter()
        .map(|slug| from_slug::<Equipment>(7, slug))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(domain::Exercise {
        id: parse_uuid(0, &id)?.into(),
        owner: owner_id
            .map(|owner_id| parse_uuid(1, &owner_id).map(UserID::from))
            .transpose()?,
        name: Name::new(&name).map_err(|err| conversion_error(2, err))?,
        description: row.get(3)?,
        muscles,
        force: force.map(|f| from_slug::<Force>(5, &f)).transpose()?,
        mechanic: mechanic.map(|m| from_slug::<Mechanic>(6, &m)).transpose()?,
        equipment,
        category: from_slug::<Category>(8, &category)?,
    })
}

fn read_exercise(
    conn: &Connection,
    user_id: UserID,
    id: ExerciseID,
) -> Result<domain::Exercise, DbError> {
    Ok(conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM exercises
             WHERE id = ?1 AND (owner_id IS NULL OR owner_id = ?2)"
        ),
        [id.to_string(), user_id.to_string()],
        exercise_from_row,
    )?)
}

fn insert_exercise(
    conn: &Connection,
    verb: &str,
    id: ExerciseID,
    owner: Option<UserID>,
    exercise: &NewExercise,
) -> Result<usize, DbError> {
    Ok(conn.execute(
        &format!(
            "{verb} INTO exercises ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            id.to_string(),
            owner.map(|o| o.to_string()),
            exercise.name.as_ref(),
            exercise.description,
            muscles_to_json(&exercise.muscles)?,
            exercise.force.map(Property::slug),
            exercise.mechanic.map(Property::slug),
            equipment_to_json(&exercise.equipment)?,
            exercise.category.slug(),
        ],
    )?)
}

#[async_trait]
impl ExerciseRepository for Storage {
    async fn read_exercises(&self, user_id: UserID) -> Result<Vec<domain::Exercise>, ReadError> {
        Ok(self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM exercises
                     WHERE owner_id IS NULL OR owner_id = ?1
                     ORDER BY name COLLATE NOCASE, id"
                ))?;
                let exercises = stmt
                    .query_map([user_id.to_string()], exercise_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(exercises)
            })
            .await?)
    }

    async fn read_exercise(
        &self,
        user_id: UserID,
        id: ExerciseID,
    ) -> Result<domain::Exercise, ReadError> {
        Ok(self
            .db
            .call(move |conn| read_exercise(conn, user_id, id))
            .await?)
    }

    async fn create_exercise(
        &self,
        user_id: UserID,
        exercise: NewExercise,
    ) -> Result<domain::Exercise, CreateError> {
        Ok(self
            .db
            .call(move |conn| {
                let id = ExerciseID::random();
                insert_exercise(conn, "INSERT", id, Some(user_id), &exercise)?;
                read_exercise(conn, user_id, id)
            })
            .await?)
    }

    async fn replace_exercise(
        &self,
        user_id: UserID,
        exercise: domain::Exercise,
    ) -> Result<domain::Exercise, UpdateError> {
        Ok(self
            .db
            .call(move |conn| {
                affected(conn.execute(
                    "UPDATE exercises SET
                        name = ?3, description = ?4, muscles = ?5, force = ?6,
                        mechanic = ?7, equipment = ?8, category = ?9
                     WHERE id = ?1 AND owner_id = ?2",
                    params![
                        exercise.id.to_string(),
                        user_id.to_string(),
                        exercise.name.as_ref(),
                        exercise.description,
                        muscles_to_json(&exercise.muscles)?,
                        exercise.force.map(Property::slug),
                        exercise.mechanic.map(Property::slug),
                        equipment_to_json(&exercise.equipment)?,
                        exercise.category.slug(),
                    ],
                )?)?;
                read_exercise(conn, user_id, exercise.id)
            })
            .await?)
    }

    async fn delete_exercise(
        &self,
        user_id: UserID,
        id: ExerciseID,
    ) -> Result<ExerciseID, DeleteError> {
        Ok(self
            .db
            .call(move |conn| {
                affected(conn.execute(
                    "DELETE FROM exercises WHERE id = ?1 AND owner_id = ?2",
                    [id.to_string(), user_id.to_string()],
                )?)?;
                Ok(id)
            })
            .await?)
    }

    async fn seed_catalog(&self, exercises: Vec<NewExercise>) -> Result<usize, CreateError> {
        let inserted = self
            .db
            .call(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let mut inserted = 0;
                for exercise in &exercises {
                    inserted +=
                        insert_exercise(&tx, "INSERT OR IGNORE", ExerciseID::random(), None, exercise)?;
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;
        if inserted > 0 {
            info!("{inserted} catalog exercises added");
        }
        Ok(inserted)
    }
}
