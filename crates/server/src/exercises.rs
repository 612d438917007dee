use std::collections::HashSet;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use liftlog_domain::{
    Category, Equipment, Exercise, ExerciseFilter, ExerciseMuscle, ExerciseService,
    Force, Mechanic, MuscleID, Name, NewExercise, Property, Stimulus, ValidationError,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::ApiResult,
    extract::{Json, Path, Query},
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_exercises).post(create_exercise))
        .route(
            "/{id}",
            get(get_exercise).put(replace_exercise).delete(delete_exercise),
        )
}

#[derive(Serialize, Debug, PartialEq)]
pub struct MuscleResponse {
    id: &'static str,
    name: &'static str,
    description: &'static str,
}

pub async fn get_muscles() -> Json<Vec<MuscleResponse>> {
    Json(
        MuscleID::muscles()
            .map(|m| MuscleResponse {
                id: m.slug(),
                name: m.name(),
                description: m.description(),
            })
            .collect(),
    )
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MuscleBody {
    muscle: String,
    stimulus: u32,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct ExerciseResponse {
    id: String,
    name: String,
    description: String,
    custom: bool,
    muscles: Vec<MuscleBody>,
    force: Option<&'static str>,
    mechanic: Option<&'static str>,
    equipment: Vec<&'static str>,
    category: &'static str,
}

impl From<Exercise> for ExerciseResponse {
    fn from(value: Exercise) -> Self {
        Self {
            id: value.id.to_string(),
            custom: value.is_custom(),
            name: value.name.to_string(),
            description: value.description,
            muscles: value
                .muscles
                .iter()
                .map(|m| MuscleBody {
                    muscle: m.muscle_id.slug().to_string(),
                    stimulus: *m.stimulus,
                })
                .collect(),
            force: value.force.map(Force::slug),
            mechanic: value.mechanic.map(Mechanic::slug),
            equipment: value.equipment.iter().map(|e| e.slug()).collect(),
            category: value.category.slug(),
        }
    }
}

#[derive(Deserialize)]
struct ExerciseRequest {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    muscles: Vec<MuscleBody>,
    force: Option<String>,
    mechanic: Option<String>,
    #[serde(default)]
    equipment: Vec<String>,
    category: Option<String>,
}

fn property<P: Property>(field: &str, slug: &str) -> Result<P, ValidationError> {
    P::from_slug(slug).ok_or_else(|| ValidationError::invalid(field, format!("unknown {slug}")))
}

impl TryFrom<ExerciseRequest> for NewExercise {
    type Error = ValidationError;

    fn try_from(value: ExerciseRequest) -> Result<Self, Self::Error> {
        Ok(NewExercise {
            name: Name::new(&value.name).map_err(|err| ValidationError::invalid("name", err))?,
            description: value.description.trim().to_string(),
            muscles: value
                .muscles
                .iter()
                .map(|m| {
                    Ok(ExerciseMuscle {
                        muscle_id: property::<MuscleID>("muscles", &m.muscle)?,
                        stimulus: Stimulus::new(m.stimulus)
                            .map_err(|err| ValidationError::invalid("muscles", err))?,
                    })
                })
                .collect::<Result<_, ValidationError>>()?,
            force: value
                .force
                .as_deref()
                .map(|f| property("force", f))
                .transpose()?,
            mechanic: value
                .mechanic
                .as_deref()
                .map(|m| property("mechanic", m))
                .transpose()?,
            equipment: value
                .equipment
                .iter()
                .map(|e| property("equipment", e))
                .collect::<Result<_, _>>()?,
            category: value
                .category
                .as_deref()
                .map(|c| property("category", c))
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

/// Comma separated slugs of each property. The equipment `none` matches
/// exercises without equipment, the muscle `none` exercises without muscles.
#[derive(Deserialize, Default)]
struct FilterQuery {
    #[serde(default)]
    name: String,
    muscle: Option<String>,
    equipment: Option<String>,
    category: Option<String>,
    force: Option<String>,
    mechanic: Option<String>,
    #[serde(default)]
    custom: bool,
}

fn slugs(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn property_set<P: Property + Eq + std::hash::Hash>(
    field: &str,
    value: Option<&str>,
) -> Result<HashSet<P>, ValidationError> {
    slugs(value).map(|s| property(field, s)).collect()
}

impl TryFrom<FilterQuery> for ExerciseFilter {
    type Error = ValidationError;

    fn try_from(value: FilterQuery) -> Result<Self, Self::Error> {
        Ok(ExerciseFilter {
            name: value.name,
            muscles: property_set("muscle", value.muscle.as_deref())?,
            force: property_set("force", value.force.as_deref())?,
            mechanic: property_set("mechanic", value.mechanic.as_deref())?,
            equipment: slugs(value.equipment.as_deref())
                .map(|s| match s {
                    "none" => Ok(None),
                    s => property::<Equipment>("equipment", s).map(Some),
                })
                .collect::<Result<_, _>>()?,
            category: property_set::<Category>("category", value.category.as_deref())?,
            custom_only: value.custom,
        })
    }
}

async fn get_exercises(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<FilterQuery>,
) -> ApiResult<Json<Vec<ExerciseResponse>>> {
    let filter = ExerciseFilter::try_from(query)?;
    let exercises = state
        .service
        .get_exercises(auth.user.id, &filter)
        .await?;
    Ok(Json(exercises.into_iter().map(Into::into).collect()))
}

async fn get_exercise(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExerciseResponse>> {
    let exercise = state.service.get_exercise(auth.user.id, id.into()).await?;
    Ok(Json(exercise.into()))
}

async fn create_exercise(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<ExerciseRequest>,
) -> ApiResult<(StatusCode, Json<ExerciseResponse>)> {
    let exercise = NewExercise::try_from(request)?;
    let exercise = state
        .service
        .create_exercise(auth.user.id, exercise)
        .await?;
    Ok((StatusCode::CREATED, Json(exercise.into())))
}

async fn replace_exercise(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ExerciseRequest>,
) -> ApiResult<Json<ExerciseResponse>> {
    let exercise = NewExercise::try_from(request)?.into_exercise(id.into(), Some(auth.user.id));
    let exercise = state
        .service
        .replace_exercise(auth.user.id, exercise)
        .await?;
    Ok(Json(exercise.into()))
}

async fn delete_exercise(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.service.delete_exercise(auth.user.id, id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}
