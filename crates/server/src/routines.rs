use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{DateTime, Utc};
use liftlog_domain::{
    NewRoutine, RPE, Reps, Routine, RoutineChanges, RoutineDay, RoutineExercise, RoutineService,
    Time, ValidationError, Weight,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, parse_name},
    error::ApiResult,
    extract::{Json, Path, Query},
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_routines).post(create_routine))
        .route(
            "/{id}",
            get(get_routine).patch(modify_routine).delete(delete_routine),
        )
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoutineExerciseBody {
    exercise_id: Uuid,
    sets: u32,
    #[serde(default)]
    reps: u32,
    weight: Option<f32>,
    rpe: Option<f32>,
    #[serde(default)]
    rest: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoutineDayBody {
    name: String,
    #[serde(default)]
    exercises: Vec<RoutineExerciseBody>,
}

impl From<&RoutineDay> for RoutineDayBody {
    fn from(value: &RoutineDay) -> Self {
        Self {
            name: value.name.to_string(),
            exercises: value
                .exercises
                .iter()
                .map(|e| RoutineExerciseBody {
                    exercise_id: *e.exercise_id,
                    sets: e.sets,
                    reps: e.reps.into(),
                    weight: e.weight.map(f32::from),
                    rpe: e.rpe.map(f32::from),
                    rest: e.rest.into(),
                })
                .collect(),
        }
    }
}

impl TryFrom<RoutineDayBody> for RoutineDay {
    type Error = ValidationError;

    fn try_from(value: RoutineDayBody) -> Result<Self, Self::Error> {
        Ok(RoutineDay {
            name: parse_name(&value.name)?,
            exercises: value
                .exercises
                .into_iter()
                .map(|e| {
                    Ok(RoutineExercise {
                        exercise_id: e.exercise_id.into(),
                        sets: e.sets,
                        reps: Reps::new(e.reps).map_err(|err| ValidationError::invalid("reps", err))?,
                        weight: e
                            .weight
                            .map(Weight::new)
                            .transpose()
                            .map_err(|err| ValidationError::invalid("weight", err))?,
                        rpe: e
                            .rpe
                            .map(RPE::new)
                            .transpose()
                            .map_err(|err| ValidationError::invalid("rpe", err))?,
                        rest: Time::new(e.rest).map_err(|err| ValidationError::invalid("rest", err))?,
                    })
                })
                .collect::<Result<_, ValidationError>>()?,
        })
    }
}

fn days(days: Vec<RoutineDayBody>) -> Result<Vec<RoutineDay>, ValidationError> {
    days.into_iter().map(RoutineDay::try_from).collect()
}

#[derive(Serialize, Debug, PartialEq)]
pub struct RoutineResponse {
    id: String,
    name: String,
    notes: String,
    archived: bool,
    days: Vec<RoutineDayBody>,
    sets: u32,
    duration: i64,
    created_at: DateTime<Utc>,
}

impl From<Routine> for RoutineResponse {
    fn from(value: Routine) -> Self {
        Self {
            id: value.id.to_string(),
            sets: value.num_sets(),
            duration: value.duration().num_seconds(),
            days: value.days.iter().map(Into::into).collect(),
            name: value.name.to_string(),
            notes: value.notes,
            archived: value.archived,
            created_at: value.created_at,
        }
    }
}

#[derive(Deserialize)]
struct RoutinesQuery {
    #[serde(default)]
    archived: bool,
}

async fn get_routines(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<RoutinesQuery>,
) -> ApiResult<Json<Vec<RoutineResponse>>> {
    let routines = state
        .service
        .get_routines(auth.user.id, query.archived)
        .await?;
    Ok(Json(routines.into_iter().map(Into::into).collect()))
}

async fn get_routine(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RoutineResponse>> {
    let routine = state.service.get_routine(auth.user.id, id.into()).await?;
    Ok(Json(routine.into()))
}

#[derive(Deserialize)]
struct CreateRoutineRequest {
    name: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    days: Vec<RoutineDayBody>,
}

async fn create_routine(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<CreateRoutineRequest>,
) -> ApiResult<(StatusCode, Json<RoutineResponse>)> {
    let routine = NewRoutine {
        name: parse_name(&request.name)?,
        notes: request.notes.trim().to_string(),
        days: days(request.days)?,
    };
    let routine = state.service.create_routine(auth.user.id, routine).await?;
    Ok((StatusCode::CREATED, Json(routine.into())))
}

#[derive(Deserialize)]
struct ModifyRoutineRequest {
    name: Option<String>,
    notes: Option<String>,
    archived: Option<bool>,
    days: Option<Vec<RoutineDayBody>>,
}

async fn modify_routine(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ModifyRoutineRequest>,
) -> ApiResult<Json<RoutineResponse>> {
    let changes = RoutineChanges {
        name: request.name.as_deref().map(parse_name).transpose()?,
        notes: request.notes.map(|notes| notes.trim().to_string()),
        archived: request.archived,
        days: request.days.map(days).transpose()?,
    };
    let routine = state
        .service
        .modify_routine(auth.user.id, id.into(), changes)
        .await?;
    Ok(Json(routine.into()))
}

async fn delete_routine(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.service.delete_routine(auth.user.id, id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}
