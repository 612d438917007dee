use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use liftlog_domain::{
    ActiveWorkout, NewWorkoutSet, Phase, RPE, Reps, SetChanges, SetValues, StartWorkout, Time,
    ValidationError, Weight, Workout, WorkoutChanges, WorkoutFilter, WorkoutService, WorkoutSet,
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, parse_name},
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_workouts).post(start_workout))
        .route("/active", get(get_active_workout))
        .route(
            "/{id}",
            get(get_workout).patch(modify_workout).delete(delete_workout),
        )
        .route("/{id}/finish", post(finish_workout))
        .route("/{id}/progress", get(get_progress))
        .route("/{id}/sets", post(add_set))
        .route("/{id}/sets/complete", post(complete_set))
        .route("/{id}/sets/{set_id}", patch(modify_set).delete(delete_set))
}

#[derive(Serialize, Debug, PartialEq)]
pub struct SetResponse {
    id: String,
    exercise_id: String,
    position: u32,
    target_reps: Option<u32>,
    target_weight: Option<f32>,
    target_rpe: Option<f32>,
    target_rest: Option<u32>,
    reps: Option<u32>,
    weight: Option<f32>,
    rpe: Option<f32>,
    notes: String,
    completed_at: Option<DateTime<Utc>>,
}

impl From<&WorkoutSet> for SetResponse {
    fn from(value: &WorkoutSet) -> Self {
        Self {
            id: value.id.to_string(),
            exercise_id: value.exercise_id.to_string(),
            position: value.position,
            target_reps: value.target_reps.map(u32::from),
            target_weight: value.target_weight.map(f32::from),
            target_rpe: value.target_rpe.map(f32::from),
            target_rest: value.target_rest.map(u32::from),
            reps: value.reps.map(u32::from),
            weight: value.weight.map(f32::from),
            rpe: value.rpe.map(f32::from),
            notes: value.notes.clone(),
            completed_at: value.completed_at,
        }
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub struct WorkoutResponse {
    id: String,
    routine_id: Option<String>,
    routine_day: Option<u32>,
    name: String,
    notes: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    duration: Option<i64>,
    completed_sets: usize,
    volume_load: u64,
    sets: Vec<SetResponse>,
}

impl From<Workout> for WorkoutResponse {
    fn from(value: Workout) -> Self {
        Self {
            id: value.id.to_string(),
            routine_id: value.routine_id.map(|id| id.to_string()),
            routine_day: value.routine_day,
            duration: value.duration().map(|d| d.num_seconds()),
            completed_sets: value.completed_sets().count(),
            volume_load: value.volume_load(),
            sets: value.sets.iter().map(Into::into).collect(),
            name: value.name.to_string(),
            notes: value.notes,
            started_at: value.started_at,
            finished_at: value.finished_at,
        }
    }
}

/// Where the user is within a workout, as seen at the time of the request.
#[derive(Serialize, Debug, PartialEq)]
pub struct ProgressResponse {
    phase: &'static str,
    current_index: Option<usize>,
    current_set: Option<SetResponse>,
    completed: usize,
    total: usize,
    rest_until: Option<DateTime<Utc>>,
    rest_remaining: i64,
    elapsed: i64,
}

impl ProgressResponse {
    fn new(tracker: &ActiveWorkout, now: DateTime<Utc>) -> Self {
        let progress = tracker.progress();
        Self {
            phase: match tracker.phase() {
                Phase::Exercising { .. } => "exercising",
                Phase::Resting { .. } => "resting",
                Phase::Completed => "completed",
            },
            current_index: tracker.current_index(),
            current_set: tracker.current().map(Into::into),
            completed: progress.completed,
            total: progress.total,
            rest_until: match tracker.phase() {
                Phase::Resting { until, .. } => Some(until),
                _ => None,
            },
            rest_remaining: tracker.rest_remaining(now).num_seconds(),
            elapsed: tracker.elapsed(now).num_seconds(),
        }
    }
}

// Distinguishes an absent field from an explicit null.
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn reps(value: u32) -> Result<Reps, ValidationError> {
    Reps::new(value).map_err(|err| ValidationError::invalid("reps", err))
}

fn weight(value: f32) -> Result<Weight, ValidationError> {
    Weight::new(value).map_err(|err| ValidationError::invalid("weight", err))
}

fn rpe(value: f32) -> Result<RPE, ValidationError> {
    RPE::new(value).map_err(|err| ValidationError::invalid("rpe", err))
}

#[derive(Deserialize)]
struct WorkoutsQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<u32>,
    #[serde(default)]
    offset: u32,
}

async fn get_workouts(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<WorkoutsQuery>,
) -> ApiResult<Json<Vec<WorkoutResponse>>> {
    let filter = WorkoutFilter {
        from: query.from,
        to: query.to,
        limit: query.limit,
        offset: query.offset,
    };
    filter
        .validate()
        .map_err(|err| ValidationError::invalid("to", err))?;
    let workouts = state.service.get_workouts(auth.user.id, &filter).await?;
    Ok(Json(workouts.into_iter().map(Into::into).collect()))
}

async fn get_active_workout(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> ApiResult<Json<Option<WorkoutResponse>>> {
    let workout = state.service.get_active_workout(auth.user.id).await?;
    Ok(Json(workout.map(Into::into)))
}

async fn get_workout(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkoutResponse>> {
    let workout = state.service.get_workout(auth.user.id, id.into()).await?;
    Ok(Json(workout.into()))
}

#[derive(Deserialize, Default)]
struct StartWorkoutRequest {
    routine_id: Option<Uuid>,
    day: Option<u32>,
    name: Option<String>,
}

async fn start_workout(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<StartWorkoutRequest>,
) -> ApiResult<(StatusCode, Json<WorkoutResponse>)> {
    let start = StartWorkout {
        routine_id: request.routine_id.map(Into::into),
        day: request.day,
        name: request.name.as_deref().map(parse_name).transpose()?,
    };
    let workout = match state
        .service
        .start_workout(auth.user.id, start, Utc::now())
        .await
    {
        Err(liftlog_domain::CreateError::Conflict) => {
            return Err(ApiError::Conflict(
                "another workout is in progress".to_string(),
            ));
        }
        result => result?,
    };
    Ok((StatusCode::CREATED, Json(workout.into())))
}

#[derive(Deserialize)]
struct ModifyWorkoutRequest {
    name: Option<String>,
    notes: Option<String>,
}

async fn modify_workout(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ModifyWorkoutRequest>,
) -> ApiResult<Json<WorkoutResponse>> {
    let changes = WorkoutChanges {
        name: request.name.as_deref().map(parse_name).transpose()?,
        notes: request.notes.map(|notes| notes.trim().to_string()),
    };
    let workout = state
        .service
        .modify_workout(auth.user.id, id.into(), changes)
        .await?;
    Ok(Json(workout.into()))
}

async fn finish_workout(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkoutResponse>> {
    let workout = match state
        .service
        .finish_workout(auth.user.id, id.into(), Utc::now())
        .await
    {
        Err(liftlog_domain::UpdateError::Conflict) => {
            return Err(ApiError::Conflict("workout is already finished".to_string()));
        }
        result => result?,
    };
    Ok(Json(workout.into()))
}

async fn delete_workout(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.service.delete_workout(auth.user.id, id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_progress(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProgressResponse>> {
    let now = Utc::now();
    let workout = state.service.get_workout(auth.user.id, id.into()).await?;
    Ok(Json(ProgressResponse::new(&ActiveWorkout::new(workout, now), now)))
}

#[derive(Deserialize)]
struct AddSetRequest {
    exercise_id: Uuid,
    target_reps: Option<u32>,
    target_weight: Option<f32>,
    target_rpe: Option<f32>,
    target_rest: Option<u32>,
    reps: Option<u32>,
    weight: Option<f32>,
    rpe: Option<f32>,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    completed: bool,
}

impl AddSetRequest {
    fn into_new_set(self, now: DateTime<Utc>) -> Result<NewWorkoutSet, ValidationError> {
        Ok(NewWorkoutSet {
            exercise_id: self.exercise_id.into(),
            target_reps: self.target_reps.map(reps).transpose()?,
            target_weight: self.target_weight.map(weight).transpose()?,
            target_rpe: self.target_rpe.map(rpe).transpose()?,
            target_rest: self
                .target_rest
                .map(Time::new)
                .transpose()
                .map_err(|err| ValidationError::invalid("target_rest", err))?,
            reps: self.reps.map(reps).transpose()?,
            weight: self.weight.map(weight).transpose()?,
            rpe: self.rpe.map(rpe).transpose()?,
            notes: self.notes.trim().to_string(),
            completed_at: self.completed.then_some(now),
        })
    }
}

async fn add_set(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AddSetRequest>,
) -> ApiResult<(StatusCode, Json<WorkoutResponse>)> {
    let set = request.into_new_set(Utc::now())?;
    let workout = state.service.add_set(auth.user.id, id.into(), set).await?;
    Ok((StatusCode::CREATED, Json(workout.into())))
}

#[derive(Deserialize, Default)]
struct ModifySetRequest {
    #[serde(default, deserialize_with = "nullable")]
    reps: Option<Option<u32>>,
    #[serde(default, deserialize_with = "nullable")]
    weight: Option<Option<f32>>,
    #[serde(default, deserialize_with = "nullable")]
    rpe: Option<Option<f32>>,
    notes: Option<String>,
    completed: Option<bool>,
}

impl ModifySetRequest {
    fn into_changes(self, now: DateTime<Utc>) -> Result<SetChanges, ValidationError> {
        Ok(SetChanges {
            reps: self.reps.map(|v| v.map(reps).transpose()).transpose()?,
            weight: self.weight.map(|v| v.map(weight).transpose()).transpose()?,
            rpe: self.rpe.map(|v| v.map(rpe).transpose()).transpose()?,
            notes: self.notes.map(|notes| notes.trim().to_string()),
            completed_at: self.completed.map(|completed| completed.then_some(now)),
        })
    }
}

async fn modify_set(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path((id, set_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ModifySetRequest>,
) -> ApiResult<Json<WorkoutResponse>> {
    let changes = request.into_changes(Utc::now())?;
    let workout = state
        .service
        .modify_set(auth.user.id, id.into(), set_id.into(), changes)
        .await?;
    Ok(Json(workout.into()))
}

async fn delete_set(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path((id, set_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<WorkoutResponse>> {
    let workout = state
        .service
        .delete_set(auth.user.id, id.into(), set_id.into())
        .await?;
    Ok(Json(workout.into()))
}

#[derive(Deserialize)]
struct CompleteSetRequest {
    /// Completes this set instead of the current one.
    index: Option<usize>,
    reps: u32,
    weight: Option<f32>,
    rpe: Option<f32>,
}

/// Completes the current set of a running workout and advances to the next one.
async fn complete_set(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CompleteSetRequest>,
) -> ApiResult<Json<ProgressResponse>> {
    let now = Utc::now();
    let values = SetValues {
        reps: reps(request.reps)?,
        weight: request.weight.map(weight).transpose()?,
        rpe: request.rpe.map(rpe).transpose()?,
    };
    let workout = state.service.get_workout(auth.user.id, id.into()).await?;
    if workout.is_finished() {
        return Err(ApiError::Conflict("workout is already finished".to_string()));
    }

    let mut tracker = ActiveWorkout::new(workout, now);
    if let Some(index) = request.index {
        tracker.select(index, now)?;
    }
    let set = tracker.complete_current(values, now)?;
    let changes = SetChanges {
        reps: Some(set.reps),
        weight: Some(set.weight),
        rpe: Some(set.rpe),
        notes: None,
        completed_at: Some(set.completed_at),
    };
    let set_id = set.id;

    let workout = state
        .service
        .modify_set(auth.user.id, id.into(), set_id, changes)
        .await?;
    Ok(Json(ProgressResponse::new(
        &ActiveWorkout::new(workout, now),
        now,
    )))
}
