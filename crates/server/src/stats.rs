use std::collections::BTreeMap;

use axum::extract::State;
use chrono::{NaiveDate, Utc};
use liftlog_domain::{
    PersonalRecord, Property, Statistics, StatisticsService, TrainingLoad, ValidationError,
    WorkoutFilter,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthUser,
    error::ApiResult,
    extract::{Json, Query},
    state::SharedState,
};

#[derive(Deserialize)]
pub struct StatisticsQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

#[derive(Serialize, Debug, PartialEq)]
struct SummaryResponse {
    workouts: usize,
    completed_sets: usize,
    volume_load: u64,
    duration: i64,
    avg_rpe: Option<f32>,
}

#[derive(Serialize, Debug, PartialEq)]
struct RecordResponse {
    exercise_id: String,
    max_weight: Option<f32>,
    max_reps: Option<u32>,
    estimated_one_rep_max: Option<f32>,
}

#[derive(Serialize, Debug, PartialEq)]
struct LoadResponse {
    short_term: Vec<(NaiveDate, f32)>,
    long_term: Vec<(NaiveDate, f32)>,
    ratio: Option<f32>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct StatisticsResponse {
    summary: SummaryResponse,
    sets_per_muscle: BTreeMap<&'static str, f32>,
    records: Vec<RecordResponse>,
    load: LoadResponse,
}

impl From<Statistics> for StatisticsResponse {
    fn from(value: Statistics) -> Self {
        let load_ratio = value.load.load_ratio();
        let TrainingLoad {
            short_term_load,
            long_term_load,
        } = value.load;
        Self {
            summary: SummaryResponse {
                workouts: value.summary.workouts,
                completed_sets: value.summary.completed_sets,
                volume_load: value.summary.volume_load,
                duration: value.summary.duration.num_seconds(),
                avg_rpe: value.summary.avg_rpe.map(f32::from),
            },
            sets_per_muscle: value
                .sets_per_muscle
                .into_iter()
                .map(|(muscle, sets)| (muscle.slug(), sets))
                .collect(),
            records: value
                .records
                .into_iter()
                .map(
                    |(
                        exercise_id,
                        PersonalRecord {
                            max_weight,
                            max_reps,
                            estimated_one_rep_max,
                        },
                    )| RecordResponse {
                        exercise_id: exercise_id.to_string(),
                        max_weight: max_weight.map(f32::from),
                        max_reps: max_reps.map(u32::from),
                        estimated_one_rep_max,
                    },
                )
                .collect(),
            load: LoadResponse {
                short_term: short_term_load,
                long_term: long_term_load,
                ratio: load_ratio,
            },
        }
    }
}

pub async fn get_statistics(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<StatisticsQuery>,
) -> ApiResult<Json<StatisticsResponse>> {
    let filter = WorkoutFilter {
        from: query.from,
        to: query.to,
        ..WorkoutFilter::default()
    };
    filter
        .validate()
        .map_err(|err| ValidationError::invalid("to", err))?;
    let statistics = state
        .service
        .get_statistics(auth.user.id, &filter, Utc::now().date_naive())
        .await?;
    Ok(Json(statistics.into()))
}

#[cfg(test)]
mod tests {
    use liftlog_domain::{ExerciseID, MuscleID, RPE, Reps, Summary, Weight};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_statistics_response() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let statistics = Statistics {
            summary: Summary {
                workouts: 2,
                completed_sets: 10,
                volume_load: 4000,
                duration: chrono::Duration::minutes(90),
                avg_rpe: Some(RPE::EIGHT),
            },
            sets_per_muscle: BTreeMap::from([(MuscleID::Pecs, 6.0), (MuscleID::Triceps, 3.0)]),
            records: BTreeMap::from([(
                ExerciseID::from(1),
                PersonalRecord {
                    max_weight: Some(Weight::new(100.0).unwrap()),
                    max_reps: Some(Reps::new(5).unwrap()),
                    estimated_one_rep_max: Some(112.5),
                },
            )]),
            load: TrainingLoad {
                short_term_load: vec![(day, 400.0)],
                long_term_load: vec![(day, 200.0)],
            },
        };
        assert_eq!(
            StatisticsResponse::from(statistics),
            StatisticsResponse {
                summary: SummaryResponse {
                    workouts: 2,
                    completed_sets: 10,
                    volume_load: 4000,
                    duration: 5400,
                    avg_rpe: Some(8.0),
                },
                sets_per_muscle: BTreeMap::from([("pecs", 6.0), ("triceps", 3.0)]),
                records: vec![RecordResponse {
                    exercise_id: ExerciseID::from(1).to_string(),
                    max_weight: Some(100.0),
                    max_reps: Some(5),
                    estimated_one_rep_max: Some(112.5),
                }],
                load: LoadResponse {
                    short_term: vec![(day, 400.0)],
                    long_term: vec![(day, 200.0)],
                    ratio: Some(2.0),
                },
            }
        );
    }
}
