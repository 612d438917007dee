use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use crate::{
    Exercise, ExerciseID, MuscleID, RPE, ReadError, Reps, UserID, Weight, Workout, WorkoutFilter,
};

#[async_trait]
pub trait StatisticsService: Send + Sync + 'static {
    async fn get_statistics(
        &self,
        user_id: UserID,
        filter: &WorkoutFilter,
        today: NaiveDate,
    ) -> Result<Statistics, ReadError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub summary: Summary,
    pub sets_per_muscle: BTreeMap<MuscleID, f32>,
    pub records: BTreeMap<ExerciseID, PersonalRecord>,
    pub load: TrainingLoad,
}

#[must_use]
pub fn statistics(
    workouts: &[Workout],
    exercises: &BTreeMap<ExerciseID, Exercise>,
    today: NaiveDate,
) -> Statistics {
    Statistics {
        summary: summary(workouts),
        sets_per_muscle: sets_per_muscle(workouts, exercises),
        records: personal_records(workouts),
        load: training_load(workouts, today),
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Summary {
    pub workouts: usize,
    pub completed_sets: usize,
    pub volume_load: u64,
    pub duration: Duration,
    pub avg_rpe: Option<RPE>,
}

#[must_use]
pub fn summary(workouts: &[Workout]) -> Summary {
    Summary {
        workouts: workouts.len(),
        completed_sets: workouts.iter().map(|w| w.completed_sets().count()).sum(),
        volume_load: workouts.iter().map(Workout::volume_load).sum(),
        duration: workouts.iter().filter_map(Workout::duration).sum(),
        avg_rpe: RPE::avg(
            &workouts
                .iter()
                .flat_map(Workout::completed_sets)
                .filter_map(|s| s.rpe)
                .collect::<Vec<_>>(),
        ),
    }
}

/// Number of effective sets per muscle, secondary muscles counting as half a set.
#[must_use]
pub fn sets_per_muscle(
    workouts: &[Workout],
    exercises: &BTreeMap<ExerciseID, Exercise>,
) -> BTreeMap<MuscleID, f32> {
    let mut result: BTreeMap<MuscleID, f32> = MuscleID::muscles().map(|m| (m, 0.0)).collect();
    for workout in workouts {
        for (muscle_id, stimulus) in workout.stimulus_per_muscle(exercises) {
            *result.entry(muscle_id).or_insert(0.0) += stimulus.sets();
        }
    }
    result
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PersonalRecord {
    pub max_weight: Option<Weight>,
    pub max_reps: Option<Reps>,
    pub estimated_one_rep_max: Option<f32>,
}

/// Epley formula, rounded to 0.1 kg.
#[must_use]
pub fn estimated_one_rep_max(weight: Weight, reps: Reps) -> Option<f32> {
    let w = f32::from(weight);
    let r = u32::from(reps);
    match r {
        0 => None,
        1 => Some(w),
        #[allow(clippy::cast_precision_loss)]
        _ => Some((w * (1.0 + r as f32 / 30.0) * 10.0).round() / 10.0),
    }
}

#[must_use]
pub fn personal_records(workouts: &[Workout]) -> BTreeMap<ExerciseID, PersonalRecord> {
    let mut result: BTreeMap<ExerciseID, PersonalRecord> = BTreeMap::new();
    for set in workouts.iter().flat_map(Workout::completed_sets) {
        let record = result.entry(set.exercise_id).or_default();
        if let Some(weight) = set.weight {
            if record.max_weight.is_none_or(|max| weight > max) {
                record.max_weight = Some(weight);
            }
        }
        if let Some(reps) = set.reps {
            if record.max_reps.is_none_or(|max| reps > max) {
                record.max_reps = Some(reps);
            }
            if let Some(one_rep_max) = set
                .weight
                .and_then(|weight| estimated_one_rep_max(weight, reps))
            {
                if record
                    .estimated_one_rep_max
                    .is_none_or(|max| one_rep_max > max)
                {
                    record.estimated_one_rep_max = Some(one_rep_max);
                }
            }
        }
    }
    result
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrainingLoad {
    pub short_term_load: Vec<(NaiveDate, f32)>,
    pub long_term_load: Vec<(NaiveDate, f32)>,
}

impl TrainingLoad {
    pub const LOAD_RATIO_LOW: f32 = 0.8;
    pub const LOAD_RATIO_HIGH: f32 = 1.5;

    const SHORT_TERM_WINDOW: usize = 7;
    const LONG_TERM_WINDOW: usize = 28;

    #[must_use]
    pub fn load_ratio(&self) -> Option<f32> {
        let long_term_load = self.long_term_load.last().map_or(0., |(_, l)| *l);
        if long_term_load > 0. {
            let short_term_load = self.short_term_load.last().map_or(0., |(_, l)| *l);
            Some(short_term_load / long_term_load)
        } else {
            None
        }
    }
}

#[must_use]
pub fn training_load(workouts: &[Workout], today: NaiveDate) -> TrainingLoad {
    let daily_load = daily_load(workouts, today);
    let short_term_load = weighted_sum_of_load(&daily_load, TrainingLoad::SHORT_TERM_WINDOW);
    let long_term_load = average_of_load(&short_term_load, TrainingLoad::LONG_TERM_WINDOW);
    TrainingLoad {
        short_term_load,
        long_term_load,
    }
}

/// Load of every day from the first workout up to `today`.
#[allow(clippy::cast_precision_loss)]
fn daily_load(workouts: &[Workout], today: NaiveDate) -> Vec<(NaiveDate, f32)> {
    let mut load_per_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for workout in workouts {
        *load_per_day.entry(workout.date()).or_default() += workout.load();
    }
    let first_day = load_per_day
        .first_key_value()
        .map_or(today, |(day, _)| *day)
        .min(today);
    first_day
        .iter_days()
        .take_while(|day| *day <= today)
        .map(|day| (day, load_per_day.get(&day).copied().unwrap_or_default() as f32))
        .collect()
}

/// Sum of the load of the preceding days, linearly decreasing in weight with age.
fn weighted_sum_of_load(
    daily_load: &[(NaiveDate, f32)],
    window_size: usize,
) -> Vec<(NaiveDate, f32)> {
    #[allow(clippy::cast_precision_loss)]
    let weight = |age: usize| 1. - age as f32 / window_size as f32;
    daily_load
        .iter()
        .enumerate()
        .map(|(index, (date, _))| {
            let window = &daily_load[(index + 1).saturating_sub(window_size)..=index];
            let sum = window
                .iter()
                .rev()
                .enumerate()
                .map(|(age, (_, load))| load * weight(age))
                .sum::<f32>();
            (*date, sum)
        })
        .collect()
}

/// Moving average, only defined once a full window is available.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn average_of_load(load: &[(NaiveDate, f32)], window_size: usize) -> Vec<(NaiveDate, f32)> {
    let mut sum = 0.0_f64;
    load.iter()
        .enumerate()
        .filter_map(|(index, (date, value))| {
            sum += f64::from(*value);
            if let Some(dropped) = index.checked_sub(window_size) {
                sum -= f64::from(load[dropped].1);
            }
            (index + 1 >= window_size).then(|| (*date, (sum / window_size as f64) as f32))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use assert_approx_eq::assert_approx_eq;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{Category, ExerciseMuscle, Name, Stimulus, WorkoutSet};

    use super::*;

    static TODAY: std::sync::LazyLock<NaiveDate> =
        std::sync::LazyLock::new(|| NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());

    fn started(days_ago: i64) -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &(*TODAY - Duration::days(days_ago))
                .and_hms_opt(17, 0, 0)
                .unwrap(),
        )
    }

    fn set(exercise_id: u128, reps: u32, weight: f32, rpe: Option<RPE>) -> WorkoutSet {
        WorkoutSet {
            id: 0.into(),
            exercise_id: exercise_id.into(),
            position: 0,
            target_reps: None,
            target_weight: None,
            target_rpe: None,
            target_rest: None,
            reps: Some(Reps::new(reps).unwrap()),
            weight: Some(Weight::new(weight).unwrap()),
            rpe,
            notes: String::new(),
            completed_at: Some(DateTime::UNIX_EPOCH),
        }
    }

    fn workout(days_ago: i64, minutes: i64, sets: Vec<WorkoutSet>) -> Workout {
        Workout {
            id: 1.into(),
            owner: 1.into(),
            routine_id: None,
            routine_day: None,
            name: Name::new("A").unwrap(),
            notes: String::new(),
            started_at: started(days_ago),
            finished_at: Some(started(days_ago) + Duration::minutes(minutes)),
            sets,
        }
    }

    static WORKOUTS: std::sync::LazyLock<Vec<Workout>> = std::sync::LazyLock::new(|| {
        vec![
            workout(
                3,
                60,
                vec![
                    set(1, 5, 100.0, Some(RPE::EIGHT)),
                    set(1, 3, 110.0, Some(RPE::NINE)),
                ],
            ),
            workout(
                1,
                30,
                vec![set(1, 10, 80.0, Some(RPE::SIX)), set(2, 12, 20.0, None)],
            ),
        ]
    });

    static EXERCISES: std::sync::LazyLock<BTreeMap<ExerciseID, Exercise>> =
        std::sync::LazyLock::new(|| {
            BTreeMap::from([(
                1.into(),
                Exercise {
                    id: 1.into(),
                    owner: None,
                    name: Name::new("Squat").unwrap(),
                    description: String::new(),
                    muscles: vec![
                        ExerciseMuscle {
                            muscle_id: MuscleID::Quads,
                            stimulus: Stimulus::PRIMARY,
                        },
                        ExerciseMuscle {
                            muscle_id: MuscleID::Glutes,
                            stimulus: Stimulus::SECONDARY,
                        },
                    ],
                    force: None,
                    mechanic: None,
                    equipment: vec![],
                    category: Category::Strength,
                },
            )])
        });

    #[test]
    fn test_summary() {
        assert_eq!(
            summary(&WORKOUTS),
            Summary {
                workouts: 2,
                completed_sets: 4,
                volume_load: 500 + 330 + 800 + 240,
                duration: Duration::minutes(90),
                avg_rpe: RPE::new(7.5).ok(),
            }
        );
    }

    #[test]
    fn test_summary_heavy_sets() {
        let workouts = (0..5)
            .map(|days_ago| {
                workout(
                    days_ago,
                    60,
                    (0..1000).map(|_| set(1, 999, 999.9, None)).collect(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(summary(&workouts).volume_load, 5 * 1000 * 998_900);
    }

    #[test]
    fn test_summary_empty() {
        assert_eq!(summary(&[]), Summary::default());
    }

    #[test]
    fn test_sets_per_muscle() {
        let sets = sets_per_muscle(&WORKOUTS, &EXERCISES);
        assert_eq!(sets.len(), 18);
        assert_eq!(sets[&MuscleID::Quads], 2.0);
        assert_eq!(sets[&MuscleID::Glutes], 1.0);
        assert_eq!(sets[&MuscleID::Pecs], 0.0);
    }

    #[rstest]
    #[case(100.0, 1, Some(100.0))]
    #[case(100.0, 5, Some(116.7))]
    #[case(80.0, 10, Some(106.7))]
    #[case(80.0, 0, None)]
    fn test_estimated_one_rep_max(
        #[case] weight: f32,
        #[case] reps: u32,
        #[case] expected: Option<f32>,
    ) {
        assert_eq!(
            estimated_one_rep_max(Weight::new(weight).unwrap(), Reps::new(reps).unwrap()),
            expected
        );
    }

    #[test]
    fn test_personal_records() {
        let records = personal_records(&WORKOUTS);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[&1.into()],
            PersonalRecord {
                max_weight: Some(Weight::new(110.0).unwrap()),
                max_reps: Some(Reps::new(10).unwrap()),
                estimated_one_rep_max: Some(121.0),
            }
        );
        assert_eq!(
            records[&2.into()].max_reps,
            Some(Reps::new(12).unwrap())
        );
    }

    #[test]
    fn test_training_load() {
        let load = training_load(&WORKOUTS, *TODAY);
        // first workout: 8 + 16, second workout: 2 + 1
        let expected = [
            (*TODAY - Duration::days(3), 24.0),
            (*TODAY - Duration::days(2), 24.0 * 6.0 / 7.0),
            (*TODAY - Duration::days(1), 24.0 * 5.0 / 7.0 + 3.0),
            (*TODAY, 24.0 * 4.0 / 7.0 + 3.0 * 6.0 / 7.0),
        ];
        assert_eq!(load.short_term_load.len(), expected.len());
        for ((date, value), (expected_date, expected_value)) in
            zip(&load.short_term_load, &expected)
        {
            assert_eq!(date, expected_date);
            assert_approx_eq!(*value, *expected_value, 0.001);
        }
        assert_eq!(load.long_term_load, vec![]);
        assert_eq!(load.load_ratio(), None);
    }

    #[test]
    fn test_training_load_ratio() {
        let workouts = (0..35)
            .map(|days_ago| workout(days_ago, 60, vec![set(1, 5, 100.0, None)]))
            .collect::<Vec<_>>();
        let load = training_load(&workouts, *TODAY);
        assert_eq!(load.short_term_load.len(), 35);
        assert_eq!(load.long_term_load.len(), 8);
        assert_approx_eq!(load.load_ratio().unwrap(), 1.0);
    }

    #[test]
    fn test_training_load_without_workouts() {
        let load = training_load(&[], *TODAY);
        assert_eq!(load.short_term_load, vec![(*TODAY, 0.0)]);
        assert!(load.long_term_load.is_empty());
    }

    #[test]
    fn test_statistics() {
        let statistics = statistics(&WORKOUTS, &EXERCISES, *TODAY);
        assert_eq!(statistics.summary.workouts, 2);
        assert_eq!(statistics.records.len(), 2);
        assert_eq!(statistics.load.short_term_load.len(), 4);
    }
}
