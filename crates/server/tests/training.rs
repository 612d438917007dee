mod common;

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

use common::{TestApp, test_app};

async fn create_routine(app: &TestApp, token: &str, exercise_id: &str) -> Value {
    let response = app
        .post(
            "/api/routines",
            token,
            json!({
                "name": "Push Pull",
                "days": [
                    {
                        "name": "Push",
                        "exercises": [
                            {"exercise_id": exercise_id, "sets": 2, "reps": 5, "weight": 100.0, "rest": 120}
                        ]
                    },
                    {"name": "Pull", "exercises": []}
                ]
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.json());
    response.json()
}

#[tokio::test]
async fn test_muscles() {
    let app = test_app().await;
    let response = app.request(Method::GET, "/api/muscles", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    let muscles = response.json();
    assert!(
        muscles
            .as_array()
            .unwrap()
            .iter()
            .any(|m| m["id"] == "pecs" && m["name"] == "Pecs")
    );
}

#[tokio::test]
async fn test_exercises() {
    let app = test_app().await;
    let token = app.access_token("alice@example.com").await;
    let other_token = app.access_token("bob@example.com").await;

    let catalog = app.get("/api/exercises", &token).await.json();
    assert!(catalog.as_array().unwrap().len() > 10);
    assert!(catalog.as_array().unwrap().iter().all(|e| e["custom"] == false));

    let created = app
        .post(
            "/api/exercises",
            &token,
            json!({
                "name": "Floor Press",
                "muscles": [{"muscle": "pecs", "stimulus": 100}, {"muscle": "triceps", "stimulus": 50}],
                "force": "push",
                "mechanic": "compound",
                "equipment": ["dumbbell"]
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let created = created.json();
    assert_eq!(created["custom"], true);
    assert_eq!(created["category"], "strength");
    let id = created["id"].as_str().unwrap();

    let custom = app.get("/api/exercises?custom=true", &token).await.json();
    assert_eq!(custom.as_array().unwrap().len(), 1);
    let filtered = app
        .get("/api/exercises?name=floor&muscle=pecs&equipment=dumbbell", &token)
        .await
        .json();
    assert_eq!(filtered[0]["id"], id);

    // custom exercises are private
    assert_eq!(
        app.get(&format!("/api/exercises/{id}"), &other_token).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.delete(&format!("/api/exercises/{id}"), &other_token).await.status,
        StatusCode::NOT_FOUND
    );

    let replaced = app
        .request(
            Method::PUT,
            &format!("/api/exercises/{id}"),
            Some(&token),
            Some(json!({"name": "Dumbbell Floor Press", "equipment": ["dumbbell"]})),
        )
        .await;
    assert_eq!(replaced.status, StatusCode::OK);
    assert_eq!(replaced.json()["name"], "Dumbbell Floor Press");

    assert_eq!(
        app.delete(&format!("/api/exercises/{id}"), &token).await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.get(&format!("/api/exercises/{id}"), &token).await.status,
        StatusCode::NOT_FOUND
    );
}

#[rstest]
#[case("/api/exercises?muscle=wings")]
#[case("/api/exercises/not-a-uuid")]
#[case("/api/workouts?from=2024-02-01&to=2024-01-01")]
#[case("/api/stats?from=yesterday")]
#[tokio::test]
async fn test_invalid_requests(#[case] uri: &str) {
    let app = test_app().await;
    let token = app.access_token("alice@example.com").await;
    assert_eq!(app.get(uri, &token).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_catalog_exercise_cannot_be_deleted() {
    let app = test_app().await;
    let token = app.access_token("alice@example.com").await;
    let id = app.exercise_id(&token, "Barbell Bench Press").await;
    assert_eq!(
        app.delete(&format!("/api/exercises/{id}"), &token).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_routines() {
    let app = test_app().await;
    let token = app.access_token("alice@example.com").await;
    let exercise_id = app.exercise_id(&token, "Barbell Bench Press").await;
    let routine = create_routine(&app, &token, &exercise_id).await;
    assert_eq!(routine["sets"], 2);
    assert_eq!(routine["archived"], false);
    assert_eq!(routine["days"][0]["exercises"][0]["exercise_id"], exercise_id);
    let id = routine["id"].as_str().unwrap();

    let archived = app
        .patch(&format!("/api/routines/{id}"), &token, json!({"archived": true}))
        .await;
    assert_eq!(archived.status, StatusCode::OK);
    assert_eq!(archived.json()["archived"], true);
    assert_eq!(
        app.get("/api/routines", &token).await.json(),
        json!([])
    );
    assert_eq!(
        app.get("/api/routines?archived=true", &token).await.json()[0]["id"],
        id
    );

    let unknown_exercise = app
        .patch(
            &format!("/api/routines/{id}"),
            &token,
            json!({"days": [{"name": "Push", "exercises": [
                {"exercise_id": "00000000-0000-0000-0000-000000000001", "sets": 3}
            ]}]}),
        )
        .await;
    assert_eq!(unknown_exercise.status, StatusCode::BAD_REQUEST);

    assert_eq!(
        app.delete(&format!("/api/routines/{id}"), &token).await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.get(&format!("/api/routines/{id}"), &token).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_workout_from_routine() {
    let app = test_app().await;
    let token = app.access_token("alice@example.com").await;
    let exercise_id = app.exercise_id(&token, "Barbell Bench Press").await;
    let routine = create_routine(&app, &token, &exercise_id).await;

    assert_eq!(app.get("/api/workouts/active", &token).await.json(), Value::Null);

    let started = app
        .post(
            "/api/workouts",
            &token,
            json!({"routine_id": routine["id"], "day": 0}),
        )
        .await;
    assert_eq!(started.status, StatusCode::CREATED);
    let workout = started.json();
    assert_eq!(workout["name"], "Push Pull - Push");
    assert_eq!(workout["sets"].as_array().unwrap().len(), 2);
    assert_eq!(workout["sets"][0]["target_reps"], 5);
    assert_eq!(workout["sets"][0]["target_rest"], 120);
    let id = workout["id"].as_str().unwrap();

    let second = app.post("/api/workouts", &token, json!({})).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(app.get("/api/workouts/active", &token).await.json()["id"], id);

    let progress = app.get(&format!("/api/workouts/{id}/progress"), &token).await.json();
    assert_eq!(progress["phase"], "exercising");
    assert_eq!(progress["current_index"], 0);
    assert_eq!(progress["completed"], 0);
    assert_eq!(progress["total"], 2);

    let completed = app
        .post(
            &format!("/api/workouts/{id}/sets/complete"),
            &token,
            json!({"reps": 5, "weight": 100.0, "rpe": 8}),
        )
        .await;
    assert_eq!(completed.status, StatusCode::OK);
    let progress = completed.json();
    assert_eq!(progress["phase"], "resting");
    assert_eq!(progress["current_index"], 1);
    assert_eq!(progress["completed"], 1);
    assert!(progress["rest_remaining"].as_i64().unwrap() > 100);

    let workout = app.get(&format!("/api/workouts/{id}"), &token).await.json();
    assert_eq!(workout["sets"][0]["reps"], 5);
    assert_eq!(workout["sets"][0]["rpe"], 8.0);
    assert!(workout["sets"][0]["completed_at"].is_string());
    assert_eq!(workout["volume_load"], 500);

    let completed_again = app
        .post(
            &format!("/api/workouts/{id}/sets/complete"),
            &token,
            json!({"reps": 5, "index": 0}),
        )
        .await;
    assert_eq!(completed_again.status, StatusCode::CONFLICT);

    let progress = app
        .post(
            &format!("/api/workouts/{id}/sets/complete"),
            &token,
            json!({"reps": 4, "weight": 100.0}),
        )
        .await
        .json();
    assert_eq!(progress["phase"], "completed");
    assert_eq!(progress["current_set"], Value::Null);

    let finished = app
        .post(&format!("/api/workouts/{id}/finish"), &token, json!({}))
        .await;
    assert_eq!(finished.status, StatusCode::OK);
    assert!(finished.json()["finished_at"].is_string());
    assert_eq!(
        app.post(&format!("/api/workouts/{id}/finish"), &token, json!({}))
            .await
            .status,
        StatusCode::CONFLICT
    );
    assert_eq!(
        app.post(
            &format!("/api/workouts/{id}/sets/complete"),
            &token,
            json!({"reps": 5})
        )
        .await
        .status,
        StatusCode::CONFLICT
    );
    assert_eq!(app.get("/api/workouts/active", &token).await.json(), Value::Null);
}

#[tokio::test]
async fn test_complete_set_rejected() {
    let app = test_app().await;
    let token = app.access_token("alice@example.com").await;
    let exercise_id = app.exercise_id(&token, "Barbell Bench Press").await;
    let workout = app.post("/api/workouts", &token, json!({})).await.json();
    let id = workout["id"].as_str().unwrap();
    let complete_uri = format!("/api/workouts/{id}/sets/complete");

    // no sets yet
    let response = app.post(&complete_uri, &token, json!({"reps": 5})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let added = app
        .post(
            &format!("/api/workouts/{id}/sets"),
            &token,
            json!({"exercise_id": exercise_id, "reps": 8}),
        )
        .await;
    assert_eq!(added.status, StatusCode::CREATED);

    let response = app
        .post(&complete_uri, &token, json!({"reps": 5, "index": 3}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let completed = app.post(&complete_uri, &token, json!({"reps": 8})).await;
    assert_eq!(completed.status, StatusCode::OK);
    assert_eq!(completed.json()["phase"], "completed");

    // every set is completed, but the workout is still running
    let response = app.post(&complete_uri, &token, json!({"reps": 8})).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(app.get("/api/workouts/active", &token).await.json()["id"], id);
}

#[tokio::test]
async fn test_workout_sets() {
    let app = test_app().await;
    let token = app.access_token("alice@example.com").await;
    let exercise_id = app.exercise_id(&token, "Barbell Bench Press").await;

    let workout = app
        .post("/api/workouts", &token, json!({"name": "Evening"}))
        .await
        .json();
    assert_eq!(workout["name"], "Evening");
    assert_eq!(workout["sets"], json!([]));
    let id = workout["id"].as_str().unwrap();

    let added = app
        .post(
            &format!("/api/workouts/{id}/sets"),
            &token,
            json!({"exercise_id": exercise_id, "reps": 8, "weight": 60.0, "completed": true}),
        )
        .await;
    assert_eq!(added.status, StatusCode::CREATED);
    let workout = added.json();
    let set_id = workout["sets"][0]["id"].as_str().unwrap();
    assert_eq!(workout["completed_sets"], 1);

    let modified = app
        .patch(
            &format!("/api/workouts/{id}/sets/{set_id}"),
            &token,
            json!({"weight": null, "completed": false, "notes": "too easy"}),
        )
        .await;
    assert_eq!(modified.status, StatusCode::OK);
    let set = &modified.json()["sets"][0];
    assert_eq!(set["weight"], Value::Null);
    assert_eq!(set["reps"], 8);
    assert_eq!(set["completed_at"], Value::Null);
    assert_eq!(set["notes"], "too easy");

    let invalid = app
        .patch(
            &format!("/api/workouts/{id}/sets/{set_id}"),
            &token,
            json!({"rpe": 11}),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let unknown = app
        .post(
            &format!("/api/workouts/{id}/sets"),
            &token,
            json!({"exercise_id": "00000000-0000-0000-0000-000000000001"}),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);

    let deleted = app
        .delete(&format!("/api/workouts/{id}/sets/{set_id}"), &token)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.json()["sets"], json!([]));

    let renamed = app
        .patch(
            &format!("/api/workouts/{id}"),
            &token,
            json!({"name": "Late Evening", "notes": "tired"}),
        )
        .await
        .json();
    assert_eq!(renamed["name"], "Late Evening");
    assert_eq!(renamed["notes"], "tired");

    assert_eq!(
        app.delete(&format!("/api/workouts/{id}"), &token).await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(app.get("/api/workouts", &token).await.json(), json!([]));
}

#[tokio::test]
async fn test_workouts_are_private() {
    let app = test_app().await;
    let token = app.access_token("alice@example.com").await;
    let other_token = app.access_token("bob@example.com").await;
    let workout = app.post("/api/workouts", &token, json!({})).await.json();
    let id = workout["id"].as_str().unwrap();

    assert_eq!(
        app.get(&format!("/api/workouts/{id}"), &other_token).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.delete(&format!("/api/workouts/{id}"), &other_token).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.get("/api/workouts", &other_token).await.json(), json!([]));
}

#[tokio::test]
async fn test_statistics() {
    let app = test_app().await;
    let token = app.access_token("alice@example.com").await;
    let exercise_id = app.exercise_id(&token, "Barbell Bench Press").await;

    let empty = app.get("/api/stats", &token).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.json()["summary"]["workouts"], 0);
    assert_eq!(empty.json()["load"]["ratio"], Value::Null);

    let workout = app.post("/api/workouts", &token, json!({})).await.json();
    let id = workout["id"].as_str().unwrap();
    for _ in 0..3 {
        app.post(
            &format!("/api/workouts/{id}/sets"),
            &token,
            json!({"exercise_id": exercise_id, "reps": 5, "weight": 100.0, "rpe": 8, "completed": true}),
        )
        .await;
    }
    app.post(&format!("/api/workouts/{id}/finish"), &token, json!({}))
        .await;

    let stats = app.get("/api/stats", &token).await.json();
    assert_eq!(stats["summary"]["workouts"], 1);
    assert_eq!(stats["summary"]["completed_sets"], 3);
    assert_eq!(stats["summary"]["volume_load"], 1500);
    assert_eq!(stats["summary"]["avg_rpe"], 8.0);
    assert!(stats["sets_per_muscle"]["pecs"].as_f64().unwrap() > 0.0);
    assert_eq!(stats["records"][0]["exercise_id"], exercise_id);
    assert_eq!(stats["records"][0]["max_weight"], 100.0);
    assert_eq!(stats["records"][0]["max_reps"], 5);
}
