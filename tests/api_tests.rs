// tests/api_tests.rs

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{Value, json};
use test_series::{
    config::Config,
    exam::{SessionRegistry, marking::MarkingScheme},
    routes,
    state::AppState,
    store::MemoryStore,
    utils::jwt::sign_jwt,
};
use uuid::Uuid;

const SECRET: &str = "test_secret_for_integration_tests";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let config = Config {
        database_url: None,
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        marking_scheme: MarkingScheme::FLAT,
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
    };

    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        config,
        sessions: SessionRegistry::new(),
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn token_for(user_id: Uuid) -> String {
    sign_jwt(user_id, "authenticated", SECRET, 600).expect("Failed to sign token")
}

fn series_payload() -> Value {
    let questions: Vec<Value> = (0..4)
        .map(|i| {
            json!({
                "id": format!("q{}", i),
                "prompt": format!("Question {}", i),
                "topic": if i < 2 { "Mechanics" } else { "Optics" },
                "type": "single_correct",
                "options": ["A", "B", "C", "D"],
                "correct_answer": 0
            })
        })
        .collect();

    json!({
        "title": "Physics mock 1",
        "questions": questions,
        "duration_seconds": 600,
        "negative_marking": true
    })
}

async fn create_series(client: &reqwest::Client, address: &str, token: &str) -> Value {
    let response = client
        .post(format!("{}/api/test-series", address))
        .bearer_auth(token)
        .json(&series_payload())
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

async fn start_session(client: &reqwest::Client, address: &str, token: &str, series_id: &str) -> Value {
    let response = client
        .post(format!("{}/api/test-series/{}/sessions", address, series_id))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

async fn post_action(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    session_id: &str,
    action: &str,
    body: Value,
) -> reqwest::Response {
    client
        .post(format!("{}/api/sessions/{}/{}", address, session_id, action))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/test-series", address))
        .json(&series_payload())
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn create_series_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = token_for(Uuid::new_v4());

    // Act: no questions
    let response = client
        .post(format!("{}/api/test-series", address))
        .bearer_auth(&token)
        .json(&json!({ "title": "Empty", "questions": [] }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn public_series_hides_answer_keys() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = token_for(Uuid::new_v4());
    let series = create_series(&client, &address, &token).await;

    let fetched: Value = client
        .get(format!("{}/api/test-series/{}", address, series["id"].as_str().unwrap()))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();

    assert_eq!(fetched["question_count"], 4);
    assert_eq!(fetched["duration_seconds"], 600);
    for question in fetched["questions"].as_array().unwrap() {
        assert!(question.get("correct_answer").is_none());
    }
}

#[tokio::test]
async fn test_session_flow() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = token_for(Uuid::new_v4());
    let series = create_series(&client, &address, &token).await;
    let series_id = series["id"].as_str().unwrap().to_string();

    // 1. Start
    let session = start_session(&client, &address, &token, &series_id).await;
    let session_id = session["session_id"].as_str().unwrap().to_string();
    assert_eq!(session["state"], "running");
    assert_eq!(session["current_index"], 0);
    assert_eq!(session["total_questions"], 4);
    assert_eq!(session["pause_left"], 1800);

    // 2. Answer: two correct, one wrong, one left blank
    for (index, option) in [(0, 0), (1, 0), (2, 3)] {
        let response = post_action(
            &client,
            &address,
            &token,
            &session_id,
            "answer",
            json!({ "question_index": index, "answer": { "kind": "choice", "value": option } }),
        )
        .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    // 3. Lifeline on the blank question
    let lifeline: Value = post_action(&client, &address, &token, &session_id, "lifeline", json!({ "question_index": 3 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(lifeline["lifeline"]["status"], "applied");
    let eliminated = lifeline["lifeline"]["eliminated"].as_array().unwrap();
    assert_eq!(eliminated.len(), 2);
    assert!(!eliminated.contains(&json!(0)));

    // A second lifeline on the same question changes nothing
    let again: Value = post_action(&client, &address, &token, &session_id, "lifeline", json!({ "question_index": 3 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(again["lifeline"]["status"], "already_used");

    // 4. Navigation clamps, review marks toggle, pause freezes
    let view: Value = post_action(&client, &address, &token, &session_id, "navigate", json!({ "index": 99 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["current_index"], 3);
    assert_eq!(view["visible_options"].as_array().unwrap().len(), 2);

    let view: Value = post_action(&client, &address, &token, &session_id, "review", json!({ "question_index": 1 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["marked_for_review"], json!([1]));

    let view: Value = post_action(&client, &address, &token, &session_id, "pause", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["state"], "paused");

    // 5. Submit
    let response = post_action(&client, &address, &token, &session_id, "submit", json!({})).await;
    assert_eq!(response.status().as_u16(), 200);
    let result: Value = response.json().await.unwrap();

    assert_eq!(result["saved"], true);
    assert_eq!(result["attempt"]["score"], 1.75);
    assert_eq!(result["attempt"]["total_questions"], 4);
    assert_eq!(result["statistics"]["correct"], 2);
    assert_eq!(result["statistics"]["incorrect"], 1);
    assert_eq!(result["statistics"]["unattempted"], 1);
    assert_eq!(result["statistics"]["accuracy"], 67);
    let attempt_id = result["attempt"]["id"].as_str().unwrap().to_string();

    // 6. Submitting again returns the same attempt
    let repeat: Value = post_action(&client, &address, &token, &session_id, "submit", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(repeat["attempt"]["id"], attempt_id.as_str());

    // 7. Further interaction is rejected
    let response = post_action(
        &client,
        &address,
        &token,
        &session_id,
        "answer",
        json!({ "question_index": 3, "answer": { "kind": "choice", "value": 0 } }),
    )
    .await;
    assert_eq!(response.status().as_u16(), 409);

    // 8. Stored attempt can be listed and rescored
    let attempts: Vec<Value> = client
        .get(format!("{}/api/attempts", address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["title"], "Physics mock 1");

    let rescored: Value = client
        .get(format!("{}/api/attempts/{}/result", address, attempt_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(rescored["statistics"]["correct"], 2);
    assert_eq!(rescored["statistics"]["current_score"], 1.75);
    assert_eq!(rescored["statistics"]["topic_scores"][0]["topic"], "Mechanics");
}

#[tokio::test]
async fn exit_discards_session() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = token_for(Uuid::new_v4());
    let series = create_series(&client, &address, &token).await;
    let session = start_session(&client, &address, &token, series["id"].as_str().unwrap()).await;
    let session_id = session["session_id"].as_str().unwrap();

    let response = client
        .delete(format!("{}/api/sessions/{}", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 204);

    let response = post_action(&client, &address, &token, session_id, "submit", json!({})).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .get(format!("{}/api/sessions/{}", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);

    let attempts: Vec<Value> = client
        .get(format!("{}/api/attempts", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(attempts.is_empty());
}

#[tokio::test]
async fn sessions_are_private_to_their_owner() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let owner = token_for(Uuid::new_v4());
    let stranger = token_for(Uuid::new_v4());
    let series = create_series(&client, &address, &owner).await;
    let session = start_session(&client, &address, &owner, series["id"].as_str().unwrap()).await;
    let session_id = session["session_id"].as_str().unwrap();

    let response = post_action(&client, &address, &stranger, session_id, "submit", json!({})).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .get(format!("{}/api/sessions/{}", address, session_id))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}
