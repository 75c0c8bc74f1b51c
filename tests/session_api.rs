mod support;

use serde_json::Value;

async fn create_session(
    client: &reqwest::Client,
    base_url: &str,
    player_id: &str,
    duration_seconds: i64,
) -> reqwest::Response {
    let payload = serde_json::json!({
        "player_id": player_id,
        "player_name": "Integration",
        "duration_seconds": duration_seconds,
    });
    client
        .post(format!("{base_url}/sessions"))
        .json(&payload)
        .send()
        .await
        .expect("request should succeed")
}

#[tokio::test]
async fn create_session_returns_initial_state() {
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();
    let player_id = format!("player-{}", uuid::Uuid::new_v4());

    let res = create_session(&client, base_url, &player_id, 120).await;
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);

    let body: Value = res.json().await.expect("json body");
    let session_id = body["session_id"].as_str().expect("session id");
    assert!(session_id.starts_with("session-"));
    assert_eq!(body["player"]["id"], player_id.as_str());
    assert_eq!(body["session"]["phase"], "playing");
    assert_eq!(body["session"]["time_left"], 120);
    assert_eq!(body["session"]["world_energy"], 1000);
    assert_eq!(body["session"]["total_commits"], 0);
    assert_eq!(body["session"]["nodes"].as_array().expect("nodes").len(), 5);
    // The owner spawns at the arena center.
    assert_eq!(body["player"]["x"], 400.0);
    assert_eq!(body["player"]["y"], 300.0);
}

#[tokio::test]
async fn create_session_rejects_bad_duration() {
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();
    let player_id = format!("player-{}", uuid::Uuid::new_v4());

    let res = create_session(&client, base_url, &player_id, 0).await;
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.expect("json body");
    assert!(body["error"].as_str().expect("error string").contains("duration"));
}

#[tokio::test]
async fn create_session_requires_player_id() {
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();

    let res = create_session(&client, base_url, "   ", 120).await;
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_session_round_trips() {
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();
    let player_id = format!("player-{}", uuid::Uuid::new_v4());

    let created: Value = create_session(&client, base_url, &player_id, 300)
        .await
        .json()
        .await
        .expect("json body");
    let session_id = created["session_id"].as_str().expect("session id");

    let res = client
        .get(format!("{base_url}/sessions/{session_id}"))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let snapshot: Value = res.json().await.expect("json body");
    assert_eq!(snapshot["session_id"], session_id);
    assert_eq!(
        snapshot["players"].as_array().expect("players").len(),
        1
    );
}

#[tokio::test]
async fn get_unknown_session_is_not_found() {
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base_url}/sessions/session-does-not-exist"))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
}
