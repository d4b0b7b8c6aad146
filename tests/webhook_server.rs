use std::sync::Arc;

use hookboard::{EventStore, SqliteEventStore, webhook};
use serde_json::{Value, json};

async fn spawn_server(store: Arc<dyn EventStore>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, webhook::router(store)).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn deliveries_flow_through_to_api() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteEventStore::open(dir.path().join("events.db")).unwrap());
    let base = spawn_server(store).await;
    let client = reqwest::Client::new();

    let pong: Value = client
        .post(format!("{base}/webhook"))
        .header("X-GitHub-Event", "ping")
        .json(&json!({ "zen": "Design for failure." }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pong["status"], "pong");

    let resp = client
        .post(format!("{base}/webhook"))
        .header("X-GitHub-Event", "pull_request")
        .json(&json!({
            "action": "opened",
            "pull_request": {
                "number": 9,
                "merged": false,
                "user": { "login": "carol" },
                "head": { "ref": "topic" },
                "base": { "ref": "main" }
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let resp = client
        .post(format!("{base}/webhook"))
        .header("X-GitHub-Event", "issues")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let events: Vec<Value> = client
        .get(format!("{base}/api/events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["action"], "PULL_REQUEST");
    assert_eq!(events[0]["author"], "carol");
    assert_eq!(events[0]["request_id"], "9");
    assert_eq!(events[0]["from_branch"], "topic");
    assert_eq!(events[0]["to_branch"], "main");
}
