//! HTTP API tests: the router is served in-process on an ephemeral port and
//! exercised with a real client.

use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use meeting_actions::config;
use meeting_actions::llm::ScriptedChatClient;
use meeting_actions::{migrate, server, AppContext};

struct TestServer {
    _tmp: TempDir,
    base: String,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn start(llm: ScriptedChatClient) -> TestServer {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let config_path = root.join("mact.toml");
    fs::write(
        &config_path,
        format!(
            "[db]\npath = \"{0}/mact.sqlite\"\n\n[storage]\nroot = \"{0}/documents\"\n",
            root.display()
        ),
    )
    .unwrap();

    let cfg = config::load_config(&config_path).unwrap();
    migrate::run_migrations(&cfg).await.unwrap();
    let ctx = AppContext::from_config(&cfg)
        .await
        .unwrap()
        .with_llm(Arc::new(llm));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(ctx)).await.unwrap();
    });

    TestServer {
        _tmp: tmp,
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
    }
}

async fn create_meeting(srv: &TestServer, title: &str) -> String {
    let resp = srv
        .client
        .post(srv.url("/meetings"))
        .json(&json!({ "title": title, "meetingDate": "2024-05-02" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_ok() {
    let srv = start(ScriptedChatClient::new()).await;
    let body: Value = srv
        .client
        .get(srv.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_meeting_uses_error_contract() {
    let srv = start(ScriptedChatClient::new()).await;

    let resp = srv.client.get(srv.url("/meetings/nope")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "not_found");
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let srv = start(ScriptedChatClient::new()).await;

    let resp = srv
        .client
        .post(srv.url("/functions/process-document"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn process_document_then_edit_item() {
    let srv = start(ScriptedChatClient::new().reply(
        "```json\n[{\"actionItem\":\"Draft the rollout plan\",\"priority\":\"High\"}]\n```",
    ))
    .await;
    let meeting_id = create_meeting(&srv, "Rollout sync").await;

    let resp = srv
        .client
        .post(srv.url("/functions/process-document"))
        .json(&json!({
            "meetingId": meeting_id,
            "userId": "dana",
            "chunks": [{ "text": "Dana drafts the rollout plan.", "sourceDocument": "sync.docx", "chunkIndex": 0 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["chunksProcessed"], 1);
    assert_eq!(body["actionItemsGenerated"], 1);
    let item_id = body["actionItems"][0]["id"].as_str().unwrap().to_string();

    let resp = srv
        .client
        .patch(srv.url(&format!("/action-items/{}", item_id)))
        .json(&json!({ "status": "In Progress", "assignedTo": "Dana", "dueDate": "2024-06-10" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["status"], "In Progress");
    assert_eq!(updated["assignedTo"], "Dana");
    assert_eq!(updated["priority"], "High");

    let listed: Value = srv
        .client
        .get(srv.url(&format!("/meetings/{}/action-items?sort=priority&direction=desc", meeting_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["dueDate"], "2024-06-10");
}

#[tokio::test]
async fn unknown_sort_column_is_rejected() {
    let srv = start(ScriptedChatClient::new()).await;
    let meeting_id = create_meeting(&srv, "Standup").await;

    let resp = srv
        .client
        .get(srv.url(&format!(
            "/meetings/{}/action-items?sort=id;DROP%20TABLE%20tasks",
            meeting_id
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn requirements_fall_back_to_template_then_version() {
    let srv = start(ScriptedChatClient::new()).await;
    let meeting_id = create_meeting(&srv, "Discovery").await;

    let current: Value = srv
        .client
        .get(srv.url(&format!("/meetings/{}/requirements", meeting_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["isTemplate"], true);
    assert_eq!(current["version"], 0);

    let resp = srv
        .client
        .post(srv.url("/functions/update-business-requirements"))
        .json(&json!({ "meetingId": meeting_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    let resp = srv
        .client
        .post(srv.url(&format!("/meetings/{}/requirements", meeting_id)))
        .json(&json!({ "content": "# Requirements\n\nv1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let saved: Value = resp.json().await.unwrap();
    assert_eq!(saved["version"], 1);

    let versions: Value = srv
        .client
        .get(srv.url(&format!("/meetings/{}/requirements/versions", meeting_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(versions.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_rejects_unsupported_type() {
    let srv = start(ScriptedChatClient::new()).await;
    let meeting_id = create_meeting(&srv, "Retro").await;

    let resp = srv
        .client
        .post(srv.url(&format!("/meetings/{}/documents?filename=notes.txt", meeting_id)))
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unsupported_format");
}
