mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use serde_json::json;
use tower::util::ServiceExt;

use common::{empty_request, json_request, read_json, setup};

#[tokio::test]
async fn status_change_is_logged_chained_and_notified() -> Result<()> {
    let t = setup().await?;
    t.seed_staff("Ada Admin", "admin@agency.test", "admin").await?;
    let designer = t.seed_staff("Dan Designer", "dan@agency.test", "designer").await?;
    let admin_cookie = t.login_staff("admin@agency.test").await?;
    let designer_cookie = t.login_staff("dan@agency.test").await?;

    let resp = t
        .send(json_request(
            "POST",
            "/api/tasks",
            Some(&admin_cookie),
            json!({
                "title": "Spring campaign banner",
                "status": "in-progress",
                "assigned_to": designer.id,
                "design_brief": "Bright, bold, spring"
            }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = read_json(resp).await?;
    assert_eq!(created["task"]["version"], 1);
    assert_eq!(created["notifications"][0]["kind"], "assignment");
    let task_id = created["task"]["id"].as_str().context("task id")?.to_string();

    let resp = t
        .send(json_request(
            "PATCH",
            &format!("/api/tasks/{task_id}"),
            Some(&admin_cookie),
            json!({ "status": "review" }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = read_json(resp).await?;
    assert_eq!(updated["task"]["status"], "review");
    assert_eq!(updated["task"]["version"], 2);
    assert_eq!(updated["failures"], json!([]));

    let changes = updated["changes"].as_array().cloned().unwrap_or_default();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["field_name"], "status");
    assert_eq!(changes[0]["old_value"], "in-progress");
    assert_eq!(changes[0]["new_value"], "review");

    let notifications = updated["notifications"].as_array().cloned().unwrap_or_default();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["kind"], "status-update");
    assert_eq!(notifications[0]["user_id"], designer.id.to_string());

    // Same value again: nothing to log.
    let resp = t
        .send(json_request(
            "PATCH",
            &format!("/api/tasks/{task_id}"),
            Some(&admin_cookie),
            json!({ "status": "review" }),
        )?)
        .await?;
    let unchanged = read_json(resp).await?;
    assert_eq!(unchanged["changes"], json!([]));
    assert_eq!(unchanged["task"]["version"], 2);

    // The designer moves it on; that is logged but nobody else is notified.
    let resp = t
        .send(json_request(
            "PATCH",
            &format!("/api/tasks/{task_id}"),
            Some(&designer_cookie),
            json!({ "status": "completed" }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_json(resp).await?;
    assert_eq!(body["notifications"], json!([]));

    let resp = t
        .send(empty_request("GET", &format!("/api/tasks/{task_id}/changes"), Some(&admin_cookie))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let history = read_json(resp).await?;
    assert_eq!(history["chain_intact"], true);
    let entries = history["entries"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 2);
    assert!(entries[0]["prev_hash"].is_null());
    assert_eq!(entries[1]["prev_hash"], entries[0]["hash"]);

    let resp = t
        .send(empty_request("GET", "/api/notifications?unread=true", Some(&designer_cookie))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let inbox = read_json(resp).await?;
    let items = inbox["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(inbox["unread"], 2);
    assert!(items.iter().any(|n| n["kind"] == "status-update"));
    assert!(items.iter().any(|n| n["kind"] == "assignment"));

    let first = items[0]["id"].as_str().context("notification id")?.to_string();
    let resp = t
        .send(empty_request("POST", &format!("/api/notifications/{first}/read"), Some(&designer_cookie))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await?["is_read"], true);

    let resp = t
        .send(empty_request("POST", &format!("/api/notifications/{first}/read"), Some(&admin_cookie))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn column_and_action_checks_reject_the_write() -> Result<()> {
    let t = setup().await?;
    t.seed_staff("Ada Admin", "admin@agency.test", "admin").await?;
    t.seed_staff("Dan Designer", "dan@agency.test", "designer").await?;
    t.seed_staff("Cleo Writer", "cleo@agency.test", "content-writer").await?;
    let admin = t.login_staff("admin@agency.test").await?;
    let designer = t.login_staff("dan@agency.test").await?;
    let writer = t.login_staff("cleo@agency.test").await?;

    let resp = t
        .send(json_request("POST", "/api/tasks", Some(&admin), json!({ "title": "Newsletter" }))?)
        .await?;
    let task_id = read_json(resp).await?["task"]["id"]
        .as_str()
        .context("task id")?
        .to_string();

    // Designers may not touch the brief.
    let resp = t
        .send(json_request(
            "PATCH",
            &format!("/api/tasks/{task_id}"),
            Some(&designer),
            json!({ "design_brief": "new brief" }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = t
        .send(json_request(
            "PATCH",
            &format!("/api/tasks/{task_id}"),
            Some(&designer),
            json!({ "design": "https://files.test/banner.png" }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // Designers cannot create tasks; writers can but cannot delete them.
    let resp = t
        .send(json_request("POST", "/api/tasks", Some(&designer), json!({ "title": "Nope" }))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = t
        .send(empty_request("DELETE", &format!("/api/tasks/{task_id}"), Some(&writer))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = t
        .send(json_request("PATCH", &format!("/api/tasks/{task_id}"), Some(&admin), json!({}))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = t
        .send(empty_request("DELETE", &format!("/api/tasks/{task_id}"), Some(&admin))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = t
        .send(empty_request("GET", &format!("/api/tasks/{task_id}"), Some(&admin))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn deadline_sweep_creates_one_reminder_per_task() -> Result<()> {
    let t = setup().await?;
    t.seed_staff("Ada Admin", "admin@agency.test", "admin").await?;
    let designer = t.seed_staff("Dan Designer", "dan@agency.test", "designer").await?;
    let admin = t.login_staff("admin@agency.test").await?;
    let designer_cookie = t.login_staff("dan@agency.test").await?;

    let due = chrono::Utc::now() + chrono::Duration::hours(3);
    let resp = t
        .send(json_request(
            "POST",
            "/api/tasks",
            Some(&admin),
            json!({ "title": "Ship the deck", "assigned_to": designer.id, "due_date": due }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = t
        .send(empty_request("POST", "/api/notifications/deadline-reminders", Some(&designer_cookie))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first = read_json(resp).await?;
    assert_eq!(first["created"].as_array().map(Vec::len), Some(1));
    assert_eq!(first["created"][0]["kind"], "deadline");

    let resp = t
        .send(empty_request("POST", "/api/notifications/deadline-reminders", Some(&designer_cookie))?)
        .await?;
    let second = read_json(resp).await?;
    assert_eq!(second["created"], json!([]));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_log_each_applied_write_once() -> Result<()> {
    const WRITERS: usize = 8;

    let t = setup().await?;
    t.seed_staff("Ada Admin", "admin@agency.test", "admin").await?;
    t.seed_staff("Bo Admin", "bo@agency.test", "admin").await?;
    let cookies = [
        t.login_staff("admin@agency.test").await?,
        t.login_staff("bo@agency.test").await?,
    ];
    let mut assignees = Vec::with_capacity(WRITERS);
    for n in 0..WRITERS {
        let user = t
            .seed_staff(&format!("Designer {n}"), &format!("designer{n}@agency.test"), "designer")
            .await?;
        assignees.push(user.id);
    }

    let resp = t
        .send(json_request(
            "POST",
            "/api/tasks",
            Some(&cookies[0]),
            json!({ "title": "Launch video", "status": "todo" }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let task_id = read_json(resp).await?["task"]["id"]
        .as_str()
        .context("task id")?
        .to_string();

    // Every writer assigns someone different, so each applied write moves a tracked field.
    let mut handles = Vec::with_capacity(WRITERS);
    for (n, assignee) in assignees.iter().enumerate() {
        let req = json_request(
            "PATCH",
            &format!("/api/tasks/{task_id}"),
            Some(&cookies[n % 2]),
            json!({ "assigned_to": assignee }),
        )?;
        let app = t.app.clone();
        handles.push(tokio::spawn(async move { app.oneshot(req).await }));
    }

    let mut applied = Vec::new();
    for handle in handles {
        let resp = handle.await??;
        match resp.status() {
            StatusCode::OK => {
                let body = read_json(resp).await?;
                assert_eq!(body["changes"].as_array().map(Vec::len), Some(1));
                applied.push(body["task"]["assigned_to"].as_str().context("assignee")?.to_string());
            }
            StatusCode::CONFLICT => {}
            other => anyhow::bail!("unexpected status {other}"),
        }
    }
    assert!(!applied.is_empty());

    let resp = t
        .send(empty_request("GET", &format!("/api/tasks/{task_id}"), Some(&cookies[0]))?)
        .await?;
    let task = read_json(resp).await?;
    let version = task["version"].as_u64().context("version")? as usize;
    assert_eq!(version, applied.len() + 1);

    let resp = t
        .send(empty_request("GET", &format!("/api/tasks/{task_id}/changes"), Some(&cookies[1]))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let history = read_json(resp).await?;
    assert_eq!(history["chain_intact"], true);
    let entries = history["entries"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), version - 1);
    assert!(entries.iter().all(|entry| entry["field_name"] == "assigned_to"));
    for pair in entries.windows(2) {
        assert_eq!(pair[1]["prev_hash"], pair[0]["hash"]);
    }

    let mut logged: Vec<String> = entries
        .iter()
        .filter_map(|entry| entry["new_value"].as_str().map(str::to_string))
        .collect();
    logged.sort();
    applied.sort();
    assert_eq!(logged, applied);

    Ok(())
}
