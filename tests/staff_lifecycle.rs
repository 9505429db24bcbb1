mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use serde_json::json;

use common::{clears_cookie, empty_request, json_request, read_json, session_cookie, setup, PASSWORD};

#[tokio::test]
async fn registration_approval_and_suspension() -> Result<()> {
    let t = setup().await?;
    let admin = t.seed_staff("Ada Admin", "admin@agency.test", "admin").await?;
    let admin_cookie = t.login_staff(&admin.email).await?;

    // Register: the account starts pending but gets a session right away.
    let resp = t
        .send(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "name": "Dan Designer", "email": "dan@agency.test", "password": PASSWORD }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let cookie = session_cookie(&resp, "crm_staff_session").context("register sets staff cookie")?;
    let body = read_json(resp).await?;
    assert_eq!(body["user"]["status"], "pending");
    let user_id = body["user"]["id"].as_str().context("user id")?.to_string();

    let resp = t.send(empty_request("GET", "/api/auth/me", Some(&cookie))?).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = read_json(resp).await?;
    assert_eq!(body["redirect"], "/pending-approval");

    let resp = t
        .send(json_request("POST", "/api/session/resolve", Some(&cookie), json!({ "path": "/dashboard" }))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_json(resp).await?;
    assert_eq!(body["state"], "awaiting-approval");
    assert_eq!(body["redirect"], "/pending-approval");

    // A pending account cannot approve anyone, admins can.
    let resp = t
        .send(empty_request("POST", &format!("/api/users/{user_id}/approve"), Some(&cookie))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = t
        .send(empty_request("POST", &format!("/api/users/{user_id}/approve"), Some(&admin_cookie))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_json(resp).await?;
    assert_eq!(body["status"], "active");
    assert_eq!(body["approved_by"], admin.id.to_string());

    let resp = t.send(empty_request("GET", "/api/auth/me", Some(&cookie))?).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_json(resp).await?;
    assert_eq!(body["email"], "dan@agency.test");

    // Suspension clears the live session on its next use.
    let resp = t
        .send(empty_request("POST", &format!("/api/users/{user_id}/suspend"), Some(&admin_cookie))?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = t
        .send(json_request("POST", "/api/session/resolve", Some(&cookie), json!({ "path": "/dashboard" }))?)
        .await?;
    assert!(clears_cookie(&resp, "crm_staff_session"));
    let body = read_json(resp).await?;
    assert_eq!(body["state"], "unauthenticated");
    assert_eq!(body["cleared"], json!(["staff"]));

    let resp = t.send(empty_request("GET", "/api/auth/me", Some(&cookie))?).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(clears_cookie(&resp, "crm_staff_session"));

    let resp = t
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "dan@agency.test", "password": PASSWORD }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() -> Result<()> {
    let t = setup().await?;
    t.seed_staff("Mia Manager", "mia@agency.test", "manager").await?;

    let resp = t
        .send(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "name": "Someone Else", "email": "mia@agency.test", "password": PASSWORD }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_rejected() -> Result<()> {
    let t = setup().await?;
    t.seed_staff("Mia Manager", "mia@agency.test", "manager").await?;

    let resp = t
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "mia@agency.test", "password": "not-the-password" }),
        )?)
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(resp).await?;
    assert_eq!(body["redirect"], "/auth");
    Ok(())
}

#[tokio::test]
async fn role_gated_pages_resolve_forbidden_for_other_roles() -> Result<()> {
    let t = setup().await?;
    t.seed_staff("Dan Designer", "dan@agency.test", "designer").await?;
    t.seed_staff("Mia Manager", "mia@agency.test", "manager").await?;
    let designer = t.login_staff("dan@agency.test").await?;
    let manager = t.login_staff("mia@agency.test").await?;

    let resp = t
        .send(json_request("POST", "/api/session/resolve", Some(&designer), json!({ "path": "/reports" }))?)
        .await?;
    let body = read_json(resp).await?;
    assert_eq!(body["state"], "forbidden");
    assert_eq!(body["forbidden_reason"], "role");

    let resp = t
        .send(json_request("POST", "/api/session/resolve", Some(&manager), json!({ "path": "/reports" }))?)
        .await?;
    let body = read_json(resp).await?;
    assert_eq!(body["state"], "authorized");

    let resp = t
        .send(json_request("POST", "/api/session/resolve", Some(&manager), json!({ "path": "/settings" }))?)
        .await?;
    let body = read_json(resp).await?;
    assert_eq!(body["state"], "forbidden");
    assert_eq!(body["forbidden_reason"], "admin-required");

    let resp = t
        .send(json_request("POST", "/api/session/resolve", None, json!({ "path": "/pricing" }))?)
        .await?;
    let body = read_json(resp).await?;
    assert_eq!(body["state"], "unguarded");
    Ok(())
}
