mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::{empty_request, read_json, setup};

#[tokio::test]
async fn health_endpoint_reports_db_ok() -> Result<()> {
    let t = setup().await?;

    let resp = t.send(empty_request("GET", "/api/health", None)?).await?;
    assert_eq!(resp.status(), StatusCode::OK, "health endpoint did not return 200");

    let v = read_json(resp).await?;
    let db_ok = v.get("db_ok").and_then(|b| b.as_bool()).unwrap_or(false);
    assert!(db_ok, "expected db_ok: true, got: {}", v);
    assert_eq!(v["active_config"], "default");

    Ok(())
}
