mod common;

use axum::http::StatusCode;
use serde_json::Value;

use common::{empty_request, read_json, setup};

#[test]
fn openapi_task_schema_has_guarded_columns() -> anyhow::Result<()> {
    // Build the OpenAPI document the same way the server does
    let doc = agency_crm::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let props = v
        .get("components")
        .and_then(Value::as_object)
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
        .and_then(|s| s.get("Task"))
        .and_then(Value::as_object)
        .and_then(|t| t.get("properties"))
        .and_then(Value::as_object)
        .expect("components.schemas.Task.properties must exist");

    let keys = [
        "design_brief",
        "inspiration",
        "design",
        "text_content",
        "drive_link",
        "notes",
        "status",
        "version",
    ];
    for k in &keys {
        assert!(props.contains_key(*k), "OpenAPI Task schema missing '{}'", k);
    }

    Ok(())
}

#[tokio::test]
async fn openapi_json_is_served_past_the_edge_gate() -> anyhow::Result<()> {
    let t = setup().await?;

    let resp = t.send(empty_request("GET", "/api-docs/openapi.json", None)?).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await?;
    assert!(v["paths"].get("/api/tasks/{id}").is_some());
    assert!(v["paths"].get("/api/rbac/me").is_some());
    Ok(())
}
