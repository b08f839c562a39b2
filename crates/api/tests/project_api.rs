//! HTTP-level integration tests for the `/projects` resource.
//!
//! Requests go straight to the router through `tower::ServiceExt`.

mod common;

use applaude_core::stage::Stage;
use applaude_db::repositories::StageTaskRepo;
use axum::http::StatusCode;
use common::{body_json, create_project, delete, get, post_json, project_body, put_json};
use sqlx::PgPool;

fn project_id(data: &serde_json::Value) -> uuid::Uuid {
    data["id"].as_str().expect("id string").parse().expect("uuid")
}

async fn force_status(pool: &PgPool, id: uuid::Uuid, status: &str) {
    sqlx::query("UPDATE projects SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_returns_201_and_queues_market_analysis(pool: PgPool) {
    let data = create_project(&pool, project_body("Shop App")).await;

    assert_eq!(data["name"], "Shop App");
    assert_eq!(data["status"], "PENDING");
    assert_eq!(data["app_type"], "IOS");
    assert_eq!(data["deployment_option"], "NOT_CHOSEN");

    let tasks = StageTaskRepo::list_for_project(&pool, project_id(&data))
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].parsed_stage().unwrap(), Stage::MarketAnalysis);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_rejects_invalid_url(pool: PgPool) {
    let mut body = project_body("Bad Url");
    body["source_url"] = "not a url".into();

    let response = post_json(common::build_test_app(pool), "/api/v1/projects", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_rejects_malformed_survey_questions(pool: PgPool) {
    let mut body = project_body("Bad Survey");
    body["enable_ux_survey"] = true.into();
    body["ux_survey_questions"] = serde_json::json!([
        {"id": 1, "question": "Pick one", "type": "radio", "options": ["only"]}
    ]);

    let response = post_json(common::build_test_app(pool), "/api/v1/projects", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_name_for_same_owner_returns_409(pool: PgPool) {
    create_project(&pool, project_body("Twin")).await;

    let response = post_json(
        common::build_test_app(pool),
        "/api/v1/projects",
        project_body("Twin"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn get_and_status_return_the_project(pool: PgPool) {
    let data = create_project(&pool, project_body("Readable")).await;
    let id = project_id(&data);

    let response = get(common::build_test_app(pool.clone()), &format!("/api/v1/projects/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["name"], "Readable");

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{id}/status"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "PENDING");
    assert_eq!(json["data"]["project_id"], id.to_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn get_missing_project_returns_404(pool: PgPool) {
    let id = uuid::Uuid::now_v7();
    let response = get(common::build_test_app(pool), &format!("/api/v1/projects/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_filters_by_owner(pool: PgPool) {
    create_project(&pool, project_body("Mine")).await;
    let mut other = project_body("Theirs");
    other["owner_id"] = 8.into();
    create_project(&pool, other).await;

    let response = get(common::build_test_app(pool), "/api/v1/projects?owner_id=7").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let items = json["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Mine");
}

// ---------------------------------------------------------------------------
// Deployment choice
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn deployment_target_can_be_chosen_before_deployment(pool: PgPool) {
    let data = create_project(&pool, project_body("Deployable")).await;
    let id = project_id(&data);
    force_status(&pool, id, "QA_COMPLETE").await;

    let response = put_json(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{id}/deployment"),
        serde_json::json!({"deployment_option": "APP_STORES"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["deployment_option"], "APP_STORES");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deployment_target_is_frozen_once_terminal(pool: PgPool) {
    let data = create_project(&pool, project_body("Finished")).await;
    let id = project_id(&data);
    force_status(&pool, id, "COMPLETED").await;

    let response = put_json(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{id}/deployment"),
        serde_json::json!({"deployment_option": "APPLAUDE"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deployment_target_is_frozen_while_deploying(pool: PgPool) {
    let data = create_project(&pool, project_body("Deploying")).await;
    let id = project_id(&data);
    force_status(&pool, id, "DEPLOYMENT_PENDING").await;

    let response = put_json(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{id}/deployment"),
        serde_json::json!({"deployment_option": "APPLAUDE"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_deployment_option_is_rejected(pool: PgPool) {
    let data = create_project(&pool, project_body("Odd Target")).await;
    let id = project_id(&data);

    let response = put_json(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{id}/deployment"),
        serde_json::json!({"deployment_option": "SIDELOAD"}),
    )
    .await;
    assert!(response.status().is_client_error());
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_removes_project(pool: PgPool) {
    let data = create_project(&pool, project_body("Doomed")).await;
    let id = project_id(&data);
    let uri = format!("/api/v1/projects/{id}");

    let response = delete(common::build_test_app(pool.clone()), &uri).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(common::build_test_app(pool.clone()), &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete(common::build_test_app(pool), &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
