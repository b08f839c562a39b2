//! Integration tests for the durable stage task queue.

use applaude_core::app_target::{AppType, DeploymentOption};
use applaude_core::stage::Stage;
use applaude_db::models::project::CreateProject;
use applaude_db::models::status::StageTaskStatus;
use applaude_db::repositories::{ProjectRepo, StageTaskRepo};
use sqlx::PgPool;

async fn seed_project(pool: &PgPool, name: &str) -> uuid::Uuid {
    let input = CreateProject {
        owner_id: 1,
        name: name.to_string(),
        source_url: "https://example.com".to_string(),
        app_type: AppType::Android,
        deployment_option: DeploymentOption::NotChosen,
        enable_ux_survey: false,
        enable_pmf_survey: false,
        ux_survey_questions: None,
        pmf_survey_questions: None,
    };
    ProjectRepo::create(pool, &input).await.unwrap().id
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_enqueue_is_idempotent_while_live(pool: PgPool) {
    let project_id = seed_project(&pool, "Queue").await;

    assert!(StageTaskRepo::enqueue(&pool, project_id, Stage::MarketAnalysis).await.unwrap());
    assert!(!StageTaskRepo::enqueue(&pool, project_id, Stage::MarketAnalysis).await.unwrap());
    assert!(StageTaskRepo::enqueue(&pool, project_id, Stage::Design).await.unwrap());

    // Once the live task completes, the pair can be queued again.
    let task = StageTaskRepo::claim_next(&pool, 60.0).await.unwrap().unwrap();
    StageTaskRepo::complete(&pool, task.id).await.unwrap();
    assert!(StageTaskRepo::enqueue(&pool, project_id, Stage::MarketAnalysis).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_claim_leases_and_counts_attempts(pool: PgPool) {
    let project_id = seed_project(&pool, "Claim").await;
    StageTaskRepo::enqueue(&pool, project_id, Stage::MarketAnalysis).await.unwrap();

    let task = StageTaskRepo::claim_next(&pool, 60.0).await.unwrap().unwrap();
    assert_eq!(task.project_id, project_id);
    assert_eq!(task.parsed_stage().unwrap(), Stage::MarketAnalysis);
    assert_eq!(task.status_id, StageTaskStatus::Running.id());
    assert_eq!(task.attempts, 1);
    assert!(task.lease_expires_at.is_some());

    // Leased: nobody else gets it.
    assert!(StageTaskRepo::claim_next(&pool, 60.0).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_expired_lease_is_redelivered(pool: PgPool) {
    let project_id = seed_project(&pool, "Lease").await;
    StageTaskRepo::enqueue(&pool, project_id, Stage::Design).await.unwrap();

    let first = StageTaskRepo::claim_next(&pool, 0.0).await.unwrap().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let again = StageTaskRepo::claim_next(&pool, 60.0).await.unwrap().unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.attempts, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_retry_later_delays_and_records_error(pool: PgPool) {
    let project_id = seed_project(&pool, "Retry").await;
    StageTaskRepo::enqueue(&pool, project_id, Stage::Qa).await.unwrap();
    let task = StageTaskRepo::claim_next(&pool, 60.0).await.unwrap().unwrap();

    StageTaskRepo::retry_later(&pool, task.id, 3600.0, "gateway timed out")
        .await
        .unwrap();

    let stored = StageTaskRepo::find_by_id(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(stored.status_id, StageTaskStatus::Queued.id());
    assert_eq!(stored.last_error.as_deref(), Some("gateway timed out"));
    assert!(stored.lease_expires_at.is_none());

    // Not due for an hour.
    assert!(StageTaskRepo::claim_next(&pool, 60.0).await.unwrap().is_none());

    // Still live, so enqueue does not duplicate it.
    assert!(!StageTaskRepo::enqueue(&pool, project_id, Stage::Qa).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bury_marks_failed(pool: PgPool) {
    let project_id = seed_project(&pool, "Bury").await;
    StageTaskRepo::enqueue(&pool, project_id, Stage::Deployment).await.unwrap();
    let task = StageTaskRepo::claim_next(&pool, 60.0).await.unwrap().unwrap();

    StageTaskRepo::bury(&pool, task.id, "boom").await.unwrap();

    let tasks = StageTaskRepo::list_for_project(&pool, project_id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status_id, StageTaskStatus::Failed.id());
    assert!(StageTaskRepo::claim_next(&pool, 60.0).await.unwrap().is_none());
}
