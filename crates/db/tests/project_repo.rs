//! Integration tests for `ProjectRepo` against a real database.

use applaude_core::app_target::{AppType, DeploymentOption};
use applaude_core::palette::BrandPalette;
use applaude_core::project::ProjectChange;
use applaude_core::status::ProjectStatus;
use applaude_core::survey::default_ux_questions;
use applaude_db::models::project::{CreateProject, ProjectListQuery};
use applaude_db::repositories::ProjectRepo;
use assert_matches::assert_matches;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_project(owner_id: i64, name: &str) -> CreateProject {
    CreateProject {
        owner_id,
        name: name.to_string(),
        source_url: "https://example.com/product".to_string(),
        app_type: AppType::Both,
        deployment_option: DeploymentOption::NotChosen,
        enable_ux_survey: true,
        enable_pmf_survey: false,
        ux_survey_questions: None,
        pmf_survey_questions: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_and_find(pool: PgPool) {
    let created = ProjectRepo::create(&pool, &new_project(1, "  Habit Tracker "))
        .await
        .unwrap();
    assert_eq!(created.name, "Habit Tracker");
    assert_eq!(created.status, ProjectStatus::Pending);
    assert_eq!(created.app_type, AppType::Both);
    assert!(created.enable_ux_survey);
    assert!(created.ux_survey_questions.is_none());

    let found = ProjectRepo::find_by_id(&pool, created.id).await.unwrap();
    assert_eq!(found.map(|p| p.id), Some(created.id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_name_per_owner_rejected(pool: PgPool) {
    ProjectRepo::create(&pool, &new_project(1, "Dup")).await.unwrap();
    let err = ProjectRepo::create(&pool, &new_project(1, "Dup"))
        .await
        .unwrap_err();
    assert_matches!(err, sqlx::Error::Database(ref db) if db.constraint() == Some("uq_projects_owner_name"));

    // Another owner may reuse the name.
    ProjectRepo::create(&pool, &new_project(2, "Dup")).await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_filters_by_owner(pool: PgPool) {
    ProjectRepo::create(&pool, &new_project(1, "A")).await.unwrap();
    ProjectRepo::create(&pool, &new_project(1, "B")).await.unwrap();
    ProjectRepo::create(&pool, &new_project(2, "C")).await.unwrap();

    let query = ProjectListQuery {
        owner_id: Some(1),
        ..Default::default()
    };
    let listed = ProjectRepo::list(&pool, &query).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|p| p.owner_id == 1));

    let all = ProjectRepo::list(&pool, &ProjectListQuery::default()).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_apply_change_under_lock(pool: PgPool) {
    let project = ProjectRepo::create(&pool, &new_project(1, "Locked")).await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let locked = ProjectRepo::lock_for_update(&mut tx, project.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(locked.status, ProjectStatus::Pending);

    let change = ProjectChange {
        brand_palette: Some(BrandPalette::default()),
        ux_survey_questions: Some(default_ux_questions()),
        ..ProjectChange::status(ProjectStatus::AnalysisPending, Some("Analyzing"))
    };
    let updated = ProjectRepo::apply_change(&mut tx, project.id, &change)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(updated.status, ProjectStatus::AnalysisPending);
    assert_eq!(updated.status_message.as_deref(), Some("Analyzing"));
    assert_eq!(updated.brand_palette, Some(BrandPalette::default()));
    assert_eq!(updated.ux_survey_questions, Some(default_ux_questions()));
    assert_eq!(updated.source_url, project.source_url);
    assert!(updated.updated_at >= project.updated_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lock_missing_project_returns_none(pool: PgPool) {
    let mut tx = pool.begin().await.unwrap();
    let missing = ProjectRepo::lock_for_update(&mut tx, uuid::Uuid::now_v7())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_idle_respects_status_and_age(pool: PgPool) {
    let project = ProjectRepo::create(&pool, &new_project(1, "Idle")).await.unwrap();
    ProjectRepo::create(&pool, &new_project(1, "Fresh")).await.unwrap();

    sqlx::query("UPDATE projects SET updated_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(project.id)
        .execute(&pool)
        .await
        .unwrap();

    let cutoff = chrono::Utc::now() - chrono::Duration::minutes(10);
    let idle = ProjectRepo::list_idle(&pool, &[ProjectStatus::Pending], cutoff, 10)
        .await
        .unwrap();
    assert_eq!(idle.len(), 1);
    assert_eq!(idle[0].id, project.id);

    let none = ProjectRepo::list_idle(&pool, &[ProjectStatus::QaComplete], cutoff, 10)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete(pool: PgPool) {
    let project = ProjectRepo::create(&pool, &new_project(1, "Gone")).await.unwrap();
    assert!(ProjectRepo::delete(&pool, project.id).await.unwrap());
    assert!(!ProjectRepo::delete(&pool, project.id).await.unwrap());
    assert!(ProjectRepo::find_by_id(&pool, project.id).await.unwrap().is_none());
}
