use std::sync::LazyLock;

use applaude_core::app_target::DeploymentOption;
use applaude_core::project::{Project, ProjectChange};
use applaude_core::stage::Stage;
use applaude_core::status::ProjectStatus;
use applaude_core::types::ProjectId;
use async_trait::async_trait;
use regex::Regex;

use super::{begin, commit, Begin, StageDeps, StageError, StageHandler, StageOutcome};
use crate::prompts;
use crate::store::LockedUpdate;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s)\]>"'`]+"#).expect("valid regex"));

/// Store-safe identifier derived from the project name.
fn slug(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Link used when the report names none. `BOTH` links the Android build.
pub fn default_deployment_url(project: &Project) -> String {
    let android = project.app_type.includes_android();
    match project.deployment_option {
        DeploymentOption::AppStores if android => format!(
            "https://play.google.com/store/apps/details?id=ai.applaude.{}",
            slug(&project.name)
        ),
        DeploymentOption::AppStores => format!("https://apps.apple.com/app/{}", slug(&project.name)),
        _ if android => format!("https://cdn.applaude.ai/apps/{}/app.apk", project.id),
        _ => format!("https://cdn.applaude.ai/apps/{}/app.ipa", project.id),
    }
}

fn extract_url(report: &str) -> Option<String> {
    URL_RE
        .find_iter(report)
        .last()
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
}

fn simulated_report(project: &Project, url: &str) -> String {
    format!(
        "### Deployment Report for {name}\n\n\
         1. Built the {app_type} release artifact.\n\
         2. Ran the automated test suite against staging. All tests passed.\n\
         3. Promoted the build to production via {option}.\n\n\
         Your application is available at: {url}",
        name = project.name,
        app_type = project.app_type,
        option = project.deployment_option,
    )
}

/// Publishes the app, or finishes without a deploy when no target was chosen.
pub struct DeploymentStage {
    deps: StageDeps,
}

impl DeploymentStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }

    /// Finish a project whose owner picked no target. `None` when the
    /// project does not qualify.
    async fn finish_without_target(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<StageOutcome>, StageError> {
        let change = ProjectChange::status(
            ProjectStatus::Completed,
            Some("App is ready. No deployment target was chosen."),
        );
        let update = self
            .deps
            .store
            .update_locked(
                project_id,
                &|p: &Project| {
                    p.status == ProjectStatus::QaComplete && !p.deployment_option.is_chosen()
                },
                &change,
            )
            .await?;

        match update {
            LockedUpdate::Applied { project, .. } => {
                tracing::info!(project_id = %project_id, "Completed without deployment");
                self.deps.notify(&project).await;
                Ok(Some(StageOutcome::Advanced {
                    status: project.status,
                }))
            }
            LockedUpdate::Rejected(_) => Ok(None),
        }
    }
}

#[async_trait]
impl StageHandler for DeploymentStage {
    fn stage(&self) -> Stage {
        Stage::Deployment
    }

    async fn execute(&self, project_id: ProjectId) -> Result<StageOutcome, StageError> {
        if let Some(outcome) = self.finish_without_target(project_id).await? {
            return Ok(outcome);
        }

        let stage = self.stage();
        let project = match begin(
            &self.deps,
            stage,
            project_id,
            "Preparing for deployment to production environment...",
        )
        .await?
        {
            Begin::Run(project) => project,
            Begin::Skip(status) => return Ok(StageOutcome::Skipped { status }),
        };

        let (report, url) = if self.deps.gateway.is_configured() {
            let report = self.deps.generate(&prompts::deployment(&project)).await?;
            let url = extract_url(&report).unwrap_or_else(|| default_deployment_url(&project));
            (report, url)
        } else {
            let url = default_deployment_url(&project);
            (simulated_report(&project, &url), url)
        };

        let change = ProjectChange {
            deployment_report: Some(report.trim().to_string()),
            deployment_url: Some(url),
            ..ProjectChange::status(
                stage.completion(),
                Some("Deployment successful. Your app is live!"),
            )
        };
        commit(&self.deps, stage, project_id, &change).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use applaude_core::app_target::AppType;

    fn project(app_type: AppType, option: DeploymentOption) -> Project {
        let mut p = Project::new_pending(1, "My Shop 2", "https://example.com", app_type);
        p.deployment_option = option;
        p
    }

    #[test]
    fn default_urls_follow_platform_and_target() {
        let p = project(AppType::Android, DeploymentOption::Applaude);
        assert_eq!(
            default_deployment_url(&p),
            format!("https://cdn.applaude.ai/apps/{}/app.apk", p.id)
        );

        let p = project(AppType::Ios, DeploymentOption::Applaude);
        assert!(default_deployment_url(&p).ends_with("/app.ipa"));

        let p = project(AppType::Ios, DeploymentOption::AppStores);
        assert_eq!(default_deployment_url(&p), "https://apps.apple.com/app/myshop2");

        let p = project(AppType::Both, DeploymentOption::AppStores);
        assert_eq!(
            default_deployment_url(&p),
            "https://play.google.com/store/apps/details?id=ai.applaude.myshop2"
        );
    }

    #[test]
    fn extracts_last_url_from_markdown() {
        let report = "See https://docs.example.com first.\n\
                      Live at [link](https://cdn.applaude.ai/apps/1/app.apk).";
        assert_eq!(
            extract_url(report).as_deref(),
            Some("https://cdn.applaude.ai/apps/1/app.apk")
        );
        assert_eq!(extract_url("no links here"), None);
    }
}
