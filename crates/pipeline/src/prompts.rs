//! Prompt builders, one per stage.
//!
//! Every prompt is a persona, a goal and a task section. Nothing but the
//! instructions themselves is sent to the model.

use applaude_core::project::Project;
use applaude_core::survey::SurveyQuestion;

fn frame(persona: &str, goal: &str, task: &str) -> String {
    format!("**Persona:** {persona}\n\n**Goal:** {goal}\n\n**Task:**\n{task}\n")
}

pub fn market_analysis(project: &Project) -> String {
    frame(
        "You are a senior market research analyst specialising in mobile products.",
        "Produce a user persona document that guides the design and build of a mobile app.",
        &format!(
            "1. Study the business at {url} (project \"{name}\").\n\
             2. Describe the target market, main competitors and differentiators.\n\
             3. Write one detailed primary user persona: demographics, goals, pain points, \
             and the features that persona expects.\n\
             Respond with the persona document in Markdown.",
            url = project.source_url,
            name = project.name,
        ),
    )
}

pub fn design(project: &Project) -> String {
    let persona = project.user_persona_document.as_deref().unwrap_or("(none)");
    frame(
        "You are a brand designer who extracts visual identity from existing websites.",
        "Derive a five-colour brand palette for the mobile app.",
        &format!(
            "Analyze the website at {url} and the persona below.\n\n{persona}\n\n\
             Respond with a single JSON object with exactly these keys, each a \
             `#RRGGBB` hex colour: \"primary\", \"secondary\", \"text_light\", \
             \"text_dark\", \"background\".",
            url = project.source_url,
        ),
    )
}

fn survey_section(title: &str, questions: Option<&[SurveyQuestion]>) -> String {
    match questions.map(serde_json::to_string_pretty) {
        Some(Ok(json)) => format!("\n{title} survey questions (JSON):\n{json}\n"),
        _ => String::new(),
    }
}

/// `ux` and `pmf` are the question sets of the enabled surveys.
pub fn code_generation(
    project: &Project,
    ux: Option<&[SurveyQuestion]>,
    pmf: Option<&[SurveyQuestion]>,
) -> String {
    let palette = project
        .brand_palette
        .as_ref()
        .and_then(|p| serde_json::to_string(p).ok())
        .unwrap_or_else(|| "{}".to_string());
    let persona = project.user_persona_document.as_deref().unwrap_or("(none)");

    let mut task = format!(
        "Generate the complete, production-ready source code for a {app_type} app \
         named \"{name}\".\n\
         Brand palette: {palette}\n\
         User persona:\n{persona}\n",
        app_type = project.app_type,
        name = project.name,
    );
    if ux.is_some() || pmf.is_some() {
        task.push_str(
            "\nThe app must include in-app survey logic that presents the following \
             survey questions to users and submits their answers.\n",
        );
        task.push_str(&survey_section("UX", ux));
        task.push_str(&survey_section("PMF", pmf));
    }
    task.push_str("\nRespond with every source file in fenced code blocks, each preceded by its path.");

    frame(
        "You are a principal mobile engineer.",
        "Ship a complete app that matches the brand and serves the persona.",
        &task,
    )
}

pub fn qa(project: &Project, source: &str) -> String {
    frame(
        "You are a meticulous QA and security engineer.",
        "Decide whether the generated code is ready for release.",
        &format!(
            "Review the source code of \"{name}\" below for functional defects, \
             security issues and crashes. Write a report grouped by severity \
             (critical, high, medium, low). End the report with a final line that is \
             exactly `VERDICT: PASS` or `VERDICT: FAIL`. Fail only for critical or \
             high severity issues.\n\n{source}",
            name = project.name,
        ),
    )
}

pub fn deployment(project: &Project) -> String {
    frame(
        "You are a release engineer for mobile apps.",
        "Publish the app and report where users can get it.",
        &format!(
            "Prepare the {app_type} build of \"{name}\" for release via {option}. \
             Write a short deployment report and include the public download or store \
             URL on its own line.",
            app_type = project.app_type,
            name = project.name,
            option = project.deployment_option,
        ),
    )
}
