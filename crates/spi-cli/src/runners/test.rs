//! `spi-agent test`: Maven builds, tests and coverage grading per service.

use super::{RunContext, conclude, save_log, stream};
use crate::display::{print_note, print_panel};
use crate::session::Titles;
use anyhow::Result;
use spi_adapters::maven::{self, MavenError, REPORT_TIMEOUT};
use spi_core::coverage;
use spi_core::workflows::test_run::{self, TestParser, TestRun, TestStatus};
use spi_core::{PromptBuilder, RunLog, Tracker, WorkflowResult};
use std::path::Path;
use tracing::{info, warn};

const TITLES: Titles = Titles {
    status: "Test Execution Status",
    output: "Maven Output",
};

const MAVEN: &str = "mvn";

pub async fn run(ctx: &RunContext, services: &[String], provider: &str) -> Result<i32> {
    let profiles = coverage::parse_profiles(provider);
    let prompt = PromptBuilder::new("test", ctx.config.organization.as_str())?
        .services(services)
        .arg("PROVIDER", profiles.join(","))
        .build();
    info!(services = ?services, profiles = ?profiles, "Starting test workflow");

    let parser = TestParser::new(profiles.clone());
    let Some(mut run) = stream::<TestRun, _>(ctx, services, parser, TITLES, &prompt).await? else {
        return Ok(1);
    };

    if !run.interrupted {
        let repos = ctx.config.repos_root.as_str();
        test_run::validate_with_surefire(&mut run.tracker, &ctx.root, repos, &profiles);
        regenerate_missing_reports(ctx, &run.tracker, &profiles).await;
        test_run::apply_coverage(&mut run.tracker, &ctx.root, repos, &profiles);
    }

    print_panel(&test_run::report(&run.tracker, provider, run.exit_code), ctx.use_colors);
    ctx.store
        .store(WorkflowResult::test(&run.tracker, provider, run.exit_code));

    let log = RunLog::new("test", "Maven Test Execution Log", services).param("Provider", provider);
    let body = format!("{}\n=== FULL OUTPUT ===\n\n{}", test_run::results_text(&run.tracker), run.output.full());
    save_log(ctx, &log, run.exit_code, &body);

    Ok(conclude(ctx, run.exit_code, run.interrupted))
}

/// Runs `jacoco:report` for built services that left no coverage data.
///
/// Best-effort: failures are logged and the run continues with whatever
/// reports exist.
async fn regenerate_missing_reports(ctx: &RunContext, tracker: &Tracker<TestRun>, profiles: &[String]) {
    for service in built_without_coverage(tracker, &ctx.root, &ctx.config.repos_root) {
        let base = coverage::service_workspace(&ctx.root, &ctx.config.repos_root, &service);
        let modules = maven::report_modules(&base, &service, profiles);
        print_note(&format!("Generating coverage report for {service}..."), ctx.use_colors);
        match maven::regenerate_reports(MAVEN, &modules, REPORT_TIMEOUT).await {
            Ok(done) => info!(service = %service, modules = done.len(), "Coverage reports regenerated"),
            Err(MavenError::NotFound) => {
                warn!("Maven not found, skipping coverage report generation");
                return;
            }
            Err(e) => warn!(service = %service, error = %e, "Coverage report generation failed"),
        }
    }
}

fn built_without_coverage(tracker: &Tracker<TestRun>, root: &Path, repos_dir: &str) -> Vec<String> {
    tracker
        .iter()
        .filter(|r| matches!(r.status, TestStatus::TestSuccess | TestStatus::CompileSuccess))
        .filter(|r| coverage::collect(&coverage::service_workspace(root, repos_dir, &r.service)).is_none())
        .map(|r| r.service.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn only_built_services_without_reports_need_regeneration() {
        let temp = TempDir::new().unwrap();
        let report = temp.path().join("repos/partition/target/site/jacoco");
        fs::create_dir_all(&report).unwrap();
        fs::write(
            report.join("jacoco.csv"),
            "GROUP,PACKAGE,CLASS,INSTRUCTION_MISSED,INSTRUCTION_COVERED,BRANCH_MISSED,BRANCH_COVERED,LINE_MISSED,LINE_COVERED\n\
             g,p,C,0,10,1,9,2,18\n",
        )
        .unwrap();
        fs::create_dir_all(temp.path().join("repos/legal")).unwrap();

        let mut tracker = Tracker::<TestRun>::new(["partition", "legal", "schema"]);
        tracker.update("partition", TestStatus::TestSuccess, "Complete");
        tracker.update("legal", TestStatus::TestSuccess, "Complete");
        tracker.update("schema", TestStatus::CompileFailed, "Failed");

        assert_eq!(built_without_coverage(&tracker, temp.path(), "repos"), vec!["legal".to_string()]);
    }
}
