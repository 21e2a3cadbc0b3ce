//! `spi-agent fork`: initialize service forks through the AI CLI.

use super::{RunContext, conclude, save_log, stream};
use crate::display::print_panel;
use crate::session::Titles;
use anyhow::Result;
use spi_core::workflows::fork::{self, Fork, ForkParser};
use spi_core::{AgentConfig, PromptBuilder, RunLog, WorkflowResult};
use tracing::info;

const TITLES: Titles = Titles {
    status: "Service Processing Status",
    output: "Live Output",
};

pub async fn run(ctx: &RunContext, services: &[String], branch: &str) -> Result<i32> {
    let prompt = fork_prompt(&ctx.config, services, branch)?;
    info!(services = ?services, branch, template = %ctx.config.template_repo, "Starting fork workflow");

    let Some(run) = stream::<Fork, _>(ctx, services, ForkParser::new(), TITLES, &prompt).await? else {
        return Ok(1);
    };

    print_panel(
        &fork::report(&run.tracker, &ctx.config.organization, branch, run.exit_code),
        ctx.use_colors,
    );

    let log = RunLog::new("fork", "Copilot Fork Execution Log", services)
        .param("Branch", branch)
        .param("Template", ctx.config.template_repo.as_str());
    save_log(ctx, &log, run.exit_code, run.output.full());
    ctx.store
        .store(WorkflowResult::fork(&run.tracker, branch, run.exit_code));

    Ok(conclude(ctx, run.exit_code, run.interrupted))
}

fn fork_prompt(config: &AgentConfig, services: &[String], branch: &str) -> Result<String> {
    Ok(PromptBuilder::new("fork", config.organization.as_str())?
        .services(services)
        .arg("BRANCH", branch)
        .arg("TEMPLATE_REPO", config.template_repo.as_str())
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_the_configured_template() {
        let services = vec!["partition".to_string()];
        let prompt = fork_prompt(&AgentConfig::default(), &services, "main").unwrap();
        assert!(prompt.contains("--template <TEMPLATE_REPO>"));
        assert!(prompt.ends_with("SERVICES: partition\nBRANCH: main\nTEMPLATE_REPO: azure/osdu-spi"));

        let config = AgentConfig {
            template_repo: "acme/spi-template".to_string(),
            ..AgentConfig::default()
        };
        let prompt = fork_prompt(&config, &services, "dev").unwrap();
        assert!(prompt.contains("TEMPLATE_REPO: acme/spi-template"));
    }
}
