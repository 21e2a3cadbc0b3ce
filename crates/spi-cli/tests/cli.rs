//! End-to-end tests of the `spi-agent` binary.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn spi_agent(workdir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_spi-agent"));
    cmd.args(args)
        .current_dir(workdir)
        .env("SPI_AGENT_LOG_DIRECTORY", workdir.join("logs"))
        .env_remove("SPI_AGENT_DEBUG_LOG")
        .env_remove("SPI_AGENT_COPILOT_COMMAND");
    cmd
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("spawn spi-agent")
}

#[test]
fn help_lists_workflows() {
    let temp = TempDir::new().unwrap();
    let out = run(&mut spi_agent(temp.path(), &["--help"]));
    assert!(out.status.success());
    let stdout = text(&out.stdout);
    for command in ["fork", "status", "test", "vulns", "context", "chat"] {
        assert!(stdout.contains(command), "missing {command} in:\n{stdout}");
    }
}

#[test]
fn unknown_service_is_rejected_before_running() {
    let temp = TempDir::new().unwrap();
    let out = run(&mut spi_agent(temp.path(), &["--no-tui", "fork", "--services", "partition,billing"]));
    assert_eq!(out.status.code(), Some(1));
    assert!(text(&out.stderr).contains("Unknown service(s): billing"));
    assert!(!temp.path().join("logs").exists());
}

#[test]
fn context_with_no_results() {
    let temp = TempDir::new().unwrap();
    let out = run(&mut spi_agent(temp.path(), &["context"]));
    assert!(out.status.success());
    assert_eq!(text(&out.stdout).trim(), "No recent workflow results.");
}

#[test]
fn missing_copilot_exits_with_one() {
    let temp = TempDir::new().unwrap();
    let out = run(spi_agent(temp.path(), &["--no-tui", "fork", "--services", "legal"])
        .env("SPI_AGENT_COPILOT_COMMAND", "spi-agent-no-such-tool"));
    assert_eq!(out.status.code(), Some(1));
    assert!(text(&out.stderr).contains("'spi-agent-no-such-tool' command not found"));
}

#[test]
fn chat_handles_slash_commands_without_the_agent() {
    let temp = TempDir::new().unwrap();
    let mut child = spi_agent(temp.path(), &["--no-tui", "--color", "never", "chat"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn spi-agent");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"/context\n/fork billing\nexit\n")
        .unwrap();
    let out = child.wait_with_output().unwrap();

    assert_eq!(out.status.code(), Some(0));
    let stdout = text(&out.stdout);
    assert!(stdout.contains("SPI Agent - Interactive Mode"), "{stdout}");
    assert!(stdout.contains("No recent workflow results."));
    assert!(stdout.trim_end().ends_with("Goodbye!"));
    assert!(text(&out.stderr).contains("Unknown service(s): billing"));
}

#[cfg(unix)]
#[test]
fn fork_with_scripted_tool_reports_and_remembers() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let script = temp.path().join("fake-copilot");
    std::fs::write(
        &script,
        "#!/bin/sh\n\
         echo '● Check partition repository'\n\
         echo '✓ partition service completed successfully'\n\
         echo 'legal: permission denied' >&2\n\
         exit 0\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let out = run(spi_agent(
        temp.path(),
        &["--no-tui", "--color", "never", "fork", "--services", "partition,legal"],
    )
    .env("SPI_AGENT_COPILOT_COMMAND", &script));
    let stdout = text(&out.stdout);
    assert_eq!(out.status.code(), Some(0), "stdout:\n{stdout}\nstderr:\n{}", text(&out.stderr));
    assert!(stdout.contains("github.com/danielscholl-osdu/partition"), "{stdout}");
    assert!(stdout.contains("✓ Log saved to:"));

    let logs: Vec<_> = std::fs::read_dir(temp.path().join("logs"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("fork_"))
        .collect();
    assert_eq!(logs.len(), 1);
    let log = std::fs::read_to_string(logs[0].path()).unwrap();
    assert!(log.contains("Copilot Fork Execution Log"));
    assert!(log.contains("Branch: main"));
    assert!(log.contains("legal: permission denied"));

    let out = run(&mut spi_agent(temp.path(), &["context", "--limit", "1"]));
    let stdout = text(&out.stdout);
    assert!(stdout.starts_with("Recent workflow results:"), "{stdout}");
    assert!(stdout.contains("[fork]"));
}
