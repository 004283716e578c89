//! Human readable rendering of events, failures and summaries.
//!
//! Progress and summaries go to stdout; failure blocks go to stderr.

use colored::Colorize;
use lk_core::build::BuildError;
use lk_core::shutdown::{ShutdownOutcome, StopOutcome};
use lk_core::startup::StartupError;
use lk_core::supervisor::RunSummary;
use lk_protocol::build_models::{BuildSummary, StepStatus};
use lk_protocol::ipc::Event;
use lk_protocol::process_models::{OutputLine, ProcessState};

const RULE_WIDTH: usize = 60;

/// One progress line for the events worth showing outside the log.
pub fn event(event: &Event) {
    match event {
        Event::PortResolved { role, binding } if binding.was_relocated() => {
            println!(
                "{} {role}: port {} busy, using {}",
                "!".yellow(),
                binding.requested,
                binding.port
            );
        }
        Event::ProcessSpawned { role, pid } => {
            let pid = pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
            println!("{} {role} started (pid {pid})", "•".cyan());
        }
        Event::ProcessStateChanged { role, to, .. } if *to == ProcessState::Ready => {
            println!("{} {role} ready", "✓".green());
        }
        Event::DegradedMode { role, reason } => {
            println!("{} continuing without {role}: {reason}", "!".yellow().bold());
        }
        Event::StartupCompleted { degraded, .. } => {
            if degraded.is_empty() {
                println!("{}", "All roles ready.".green().bold());
            } else {
                println!(
                    "{} degraded: {}",
                    "Started".yellow().bold(),
                    degraded.join(", ")
                );
            }
        }
        Event::ShutdownStarted { trigger } => {
            println!("{} shutting down: {trigger}", "•".cyan());
        }
        Event::BuildStepStarted { step, index, total } => {
            println!("{} {step}", format!("[{}/{total}]", index + 1).cyan().bold());
        }
        _ => {}
    }
}

/// The blocking failure notification for an aborted startup.
pub fn startup_failure(error: &StartupError) {
    let title = match error.role() {
        Some(role) => format!("Failed to start '{role}'"),
        None => "Startup failed".to_string(),
    };
    let mut body = vec![error.to_string()];
    if let StartupError::StartupFailed { exit: Some(exit), .. } = error {
        body.push(format!("Process ended with {exit}."));
    }
    failure_block(&title, &body, error.diagnostics());
}

/// The failure notification for a build that stopped.
pub fn build_failure(error: &BuildError) {
    let (title, diagnostics) = match error {
        BuildError::StepFailed {
            step, diagnostics, ..
        } => (format!("Build step '{step}' failed"), diagnostics.as_slice()),
        BuildError::RequirementsNotMet { .. } => ("Missing build requirements".to_string(), &[][..]),
        BuildError::Validation { .. } => ("Build validation failed".to_string(), &[][..]),
        BuildError::UnknownStep { .. } => ("Invalid step selection".to_string(), &[][..]),
        BuildError::Cancelled => ("Build cancelled".to_string(), &[][..]),
    };
    failure_block(&title, &[error.to_string()], diagnostics);
}

fn failure_block(title: &str, body: &[String], diagnostics: &[OutputLine]) {
    let rule = "═".repeat(RULE_WIDTH);
    eprintln!();
    eprintln!("{}", rule.red());
    eprintln!("{}", title.red().bold());
    eprintln!("{}", rule.red());
    for line in body {
        eprintln!("{line}");
    }
    if !diagnostics.is_empty() {
        eprintln!();
        eprintln!("{}", "Last output:".bold());
        for line in diagnostics {
            eprintln!("  {}", line.to_string().dimmed());
        }
    }
    eprintln!("{}", rule.red());
}

/// How a supervised session ended.
pub fn run_summary(summary: &RunSummary) {
    println!();
    println!("{} {}", "Session ended:".bold(), summary.trigger);
    match &summary.shutdown {
        ShutdownOutcome::Completed(reports) => {
            for report in reports {
                let outcome = match report.outcome {
                    StopOutcome::Graceful => "stopped".green(),
                    StopOutcome::Forced => "killed".yellow(),
                    StopOutcome::AlreadyExited => "already exited".normal(),
                    StopOutcome::Detached => "detached".dimmed(),
                    StopOutcome::Unresponsive => "unresponsive".red().bold(),
                };
                println!("  {:<16} {outcome}", report.role);
            }
        }
        ShutdownOutcome::AlreadyInProgress => println!("  teardown handled elsewhere"),
    }
}

/// Step table, warnings and artifacts of a build run.
pub fn build_summary(summary: &BuildSummary) {
    println!();
    println!("{}", "Build summary".bold());
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
    for step in &summary.steps {
        let status = match step.status {
            StepStatus::Succeeded => "ok".green(),
            StepStatus::Warning => "warning".yellow(),
            StepStatus::Failed => "failed".red().bold(),
            StepStatus::Skipped => "skipped".dimmed(),
        };
        println!("  {:<24} {:<8} {:>7}ms", step.name, status, step.duration_ms);
    }
    for warning in &summary.warnings {
        println!("  {} {warning}", "warning:".yellow());
    }
    for artifact in &summary.artifacts {
        println!("  {} {}", "✓".green(), artifact.display());
    }
    for artifact in &summary.missing_artifacts {
        println!("  {} {} (missing)", "✗".red(), artifact.display());
    }
    let seconds = summary.elapsed_ms as f64 / 1000.0;
    if summary.is_success() {
        println!("{} in {seconds:.1}s", "Build succeeded".green().bold());
    } else {
        println!("{} after {seconds:.1}s", "Build failed".red().bold());
    }
}
