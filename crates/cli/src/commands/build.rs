//! `lk build`: run, clean or validate the build pipeline.

use crate::cli::BuildArgs;
use crate::report;
use color_eyre::eyre::{Result, WrapErr};
use colored::Colorize;
use lk_core::build::{BuildPipeline, BuildReport, Selection};
use lk_core::shutdown::cancel_on_signal;
use lk_protocol::ipc::Event;
use std::path::Path;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::warn;

pub async fn run(project: &Path, args: BuildArgs) -> Result<ExitCode> {
    let config = super::load(project).await?;
    let pipeline = BuildPipeline::new(config.build, project);

    if args.clean {
        let warnings = pipeline.clean().await;
        for warning in &warnings {
            eprintln!("{} {warning}", "warning:".yellow());
        }
        println!("{}", "Clean finished.".green());
        return Ok(ExitCode::SUCCESS);
    }

    if args.validate {
        return Ok(match pipeline.validate() {
            Ok(found) => {
                for artifact in &found {
                    println!("{} {}", "✓".green(), artifact.display());
                }
                println!("{}", "All artifacts present.".green().bold());
                ExitCode::SUCCESS
            }
            Err(error) => {
                report::build_failure(&error);
                ExitCode::FAILURE
            }
        });
    }

    let selection = selection(&args);
    let report = execute(&pipeline, &selection, !args.json).await;

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&report.summary).wrap_err("cannot render build summary")?;
        println!("{rendered}");
    } else {
        report::build_summary(&report.summary);
    }

    match &report.error {
        None => Ok(ExitCode::SUCCESS),
        Some(error) => {
            report::build_failure(error);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn selection(args: &BuildArgs) -> Selection {
    if let Some(phase) = args.phase {
        Selection::Phase(phase)
    } else if let Some(group) = &args.group {
        Selection::Group(group.clone())
    } else if !args.step.is_empty() {
        Selection::Steps(args.step.clone())
    } else {
        Selection::All
    }
}

/// Run the pipeline while rendering its events.
///
/// A signal cancels the run and stops the running step.
async fn execute(pipeline: &BuildPipeline, selection: &Selection, progress: bool) -> BuildReport {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<Event>();
    let show = |event: &Event| {
        if progress {
            report::event(event);
        }
    };

    let signals = match cancel_on_signal(pipeline.cancellation().clone()) {
        Ok(task) => Some(task),
        Err(error) => {
            warn!(%error, "cannot listen for signals");
            None
        }
    };

    let run = pipeline.run(selection, events_tx);
    tokio::pin!(run);
    let report = loop {
        tokio::select! {
            report = &mut run => break report,
            Some(event) = events_rx.recv() => show(&event),
        }
    };
    while let Ok(event) = events_rx.try_recv() {
        show(&event);
    }
    if let Some(task) = signals {
        task.abort();
    }
    report
}
