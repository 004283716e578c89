//! `lk up`: start the roles and supervise them.

use crate::cli::UpArgs;
use crate::prompt::TerminalPrompt;
use crate::report;
use color_eyre::eyre::{bail, Result};
use lk_core::startup::{AlwaysAbort, AlwaysProceed, OperatorPrompt};
use lk_core::supervisor::Supervisor;
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

const DEV_PORT_VARIABLE: &str = "LK_DEV_PORT";

pub async fn run(project: &Path, args: UpArgs) -> Result<ExitCode> {
    let mut config = super::load(project).await?;
    if let Some(port) = args.dev_port {
        let updated = config.override_port(DEV_PORT_VARIABLE, port);
        info!(port, roles = updated, "applied {DEV_PORT_VARIABLE}");
    }
    if config.supervisor.roles_for(args.mode).is_empty() {
        bail!("no roles configured for {} mode", args.mode);
    }

    let prompt: Arc<dyn OperatorPrompt> = if args.accept_degraded {
        Arc::new(AlwaysProceed)
    } else if std::io::stdin().is_terminal() {
        Arc::new(TerminalPrompt)
    } else {
        Arc::new(AlwaysAbort)
    };

    let supervisor = Supervisor::new(config.supervisor, project).with_prompt(prompt);
    match supervisor.run(args.mode, report::event).await {
        Ok(summary) => {
            report::run_summary(&summary);
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            report::startup_failure(&error);
            Ok(ExitCode::FAILURE)
        }
    }
}
