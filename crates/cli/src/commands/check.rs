//! `lk check`: validate and print the resolved configuration.

use crate::cli::CheckArgs;
use color_eyre::eyre::{Result, WrapErr};
use colored::Colorize;
use lk_core::config::AppConfig;
use lk_protocol::config_models::{Mode, RoleConfig};
use std::path::Path;
use std::process::ExitCode;

pub async fn run(project: &Path, args: CheckArgs) -> Result<ExitCode> {
    let config = super::load(project).await?;

    if args.json {
        let value = serde_json::json!({
            "supervisor": config.supervisor,
            "build": config.build,
        });
        let rendered = serde_json::to_string_pretty(&value).wrap_err("cannot render configuration")?;
        println!("{rendered}");
    } else {
        print_config(&config);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_config(config: &AppConfig) {
    let settings = &config.supervisor.supervisor;
    println!("{}", "Supervisor".bold());
    println!("  grace period    {}ms", settings.grace_period_ms);
    println!("  kill timeout    {}ms", settings.kill_timeout_ms);
    println!("  output buffer   {} lines", settings.output_buffer_lines);
    println!("  port attempts   {}", settings.port_attempts);

    for mode in [Mode::Development, Mode::Production] {
        println!();
        println!("{}", format!("Roles ({mode})").bold());
        let roles = config.supervisor.roles_for(mode);
        if roles.is_empty() {
            println!("  {}", "none".dimmed());
        }
        for role in &roles {
            println!("  {:<16} {}", role.name, describe(role));
        }
    }

    let build = &config.build;
    println!();
    println!("{}", "Build".bold());
    for requirement in &build.requirements {
        println!("  requires {:<16} ({})", requirement.name, requirement.command);
    }
    for (index, step) in build.steps.iter().enumerate() {
        let group = step.group.as_deref().unwrap_or("-");
        let optional = if step.required { "" } else { " (optional)" };
        println!(
            "  {:>2}. {:<24} {:<8} {group}{optional}",
            index + 1,
            step.name,
            step.phase.to_string()
        );
    }
    for artifact in &build.artifacts {
        println!("  artifact {}", artifact.display());
    }
}

fn describe(role: &RoleConfig) -> String {
    let mut parts = Vec::new();
    match &role.command {
        Some(command) => parts.push(command.clone()),
        None => parts.push("attach-only".to_string()),
    }
    if let Some(port) = &role.port {
        parts.push(format!("port {}", port.preferred));
    }
    if let Some(health) = &role.health {
        parts.push(format!("health {}", health.path));
    }
    if role.primary {
        parts.push("primary".to_string());
    }
    if role.optional {
        parts.push("optional".to_string());
    }
    parts.join(", ")
}
