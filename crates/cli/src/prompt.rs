//! Interactive degraded-mode prompt.

use async_trait::async_trait;
use colored::Colorize;
use lk_core::startup::{Decision, FailureReason, OperatorPrompt};
use std::io::{self, BufRead, Write};

/// Asks on the terminal whether to continue without a failed optional role.
///
/// Anything but an explicit yes aborts, including a closed stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl OperatorPrompt for TerminalPrompt {
    async fn decide(&self, role: &str, reason: FailureReason, detail: &str) -> Decision {
        eprintln!();
        eprintln!("{}", format!("Optional role '{role}' is unavailable ({reason})").yellow().bold());
        eprintln!("  {detail}");
        eprint!("Continue without it? Some features will not work. [y/N] ");
        let _ = io::stderr().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => parse_answer(&line),
            _ => Decision::Abort,
        }
    }
}

fn parse_answer(line: &str) -> Decision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Decision::Proceed,
        _ => Decision::Abort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_yes_proceeds() {
        assert_eq!(parse_answer("y\n"), Decision::Proceed);
        assert_eq!(parse_answer(" YES "), Decision::Proceed);
        assert_eq!(parse_answer("\n"), Decision::Abort);
        assert_eq!(parse_answer("no"), Decision::Abort);
    }
}
