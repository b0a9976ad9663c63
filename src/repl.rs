//! Line-oriented chat loop

use ani_core::event_bus::CoreEvent;
use ani_core::{logger, AniError, Orchestrator, Outcome, RoutingMode, SourceTag};
use anyhow::Result;
use console::Style;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const DEFAULT_TAIL: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    Help,
    Status,
    /// `/mode` alone shows the current mode
    Mode(Option<String>),
    Log(usize),
    Logs(usize),
    Unknown(String),
    Submit(String),
}

pub fn parse_command(input: &str) -> ReplCommand {
    let input = input.trim();
    match input.to_lowercase().as_str() {
        "quit" | "exit" | "q" => return ReplCommand::Quit,
        _ => {}
    }

    let Some(command) = input.strip_prefix('/') else {
        return ReplCommand::Submit(input.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next();
    let count = || arg.and_then(|a| a.parse().ok()).unwrap_or(DEFAULT_TAIL);

    match name.as_str() {
        "quit" | "exit" | "q" => ReplCommand::Quit,
        "help" | "?" => ReplCommand::Help,
        "status" => ReplCommand::Status,
        "mode" => ReplCommand::Mode(arg.map(str::to_string)),
        "log" => ReplCommand::Log(count()),
        "logs" => ReplCommand::Logs(count()),
        _ => ReplCommand::Unknown(name),
    }
}

pub fn format_outcome(outcome: &Outcome) -> String {
    format!("Ani ({}): {}", outcome.source, outcome.text.trim())
}

fn print_outcome(result: std::result::Result<Outcome, AniError>) {
    match result {
        Ok(outcome) => {
            let style = match outcome.source {
                SourceTag::Direct => Style::new().cyan(),
                SourceTag::Assisted => Style::new().green(),
                SourceTag::AssistedWithEscalation => Style::new().yellow(),
            };
            println!("{}", style.apply_to(format_outcome(&outcome)));
        }
        Err(e) => {
            println!("{}", Style::new().red().apply_to(format!("Error: {}", e.user_message())));
        }
    }
}

fn print_help() {
    let bold = Style::new().bold();
    println!("{}", bold.apply_to("Commands:"));
    println!("  /mode [auto|direct|session]  show or switch routing");
    println!("  /log [n]                     last n lines of session output");
    println!("  /logs [n]                    last n diagnostic log entries");
    println!("  /status                      session, model and routing state");
    println!("  quit | exit | q              leave");
    println!("Prefix a message with ! to force the session, ? to skip it.");
}

fn print_status(orchestrator: &Orchestrator) {
    let session = orchestrator
        .session_state()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "absent".to_string());
    println!("Session:  {}", session);
    println!("Model:    {}", orchestrator.model_name());
    println!("Mode:     {}", orchestrator.mode());
    println!("State:    {}", orchestrator.state());
    println!("History:  {} entries", orchestrator.history_len());
}

/// Print side-channel notices while a request runs
fn spawn_notices(mut events: broadcast::Receiver<CoreEvent>) -> JoinHandle<()> {
    let dim = Style::new().dim();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let notice = match event {
                CoreEvent::PromptAutoApproved { token, .. } => {
                    format!("[approved a read-only prompt with {:?}]", token)
                }
                CoreEvent::Escalated { .. } => "[the session wants confirmation]".to_string(),
                CoreEvent::TimedOut { ticks } => {
                    format!("[no settled output after {} ticks, answering directly]", ticks)
                }
                CoreEvent::SessionExited { code } => format!("[session exited: {:?}]", code),
                _ => continue,
            };
            println!("{}", dim.apply_to(notice));
        }
    })
}

fn prompt(mode: RoutingMode) {
    let label = match mode {
        RoutingMode::Auto => "Ani> ",
        RoutingMode::Direct => "Ani (direct)> ",
        RoutingMode::Session => "Ani (session)> ",
    };
    print!("{}", Style::new().bold().apply_to(label));
    let _ = std::io::stdout().flush();
}

pub async fn run(orchestrator: Arc<Orchestrator>) -> Result<()> {
    println!(
        "{} v{} - type /help for commands",
        Style::new().blue().bold().apply_to("ani"),
        env!("CARGO_PKG_VERSION")
    );
    let notices = spawn_notices(orchestrator.events().subscribe());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt(orchestrator.mode());
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        // EOF
        let Some(line) = line else {
            println!();
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::Status => print_status(&orchestrator),
            ReplCommand::Mode(None) => println!("Mode: {}", orchestrator.mode()),
            ReplCommand::Mode(Some(arg)) => match arg.parse::<RoutingMode>() {
                Ok(mode) => {
                    orchestrator.set_mode(mode);
                    println!("Mode: {}", mode);
                }
                Err(e) => println!("{}", Style::new().red().apply_to(e)),
            },
            ReplCommand::Log(n) => {
                for line in orchestrator.log_snapshot(n) {
                    println!("{:>6}  {}", line.sequence_index, line.text);
                }
            }
            ReplCommand::Logs(n) => {
                // newest first from the logger; show oldest first
                for entry in logger::get_recent_logs(n).into_iter().rev() {
                    println!("{}", entry);
                }
            }
            ReplCommand::Unknown(name) => {
                println!("Unknown command /{} (try /help)", name);
            }
            ReplCommand::Submit(text) => {
                let result = tokio::select! {
                    result = orchestrator.submit(&text) => result,
                    _ = tokio::signal::ctrl_c() => {
                        println!("{}", Style::new().dim().apply_to("[interrupted]"));
                        continue;
                    }
                };
                print_outcome(result);
            }
        }
    }

    notices.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("quit"), ReplCommand::Quit);
        assert_eq!(parse_command("  Q "), ReplCommand::Quit);
        assert_eq!(parse_command("/exit"), ReplCommand::Quit);
        assert_eq!(parse_command("/status"), ReplCommand::Status);
        assert_eq!(parse_command("/mode"), ReplCommand::Mode(None));
        assert_eq!(
            parse_command("/mode direct"),
            ReplCommand::Mode(Some("direct".to_string()))
        );
        assert_eq!(parse_command("/log 5"), ReplCommand::Log(5));
        assert_eq!(parse_command("/logs"), ReplCommand::Logs(DEFAULT_TAIL));
        assert_eq!(parse_command("/log lots"), ReplCommand::Log(DEFAULT_TAIL));
        assert_eq!(parse_command("/frobnicate"), ReplCommand::Unknown("frobnicate".to_string()));
    }

    #[test]
    fn plain_text_is_submitted() {
        assert_eq!(
            parse_command("list files here"),
            ReplCommand::Submit("list files here".to_string())
        );
        assert_eq!(parse_command("!ls"), ReplCommand::Submit("!ls".to_string()));
    }

    #[test]
    fn outcome_format_carries_source_tag() {
        let outcome = Outcome {
            text: " Two files: notes.txt and build.sh \n".to_string(),
            source: SourceTag::Assisted,
        };
        assert_eq!(
            format_outcome(&outcome),
            "Ani (assisted): Two files: notes.txt and build.sh"
        );
    }
}
