//! Console rendering sink for display events

use crossterm::style::Stylize;
use flagsolve_core::events::{DisplayEvent, RenderSink};

/// Renders display events as styled lines on stdout
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    fn label(agent: &str) -> String {
        if agent.is_empty() {
            "[tool]".to_string()
        } else {
            format!("[{}]", agent)
        }
    }
}

impl RenderSink for ConsoleSink {
    fn emit(&self, event: DisplayEvent) {
        match event {
            DisplayEvent::Narrative { agent, text } => {
                println!();
                println!("{} {}", Self::label(&agent).green().bold(), text);
            }
            DisplayEvent::Reasoning { agent, text } => {
                println!("{} {}", Self::label(&agent).cyan(), text.dim());
            }
            DisplayEvent::ToolInvoked { agent, tool, args } => {
                println!(
                    "{} {} {}",
                    Self::label(&agent).magenta(),
                    format!("running {}", tool).magenta().bold(),
                    args.dim()
                );
            }
            DisplayEvent::ToolOutput {
                agent,
                output,
                is_error,
            } => {
                let label = Self::label(&agent);
                if is_error {
                    println!("{}", format!("{} {}", label, output).red().dim());
                } else {
                    println!("{}", format!("{} {}", label, output).dim());
                }
            }
            DisplayEvent::Warning(text) => {
                println!("{}", format!("warning: {}", text).yellow());
            }
            DisplayEvent::Error(text) => {
                eprintln!("{}", format!("error: {}", text).red().bold());
            }
        }
    }
}

/// Print the startup banner
pub fn print_welcome(session_id: &str, step_limit: u32) {
    println!("{}", "flagsolve - multi-agent CTF solver".green().bold());
    println!(
        "{}",
        format!(
            "session: {} | step limit: {} per turn | type 'exit' to quit",
            session_id, step_limit
        )
        .dim()
    );
}

pub fn print_info(text: &str) {
    println!("{}", text.to_string().cyan());
}
