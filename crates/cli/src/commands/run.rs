//! `cmdloop run`: Drive one instruction through the loop in the terminal.
//!
//! Ctrl+C drops the event receiver, which cancels the model stream or the
//! command currently running.

use std::io::Write;
use std::sync::Arc;

use cmdloop_agent::{AgentLoop, Invocation, LoopEvent, LoopSettings, to_ndjson_line};
use cmdloop_config::AppConfig;

/// Per-run overrides from the command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub auto_execute: Option<bool>,
    pub max_iterations: Option<u32>,
}

pub async fn run(instruction: String, overrides: Overrides, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export OPENROUTER_API_KEY='sk-or-v1-...'   (recommended)");
        eprintln!("    export OPENAI_API_KEY='sk-...'             (for OpenAI direct)");
        eprintln!("    export CMDLOOP_API_KEY='sk-...'            (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let settings = LoopSettings::from_config(&config.agent)
        .with_overrides(overrides.auto_execute, overrides.max_iterations)?;
    let invocation = Invocation::new(instruction, settings)?;

    let agent = build_agent(&config)?;
    let mut rx = agent.run_stream(invocation);
    let mut stdout = std::io::stdout();

    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n  Interrupted, cancelling.");
                break;
            }
        };
        let Some(event) = event else { break };

        if let Some(text) = render(&event, json) {
            write!(stdout, "{text}")?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn build_agent(config: &AppConfig) -> Result<AgentLoop, Box<dyn std::error::Error>> {
    let router = cmdloop_providers::router::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;

    let mut agent = AgentLoop::new(
        provider,
        cmdloop_providers::router::resolve_model(config),
        config.default_temperature,
    )
    .with_max_tokens(config.default_max_tokens)
    .with_system_prompt(&config.agent.system_prompt)
    .with_completion_phrases(&config.agent.completion_phrases);

    if let Some(executor) = cmdloop_executor::build_from_config(&config.executor) {
        let executor: Arc<dyn cmdloop_core::CommandExecutor> = executor;
        agent = agent.with_executor(executor);
    }

    Ok(agent)
}

/// Terminal rendering of one event; `None` prints nothing.
fn render(event: &LoopEvent, json: bool) -> Option<String> {
    if json {
        return to_ndjson_line(event);
    }

    match event {
        LoopEvent::Chunk(text) => Some(text.clone()),
        LoopEvent::Proposal(raw) => Some(format!("\n📋 Proposed commands:\n```bash\n{raw}\n```\n")),
        LoopEvent::LimitReached { .. } | LoopEvent::ExecutorUnavailable => None,
        LoopEvent::Done { .. } => Some("\n".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_mode_prints_chunks_verbatim() {
        assert_eq!(
            render(&LoopEvent::Chunk("🔧 Executing: ls\n".into()), false).as_deref(),
            Some("🔧 Executing: ls\n")
        );
    }

    #[test]
    fn text_mode_fences_proposals() {
        let out = render(&LoopEvent::Proposal("nmap -sV host".into()), false).unwrap();
        assert!(out.contains("```bash\nnmap -sV host\n```"));
    }

    #[test]
    fn json_mode_uses_wire_frames() {
        assert_eq!(
            render(&LoopEvent::LimitReached { iterations: 4 }, true).as_deref(),
            Some("{\"limit_reached\":true,\"iterations\":4}\n")
        );
        assert!(render(&LoopEvent::Done { completed: true }, true).is_none());
    }

    #[test]
    fn default_config_builds_an_agent() {
        assert!(build_agent(&AppConfig::default()).is_ok());
    }
}
