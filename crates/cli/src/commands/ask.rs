//! `spotctl ask`: Run the agent loop on one prompt.

use serde_json::Value;
use spotctl_agent::{AgentLoop, AgentStreamEvent, ContextManager, ToolSelection};
use spotctl_config::AppConfig;
use spotctl_core::action::ActionCategory;
use spotctl_core::context::AIContext;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::session;

pub struct AskOptions {
    pub prompt: String,
    /// `None` defers to `agent.enable_streaming`
    pub streaming: Option<bool>,
    pub max_steps: Option<u32>,
    pub category: Option<ActionCategory>,
    pub tools: Vec<String>,
    pub session: Option<PathBuf>,
}

pub async fn run(options: AskOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured for '{}'!", config.default_provider);
        eprintln!();
        eprintln!("  Set OPENAI_API_KEY or ANTHROPIC_API_KEY, or add it to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = spotctl_providers::router::build_from_config(&config);
    let (provider, model) = router.default_provider()?;
    let engine = session::engine(&config)?;

    let mut agent = AgentLoop::new(provider, engine.clone(), model).with_settings(&config.agent);
    if let Some(steps) = options.max_steps {
        agent = agent.with_max_steps(steps);
    }

    let manager = load_session(&config, options.session.as_deref())?;
    session::initialize(&engine, manager.context());

    let selection = selection(options.category, options.tools);
    let streaming = options.streaming.unwrap_or(config.agent.enable_streaming);

    let context = if streaming {
        stream(Arc::new(agent), options.prompt, manager, selection).await?
    } else {
        let mut manager = manager;
        let response = agent.execute_prompt(&options.prompt, &mut manager, &selection).await?;
        for (call, result) in response.tool_calls.iter().zip(&response.tool_results) {
            print_tool(&call.name, &Value::Object(call.parameters.clone()), result.success, result.error.as_deref());
        }
        println!("{}", response.text);
        manager.into_context()
    };

    session::save_refreshed_tokens(&config, &context)?;
    if let Some(path) = options.session.as_deref() {
        if config.agent.auto_save_context {
            save_session(path, &context)?;
        }
    }
    Ok(())
}

async fn stream(
    agent: Arc<AgentLoop>,
    prompt: String,
    manager: ContextManager,
    selection: ToolSelection,
) -> Result<AIContext, Box<dyn std::error::Error>> {
    let mut events = agent.stream_prompt(prompt, manager, selection);
    let mut stdout = std::io::stdout();
    let mut context = None;

    while let Some(event) = events.recv().await {
        match event {
            AgentStreamEvent::Text { content } => {
                print!("{content}");
                stdout.flush()?;
            }
            AgentStreamEvent::ToolCall { call } => {
                eprintln!();
                eprintln!("  → {} {}", call.name, Value::Object(call.parameters));
            }
            AgentStreamEvent::ToolResult { result } => {
                let status = if result.success { "ok".to_string() } else { result.error.unwrap_or_default() };
                eprintln!("  ← {} {status}", result.tool_call_id);
            }
            AgentStreamEvent::Error { message } => eprintln!("\n  ❌ {message}"),
            AgentStreamEvent::Finish { context: finished, steps, .. } => {
                println!();
                info!(steps, "Stream finished");
                context = Some(*finished);
            }
        }
    }

    context.ok_or_else(|| "stream ended without a final context".into())
}

fn print_tool(name: &str, parameters: &Value, success: bool, error: Option<&str>) {
    let status = if success { "ok" } else { error.unwrap_or("failed") };
    eprintln!("  → {name} {parameters} ({status})");
}

fn selection(category: Option<ActionCategory>, tools: Vec<String>) -> ToolSelection {
    if !tools.is_empty() {
        return ToolSelection::named(tools);
    }
    category.map(ToolSelection::category).unwrap_or_default()
}

fn load_session(config: &AppConfig, path: Option<&Path>) -> Result<ContextManager, Box<dyn std::error::Error>> {
    let mut manager = ContextManager::new(session::remote_auth(config));
    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(manager);
    };

    let json = std::fs::read_to_string(path)?;
    manager.import_context(&json)?;
    // Saved sessions may hold stale tokens; the config's are current.
    let auth = session::remote_auth(config);
    if auth.is_usable() {
        manager.context_mut().remote_auth = auth;
    }
    info!(path = %path.display(), session_id = %manager.session_id(), "Resumed session");
    Ok(manager)
}

fn save_session(path: &Path, context: &AIContext) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = ContextManager::from_context(context.clone()).export_context()?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), "Session saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotctl_core::context::MessageRole;

    #[test]
    fn explicit_tools_beat_category() {
        let selection = selection(Some(ActionCategory::Search), vec!["like_songs".into()]);
        assert_eq!(selection.tools, Some(vec!["like_songs".to_string()]));
        assert!(selection.category.is_none());
    }

    #[test]
    fn session_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut manager = ContextManager::default();
        manager.add_message(MessageRole::User, "make me a playlist");
        save_session(&path, manager.context()).unwrap();

        let loaded = load_session(&AppConfig::default(), Some(&path)).unwrap();
        assert_eq!(loaded.context(), manager.context());
    }

    #[test]
    fn missing_session_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_session(&AppConfig::default(), Some(&dir.path().join("none.json"))).unwrap();
        assert!(loaded.context().conversation_history.is_empty());
    }
}
