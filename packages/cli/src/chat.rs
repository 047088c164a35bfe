// ABOUTME: Interactive conversation loop binding an agent to a fresh sandbox session
// ABOUTME: Supports quit/reset commands and prints tool and token usage footers

use crate::config::Config;
use anyhow::Context;
use skiff_agent::{Agent, AgentConfig, LlmClient, ToolExecutor};
use skiff_memory::{ConversationManager, MemoryStore};
use skiff_sandbox::{BackendKind, LifecycleOrchestrator, RemoteBackend, UnifiedSandboxManager};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to powerful tools:

1. execute_code: Run Python code in a secure sandbox
2. file_operations: Read, write, list files in the sandbox
3. analyze_data: Analyze CSV files with pandas
4. web_search: Search the web for information

Guidelines:
- Break complex tasks into steps
- Use tools when needed rather than computing things yourself
- Show your work and explain your reasoning
- Handle errors gracefully and suggest alternatives

You maintain conversation context and remember previous interactions.";

pub async fn run(config: Config, environment: String, backend: BackendKind) -> anyhow::Result<()> {
    info!("Initializing conversational agent");

    let sandboxes = Arc::new(UnifiedSandboxManager::new());
    sandboxes
        .register_backend(Arc::new(RemoteBackend::from_env()))
        .await;
    if let Ok(docker) = skiff_sandbox::DockerBackend::new() {
        sandboxes.register_backend(Arc::new(docker)).await;
    }

    let lifecycle = Arc::new(LifecycleOrchestrator::new(
        sandboxes.clone(),
        &config.storage_dir,
    )?);

    let memory = Arc::new(
        MemoryStore::new(format!("{}/memory", config.storage_dir))
            .context("Failed to open memory store")?,
    );
    let conversation = Arc::new(ConversationManager::new(memory));

    let tools = Arc::new(ToolExecutor::with_builtins(sandboxes.clone()).await);
    let llm = Arc::new(LlmClient::new());

    let agent_config = AgentConfig {
        name: "conversational-agent".to_string(),
        model: llm.model().to_string(),
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
        ..Default::default()
    };

    let session = lifecycle
        .start(
            serde_json::to_value(&agent_config)?,
            &environment,
            backend,
        )
        .await
        .context("Failed to start session")?;

    let agent = Agent::new(agent_config, llm, Some(tools), conversation);

    println!("Session {} on {} backend", session.session_id, backend);
    println!("Type 'quit' to exit, 'reset' to clear history\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        if input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.eq_ignore_ascii_case("reset") {
            agent.reset_session(&session.session_id).await;
            println!("Session reset");
            continue;
        }
        if input.is_empty() {
            continue;
        }

        match agent.run(&session.session_id, input).await {
            Ok(response) => {
                println!("\nAssistant: {}", response.content);
                if !response.tool_calls.is_empty() {
                    println!(
                        "[Used {} tools in {} iterations]",
                        response.tool_calls.len(),
                        response.iterations
                    );
                }
                if let Some(usage) = response.usage {
                    println!("[Tokens: {}]", usage.total_tokens());
                }
            }
            Err(e) => {
                println!("\nSomething went wrong: {}", e);
            }
        }
    }

    info!("Cleaning up session {}", session.session_id);
    lifecycle.stop(&session.session_id, &session.handle).await;
    println!("\nSession ended");

    Ok(())
}
