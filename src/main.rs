mod config;
mod engine;
mod error;
mod narrator;
mod server;
mod store;
mod tools;
mod types;
mod week;

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::ReflectionEngine;
use crate::narrator::AnthropicNarrator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("daily_reflections=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    let server = build_server(&config)?;

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--refresh") {
        return run_refresh(&server);
    }

    run_mcp_server(server).await
}

fn build_server(config: &Config) -> Result<server::ReflectionServer> {
    let store = Arc::new(store::open(&config.store_path)?);
    let narrator =
        AnthropicNarrator::new(config.api_key.clone(), config.model.clone(), config.timeout);
    if !narrator.has_key() {
        warn!("ANTHROPIC_API_KEY not set, reflections cannot be generated");
    }

    let engine = ReflectionEngine::new(store.clone(), store, Arc::new(narrator));
    Ok(server::ReflectionServer {
        engine,
        user_id: config.user_id.clone(),
        today: None,
    })
}

async fn run_mcp_server(server: server::ReflectionServer) -> Result<()> {
    let transport = rmcp::transport::io::stdio();
    info!(user = %server.user_id, "starting daily-reflections MCP server (stdio)");

    let service = server.serve(transport).await
        .map_err(|e| anyhow::anyhow!("MCP server failed: {}", e))?;

    let _ = service.waiting().await;
    Ok(())
}

/// One-shot trigger refresh, for cron or a login hook
fn run_refresh(server: &server::ReflectionServer) -> Result<()> {
    match server.do_refresh() {
        Ok(msg) => println!("{}", msg),
        Err(e) => eprintln!("{}", server::render_error(&e)),
    }
    Ok(())
}
