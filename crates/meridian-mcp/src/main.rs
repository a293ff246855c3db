//! Meridian MCP server binary.
//!
//! This binary runs the MCP server using stdio transport.

use clap::Parser;
use meridian_mcp::MeridianMcpServer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// MCP server exposing meridian issue relationships over stdio
#[derive(Debug, Parser)]
#[command(name = "meridian-mcp", version, about)]
struct Args {
    /// Workspace to open at startup (any directory inside it)
    #[arg(long, env = "MERIDIAN_WORKSPACE")]
    workspace: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("meridian=info,meridian_mcp=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting meridian-mcp server");

    let mut server = MeridianMcpServer::new();
    if let Some(workspace) = args.workspace {
        server = server.with_workspace(&workspace).await?;
    }
    server.run().await?;

    Ok(())
}
