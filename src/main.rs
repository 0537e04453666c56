use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use mcp_relay::agent_core::{OrchestratorSettings, PromptOrchestrator, SamplingHandler};
use mcp_relay::cli::Repl;
use mcp_relay::http::{self, AppState};
use mcp_relay::inference::{load_model_config, MessagesClient, ModelApi};
use mcp_relay::mcp_client::lifecycle::{DEFAULT_INIT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use mcp_relay::mcp_client::StdioConnector;
use mcp_relay::server_registry::{path_cache, ServerRegistry};
use mcp_relay::session::{SessionManager, DEFAULT_CALL_TIMEOUT};
use mcp_relay::{init_tracing, LogFormat, LogTarget};

#[derive(Parser, Debug)]
#[command(name = "mcp-relay", author, version, about)]
struct Args {
    /// Server configuration file (defaults to the last one used)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Optional YAML model configuration
    #[arg(long = "model-config", global = true)]
    model_config: Option<PathBuf>,

    /// Seconds allowed for a server's initialize handshake
    #[arg(long = "init-timeout-secs", global = true, default_value_t = DEFAULT_INIT_TIMEOUT.as_secs())]
    init_timeout_secs: u64,

    /// Seconds allowed for a single tool call
    #[arg(long = "call-timeout-secs", global = true, default_value_t = DEFAULT_CALL_TIMEOUT.as_secs())]
    call_timeout_secs: u64,

    /// Connect every configured server before accepting commands
    #[arg(long = "connect-all", global = true)]
    connect_all: bool,

    /// Emit logs as JSON lines
    #[arg(long = "json-logs", global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Interactive command loop on stdin/stdout
    Repl,
    /// HTTP API
    Serve {
        #[arg(short = 'P', long, default_value_t = 8000)]
        port: u16,

        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let target = match args.command {
        Mode::Repl => LogTarget::File,
        Mode::Serve { .. } => LogTarget::Stderr,
    };
    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    if let Err(e) = init_tracing(target, format) {
        eprintln!("warning: file logging unavailable: {e}");
    }

    let cache_file = path_cache::default_cache_file();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| path_cache::saved_config_path(&cache_file));
    let registry = ServerRegistry::load(&config_path)
        .with_context(|| format!("loading server config {}", config_path.display()))?;
    path_cache::save_config_path(&cache_file, &config_path);

    let model_config = load_model_config(args.model_config.as_deref())
        .context("loading model config")?;
    let model_api: Option<Arc<dyn ModelApi>> = match MessagesClient::new(&model_config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "model API disabled");
            eprintln!("warning: {e}; prompts are disabled");
            None
        }
    };

    let mut connector = StdioConnector::new(
        Duration::from_secs(args.init_timeout_secs),
        DEFAULT_REQUEST_TIMEOUT,
    );
    if let Some(api) = &model_api {
        connector = connector.with_request_handler(Arc::new(SamplingHandler::new(
            api.clone(),
            model_config.model.clone(),
        )));
    }
    let sessions = Arc::new(
        SessionManager::new(registry, Arc::new(connector))
            .with_call_timeout(Duration::from_secs(args.call_timeout_secs)),
    );

    let orchestrator = model_api.map(|api| {
        Arc::new(PromptOrchestrator::new(
            sessions.clone(),
            api,
            OrchestratorSettings::from(&model_config),
        ))
    });

    if args.connect_all {
        let report = sessions.connect_all().await;
        for failure in &report.failures {
            eprintln!("warning: {}: {}", failure.server, failure.error);
        }
    }

    let outcome = match args.command {
        Mode::Repl => {
            let repl = Repl::new(sessions.clone(), orchestrator);
            repl.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await
                .context("REPL I/O failed")
        }
        Mode::Serve { port, host } => {
            let state = AppState {
                sessions: sessions.clone(),
                orchestrator,
            };
            let addr = SocketAddr::new(host, port);
            http::serve(state, addr, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "cannot listen for ctrl-c");
                }
                tracing::info!("shutdown requested");
            })
            .await
            .with_context(|| format!("serving on {addr}"))
        }
    };

    sessions.shutdown().await;
    tracing::info!("=== mcp-relay stopped ===");
    outcome
}
