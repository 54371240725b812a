//! GitSplits CLI - talk to the agent from a terminal
//!
//! Every line goes through the same pipeline the web and social channels
//! use, so modes, plans, approvals and replays behave identically.
//!
//! # Quick Start
//!
//! ```bash
//! # One message
//! gitsplits send "analyze near/near-sdk-rs"
//!
//! # Interactive session without network access
//! gitsplits --offline chat --author alice
//! > mode draft
//! > pay 10 NEAR to gitsplits/demo
//! > approve
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use gitsplits_agent_kernel::{
    AgentKernel, GitHubAnalyzer, HeuristicReputation, InMemoryLedger, KernelConfig,
    RepositoryAnalyzer, StaticAnalyzer, Tools,
};
use gitsplits_core::{AgentConfig, Channel, InboundMessage};
use gitsplits_llm::{InferenceProvider, MockInferenceProvider, VerifiableInferenceProvider};
use gitsplits_payments::{
    IntentsRailConfig, IntentsRailEngine, NativeRailConfig, NativeRailEngine, PaymentOrchestrator,
};

mod display;

const OFFLINE_INSIGHT: &str =
    "Shares follow commit history; review long-tail contributors before paying out.";

/// GitSplits CLI - pay the people who build your dependencies
#[derive(Parser)]
#[command(name = "gitsplits")]
#[command(author = "GitSplits Contributors")]
#[command(version)]
#[command(about = "Analyze repositories, create splits and pay contributors", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Use bundled sample repositories and mock providers (no network)
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session reading one message per line from stdin
    Chat {
        /// Who is speaking
        #[arg(short, long, default_value = "cli-user")]
        author: String,

        /// Channel the messages are attributed to
        #[arg(short, long, default_value = "cli", value_parser = parse_channel)]
        channel: Channel,

        /// NEAR account linked to the session
        #[arg(long, env = "NEAR_ACCOUNT_ID")]
        near_account: Option<String>,
    },

    /// Process a single message and print the response
    Send {
        /// Who is speaking
        #[arg(short, long, default_value = "cli-user")]
        author: String,

        /// Channel the message is attributed to
        #[arg(short, long, default_value = "cli", value_parser = parse_channel)]
        channel: Channel,

        /// NEAR account linked to the message
        #[arg(long, env = "NEAR_ACCOUNT_ID")]
        near_account: Option<String>,

        /// Message text
        text: String,
    },
}

fn parse_channel(value: &str) -> Result<Channel, String> {
    Channel::parse(value)
        .ok_or_else(|| format!("unknown channel '{}' (web, farcaster, twitter, cli)", value))
}

fn message(
    text: &str,
    author: &str,
    channel: Channel,
    near_account: Option<&str>,
) -> InboundMessage {
    let message = InboundMessage::new(text, author, channel);
    match near_account {
        Some(account) => message.with_near_account(account),
        None => message,
    }
}

/// Wire collaborators from the environment, or the offline stand-ins
fn build_kernel(config: AgentConfig, offline: bool) -> AgentKernel {
    let analyzer: Arc<dyn RepositoryAnalyzer> = if offline {
        Arc::new(StaticAnalyzer::demo())
    } else {
        Arc::new(GitHubAnalyzer::from_env())
    };
    let inference: Arc<dyn InferenceProvider> = if offline {
        Arc::new(MockInferenceProvider::new(OFFLINE_INSIGHT))
    } else {
        Arc::new(VerifiableInferenceProvider::from_env())
    };
    let payments = if offline {
        PaymentOrchestrator::new(
            Arc::new(IntentsRailEngine::new(IntentsRailConfig::unconfigured(false))),
            Arc::new(NativeRailEngine::new(NativeRailConfig::unconfigured(false))),
            config.native_token.clone(),
        )
    } else {
        PaymentOrchestrator::from_env(config.native_token.clone())
    };

    let tools = Tools {
        analyzer,
        ledger: Arc::new(InMemoryLedger::new()),
        reputation: Arc::new(HeuristicReputation::new(config.reputation_min_score)),
        inference,
        payments,
    };
    AgentKernel::new(KernelConfig::new(config, tools))
}

async fn chat(
    kernel: &AgentKernel,
    author: &str,
    channel: Channel,
    near_account: Option<&str>,
) -> anyhow::Result<()> {
    display::section(&format!("GitSplits chat as {} ({})", author, channel));
    display::info("Type a command, or \"exit\" to leave");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        display::prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "exit" | "quit") {
            break;
        }

        let response = kernel
            .process_message(message(text, author, channel, near_account))
            .await;
        display::response(&response);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so responses can be piped
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AgentConfig::from_env();
    if cli.offline {
        tracing::info!("Offline mode: sample repositories and mock providers");
    }
    let kernel = build_kernel(config, cli.offline);

    match cli.command {
        Commands::Chat {
            author,
            channel,
            near_account,
        } => {
            chat(&kernel, &author, channel, near_account.as_deref()).await?;
            println!("{}", "Bye!".bright_black());
        }
        Commands::Send {
            author,
            channel,
            near_account,
            text,
        } => {
            let response = kernel
                .process_message(message(&text, &author, channel, near_account.as_deref()))
                .await;
            println!("{}", response);
        }
    }

    Ok(())
}
