//! # fedgraph - Federated Graph Server
//!
//! The main binary for the fedgraph federated store.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for registry and element operations
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │               apps/fedgraph (THE BINARY)           │
//! │                                                    │
//! │      ┌─────────────┐        ┌─────────────┐        │
//! │      │    CLI      │        │  HTTP API   │        │
//! │      │   (clap)    │        │   (axum)    │        │
//! │      └──────┬──────┘        └──────┬──────┘        │
//! │             └───────────┬──────────┘               │
//! │                         ▼                          │
//! │                 ┌───────────────┐                  │
//! │                 │ fedgraph-core │                  │
//! │                 │  (THE LOGIC)  │                  │
//! │                 └───────────────┘                  │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server over a federation file
//! fedgraph -c federation.toml serve --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! fedgraph -c federation.toml graphs
//! fedgraph -c federation.toml add-elements -f elements.json
//! fedgraph -c federation.toml get-all --graph-ids mapGraph
//! ```

use clap::Parser;
use fedgraph::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // FEDGRAPH_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("FEDGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "fedgraph=debug,fedgraph_core=debug,tower_http=debug"
    } else {
        "fedgraph=info,fedgraph_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    eprintln!(
        r#"
  ┌─┐┌─┐┌┬┐┌─┐┬─┐┌─┐┌─┐┬ ┬
  ├┤ ├┤  │││ ┬├┬┘├─┤├─┘├─┤
  └  └─┘─┴┘└─┘┴└─┴ ┴┴  ┴ ┴

  Federated Graph Store v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
