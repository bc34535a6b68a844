// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use beanbus_backend::BackendManagerBuilder;
use beanbus_config::{load_config, validate_config};
use beanbus_http::{HttpBridge, build_app};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "beanbus-http", version, about = "HTTP bridge to in-process management beans")]
struct Args {
    /// Path of the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address, overriding the configured one.
    #[arg(long)]
    bind: Option<String>,

    /// Enable debug recording regardless of configuration.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("load configuration")?;
    if let Some(bind) = args.bind {
        config.listen = bind;
    }
    if args.debug {
        config.debug = true;
    }

    let level = config.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("beanbus={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for warning in validate_config(&config).context("validate configuration")? {
        warn!(%warning, "configuration warning");
    }

    let context = config.agent_context.clone();
    let listen = config.listen.clone();
    let manager = Arc::new(
        BackendManagerBuilder::new(config)
            .build()
            .context("build backend")?,
    );
    let bridge = Arc::new(HttpBridge::new(manager.clone()));
    let app = build_app(bridge, &context);

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("bind {listen}"))?;
    info!(bind = %listen, context = %context, "beanbus listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
    })
    .await
    .context("serve")?;

    if let Err(err) = manager.shutdown() {
        warn!(%err, "shutdown incomplete");
    }
    Ok(())
}
