mod cli;

use crate::cli::ProxyArguments;
use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, error, info, trace, warn};
use std::sync::Arc;
use stproxy::config::Configuration;
use stproxy::discovery;
use stproxy::proxy::{self, ProxyRouter};
use stproxy::shutdown::{self, Shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ProxyArguments::parse();
    pretty_env_logger::env_logger::builder()
        .format_timestamp(None)
        .filter_level(if args.verbose { LevelFilter::Trace } else { LevelFilter::Info })
        .init();

    info!("Starting stproxy");
    trace!("Arguments: {:#?}", args);

    let config = Configuration::try_load(&args.config_path).await?;
    config.validate()?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }
    let port = config.port_number()?;

    let shutdown = Shutdown::new();
    shutdown::listen_for_signals(shutdown.clone());

    let router = Arc::new(ProxyRouter::new(Arc::new(config)));
    let server = proxy::start_rp_server(router, port, shutdown.subscribe()).await?;

    let options = args.advertise_options(server.local_addr().port());
    let advertiser = match discovery::start_discovery(options, shutdown.subscribe()).await {
        Ok(handle) => handle,
        Err(e) => {
            // Stop the listener we already started before bailing out
            shutdown.trigger();
            if let Err(wait_err) = server.wait().await {
                error!("{}", wait_err);
            }
            return Err(e);
        }
    };

    info!("Server initialized...");
    let (advertiser_result, server_result) = tokio::join!(advertiser, server.wait());
    advertiser_result.context("SSDP advertiser task failed")?;
    server_result?;

    info!("Server Shutdown!");
    Ok(())
}
