//! Headless Layoutboard client entry point.

use clap::Parser;
use layoutboard_client::{Args, ClientConfig, HttpLayoutService, Result, Session};
use layoutboard_core::SyncStatus;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let config = ClientConfig::from_args(args)?;
    log::info!("Starting Layoutboard client for {} at {}", config.viewer.name, config.base_url);

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&runtime, async move {
        let mut service = HttpLayoutService::new(config.base_url.clone())?;
        let viewer = match &config.password {
            Some(password) => {
                let viewer = service.login(&config.viewer.name, password).await?;
                service = service.with_credentials(config.viewer.name.clone(), password.clone());
                viewer
            }
            None => config.viewer.clone(),
        };

        let summary = Session::new(service, viewer, config.board, config.viewport)
            .once(config.once)
            .run()
            .await?;
        log::info!(
            "Finished after {} frames: {} items ({})",
            summary.frames,
            summary.last.items,
            summary.status.label()
        );
        Ok::<_, layoutboard_client::ClientError>(summary.status == SyncStatus::Live)
    })
}
