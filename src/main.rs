use std::fs::File;

use anyhow::{Result, anyhow};
use clap::Parser;
use daemonize::Daemonize;
use led_dimmerd::{application::Application, config::ConfigManager};
use log::{LevelFilter, info};
use syslog::{BasicLogger, Facility, Formatter3164};

mod cli;

use cli::Cli;

const DAEMON_LOG: &str = "/var/tmp/led_dimmerd.log";

fn init_log() -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process: "led_dimmerd".into(),
        pid: std::process::id(),
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(LevelFilter::Info))
            .map_err(|e| anyhow!("{e}"))
    })
}

fn into_daemon() -> Result<()> {
    File::create(DAEMON_LOG)
        .and_then(|out| Ok((out.try_clone()?, out)))
        .map_err(|e| anyhow!("{e}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Fork before the runtime exists; tokio worker threads do not survive it.
    if cli.daemonize {
        into_daemon()?;
    }
    init_log()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let config_manager = ConfigManager::load(cli.config).await?;
    info!(
        "led_dimmerd {} starting with config {}",
        env!("CARGO_PKG_VERSION"),
        config_manager.path().display()
    );

    let mut builder = Application::builder().with_config_manager(config_manager);
    if cli.no_dbus {
        builder = builder.without_dbus();
    }

    builder.build().await?.run().await
}
