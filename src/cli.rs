use clap::Parser;
use std::path::PathBuf;

/// led_dimmerd: scales LED brightness down in the dark
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: $LED_DIMMERD_CONFIG, then the user and system config dirs)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Detach from the terminal and log output to /var/tmp/led_dimmerd.log
    #[arg(short = 'd', long = "daemonize", default_value = "false")]
    pub daemonize: bool,

    /// Do not register on the D-Bus session bus
    #[arg(long = "no-dbus", default_value = "false")]
    pub no_dbus: bool,
}
