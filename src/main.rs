use std::path::PathBuf;

use anyhow::Error;
use clap::Parser;
use log::info;

use respeaker_led::prelude::*;

/// Drives the ReSpeaker LED ring from commands written to a fifo.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Owner of the command fifo as user:group. Defaults to the current user.
    owner: Option<String>,

    /// Configuration file. Defaults to /etc/respeaker-led.ron if present.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Starting config...");
    let config = Config::discover(args.config.as_deref())?;
    let owner = Owner::from_arg(args.owner.as_deref());

    info!("Starting LED strip...");
    #[cfg(feature = "pi")]
    let bus = Apa102Bus::init(&config.strip)?;
    #[cfg(not(feature = "pi"))]
    let bus = {
        log::warn!("Built without the pi feature, frames are not sent anywhere");
        SimulatedBus::with_log().0
    };

    let daemon = Daemon::init(&config, owner, bus)?;
    daemon.run(termination_signal()?).await
}
