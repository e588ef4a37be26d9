use std::path::PathBuf;

use anyhow::Error;
use clap::Parser;

use respeaker_led::{config::DEFAULT_PIPE_PATH, pipe::send_command};

/// Send a command to the respeaker-led daemon.
///
/// Actions:
///   off:   Turn off LEDs (unless held)
///   on:    Turn on LEDs until the next action
///   hold:  Keep LEDs on for holdtime seconds, ignoring off
///   flash: Flash LEDs every interval seconds until the next action
///   spin:  Spin one LED around the ring until the next action
///
/// Colours: white red blue green yellow cyan magenta
///
/// Examples:
///   respeaker-led-trigger off
///   respeaker-led-trigger on red
///   respeaker-led-trigger hold colour=white holdtime=5
///   respeaker-led-trigger spin colour=cyan interval=2 direction=ccw
#[derive(Parser, Debug)]
#[command(author, version, verbatim_doc_comment)]
struct Args {
    /// Path of the daemon's command fifo
    #[arg(short, long, default_value = DEFAULT_PIPE_PATH)]
    pipe: PathBuf,

    /// The action followed by its arguments
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let args = Args::parse();
    send_command(&args.pipe, &args.command.join(" ")).await
}
