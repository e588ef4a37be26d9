use std::future::Future;

use anyhow::Error;
use log::{error, info, warn};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::mpsc,
};

use crate::{
    config::Config,
    dispatcher::Dispatcher,
    engine::PatternEngine,
    pipe::{CommandPipe, Owner},
    strip::{LedBus, PixelStrip},
};

/// Capacity of the channel that carries pattern faults to the main loop
const FAULT_QUEUE: usize = 8;

/// The running daemon: the command fifo on one side, the strip on the other.
pub struct Daemon {
    pipe: CommandPipe,
    dispatcher: Dispatcher,
    faults: mpsc::Receiver<Error>,
}

impl Daemon {
    /// Power up the strip, blank it and create the command fifo.
    pub fn init(config: &Config, owner: Owner, bus: impl LedBus + 'static) -> Result<Self, Error> {
        let pipe = CommandPipe::create(&config.pipe_path, config.pipe_mode, owner)?;

        let mut strip = PixelStrip::new(bus);
        if let Err(e) = strip.power_on().and_then(|()| strip.blank()) {
            error!("Failed to start LED strip: {:#}", e);
            if let Err(e) = strip.power_off() {
                warn!("Failed to power off LED strip: {:#}", e);
            }
            if let Err(e) = pipe.remove() {
                warn!("{:#}", e);
            }
            return Err(e);
        }

        let (fault_tx, faults) = mpsc::channel(FAULT_QUEUE);
        let engine = PatternEngine::new(strip.shared(), fault_tx);

        Ok(Self {
            pipe,
            dispatcher: Dispatcher::new(engine),
            faults,
        })
    }

    /// Serve commands until `shutdown` resolves or something fatal happens.
    /// Either way the strip is switched off and the fifo removed before
    /// returning.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), Error> {
        let Daemon {
            mut pipe,
            mut dispatcher,
            mut faults,
        } = self;
        tokio::pin!(shutdown);

        info!("Listening on {}", pipe.path().display());
        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Terminating");
                    break Ok(());
                }
                Some(fault) = faults.recv() => {
                    break Err(fault.context("pattern stopped on a strip failure"));
                }
                line = pipe.next_line() => {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => break Err(e),
                    };
                    if let Err(e) = dispatcher.dispatch(&line).await {
                        break Err(e);
                    }
                }
            }
        };

        if let Err(e) = &result {
            error!("Fatal exception: {:#}", e);
        }

        let stopped = dispatcher.shutdown().await;
        if let Err(e) = &stopped {
            error!("Failed to switch the strip off: {:#}", e);
        }
        let removed = pipe.remove();

        result.and(stopped).and(removed)
    }
}

/// Resolves on SIGINT or SIGTERM.
pub fn termination_signal() -> Result<impl Future<Output = ()>, Error> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = terminate.recv() => info!("Got SIGTERM"),
            _ = interrupt.recv() => info!("Got SIGINT"),
        }
    })
}
