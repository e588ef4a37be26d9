use anyhow::Error;
use log::{info, warn};

use crate::{
    command::Command,
    engine::{EngineState, PatternEngine},
};

/// Turns command lines into engine calls. This is the only place that knows
/// `off` must wait for a hold to run out.
pub struct Dispatcher {
    engine: PatternEngine,
}

impl Dispatcher {
    pub fn new(engine: PatternEngine) -> Self {
        Self { engine }
    }

    /// Handle one command line. Bad commands are logged and dropped; only
    /// strip failures come back as errors.
    pub async fn dispatch(&mut self, line: &str) -> Result<(), Error> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("Dropping command '{}': {}", line.trim(), e);
                return Ok(());
            }
        };
        info!(
            "Received command: {:?}; colour: {:?}; args: {:?}",
            command.action, command.colour, command.args
        );

        if command.action.is_off() {
            if self.engine.is_holding() {
                info!("Got {:?} but still holding, ignoring it", command.action);
                return Ok(());
            }
            return self.engine.stop().await;
        }

        match command.pattern() {
            Ok(Some(pattern)) => self.engine.start(pattern).await,
            Ok(None) => Ok(()),
            Err(e) => {
                warn!("Dropping command '{}': {}", line.trim(), e);
                Ok(())
            }
        }
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn is_holding(&self) -> bool {
        self.engine.is_holding()
    }

    /// Stop everything and power the strip down, hold or not.
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.engine.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{sync::mpsc, time::sleep};

    use super::*;
    use crate::{
        colour::Colour,
        pattern::PatternKind,
        strip::{FrameLog, PixelStrip, SimulatedBus},
    };

    fn dispatcher() -> (Dispatcher, FrameLog, mpsc::Receiver<Error>) {
        let (bus, log) = SimulatedBus::with_log();
        let (tx, rx) = mpsc::channel(4);
        let engine = PatternEngine::new(PixelStrip::new(bus).shared(), tx);
        (Dispatcher::new(engine), log, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_then_off_is_idle() {
        let (mut dispatcher, log, _faults) = dispatcher();
        dispatcher.dispatch("on colour=red").await.unwrap();
        sleep(Duration::from_millis(10)).await;
        assert!(log.is_solid(Colour::RED));

        dispatcher.dispatch("off").await.unwrap();
        assert_eq!(dispatcher.state(), EngineState::Idle);
        assert!(log.is_dark());
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_ignored_while_holding() {
        let (mut dispatcher, log, _faults) = dispatcher();
        dispatcher.dispatch("hold colour=red holdtime=2").await.unwrap();
        sleep(Duration::from_millis(500)).await;

        dispatcher.dispatch("off").await.unwrap();
        dispatcher.dispatch("stop").await.unwrap();
        assert!(dispatcher.is_holding());
        sleep(Duration::from_millis(1000)).await;
        assert!(log.is_solid(Colour::RED));

        sleep(Duration::from_millis(1000)).await;
        assert!(!dispatcher.is_holding());
        assert!(log.is_dark());
        assert_eq!(dispatcher.state(), EngineState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_works_after_hold_expires() {
        let (mut dispatcher, log, _faults) = dispatcher();
        dispatcher.dispatch("hold colour=red holdtime=1").await.unwrap();
        sleep(Duration::from_millis(1500)).await;
        assert!(!dispatcher.is_holding());

        dispatcher.dispatch("on blue").await.unwrap();
        dispatcher.dispatch("off").await.unwrap();
        assert!(log.is_dark());
        assert_eq!(dispatcher.state(), EngineState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pattern_replaces_hold() {
        let (mut dispatcher, log, _faults) = dispatcher();
        dispatcher.dispatch("hold colour=red holdtime=10").await.unwrap();
        dispatcher.dispatch("flash colour=blue").await.unwrap();

        assert!(!dispatcher.is_holding());
        assert_eq!(dispatcher.state(), EngineState::Running(PatternKind::Flash));

        sleep(Duration::from_millis(250)).await;
        assert!(log.is_solid(Colour::BLUE));

        // No longer holding, so off goes through
        dispatcher.dispatch("off").await.unwrap();
        assert!(log.is_dark());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_commands_are_dropped() {
        let (mut dispatcher, log, _faults) = dispatcher();
        dispatcher.dispatch("spin colour=green").await.unwrap();

        for bad in ["", "dance", "flash interval=never", "on =red"] {
            dispatcher.dispatch(bad).await.unwrap();
        }
        assert_eq!(dispatcher.state(), EngineState::Running(PatternKind::Spin));

        sleep(Duration::from_millis(40)).await;
        assert_eq!(log.lit_pixels(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_colour_still_runs() {
        let (mut dispatcher, log, _faults) = dispatcher();
        dispatcher.dispatch("on colour=foo").await.unwrap();
        sleep(Duration::from_millis(10)).await;
        assert!(log.is_solid(Colour::WHITE));
    }
}
