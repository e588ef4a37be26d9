use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Error;
use log::{debug, error, info, warn};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{timeout, Instant},
};

use crate::{
    colour::Colour,
    pattern::{Pattern, PatternContext, PatternKind},
    strip::{with_strip, SharedStrip},
};

/// How long `stop` waits for a cancelled pattern to return. Every built-in
/// pattern polls far more often than this, so hitting it is a bug in the
/// pattern.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing is running and the ring is dark
    Idle,
    Running(PatternKind),
    /// A hold whose timer has not run out yet
    Holding { colour: Colour, deadline: Instant },
}

struct PatternTask {
    pattern: Pattern,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    started: Instant,
}

/// The PatternEngine owns the strip and the one pattern task allowed to write
/// to it. Starting a pattern always stops the previous one first, so there is
/// never more than a single writer. Hardware errors from inside a pattern are
/// reported on the fault channel given to [`PatternEngine::new`].
pub struct PatternEngine {
    strip: SharedStrip,
    holding: Arc<AtomicBool>,
    current: Option<PatternTask>,
    faults: mpsc::Sender<Error>,
}

impl PatternEngine {
    pub fn new(strip: SharedStrip, faults: mpsc::Sender<Error>) -> Self {
        Self {
            strip,
            holding: Arc::new(AtomicBool::new(false)),
            current: None,
            faults,
        }
    }

    /// Replace whatever is running with `pattern`.
    pub async fn start(&mut self, pattern: Pattern) -> Result<(), Error> {
        self.stop().await?;

        let running = Arc::new(AtomicBool::new(true));

        // Latch before spawning so an `off` right behind this command is
        // already blocked
        if pattern.kind() == PatternKind::Hold {
            self.holding.store(true, Ordering::SeqCst);
        }

        let ctx = PatternContext {
            strip: self.strip.clone(),
            running: running.clone(),
            holding: self.holding.clone(),
        };

        let faults = self.faults.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = pattern.run(ctx).await {
                error!("Pattern {} failed: {:#}", pattern.kind(), e);
                if let Err(e) = faults.try_send(e) {
                    error!("Failed to report pattern fault: {}", e);
                }
            }
        });

        info!("Started {} in {}", pattern.kind(), pattern.colour());
        self.current = Some(PatternTask {
            pattern,
            running,
            handle,
            started: Instant::now(),
        });

        Ok(())
    }

    /// Cancel the running pattern, wait for it to return and blank the ring.
    /// Safe to call when nothing is running.
    pub async fn stop(&mut self) -> Result<(), Error> {
        if let Some(task) = self.current.take() {
            let kind = task.pattern.kind();
            task.running.store(false, Ordering::SeqCst);

            match timeout(JOIN_TIMEOUT, task.handle).await {
                Ok(Ok(())) => debug!("Pattern {} stopped", kind),
                Ok(Err(e)) => error!("Pattern {} panicked: {}", kind, e),
                Err(_) => error!(
                    "Pattern {} did not stop within {:?}, forcing the strip off anyway",
                    kind, JOIN_TIMEOUT
                ),
            }
        }

        self.holding.store(false, Ordering::SeqCst);
        with_strip(&self.strip, |strip| strip.blank())
    }

    /// Stop regardless of any hold and cut power to the strip. Power-off is
    /// attempted even if stopping failed.
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        if self.is_holding() {
            warn!("Shutting down while holding, overriding the hold");
        }

        let stopped = self.stop().await;
        let powered_off = with_strip(&self.strip, |strip| strip.power_off());

        stopped.and(powered_off)
    }

    pub fn is_holding(&self) -> bool {
        self.holding.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> EngineState {
        let Some(task) = &self.current else {
            return EngineState::Idle;
        };

        match task.pattern {
            Pattern::Hold { colour, holdtime } if self.is_holding() => EngineState::Holding {
                colour,
                deadline: task.started + holdtime,
            },
            // The hold ran out and blanked the ring by itself
            Pattern::Hold { .. } => EngineState::Idle,
            pattern => EngineState::Running(pattern.kind()),
        }
    }
}

impl Drop for PatternEngine {
    fn drop(&mut self) {
        // Don't leave a pattern spinning on the runtime without an owner
        if let Some(task) = &self.current {
            task.running.store(false, Ordering::SeqCst);
        }
    }
}
