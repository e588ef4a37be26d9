use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use anyhow::{bail, Error};
use log::trace;

use super::{Frame, LedBus, PIXELS_N};
use crate::colour::Colour;

/// A bus with no hardware behind it. Every flushed frame lands in the
/// [`FrameLog`] handed out by [`SimulatedBus::with_log`], so the daemon can run on
/// a desktop and tests can watch what the ring would have shown.
pub struct SimulatedBus {
    log: FrameLog,
}

/// Frames kept before the oldest half is thrown away
pub const MAX_LOGGED_FRAMES: usize = 4096;

#[derive(Clone, Default)]
pub struct FrameLog {
    frames: Arc<Mutex<Vec<Frame>>>,
    powered: Arc<AtomicBool>,
    fail: Arc<AtomicBool>,
}

impl SimulatedBus {
    pub fn with_log() -> (Self, FrameLog) {
        let log = FrameLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl LedBus for SimulatedBus {
    fn transmit(&mut self, frame: &[Colour]) -> Result<(), Error> {
        if self.log.fail.load(Ordering::SeqCst) {
            bail!("simulated transmission failure");
        }

        let mut copy = [Colour::BLACK; PIXELS_N];
        for (slot, colour) in copy.iter_mut().zip(frame) {
            *slot = *colour;
        }
        trace!("Frame: {:?}", copy);

        match self.log.frames.lock() {
            Ok(mut frames) => {
                if frames.len() >= MAX_LOGGED_FRAMES {
                    frames.drain(..MAX_LOGGED_FRAMES / 2);
                }
                frames.push(copy)
            }
            Err(e) => bail!("frame log is poisoned: {}", e),
        }
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<(), Error> {
        self.log.powered.store(on, Ordering::SeqCst);
        Ok(())
    }
}

impl FrameLog {
    /// The most recently flushed frame, if any.
    pub fn last_frame(&self) -> Option<Frame> {
        self.frames.lock().ok()?.last().copied()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames
            .lock()
            .map(|frames| frames.clone())
            .unwrap_or_default()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().map(|frames| frames.len()).unwrap_or(0)
    }

    pub fn is_powered(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    /// Make every following transmission fail until switched off again.
    pub fn fail_transmissions(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn is_dark(&self) -> bool {
        self.last_frame()
            .map(|frame| frame.iter().all(Colour::is_black))
            .unwrap_or(true)
    }

    /// True when the last frame shows `colour` on every pixel.
    pub fn is_solid(&self, colour: Colour) -> bool {
        self.last_frame()
            .map(|frame| frame.iter().all(|c| *c == colour))
            .unwrap_or(false)
    }

    /// Indices of the lit pixels in the last frame.
    pub fn lit_pixels(&self) -> Vec<usize> {
        self.last_frame()
            .map(|frame| {
                frame
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| !c.is_black())
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default()
    }
}
