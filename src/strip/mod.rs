use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Error};
use log::{debug, info};

use crate::colour::Colour;

pub mod apa102;
pub mod sim;

#[cfg(feature = "pi")]
pub use apa102::Apa102Bus;
pub use sim::{FrameLog, SimulatedBus};

/// The ReSpeaker 4-mic hat has a ring of 12 pixels
pub const PIXELS_N: usize = 12;

pub type Frame = [Colour; PIXELS_N];

/// A strip shared between the engine and whichever pattern task is running
pub type SharedStrip = Arc<Mutex<PixelStrip>>;

/// Whatever actually moves a frame onto the LEDs.
pub trait LedBus: Send {
    /// Send one full frame. A failure here leaves the strip in an unknown
    /// state, so callers must not retry.
    fn transmit(&mut self, frame: &[Colour]) -> Result<(), Error>;

    /// Toggle the strip's power-enable line.
    fn set_power(&mut self, on: bool) -> Result<(), Error>;
}

/// Frame buffer in front of an [`LedBus`]. Pixels are staged with
/// [`PixelStrip::set_pixel`] and only reach the hardware on
/// [`PixelStrip::flush`].
pub struct PixelStrip {
    bus: Box<dyn LedBus>,
    frame: Frame,
}

impl PixelStrip {
    pub fn new(bus: impl LedBus + 'static) -> Self {
        Self {
            bus: Box::new(bus),
            frame: [Colour::BLACK; PIXELS_N],
        }
    }

    pub fn shared(self) -> SharedStrip {
        Arc::new(Mutex::new(self))
    }

    pub fn set_pixel(&mut self, index: usize, colour: Colour) -> Result<(), Error> {
        if index >= PIXELS_N {
            bail!("pixel {} is out of range (0..{})", index, PIXELS_N);
        }
        self.frame[index] = colour;
        Ok(())
    }

    pub fn fill(&mut self, colour: Colour) {
        self.frame = [colour; PIXELS_N];
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.bus
            .transmit(&self.frame)
            .context("failed to transmit frame to the LED strip")
    }

    /// Stage black on every pixel and send it.
    pub fn blank(&mut self) -> Result<(), Error> {
        self.fill(Colour::BLACK);
        self.flush()
    }

    pub fn power_on(&mut self) -> Result<(), Error> {
        info!("Powering on the LED strip");
        self.bus.set_power(true)
    }

    pub fn power_off(&mut self) -> Result<(), Error> {
        info!("Powering off the LED strip");
        let blanked = self.blank();
        self.bus.set_power(false)?;
        blanked
    }

    /// The staged frame, which is not necessarily what was last flushed.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}

/// Run `f` with the strip locked. The lock is released before returning, so
/// this must never be held across an await point.
pub fn with_strip<T>(
    strip: &SharedStrip,
    f: impl FnOnce(&mut PixelStrip) -> Result<T, Error>,
) -> Result<T, Error> {
    let mut guard = strip
        .lock()
        .map_err(|e| anyhow!("pixel strip lock is poisoned: {}", e))?;
    let result = f(&mut guard);
    if result.is_err() {
        debug!("Strip operation failed, frame was {:?}", guard.frame());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_pixel_stages_until_flush() {
        let (bus, log) = SimulatedBus::with_log();
        let mut strip = PixelStrip::new(bus);

        strip.set_pixel(3, Colour::RED).unwrap();
        assert_eq!(strip.frame()[3], Colour::RED);
        assert!(log.last_frame().is_none());

        strip.flush().unwrap();
        let frame = log.last_frame().unwrap();
        assert_eq!(frame[3], Colour::RED);
        assert_eq!(frame.iter().filter(|c| !c.is_black()).count(), 1);
    }

    #[test]
    fn test_set_pixel_out_of_range() {
        let (bus, _log) = SimulatedBus::with_log();
        let mut strip = PixelStrip::new(bus);
        assert!(strip.set_pixel(PIXELS_N, Colour::RED).is_err());
    }

    #[test]
    fn test_flush_failure_is_returned() {
        let (bus, log) = SimulatedBus::with_log();
        let mut strip = PixelStrip::new(bus);
        log.fail_transmissions(true);

        strip.fill(Colour::BLUE);
        assert!(strip.flush().is_err());
        assert!(log.last_frame().is_none());
    }

    #[test]
    fn test_power_off_blanks() {
        let (bus, log) = SimulatedBus::with_log();
        let mut strip = PixelStrip::new(bus);
        strip.power_on().unwrap();
        assert!(log.is_powered());

        strip.fill(Colour::WHITE);
        strip.flush().unwrap();
        strip.power_off().unwrap();

        assert!(!log.is_powered());
        assert_eq!(log.last_frame(), Some([Colour::BLACK; PIXELS_N]));
    }
}
