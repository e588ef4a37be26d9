// High-level overview:
//
//           fifo                             start/stop                  set pixel/flush
// client --------> CommandPipe -> Dispatcher ----------> PatternEngine -> Pattern -----------------> PixelStrip -> LedBus
//                                                                                                                 (APA102 over SPI)

pub mod colour;
pub mod command;
pub mod config;
pub mod daemon;
pub mod dispatcher;
pub mod engine;
pub mod pattern;
pub mod pipe;
pub mod strip;

pub mod prelude {
    #[cfg(feature = "pi")]
    pub use crate::strip::Apa102Bus;
    pub use crate::{
        colour::Colour,
        command::{Action, Command, CommandError},
        config::Config,
        daemon::{termination_signal, Daemon},
        dispatcher::Dispatcher,
        engine::{EngineState, PatternEngine},
        pattern::{Direction, Pattern, PatternKind},
        pipe::{send_command, CommandPipe, Owner},
        strip::{FrameLog, LedBus, PixelStrip, SimulatedBus, PIXELS_N},
    };
}
