use std::{
    fmt::{self, Display},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Error;
use log::debug;
use tokio::{
    task::yield_now,
    time::{sleep, Instant},
};

use crate::{
    colour::Colour,
    strip::{with_strip, SharedStrip, PIXELS_N},
};

pub const DEFAULT_HOLDTIME: Duration = Duration::from_secs(5);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Longest a pattern sleeps before looking at its running flag again. This
/// bounds how long `stop` waits for a pattern to notice it was cancelled.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

/// A fully parameterised pattern, ready to run on the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pattern {
    /// Light every pixel once and leave them on until superseded
    Solid { colour: Colour },
    /// Solid for `holdtime`, then blank. While it runs, `off` is ignored.
    Hold { colour: Colour, holdtime: Duration },
    /// Half an interval on, half an interval off, forever
    Flash { colour: Colour, interval: Duration },
    /// A single lit pixel going round the ring once per interval
    Spin {
        colour: Colour,
        interval: Duration,
        direction: Direction,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternKind {
    Solid,
    Hold,
    Flash,
    Spin,
}

impl Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatternKind::Solid => "solid",
            PatternKind::Hold => "hold",
            PatternKind::Flash => "flash",
            PatternKind::Spin => "spin",
        };
        write!(f, "{}", name)
    }
}

/// Everything a running pattern may touch.
pub struct PatternContext {
    pub strip: SharedStrip,
    /// Cleared by the engine to ask the pattern to return
    pub running: Arc<AtomicBool>,
    /// The hold latch, which only a hold that ran to completion clears itself
    pub holding: Arc<AtomicBool>,
}

impl PatternContext {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in slices of at most [`POLL_INTERVAL`]. Returns
    /// false as soon as the pattern has been cancelled.
    pub async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            // Still give the runtime a turn
            yield_now().await;
        }
        let deadline = Instant::now() + duration;
        loop {
            if !self.is_running() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            sleep((deadline - now).min(POLL_INTERVAL)).await;
        }
    }

    fn show_solid(&self, colour: Colour) -> Result<(), Error> {
        with_strip(&self.strip, |strip| {
            strip.fill(colour);
            strip.flush()
        })
    }

    fn show_pixel(&self, index: usize, colour: Colour) -> Result<(), Error> {
        with_strip(&self.strip, |strip| {
            strip.set_pixel(index, colour)?;
            strip.flush()
        })
    }
}

impl Pattern {
    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::Solid { .. } => PatternKind::Solid,
            Pattern::Hold { .. } => PatternKind::Hold,
            Pattern::Flash { .. } => PatternKind::Flash,
            Pattern::Spin { .. } => PatternKind::Spin,
        }
    }

    pub fn colour(&self) -> Colour {
        match self {
            Pattern::Solid { colour }
            | Pattern::Hold { colour, .. }
            | Pattern::Flash { colour, .. }
            | Pattern::Spin { colour, .. } => *colour,
        }
    }

    /// Run until finished or cancelled. Any error comes from the strip and
    /// means the hardware is in an unknown state.
    pub async fn run(self, ctx: PatternContext) -> Result<(), Error> {
        debug!("Pattern {:?} starting", self);
        match self {
            Pattern::Solid { colour } => solid(&ctx, colour),
            Pattern::Hold { colour, holdtime } => hold(&ctx, colour, holdtime).await,
            Pattern::Flash { colour, interval } => flash(&ctx, colour, interval).await,
            Pattern::Spin {
                colour,
                interval,
                direction,
            } => spin(&ctx, colour, interval, direction).await,
        }
    }
}

fn solid(ctx: &PatternContext, colour: Colour) -> Result<(), Error> {
    if !ctx.is_running() {
        return Ok(());
    }
    ctx.show_solid(colour)
}

async fn hold(ctx: &PatternContext, colour: Colour, holdtime: Duration) -> Result<(), Error> {
    solid(ctx, colour)?;

    if !ctx.pause(holdtime).await {
        debug!("Hold cancelled before its deadline");
        return Ok(());
    }

    ctx.show_solid(Colour::BLACK)?;
    ctx.holding.store(false, Ordering::SeqCst);
    debug!("Hold of {:?} expired", holdtime);
    Ok(())
}

async fn flash(ctx: &PatternContext, colour: Colour, interval: Duration) -> Result<(), Error> {
    let half = interval / 2;
    while ctx.is_running() {
        ctx.show_solid(colour)?;
        if !ctx.pause(half).await {
            break;
        }
        ctx.show_solid(Colour::BLACK)?;
        if !ctx.pause(half).await {
            break;
        }
    }
    Ok(())
}

async fn spin(
    ctx: &PatternContext,
    colour: Colour,
    interval: Duration,
    direction: Direction,
) -> Result<(), Error> {
    let step = interval / PIXELS_N as u32;
    let mut pixel = match direction {
        Direction::Clockwise => 0,
        Direction::CounterClockwise => PIXELS_N - 1,
    };

    // Start from a dark ring so only the spinning pixel is lit
    ctx.show_solid(Colour::BLACK)?;

    while ctx.is_running() {
        ctx.show_pixel(pixel, colour)?;
        if !ctx.pause(step).await {
            break;
        }
        ctx.show_pixel(pixel, Colour::BLACK)?;

        pixel = match direction {
            Direction::Clockwise => (pixel + 1) % PIXELS_N,
            Direction::CounterClockwise => (pixel + PIXELS_N - 1) % PIXELS_N,
        };
    }
    Ok(())
}
