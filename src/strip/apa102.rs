use anyhow::{anyhow, Error};
use packed_struct::prelude::*;

use crate::colour::Colour;

#[cfg(feature = "pi")]
use {
    super::LedBus,
    crate::config::StripConfig,
    log::{info, trace},
    rppal::{
        gpio::{Gpio, OutputPin},
        spi::{Bus, Mode, SlaveSelect, Spi},
    },
};

/// Largest value of the 5-bit global brightness field
pub const MAX_BRIGHTNESS: u8 = 31;

const START_FRAME: [u8; 4] = [0x00; 4];
// Supplies more than the n/2 extra clock edges needed to push the last pixel
// through a 12 pixel chain.
const END_FRAME: [u8; 4] = [0xFF; 4];

// frame # | Bits & Definition
// LED:
// 0       | 0xE0000000 = Marker, always 0b111
//         | 0x1F000000 = Global brightness
//         | 0x00FF0000 = Blue
//         | 0x0000FF00 = Green
//         | 0x000000FF = Red
#[derive(PackedStruct, Default, Debug, PartialEq, Clone)]
#[packed_struct(bit_numbering = "msb0")]
pub struct LedFramePack {
    #[packed_field(bits = "0..=2")]
    pub _marker: ReservedOne<packed_bits::Bits<3>>,
    #[packed_field(bits = "3..=7")]
    pub brightness: Integer<u8, packed_bits::Bits<5>>,
    #[packed_field(bits = "8..=15")]
    pub blue: u8,
    #[packed_field(bits = "16..=23")]
    pub green: u8,
    #[packed_field(bits = "24..=31")]
    pub red: u8,
}

impl LedFramePack {
    pub fn new(colour: Colour, brightness: u8) -> Self {
        LedFramePack {
            brightness: brightness.min(MAX_BRIGHTNESS).into(),
            blue: colour.blue,
            green: colour.green,
            red: colour.red,
            ..Default::default()
        }
    }
}

/// Build the full byte stream for one frame: start frame, one LED frame per
/// pixel, end frame.
pub fn encode_frame(frame: &[Colour], brightness: u8) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::with_capacity(START_FRAME.len() + frame.len() * 4 + END_FRAME.len());
    bytes.extend_from_slice(&START_FRAME);

    for colour in frame {
        let pack = LedFramePack::new(*colour, brightness)
            .pack()
            .map_err(|e| anyhow!("failed to pack LED frame: {:?}", e))?;
        bytes.extend_from_slice(&pack);
    }

    bytes.extend_from_slice(&END_FRAME);
    Ok(bytes)
}

/// APA102 ring on the Raspberry Pi SPI bus, with its supply switched through
/// a GPIO pin.
#[cfg(feature = "pi")]
pub struct Apa102Bus {
    spi: Spi,
    power: OutputPin,
    brightness: u8,
}

#[cfg(feature = "pi")]
impl Apa102Bus {
    pub fn init(config: &StripConfig) -> Result<Self, Error> {
        let bus = match config.spi_bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            other => return Err(anyhow!("unsupported SPI bus {}", other)),
        };
        let slave_select = match config.slave_select {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => return Err(anyhow!("unsupported SPI slave select {}", other)),
        };

        info!(
            "Opening APA102 strip on SPI{}.{} at {} Hz, power on GPIO {}",
            config.spi_bus, config.slave_select, config.clock_hz, config.power_pin
        );

        let spi = Spi::new(bus, slave_select, config.clock_hz, Mode::Mode0)?;
        let power = Gpio::new()?.get(config.power_pin)?.into_output();

        Ok(Apa102Bus {
            spi,
            power,
            brightness: config.brightness,
        })
    }
}

#[cfg(feature = "pi")]
impl LedBus for Apa102Bus {
    fn transmit(&mut self, frame: &[Colour]) -> Result<(), Error> {
        let bytes = encode_frame(frame, self.brightness)?;
        trace!("SPI write of {} bytes", bytes.len());
        self.spi.write(&bytes)?;
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<(), Error> {
        match on {
            true => self.power.set_high(),
            false => self.power.set_low(),
        }
        Ok(())
    }
}
