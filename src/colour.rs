use std::fmt::{self, Display};

use log::warn;

/// An RGB triple as sent to a single pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Colour {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Colour {
    pub const BLACK: Colour = Colour::new(0, 0, 0);
    pub const WHITE: Colour = Colour::new(255, 255, 255);
    pub const RED: Colour = Colour::new(255, 0, 0);
    pub const GREEN: Colour = Colour::new(0, 255, 0);
    pub const BLUE: Colour = Colour::new(0, 0, 255);
    pub const YELLOW: Colour = Colour::new(255, 255, 0);
    pub const CYAN: Colour = Colour::new(0, 255, 255);
    pub const MAGENTA: Colour = Colour::new(255, 0, 255);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Look up one of the fixed colour names.
    pub fn from_name(name: &str) -> Option<Colour> {
        NAMED_COLOURS
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, colour)| *colour)
    }

    /// Like [`Colour::from_name`], but unknown names select white instead of
    /// failing the command.
    pub fn from_name_or_white(name: &str) -> Colour {
        match Colour::from_name(name) {
            Some(colour) => colour,
            None => {
                warn!("Invalid colour '{}', selecting 'white' instead", name);
                Colour::WHITE
            }
        }
    }

    pub fn is_black(&self) -> bool {
        *self == Colour::BLACK
    }
}

impl Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match NAMED_COLOURS.iter().find(|(_, colour)| colour == self) {
            Some((name, _)) => write!(f, "{}", name),
            None if self.is_black() => write!(f, "black"),
            None => write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue),
        }
    }
}

pub const NAMED_COLOURS: [(&str, Colour); 7] = [
    ("white", Colour::WHITE),
    ("red", Colour::RED),
    ("green", Colour::GREEN),
    ("blue", Colour::BLUE),
    ("yellow", Colour::YELLOW),
    ("cyan", Colour::CYAN),
    ("magenta", Colour::MAGENTA),
];
