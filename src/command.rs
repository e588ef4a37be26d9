//! Parsing of the one-line text commands that arrive on the fifo.
//!
//! A command is an action name followed by arguments, all separated by
//! whitespace:
//!
//! ```text
//! flash colour=cyan interval=2
//! spin colour=green interval=1.2 direction=ccw
//! on red
//! hold white 5
//! ```
//!
//! `key=value` is the current form. The bare colour (and the bare hold time
//! after it) is the older positional form, which is still accepted.

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    str::FromStr,
    time::Duration,
};

use log::warn;
use thiserror::Error;

use crate::{
    colour::Colour,
    pattern::{Direction, Pattern, DEFAULT_HOLDTIME, DEFAULT_INTERVAL},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Off,
    Stop,
    Solid,
    Hold,
    Flash,
    Spin,
}

impl Action {
    /// `off` and `stop` blank the ring instead of starting a pattern
    pub fn is_off(&self) -> bool {
        matches!(self, Action::Off | Action::Stop)
    }
}

impl FromStr for Action {
    type Err = CommandError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "off" => Ok(Action::Off),
            "stop" => Ok(Action::Stop),
            "on" | "solid" => Ok(Action::Solid),
            "hold" => Ok(Action::Hold),
            "flash" | "blink" => Ok(Action::Flash),
            "spin" | "rotate" => Ok(Action::Spin),
            other => Err(CommandError::UnknownAction(other.to_string())),
        }
    }
}

/// An argument value. Anything that reads as an integer becomes one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgValue {
    Int(i64),
    Text(String),
}

impl ArgValue {
    pub fn parse(value: &str) -> ArgValue {
        match value.parse::<i64>() {
            Ok(int) => ArgValue::Int(int),
            Err(_) => ArgValue::Text(value.to_string()),
        }
    }
}

impl Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Int(int) => write!(f, "{}", int),
            ArgValue::Text(text) => write!(f, "{}", text),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("no command given")]
    Empty,
    #[error("invalid command '{0}'")]
    UnknownAction(String),
    #[error("malformed argument '{0}', expected key=value")]
    MalformedArgument(String),
    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    /// `None` when no colour was given at all
    pub colour: Option<Colour>,
    pub args: BTreeMap<String, ArgValue>,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let mut tokens = line.split_whitespace();
        let action: Action = tokens.next().ok_or(CommandError::Empty)?.parse()?;

        let mut colour = None;
        let mut args = BTreeMap::new();

        for token in tokens {
            match token.split_once('=') {
                Some((key, value)) => {
                    if key.is_empty() || value.is_empty() || value.contains('=') {
                        return Err(CommandError::MalformedArgument(token.to_string()));
                    }
                    match key {
                        "colour" | "color" => colour = Some(Colour::from_name_or_white(value)),
                        _ => {
                            args.insert(key.to_string(), ArgValue::parse(value));
                        }
                    }
                }
                None => match ArgValue::parse(token) {
                    ArgValue::Int(secs) if !args.contains_key("holdtime") => {
                        args.insert("holdtime".to_string(), ArgValue::Int(secs));
                    }
                    _ if colour.is_none() => colour = Some(Colour::from_name_or_white(token)),
                    _ => warn!("Ignoring extra argument '{}'", token),
                },
            }
        }

        Ok(Command {
            action,
            colour,
            args,
        })
    }

    /// The pattern this command asks for, or `None` for `off` and `stop`.
    pub fn pattern(&self) -> Result<Option<Pattern>, CommandError> {
        let colour = self.colour.unwrap_or(Colour::WHITE);

        let known: &[&str] = match self.action {
            Action::Off | Action::Stop | Action::Solid => &[],
            Action::Hold => &["holdtime"],
            Action::Flash => &["interval"],
            Action::Spin => &["interval", "direction"],
        };
        for key in self.args.keys().filter(|key| !known.contains(&key.as_str())) {
            warn!("Ignoring unknown argument '{}' for {:?}", key, self.action);
        }

        let pattern = match self.action {
            Action::Off | Action::Stop => return Ok(None),
            Action::Solid => Pattern::Solid { colour },
            Action::Hold => Pattern::Hold {
                colour,
                holdtime: self.seconds("holdtime", DEFAULT_HOLDTIME, true)?,
            },
            Action::Flash => Pattern::Flash {
                colour,
                interval: self.seconds("interval", DEFAULT_INTERVAL, false)?,
            },
            Action::Spin => Pattern::Spin {
                colour,
                interval: self.seconds("interval", DEFAULT_INTERVAL, false)?,
                direction: self.direction()?,
            },
        };

        Ok(Some(pattern))
    }

    /// Read `key` as whole or fractional seconds.
    fn seconds(
        &self,
        key: &str,
        default: Duration,
        allow_zero: bool,
    ) -> Result<Duration, CommandError> {
        let Some(value) = self.args.get(key) else {
            return Ok(default);
        };

        let secs = match value {
            ArgValue::Int(secs) => Some(*secs as f64),
            ArgValue::Text(text) => text.parse::<f64>().ok(),
        };

        // Millisecond resolution is plenty for the ring
        let duration = secs
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| Duration::from_millis((secs * 1000.0).round() as u64));

        match duration {
            Some(duration) if allow_zero || !duration.is_zero() => Ok(duration),
            _ => Err(CommandError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    fn direction(&self) -> Result<Direction, CommandError> {
        match self.args.get("direction") {
            None => Ok(Direction::Clockwise),
            Some(ArgValue::Text(text)) if text == "cw" => Ok(Direction::Clockwise),
            Some(ArgValue::Text(text)) if text == "ccw" => Ok(Direction::CounterClockwise),
            Some(other) => Err(CommandError::InvalidValue {
                key: "direction".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(line: &str) -> Option<Pattern> {
        Command::parse(line).unwrap().pattern().unwrap()
    }

    #[test]
    fn test_key_value_form() {
        let command = Command::parse("flash colour=cyan interval=2").unwrap();
        assert_eq!(command.action, Action::Flash);
        assert_eq!(command.colour, Some(Colour::CYAN));
        assert_eq!(command.args.get("interval"), Some(&ArgValue::Int(2)));

        assert_eq!(
            command.pattern().unwrap(),
            Some(Pattern::Flash {
                colour: Colour::CYAN,
                interval: Duration::from_secs(2),
            })
        );
    }

    #[test]
    fn test_legacy_positional_form() {
        assert_eq!(
            pattern("on red"),
            Some(Pattern::Solid {
                colour: Colour::RED
            })
        );
        assert_eq!(
            pattern("hold white 5"),
            Some(Pattern::Hold {
                colour: Colour::WHITE,
                holdtime: Duration::from_secs(5),
            })
        );
        assert_eq!(
            pattern("hold 5"),
            Some(Pattern::Hold {
                colour: Colour::WHITE,
                holdtime: Duration::from_secs(5),
            })
        );
        assert_eq!(Command::parse("hold 5").unwrap().colour, None);
        assert_eq!(
            pattern("hold 3 red"),
            Some(Pattern::Hold {
                colour: Colour::RED,
                holdtime: Duration::from_secs(3),
            })
        );
    }

    #[test]
    fn test_aliases_and_defaults() {
        assert_eq!(
            pattern("blink"),
            Some(Pattern::Flash {
                colour: Colour::WHITE,
                interval: DEFAULT_INTERVAL,
            })
        );
        assert_eq!(
            pattern("rotate color=blue"),
            Some(Pattern::Spin {
                colour: Colour::BLUE,
                interval: DEFAULT_INTERVAL,
                direction: Direction::Clockwise,
            })
        );
        assert_eq!(
            pattern("hold colour=red"),
            Some(Pattern::Hold {
                colour: Colour::RED,
                holdtime: DEFAULT_HOLDTIME,
            })
        );
        assert_eq!(pattern("solid"), Some(Pattern::Solid { colour: Colour::WHITE }));
    }

    #[test]
    fn test_fractional_interval_and_direction() {
        assert_eq!(
            pattern("spin colour=green interval=1.2 direction=ccw"),
            Some(Pattern::Spin {
                colour: Colour::GREEN,
                interval: Duration::from_millis(1200),
                direction: Direction::CounterClockwise,
            })
        );
    }

    #[test]
    fn test_unknown_colour_is_white() {
        assert_eq!(
            pattern("on colour=foo"),
            Some(Pattern::Solid {
                colour: Colour::WHITE
            })
        );
    }

    #[test]
    fn test_off_and_stop() {
        for line in ["off", "stop", "off red"] {
            let command = Command::parse(line).unwrap();
            assert!(command.action.is_off());
            assert_eq!(command.pattern().unwrap(), None);
        }
    }

    #[test]
    fn test_values_coerced_to_integers() {
        let command = Command::parse("spin x=12 y=-3 z=abc").unwrap();
        assert_eq!(command.args.get("x"), Some(&ArgValue::Int(12)));
        assert_eq!(command.args.get("y"), Some(&ArgValue::Int(-3)));
        assert_eq!(command.args.get("z"), Some(&ArgValue::Text("abc".to_string())));

        // Unknown keys are ignored, not fatal
        assert!(command.pattern().unwrap().is_some());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(
            Command::parse("dance red"),
            Err(CommandError::UnknownAction("dance".to_string()))
        );
        // Action names are case-sensitive
        assert_eq!(
            Command::parse("On red"),
            Err(CommandError::UnknownAction("On".to_string()))
        );
        for bad in ["on =red", "on colour=", "flash interval=1=2"] {
            assert!(matches!(
                Command::parse(bad),
                Err(CommandError::MalformedArgument(_))
            ));
        }
    }

    #[test]
    fn test_invalid_values() {
        for bad in [
            "flash interval=0",
            "flash interval=0.0001",
            "spin interval=0.0004",
            "flash interval=fast",
            "spin interval=-1",
            "hold holdtime=-2",
            "spin direction=up",
            "spin direction=1",
        ] {
            let command = Command::parse(bad).unwrap();
            assert!(
                matches!(command.pattern(), Err(CommandError::InvalidValue { .. })),
                "{} should be rejected",
                bad
            );
        }

        assert_eq!(
            pattern("hold holdtime=0"),
            Some(Pattern::Hold {
                colour: Colour::WHITE,
                holdtime: Duration::ZERO,
            })
        );
        assert_eq!(
            pattern("flash interval=0.001"),
            Some(Pattern::Flash {
                colour: Colour::WHITE,
                interval: Duration::from_millis(1),
            })
        );
    }
}
