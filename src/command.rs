//! # commands
//!
//! Everything the engine can be told to do. Each command is built from the
//! (already trimmed) text after the `:` in a line like
//! `display_text_color:red`, and is fully parsed at that point: there's no
//! such thing as a command with a bad parameter. Values that don't fit the
//! grammar fall back to a default instead, much like the microcontroller
//! `toInt()` the protocol was first written against:
//!
//!  * integers: optional sign then leading digits, garbage gives 0
//!  * `display_brightness`    0..=255, clamped
//!  * `display_text_size`     1..=255, clamped
//!  * `delay`                 negative gives 0ms
//!  * `display_text_hexcolor` optional `0x`/`#`, leading hex digits, low
//!    16 bits kept, garbage gives black
//!  * `display_text_color`    unknown names give white
//!  * `display_fill_screen`   unknown names give black
//!  * `display_cursor`        `x,y`; only sides that parse to > 0 move
use std::fmt;
use std::time::Duration;

use crate::console::Console;
use crate::display::{self, Display, Rgb565};
use crate::error::ExecError;
use crate::register::Register;
use crate::storage::Storage;

/// the collaborators a command can drive while it executes
pub struct Peripherals<'a> {
    pub display: &'a mut dyn Display,
    pub storage: &'a mut dyn Storage,
    pub console: &'a mut dyn Console,
}

/// The closed set of command kinds, without their parameters. This is the
/// name table for parsing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    ConsolePrintln,
    DisplayPrintln,
    DisplayBrightness,
    DisplayTextHexColor,
    DisplayTextColor,
    DisplayTextSize,
    DisplayFillScreen,
    DisplayCursor,
    Delay,
    WriteRegister,
    WriteFile,
}

impl CommandKind {
    pub const ALL: [CommandKind; 11] = [
        CommandKind::ConsolePrintln,
        CommandKind::DisplayPrintln,
        CommandKind::DisplayBrightness,
        CommandKind::DisplayTextHexColor,
        CommandKind::DisplayTextColor,
        CommandKind::DisplayTextSize,
        CommandKind::DisplayFillScreen,
        CommandKind::DisplayCursor,
        CommandKind::Delay,
        CommandKind::WriteRegister,
        CommandKind::WriteFile,
    ];

    /// every name, in the same order as [`CommandKind::ALL`]
    pub const NAMES: [&'static str; 11] = [
        "console_println",
        "display_println",
        "display_brightness",
        "display_text_hexcolor",
        "display_text_color",
        "display_text_size",
        "display_fill_screen",
        "display_cursor",
        "delay",
        "write_register",
        "write_file",
    ];

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::ConsolePrintln => "console_println",
            CommandKind::DisplayPrintln => "display_println",
            CommandKind::DisplayBrightness => "display_brightness",
            CommandKind::DisplayTextHexColor => "display_text_hexcolor",
            CommandKind::DisplayTextColor => "display_text_color",
            CommandKind::DisplayTextSize => "display_text_size",
            CommandKind::DisplayFillScreen => "display_fill_screen",
            CommandKind::DisplayCursor => "display_cursor",
            CommandKind::Delay => "delay",
            CommandKind::WriteRegister => "write_register",
            CommandKind::WriteFile => "write_file",
        }
    }

    /// exact, case-sensitive lookup
    pub fn from_name(name: &str) -> Option<CommandKind> {
        CommandKind::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One executable unit: a kind plus its validated parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ConsolePrintln(String),
    DisplayPrintln(String),
    DisplayBrightness(u8),
    DisplayTextHexColor(Rgb565),
    DisplayTextColor(Rgb565),
    DisplayTextSize(u8),
    DisplayFillScreen(Rgb565),
    /// `None` leaves that axis where it is
    DisplayCursor { x: Option<i16>, y: Option<i16> },
    Delay(Duration),
    WriteRegister(String),
    /// path to write the register to
    WriteFile(String),
}

impl Command {
    /// Build a command of `kind` from its raw parameter. Never fails; see the
    /// module docs for what out-of-grammar values turn into.
    pub fn build(kind: CommandKind, value: &str) -> Command {
        match kind {
            CommandKind::ConsolePrintln => Command::ConsolePrintln(value.to_string()),
            CommandKind::DisplayPrintln => Command::DisplayPrintln(value.to_string()),
            CommandKind::DisplayBrightness => {
                Command::DisplayBrightness(clamp_u8(to_int(value), 0))
            }
            CommandKind::DisplayTextHexColor => Command::DisplayTextHexColor(parse_hex_color(value)),
            CommandKind::DisplayTextColor => {
                Command::DisplayTextColor(named_color(value).unwrap_or(Rgb565::WHITE))
            }
            CommandKind::DisplayTextSize => Command::DisplayTextSize(clamp_u8(to_int(value), 1)),
            CommandKind::DisplayFillScreen => {
                Command::DisplayFillScreen(named_color(value).unwrap_or(Rgb565::BLACK))
            }
            CommandKind::DisplayCursor => {
                let (x, y) = parse_cursor(value);
                Command::DisplayCursor { x, y }
            }
            CommandKind::Delay => {
                Command::Delay(Duration::from_millis(to_int(value).max(0) as u64))
            }
            CommandKind::WriteRegister => Command::WriteRegister(value.to_string()),
            CommandKind::WriteFile => Command::WriteFile(value.to_string()),
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::ConsolePrintln(_) => CommandKind::ConsolePrintln,
            Command::DisplayPrintln(_) => CommandKind::DisplayPrintln,
            Command::DisplayBrightness(_) => CommandKind::DisplayBrightness,
            Command::DisplayTextHexColor(_) => CommandKind::DisplayTextHexColor,
            Command::DisplayTextColor(_) => CommandKind::DisplayTextColor,
            Command::DisplayTextSize(_) => CommandKind::DisplayTextSize,
            Command::DisplayFillScreen(_) => CommandKind::DisplayFillScreen,
            Command::DisplayCursor { .. } => CommandKind::DisplayCursor,
            Command::Delay(_) => CommandKind::Delay,
            Command::WriteRegister(_) => CommandKind::WriteRegister,
            Command::WriteFile(_) => CommandKind::WriteFile,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// run the command against the register and peripherals
    pub fn execute(&self, register: &mut Register, io: &mut Peripherals<'_>) -> Result<(), ExecError> {
        match self {
            Command::ConsolePrintln(message) => io.console.log_line(message),
            Command::DisplayPrintln(message) => io.display.println(message)?,
            Command::DisplayBrightness(level) => io.display.set_brightness(*level)?,
            Command::DisplayTextHexColor(color) | Command::DisplayTextColor(color) => {
                io.display.set_text_color(*color)?
            }
            Command::DisplayTextSize(size) => io.display.set_text_size(*size)?,
            Command::DisplayFillScreen(color) => io.display.fill_screen(*color)?,
            Command::DisplayCursor { x, y } => {
                if x.is_some() || y.is_some() {
                    let (cx, cy) = io.display.cursor();
                    io.display.set_cursor(x.unwrap_or(cx), y.unwrap_or(cy))?;
                }
            }
            Command::Delay(duration) => {
                let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                display::delay_display(io.display, ms)?
            }
            Command::WriteRegister(value) => register.set(value.as_str()),
            Command::WriteFile(path) => io.storage.write_file(path, register.get())?,
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    /// back in wire form, e.g. `display_cursor:-1,42`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.name())?;
        match self {
            Command::ConsolePrintln(s)
            | Command::DisplayPrintln(s)
            | Command::WriteRegister(s)
            | Command::WriteFile(s) => f.write_str(s),
            Command::DisplayBrightness(n) | Command::DisplayTextSize(n) => write!(f, "{n}"),
            Command::DisplayTextHexColor(c)
            | Command::DisplayTextColor(c)
            | Command::DisplayFillScreen(c) => write!(f, "{:04x}", c.0),
            Command::DisplayCursor { x, y } => {
                write!(f, "{},{}", x.unwrap_or(-1), y.unwrap_or(-1))
            }
            Command::Delay(d) => write!(f, "{}", d.as_millis()),
        }
    }
}

/// Leading signed decimal integer, the way `toInt()` reads it: parsing stops
/// at the first non-digit, no digits at all gives 0 and overflow saturates.
pub fn to_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// clamp into `min..=255`
fn clamp_u8(n: i64, min: u8) -> u8 {
    n.clamp(i64::from(min), i64::from(u8::MAX)) as u8
}

/// raw 16bit colour from hex digits, keeping the low 16 bits
fn parse_hex_color(s: &str) -> Rgb565 {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix('#'))
        .unwrap_or(s);
    let value = digits
        .chars()
        .map_while(|c| c.to_digit(16))
        .fold(0u16, |acc, d| acc.wrapping_shl(4) | d as u16);
    Rgb565(value)
}

fn named_color(s: &str) -> Option<Rgb565> {
    match s {
        "red" => Some(Rgb565::RED),
        "green" => Some(Rgb565::GREEN),
        "blue" => Some(Rgb565::BLUE),
        "white" => Some(Rgb565::WHITE),
        "black" => Some(Rgb565::BLACK),
        _ => None,
    }
}

/// `x,y` where each side only counts if it's a positive number
fn parse_cursor(s: &str) -> (Option<i16>, Option<i16>) {
    let Some((x, y)) = s.split_once(',') else {
        return (None, None);
    };
    let axis = |part: &str| {
        let n = to_int(part);
        (n > 0).then(|| n.min(i64::from(i16::MAX)) as i16)
    };
    (axis(x), axis(y))
}
