use tracing::debug;

use crate::command::{Command, CommandKind};
use crate::error::ParseError;

/// Parse one `<name>:<value>` line. The line is split at the first `:` and
/// both halves are trimmed, so the value may itself contain colons.
pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    let Some((name, value)) = line.split_once(':') else {
        return Err(ParseError::MissingDelimiter {
            line: line.to_string(),
        });
    };
    let name = name.trim();
    let value = value.trim();

    match CommandKind::from_name(name) {
        Some(kind) => {
            debug!(command = name, value, "parsed command");
            Ok(Command::build(kind, value))
        }
        None => Err(ParseError::UnknownCommand {
            name: name.to_string(),
            known: &CommandKind::NAMES,
        }),
    }
}

/// the non-blank lines of a command block, trimmed
pub fn split_batch(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Rgb565;
    use std::time::Duration;

    #[test]
    fn test_every_name_parses() {
        for name in CommandKind::NAMES {
            let c = parse_line(&format!("{name}:1")).unwrap();
            assert_eq!(c.name(), name);
        }
    }

    #[test]
    fn test_sides_are_trimmed() {
        assert_eq!(
            parse_line("  display_text_color :  red  ").unwrap(),
            Command::DisplayTextColor(Rgb565::RED)
        );
        assert_eq!(
            parse_line("delay:\t5000").unwrap(),
            Command::Delay(Duration::from_millis(5000))
        );
    }

    #[test]
    fn test_value_keeps_later_colons() {
        assert_eq!(
            parse_line("display_println:Time: 10:00").unwrap(),
            Command::DisplayPrintln("Time: 10:00".into())
        );
    }

    #[test]
    fn test_empty_value_is_allowed() {
        assert_eq!(
            parse_line("write_register:").unwrap(),
            Command::WriteRegister(String::new())
        );
    }

    #[test]
    fn test_missing_delimiter() {
        assert_eq!(
            parse_line("display_println Hello"),
            Err(ParseError::MissingDelimiter {
                line: "display_println Hello".into()
            })
        );
    }

    #[test]
    fn test_unknown_name() {
        let e = parse_line("beep:440").unwrap_err();
        match &e {
            ParseError::UnknownCommand { name, known } => {
                assert_eq!(name, "beep");
                assert_eq!(known.len(), CommandKind::ALL.len());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(e.to_string().contains("write_file"));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert!(parse_line("DELAY:10").is_err());
    }

    #[test]
    fn test_split_batch_skips_blank_lines() {
        let block = "
        display_brightness:50
        display_cursor:0,10

        display_fill_screen:green\r
        \t
        delay:5000
        ";
        let lines: Vec<_> = split_batch(block).collect();
        assert_eq!(
            lines,
            vec![
                "display_brightness:50",
                "display_cursor:0,10",
                "display_fill_screen:green",
                "delay:5000",
            ]
        );
    }
}
