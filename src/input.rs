use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::io::BufRead;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::{BatchReport, Producer};

/// what the operator at the keyboard can ask the main loop for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Quit,
    NextSlide,
}

/// keys the panel window listens to
const KEYMAP: [(char, Control); 3] = [
    ('q', Control::Quit),
    ('n', Control::NextSlide),
    (' ', Control::NextSlide),
];

/// reads operator controls without blocking
pub trait Input {
    /// the next pending control, if there is one
    fn poll_control(&mut self) -> Result<Option<Control>, io::Error>;
}

/// Input from the terminal's key events. Expects the terminal to already be
/// in raw mode (the terminal display does that).
pub struct KeyboardInput {
    keymap: HashMap<char, Control>,
}

impl KeyboardInput {
    pub fn new() -> Self {
        KeyboardInput {
            keymap: HashMap::from(KEYMAP),
        }
    }
}

impl Default for KeyboardInput {
    fn default() -> Self {
        Self::new()
    }
}

impl Input for KeyboardInput {
    fn poll_control(&mut self) -> Result<Option<Control>, io::Error> {
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(evt) => match evt.code {
                    KeyCode::Char('c') if evt.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(Some(Control::Quit))
                    }
                    KeyCode::Char(key) => match self.keymap.get(&key) {
                        Some(control) => return Ok(Some(*control)),
                        None => debug!(?key, "unmapped key"),
                    },
                    KeyCode::Esc => return Ok(Some(Control::Quit)),
                    KeyCode::Right => return Ok(Some(Control::NextSlide)),
                    _ => debug!("unknown key event received"),
                },
                _ => debug!("non-key event received"),
            }
        }
        Ok(None)
    }
}

/// scripted Input for testing and for running without a terminal
#[derive(Debug, Default)]
pub struct DummyInput {
    controls: VecDeque<Control>,
}

impl DummyInput {
    pub fn new(controls: &[Control]) -> Self {
        DummyInput {
            controls: controls.iter().copied().collect(),
        }
    }
}

impl Input for DummyInput {
    fn poll_control(&mut self) -> Result<Option<Control>, io::Error> {
        Ok(self.controls.pop_front())
    }
}

/// Feed every line read from `reader` to `producer`, on its own thread. The
/// thread ends at end of input (or on a read error) and hands back what it
/// accepted and rejected.
pub fn spawn_line_reader<R>(reader: R, producer: Producer) -> JoinHandle<BatchReport>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        let mut report = BatchReport::default();
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "stopped reading commands");
                    break;
                }
            };
            producer.feed(&line, &mut report);
        }
        info!(
            accepted = report.accepted,
            rejected = report.rejected.len(),
            "command input closed"
        );
        report
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use std::io::Cursor;

    #[test]
    fn test_dummy_input_replays_controls() -> Result<(), io::Error> {
        let mut i = DummyInput::new(&[Control::NextSlide, Control::Quit]);
        assert_eq!(i.poll_control()?, Some(Control::NextSlide));
        assert_eq!(i.poll_control()?, Some(Control::Quit));
        assert_eq!(i.poll_control()?, None);
        Ok(())
    }

    #[test]
    fn test_keymap_has_quit() {
        let k = KeyboardInput::new();
        assert_eq!(k.keymap.get(&'q'), Some(&Control::Quit));
    }

    #[test]
    fn test_line_reader_feeds_producer() {
        let engine = Engine::without_self_test(100);
        let input = Cursor::new("display_brightness:50\n\n  \t\nbogus\n  write_register:hi  \n");
        let report = spawn_line_reader(input, engine.producer()).join().unwrap();
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(engine.producer().pending(), 2);
    }
}
