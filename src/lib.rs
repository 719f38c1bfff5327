//!
//! ## Design
//!
//! * a small picture frame: 320x170 RGB565 panel, flash storage, a serial
//!   console, and an operator who sends it text commands
//! * abstract display so can plug alternatives; TUI in-console, headless
//!   (logs only) and a recorder for tests
//! * commands are executed by a tiny engine, which is *not* a VM: no
//!   branching, no arithmetic, no program counter. A flat list runs once,
//!   in order, and stops
//!
//! Enums to represent:
//!
//! * the command set
//!    - closed; each variant already holds its parsed parameters
//!    - building one never fails, out-of-grammar values get defaults
//! * the queue
//!    - fixed size ring buffer, oldest entry is overwritten when full
//! * the engine itself
//!    - pub .run() -- drain the queue, executing each command in order
//!    - producers push from any thread through a cloneable handle
//! * display, with trait for rendering
//! * storage, with trait for reading/writing device paths
//! * console, with trait for diagnostic lines
//!
//! Model
//!
//! Environment (main)
//!  |-- settings, display, storage, console, input
//!  |-- engine(queue, register)
//!  |    `-- producers (stdin reader, batch file)
//!  `-- main loop
//!       |-- input.poll_control()      // quit / skip slide
//!       |-- slideshow.show_next()     // picture + captions, then wait
//!       `-- engine.run()              // drain whatever was queued meanwhile
pub mod command;
pub mod config;
pub mod console;
pub mod display;
pub mod engine;
pub mod error;
pub mod input;
pub mod parser;
pub mod queue;
pub mod register;
pub mod slideshow;
pub mod storage;

pub use command::{Command, CommandKind, Peripherals};
pub use engine::{BatchReport, Engine, EngineState, Producer};
pub use error::{ExecError, ParseError, StorageError};
pub use register::Register;
