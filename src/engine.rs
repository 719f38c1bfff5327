//! # engine
//!
//! The dispatch loop. It owns the register and the command queue; producers
//! (stdin reader, batch loader, tests) get a cloneable [`Producer`] that only
//! ever pushes, and whoever holds the [`Engine`] itself is the one consumer.
//!
//!  * the queue sits behind a mutex shared with every producer; one push or
//!    one pop is one critical section, so an eviction can't be half done
//!  * the lock is dropped while a command executes, so a `delay` never holds
//!    producers up
//!  * `run` takes `&mut self`: two drains can't overlap, and the register is
//!    only ever touched from inside `run`
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::command::{Command, Peripherals};
use crate::error::ParseError;
use crate::parser::{parse_line, split_batch};
use crate::queue::RingBuffer;
use crate::register::Register;

/// what the engine queues up for itself so the first run shows something
pub const SELF_TEST: [&str; 3] = [
    "console_println:engine initialized",
    "display_println:engine initialized",
    "delay:1000",
];

type SharedQueue = Arc<Mutex<RingBuffer<Command>>>;

// nothing a push or pop can panic halfway through leaves the ring buffer
// inconsistent, so a poisoned lock is still usable
fn lock(queue: &SharedQueue) -> MutexGuard<'_, RingBuffer<Command>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// nothing queued
    Idle,
    /// commands waiting or being executed
    Draining,
}

/// Outcome of handing a block of lines to [`Producer::enqueue_batch`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub accepted: usize,
    pub rejected: Vec<ParseError>,
}

/// Handle for pushing commands from any thread.
#[derive(Debug, Clone)]
pub struct Producer {
    queue: SharedQueue,
}

impl Producer {
    /// queue a command; if the queue was full the oldest pending one is
    /// dropped to make room
    pub fn enqueue(&self, command: Command) {
        let evicted = lock(&self.queue).push(command);
        if let Some(old) = evicted {
            debug!(dropped = %old, "queue full, oldest command evicted");
        }
    }

    /// parse one line and queue it; a rejected line is logged and handed back
    pub fn enqueue_line(&self, line: &str) -> Result<(), ParseError> {
        match parse_line(line) {
            Ok(command) => {
                self.enqueue(command);
                Ok(())
            }
            Err(e) => {
                warn!(line, "{e}");
                Err(e)
            }
        }
    }

    /// Queue every non-blank line of `text` on its own. A bad line never
    /// stops the rest of the batch.
    pub fn enqueue_batch(&self, text: &str) -> BatchReport {
        let mut report = BatchReport::default();
        self.feed(text, &mut report);
        report
    }

    /// like [`Producer::enqueue_batch`], but tallies into an existing report
    /// so a stream of lines can be fed a piece at a time
    pub fn feed(&self, text: &str, report: &mut BatchReport) {
        for line in split_batch(text) {
            match self.enqueue_line(line) {
                Ok(()) => report.accepted += 1,
                Err(e) => report.rejected.push(e),
            }
        }
    }

    /// commands waiting to run
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }
}

/// The dispatch loop: one register, one bounded queue.
pub struct Engine {
    register: Register,
    queue: SharedQueue,
    producer: Producer,
}

impl Engine {
    /// engine with `capacity` queue slots and the self-test already queued
    pub fn new(capacity: usize) -> Engine {
        let engine = Engine::without_self_test(capacity);
        for line in SELF_TEST {
            // the self-test lines are fixed and known-good
            if let Err(e) = engine.producer.enqueue_line(line) {
                warn!("self-test line rejected: {e}");
            }
        }
        engine
    }

    /// engine with an empty queue
    pub fn without_self_test(capacity: usize) -> Engine {
        let queue: SharedQueue = Arc::new(Mutex::new(RingBuffer::with_capacity(capacity)));
        Engine {
            register: Register::new(),
            producer: Producer {
                queue: Arc::clone(&queue),
            },
            queue,
        }
    }

    pub fn producer(&self) -> Producer {
        self.producer.clone()
    }

    pub fn enqueue(&self, command: Command) {
        self.producer.enqueue(command)
    }

    pub fn enqueue_line(&self, line: &str) -> Result<(), ParseError> {
        self.producer.enqueue_line(line)
    }

    pub fn enqueue_batch(&self, text: &str) -> BatchReport {
        self.producer.enqueue_batch(text)
    }

    pub fn register(&self) -> &Register {
        &self.register
    }

    pub fn state(&self) -> EngineState {
        if lock(&self.queue).is_empty() {
            EngineState::Idle
        } else {
            EngineState::Draining
        }
    }

    /// Drain the queue, executing each command in order. Stops when the queue
    /// is empty or after one queue's worth of commands, whichever is first,
    /// and returns how many ran. A failing command is logged and skipped
    /// over; it never stops the ones behind it.
    pub fn run(&mut self, io: &mut Peripherals<'_>) -> usize {
        let budget = lock(&self.queue).capacity();
        let mut executed = 0;
        while executed < budget {
            // the guard is a temporary here, so it's gone before execute
            let Some(command) = lock(&self.queue).pop() else {
                break;
            };
            if executed == 0 {
                info!("running engine");
            }
            debug!(command = command.name(), "executing instruction");
            if let Err(e) = command.execute(&mut self.register, io) {
                warn!(command = %command, "instruction failed: {e}");
            }
            executed += 1;
        }
        if executed > 0 {
            info!(executed, "engine run completed");
        }
        executed
    }
}
