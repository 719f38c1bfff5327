use tracing::info;

/// diagnostic line sink; `console_println` writes here
pub trait Console {
    fn log_line(&mut self, line: &str);
}

/// Console backed by the process's tracing subscriber.
pub struct TracingConsole {}

impl TracingConsole {
    pub fn new() -> Self {
        TracingConsole {}
    }
}

impl Default for TracingConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TracingConsole {
    fn log_line(&mut self, line: &str) {
        info!(target: "slidebox::console", "{line}");
    }
}

/// dummy Console implementation for testing; keeps every line
#[derive(Debug, Default)]
pub struct DummyConsole {
    pub lines: Vec<String>,
}

impl DummyConsole {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Console for DummyConsole {
    fn log_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}
