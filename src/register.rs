/// The engine's single slot of mutable text. Written by `write_register`,
/// read by `write_file`; starts out empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Register {
    data: String,
}

impl Register {
    pub fn new() -> Self {
        Self::default()
    }

    /// replace the contents entirely
    pub fn set(&mut self, value: impl Into<String>) {
        self.data = value.into();
    }

    pub fn get(&self) -> &str {
        &self.data
    }
}
