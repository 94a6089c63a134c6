//! Worker script resources

/// Reads the worker script text
pub trait ResourceReader: Send + Sync {
    /// Read the resource named `identifier` to a string
    fn read_as_string(&self, identifier: &str) -> std::io::Result<String>;
}
