//! Worker script sources

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use wh_core::ResourceReader;

/// Reads scripts from files under a root directory
#[derive(Debug, Clone)]
pub struct FileResourceReader {
    root: PathBuf,
}

impl FileResourceReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceReader for FileResourceReader {
    fn read_as_string(&self, identifier: &str) -> io::Result<String> {
        std::fs::read_to_string(self.root.join(identifier))
    }
}

/// Serves scripts embedded in the binary
#[derive(Debug, Clone, Default)]
pub struct StaticResourceReader {
    resources: HashMap<String, &'static str>,
}

impl StaticResourceReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `text` under `identifier`
    pub fn with(mut self, identifier: impl Into<String>, text: &'static str) -> Self {
        self.resources.insert(identifier.into(), text);
        self
    }
}

impl ResourceReader for StaticResourceReader {
    fn read_as_string(&self, identifier: &str) -> io::Result<String> {
        self.resources
            .get(identifier)
            .map(|text| text.to_string())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no embedded resource named {}", identifier),
                )
            })
    }
}
