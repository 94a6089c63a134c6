//! Worker log framing
//!
//! The worker writes log entries to stdout and stderr, but the host receives
//! that output one line at a time. A multi-line entry is therefore framed by
//! a trailing NUL: lines accumulate until one ends with the terminator, and
//! the whole block is then emitted as a single message.

/// Marks the final line of a log message
pub const MESSAGE_TERMINATOR: char = '\0';

/// Per-stream accumulator that reassembles framed log messages
#[derive(Debug, Default)]
pub struct LogAccumulator {
    buffer: String,
}

impl LogAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Feed one output line (without its newline)
    ///
    /// Returns the complete message when `line` carries the terminator.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        self.buffer.push_str(line);

        if line.ends_with(MESSAGE_TERMINATOR) {
            self.buffer.pop();
            return Some(std::mem::take(&mut self.buffer));
        }

        self.buffer.push('\n');
        None
    }

    /// Text received since the last complete message
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Check whether a partial message is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drain an unterminated message, e.g. when the stream closes
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }

        let mut message = std::mem::take(&mut self.buffer);
        if message.ends_with('\n') {
            message.pop();
        }
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiline_message() {
        let mut acc = LogAccumulator::new();

        assert_eq!(acc.push_line("part1"), None);
        assert_eq!(acc.push_line("part2\0"), Some("part1\npart2".to_string()));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_single_line_message() {
        let mut acc = LogAccumulator::new();
        assert_eq!(acc.push_line("ready\0"), Some("ready".to_string()));
        assert_eq!(acc.pending(), "");
    }

    #[test]
    fn test_empty_terminated_line() {
        let mut acc = LogAccumulator::new();
        acc.push_line("first");
        assert_eq!(acc.push_line("\0"), Some("first\n".to_string()));
    }

    #[test]
    fn test_messages_do_not_bleed() {
        let mut acc = LogAccumulator::new();
        assert_eq!(acc.push_line("a\0"), Some("a".to_string()));
        assert_eq!(acc.push_line("b"), None);
        assert_eq!(acc.pending(), "b\n");
        assert_eq!(acc.push_line("c\0"), Some("b\nc".to_string()));
    }

    #[test]
    fn test_flush_partial() {
        let mut acc = LogAccumulator::new();
        acc.push_line("dangling");
        acc.push_line("lines");
        assert_eq!(acc.flush(), Some("dangling\nlines".to_string()));
        assert_eq!(acc.flush(), None);
    }
}
