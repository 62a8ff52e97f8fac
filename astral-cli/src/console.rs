//! Line output for an interactive session.

use std::io::{self, Write};

use log::warn;

/// Writes session output. In quiet mode only replies to console commands
/// are shown; everything the session pushes on its own is dropped.
pub struct Console {
    quiet: bool,
    out: Box<dyn Write>,
}

impl Console {
    pub fn new(quiet: bool, out: Box<dyn Write>) -> Self {
        Self { quiet, out }
    }

    pub fn stdout(quiet: bool) -> Self {
        Self::new(quiet, Box::new(io::stdout()))
    }

    /// Output the session produced by itself: transcript, state, prompts.
    pub fn notice(&mut self, line: &str) {
        if !self.quiet {
            self.write(line);
        }
    }

    /// Answer to something the user typed.
    pub fn reply(&mut self, line: &str) {
        self.write(line);
    }

    fn write(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            warn!("console write failed: {}", err);
        }
    }
}
