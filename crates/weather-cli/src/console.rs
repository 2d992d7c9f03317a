//! Terminal rendering of display instructions

use std::io::{self, Write};

use agent_core::{DisplayInstruction, DisplaySink};

/// Label in front of every assistant answer
pub const BOT_PROMPT: &str = "Bot: ";

const PLACEHOLDER: &str = "█";

/// Writes display instructions to a terminal-like output
pub struct Console<W: Write + Send = io::Stdout> {
    out: W,
}

impl Console {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> Console<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print text without ending the line
    pub fn write(&mut self, text: &str) {
        self.emit(|out| out.write_all(text.as_bytes()));
    }

    /// Print a full line
    pub fn line(&mut self, text: &str) {
        self.emit(|out| writeln!(out, "{text}"));
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    fn emit(&mut self, write: impl FnOnce(&mut W) -> io::Result<()>) {
        if let Err(error) = write(&mut self.out).and_then(|()| self.out.flush()) {
            tracing::warn!(%error, "Failed to write to the terminal");
        }
    }
}

fn render(out: &mut impl Write, instruction: &DisplayInstruction) -> io::Result<()> {
    match instruction {
        DisplayInstruction::Prompt => write!(out, "\r{BOT_PROMPT}"),
        DisplayInstruction::Spinner(frame) => write!(out, "\r{BOT_PROMPT}{frame}"),
        DisplayInstruction::Text(text) => out.write_all(text.as_bytes()),
        DisplayInstruction::Clear { width } => write!(out, "\r{}\r", " ".repeat(*width)),
        DisplayInstruction::Placeholder => out.write_all(PLACEHOLDER.as_bytes()),
    }
}

impl<W: Write + Send> DisplaySink for Console<W> {
    fn show(&mut self, instruction: DisplayInstruction) {
        self.emit(|out| render(out, &instruction));
    }
}
