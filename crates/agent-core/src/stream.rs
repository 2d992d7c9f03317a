//! Stream Reconciliation
//!
//! Turns the fragments of a streamed round into display instructions for a
//! terminal, and into the final answer text.
//!
//! ```text
//!            TextDelta (grows)              ToolResults
//!  Spinner ──────────────────▶ DisplayingText ──────────▶ Spinner
//!    │  ▲                          │                      (clear line,
//!    └──┘ Tick / ToolResults       └─ TextDelta            new step)
//!     next spinner frame              emit new suffix only
//! ```
//!
//! Providers sometimes replay a whole response, so the step buffer is
//! checked for exact doubling on every delta and only text beyond what is
//! already on screen is emitted.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tool::ToolResult;

/// Answer used when a round finishes without any prose
pub const FALLBACK_RESPONSE: &str = "I've processed that using my tools.";

/// Spinner frames, cycled while no text has arrived in the current step
pub const SPINNER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];

/// Extra columns blanked when clearing a line of streamed text
pub const CLEAR_MARGIN: usize = 10;

/// One item of a streamed round
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFragment {
    /// Text produced by the model in the current step
    TextDelta { delta: String },

    /// Tools ran; the next fragments belong to a new generation step
    ToolResults { results: Vec<ToolResult> },

    /// The provider made progress without producing text
    Tick,
}

impl StreamFragment {
    pub fn text(delta: impl Into<String>) -> Self {
        Self::TextDelta {
            delta: delta.into(),
        }
    }
}

/// What a terminal should do next
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayInstruction {
    /// Return to the start of the line and print the response prompt
    Prompt,

    /// Return to the start of the line and print the prompt plus a spinner frame
    Spinner(char),

    /// Append text after whatever is already shown
    Text(String),

    /// Blank `width` columns of the current line and return to its start
    Clear { width: usize },

    /// Show a static waiting marker (non-streaming rounds)
    Placeholder,
}

/// Receiver of display instructions
pub trait DisplaySink: Send {
    fn show(&mut self, instruction: DisplayInstruction);
}

impl DisplaySink for Vec<DisplayInstruction> {
    fn show(&mut self, instruction: DisplayInstruction) {
        self.push(instruction);
    }
}

/// Sink that drops everything, for rounds nobody watches
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn show(&mut self, _instruction: DisplayInstruction) {}
}

/// Collapse text made of two identical halves into one half.
///
/// Only exact doubling is detected; any other text is returned unchanged.
pub fn deduplicate(text: &str) -> &str {
    let len = text.len();
    if len == 0 || len % 2 != 0 || !text.is_char_boundary(len / 2) {
        return text;
    }

    let (first, second) = text.split_at(len / 2);
    if first == second { first } else { text }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Spinner,
    DisplayingText,
}

/// Display state for one streamed round
#[derive(Debug)]
pub struct StreamReconciler {
    /// Raw text of the current generation step
    step_buffer: String,

    /// Bytes of the deduplicated step text already on screen
    displayed_len: usize,

    mode: Mode,
    frame: usize,

    /// Deduplicated text of the latest step that produced any
    final_text: String,
}

impl Default for StreamReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReconciler {
    pub const fn new() -> Self {
        Self {
            step_buffer: String::new(),
            displayed_len: 0,
            mode: Mode::Spinner,
            frame: 0,
            final_text: String::new(),
        }
    }

    /// Whether text of the current step is on screen
    pub fn is_displaying_text(&self) -> bool {
        self.mode == Mode::DisplayingText
    }

    /// Advance the state machine by one fragment
    pub fn feed(&mut self, fragment: &StreamFragment) -> Vec<DisplayInstruction> {
        let mut out = Vec::new();

        match fragment {
            StreamFragment::ToolResults { .. } => {
                self.start_new_step(&mut out);
                self.tick(&mut out);
            }
            StreamFragment::TextDelta { delta } if !delta.is_empty() => {
                self.push_text(delta, &mut out);
            }
            StreamFragment::TextDelta { .. } | StreamFragment::Tick => self.tick(&mut out),
        }

        out
    }

    /// Final answer for the round
    pub fn finish(self) -> String {
        let text = deduplicate(self.final_text.trim());
        if text.is_empty() {
            FALLBACK_RESPONSE.to_string()
        } else {
            text.to_string()
        }
    }

    fn start_new_step(&mut self, out: &mut Vec<DisplayInstruction>) {
        if self.mode == Mode::DisplayingText && !self.step_buffer.is_empty() {
            // What is on screen is always a prefix of the raw step buffer.
            let shown = &self.step_buffer[..self.displayed_len];
            out.push(DisplayInstruction::Clear {
                width: shown.chars().count() + CLEAR_MARGIN,
            });
            out.push(DisplayInstruction::Prompt);
        }

        self.mode = Mode::Spinner;
        self.step_buffer.clear();
        self.displayed_len = 0;
    }

    fn push_text(&mut self, delta: &str, out: &mut Vec<DisplayInstruction>) {
        self.step_buffer.push_str(delta);
        let logical = deduplicate(&self.step_buffer);
        self.final_text = logical.to_string();

        if logical.len() <= self.displayed_len {
            return;
        }

        if self.mode == Mode::Spinner {
            out.push(DisplayInstruction::Prompt);
            self.mode = Mode::DisplayingText;
        }

        out.push(DisplayInstruction::Text(
            logical[self.displayed_len..].to_string(),
        ));
        self.displayed_len = logical.len();
    }

    fn tick(&mut self, out: &mut Vec<DisplayInstruction>) {
        if self.mode == Mode::Spinner {
            out.push(DisplayInstruction::Spinner(
                SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()],
            ));
            self.frame = self.frame.wrapping_add(1);
        }
    }
}

/// Pull every fragment from `fragments`, forwarding display instructions to
/// `sink`, and return the round's final text.
///
/// The stream is consumed lazily: nothing is pulled ahead of what has been
/// displayed. When the last step put no text on screen, the final text is
/// written out once the stream ends.
pub async fn reconcile<S>(fragments: S, sink: &mut dyn DisplaySink) -> Result<String>
where
    S: Stream<Item = Result<StreamFragment>>,
{
    let mut reconciler = StreamReconciler::new();
    let mut fragments = std::pin::pin!(fragments);

    while let Some(fragment) = fragments.next().await {
        for instruction in reconciler.feed(&fragment?) {
            sink.show(instruction);
        }
    }

    let on_screen = reconciler.is_displaying_text();
    let text = reconciler.finish();
    if !on_screen {
        sink.show(DisplayInstruction::Prompt);
        sink.show(DisplayInstruction::Text(text.clone()));
    }
    Ok(text)
}
