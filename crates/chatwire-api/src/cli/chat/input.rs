//! Line input for the interactive chat.
//!
//! Wraps `rustyline_async::Readline`. Ctrl+C and Ctrl+D arrive as input
//! events instead of signals, and anything written through the returned
//! `SharedWriter` is drawn above the prompt instead of over it.

use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};

/// What the user did at the prompt.
#[derive(Debug, PartialEq)]
pub enum InputEvent {
    /// A submitted line, trimmed.
    Line(String),
    /// Ctrl+D, or the terminal went away.
    Eof,
    /// Ctrl+C.
    Interrupted,
}

impl From<Result<ReadlineEvent, ReadlineError>> for InputEvent {
    fn from(result: Result<ReadlineEvent, ReadlineError>) -> Self {
        match result {
            Ok(ReadlineEvent::Line(line)) => InputEvent::Line(line.trim().to_string()),
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(err) => {
                tracing::debug!(error = %err, "readline failed, treating as end of input");
                InputEvent::Eof
            }
        }
    }
}

pub struct ChatInput {
    rl: Readline,
}

impl ChatInput {
    /// Put the terminal into line-editing mode with `prompt`.
    ///
    /// The `SharedWriter` is the only safe way to print while the prompt is
    /// active.
    pub fn new(prompt: String) -> Result<(Self, SharedWriter), ReadlineError> {
        let (rl, writer) = Readline::new(prompt)?;
        Ok((Self { rl }, writer))
    }

    /// Wait for the next line or control key.
    pub async fn read_line(&mut self) -> InputEvent {
        self.rl.readline().await.into()
    }

    /// Write out anything still buffered in the shared writer.
    pub fn flush(&mut self) {
        if let Err(err) = self.rl.flush() {
            tracing::debug!(error = %err, "failed to flush chat output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_trimmed() {
        let event: InputEvent = Ok(ReadlineEvent::Line("  hello there \n".to_string())).into();
        assert_eq!(event, InputEvent::Line("hello there".to_string()));
    }

    #[test]
    fn test_control_keys_map_to_events() {
        assert_eq!(InputEvent::from(Ok(ReadlineEvent::Eof)), InputEvent::Eof);
        assert_eq!(
            InputEvent::from(Ok(ReadlineEvent::Interrupted)),
            InputEvent::Interrupted
        );
    }
}
