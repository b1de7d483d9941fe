//! Operator input during supervised escalation.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};

/// Source of a single line of operator input.
#[async_trait]
pub trait OperatorPrompt: Send {
    /// Shows `message` and reads one line. Returns `Ok(None)` on end of input.
    async fn read_line(&mut self, message: &str) -> io::Result<Option<String>>;
}

/// Prompts on stderr and reads from stdin, keeping stdout for results.
///
/// The reader is created on first use and kept for the life of the prompt, so
/// answers piped in ahead of time are consumed one per escalation.
#[derive(Debug, Default)]
pub struct StdinPrompt {
    reader: Option<BufReader<Stdin>>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OperatorPrompt for StdinPrompt {
    async fn read_line(&mut self, message: &str) -> io::Result<Option<String>> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(format!("\n{}", message).as_bytes()).await?;
        stderr.flush().await?;

        let reader = self
            .reader
            .get_or_insert_with(|| BufReader::new(tokio::io::stdin()));
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }
}
