//! Operator decision surfaces.
//!
//! A [`Prompter`] shows one message and resolves to the operator's yes/no
//! answer. Two surfaces exist: the operator window ([`UiPrompter`], answered
//! by the egui dialog) and the terminal ([`TerminalPrompter`]).

use std::future::Future;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PresentationError {
    #[error("No interactive surface available: {0}")]
    Unavailable(String),

    #[error("Prompt surface went away before the operator answered")]
    Abandoned,

    #[error("Failed to present prompt: {0}")]
    Io(#[from] std::io::Error),
}

/// Asynchronous yes/no decision capability.
pub trait Prompter: Send {
    /// Presents `message` once and waits for the answer (`true` = affirm).
    fn ask(&mut self, message: &str) -> impl Future<Output = Result<bool, PresentationError>> + Send;
}

/// A pending question for the operator window.
#[derive(Debug)]
pub struct PromptRequest {
    message: String,
    reply: oneshot::Sender<bool>,
}

impl PromptRequest {
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Delivers the operator's answer and consumes the request.
    pub fn answer(self, affirmed: bool) {
        if self.reply.send(affirmed).is_err() {
            warn!("Prompt answered after its exchange was dropped");
        }
    }
}

/// Forwards questions to the operator window and awaits its answer.
#[derive(Clone, Debug)]
pub struct UiPrompter {
    requests: mpsc::Sender<PromptRequest>,
}

impl UiPrompter {
    /// Creates the prompter and the receiver the window drains each frame.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PromptRequest>) {
        let (requests, receiver) = mpsc::channel(capacity);
        (Self { requests }, receiver)
    }
}

impl Prompter for UiPrompter {
    async fn ask(&mut self, message: &str) -> Result<bool, PresentationError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(PromptRequest {
                message: message.to_string(),
                reply,
            })
            .await
            .map_err(|_| PresentationError::Unavailable("operator window is not running".to_string()))?;
        debug!("Prompt handed to operator window");
        answer.await.map_err(|_| PresentationError::Abandoned)
    }
}

/// Asks on a line-oriented terminal: `y`/`yes`/`ok` affirm, `n`/`no`/`cancel` decline.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompter<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R, W> Prompter for TerminalPrompter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn ask(&mut self, message: &str) -> Result<bool, PresentationError> {
        self.output
            .write_all(format!("{message} [y/n]: ").as_bytes())
            .await?;
        self.output.flush().await?;

        loop {
            let mut line = String::new();
            if self.input.read_line(&mut line).await? == 0 {
                return Err(PresentationError::Unavailable(
                    "terminal input closed".to_string(),
                ));
            }
            match line.trim().to_lowercase().as_str() {
                "y" | "yes" | "ok" => return Ok(true),
                "n" | "no" | "cancel" => return Ok(false),
                other => {
                    debug!("Unrecognised terminal answer: {:?}", other);
                    self.output.write_all(b"Please answer y or n: ").await?;
                    self.output.flush().await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn terminal_reads_answers_line_by_line() {
        let mut prompter = TerminalPrompter::new(&b"n\nYES\n"[..], Vec::new());
        assert!(!prompter.ask("Arm motors?").await.unwrap());
        assert!(prompter.ask("Arm motors?").await.unwrap());

        let shown = String::from_utf8(prompter.into_output()).unwrap();
        assert_eq!(shown.matches("Arm motors? [y/n]: ").count(), 2);
    }

    #[tokio::test]
    async fn terminal_repeats_on_unrecognised_input() {
        let mut prompter = TerminalPrompter::new(&b"maybe\n\ncancel\n"[..], Vec::new());
        assert!(!prompter.ask("Drop payload?").await.unwrap());

        let shown = String::from_utf8(prompter.into_output()).unwrap();
        assert_eq!(shown.matches("Please answer y or n").count(), 2);
    }

    #[tokio::test]
    async fn terminal_eof_is_unavailable() {
        let mut prompter = TerminalPrompter::new(&b""[..], Vec::new());
        assert!(matches!(
            prompter.ask("Continue?").await,
            Err(PresentationError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn ui_prompter_round_trip() {
        let (mut prompter, mut requests) = UiPrompter::channel(1);
        let window = tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            assert_eq!(request.message(), "Open gripper?");
            request.answer(true);
        });

        assert!(prompter.ask("Open gripper?").await.unwrap());
        window.await.unwrap();
    }

    #[tokio::test]
    async fn ui_prompter_without_window_is_unavailable() {
        let (mut prompter, requests) = UiPrompter::channel(1);
        drop(requests);
        assert!(matches!(
            prompter.ask("Anyone there?").await,
            Err(PresentationError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn ui_prompter_dropped_request_is_abandoned() {
        let (mut prompter, mut requests) = UiPrompter::channel(1);
        let window = tokio::spawn(async move {
            drop(requests.recv().await);
        });

        assert!(matches!(
            prompter.ask("Dropped?").await,
            Err(PresentationError::Abandoned)
        ));
        window.await.unwrap();
    }
}
