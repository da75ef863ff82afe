//! Controller link
//!
//! Turns the controller's reply byte stream into lines and tracks the
//! completion of the single outstanding command.
//!
//! Marlin answers a refused line with `Error:...`, then `Resend: <n>`, then
//! a final `ok`. The refusal is remembered and the command completes at the
//! trailing `ok` with a [`Completion::Rejected`] outcome, so that `ok` is
//! never credited to the next line.

use super::response_parser::{MarlinResponse, MarlinResponseParser};
use printbridge_core::{LinkError, Result};
use serde::{Deserialize, Serialize};

/// Reply handling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Longest reply line accepted, in bytes
    pub max_line_length: usize,
    /// Complete a command at `Error:` instead of the `ok` that follows it
    ///
    /// For firmware that does not acknowledge a refused line.
    pub error_completes_immediately: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_line_length: 96,
            error_completes_immediately: false,
        }
    }
}

/// Final outcome of an outstanding command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Acknowledged with `ok`
    Success,
    /// Refused; carries the first error text received
    Rejected {
        /// Text after `Error:`
        reason: String,
    },
}

impl Completion {
    /// Whether the controller accepted the command
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// What a completed reply line means to the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The outstanding command finished
    Completed(Completion),
    /// Informational reply while a command is outstanding
    Reply(MarlinResponse),
    /// Reply with no command outstanding
    Unsolicited(MarlinResponse),
}

#[derive(Debug, Clone, Default)]
struct Outstanding {
    rejection: Option<String>,
}

/// Reply line accumulator plus single-command completion tracking
#[derive(Debug, Clone)]
pub struct ControllerLink {
    config: LinkConfig,
    parser: MarlinResponseParser,
    line: Vec<u8>,
    discarding: bool,
    outstanding: Option<Outstanding>,
}

impl ControllerLink {
    /// Create a link with no command outstanding
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            parser: MarlinResponseParser::new(),
            line: Vec::with_capacity(config.max_line_length),
            discarding: false,
            outstanding: None,
        }
    }

    /// Reply handling configuration
    pub fn config(&self) -> LinkConfig {
        self.config
    }

    /// Whether a command is waiting for its completion
    pub fn is_awaiting_reply(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Register a command that was just sent
    ///
    /// Fails if another command is still outstanding.
    pub fn expect_reply(&mut self) -> Result<()> {
        if self.outstanding.is_some() {
            return Err(LinkError::CommandOutstanding.into());
        }
        self.outstanding = Some(Outstanding::default());
        Ok(())
    }

    /// Forget the outstanding command and any partial reply line
    pub fn reset(&mut self) {
        self.line.clear();
        self.discarding = false;
        self.outstanding = None;
    }

    /// Consume one reply byte
    ///
    /// Returns an event when the byte completes a non-empty line. An
    /// overlong line yields [`LinkError::ReplyTooLong`] once and the rest of
    /// it is ignored.
    pub fn feed(&mut self, byte: u8) -> Result<Option<LinkEvent>> {
        if byte == b'\n' || byte == b'\r' {
            if self.discarding {
                self.discarding = false;
                return Ok(None);
            }
            if self.line.is_empty() {
                return Ok(None);
            }
            let text = String::from_utf8_lossy(&self.line).into_owned();
            self.line.clear();
            return Ok(self.handle_line(&text));
        }

        if self.discarding {
            return Ok(None);
        }

        if self.line.len() >= self.config.max_line_length {
            tracing::warn!(
                "Reply line exceeds {} bytes, discarding it",
                self.config.max_line_length
            );
            self.line.clear();
            self.discarding = true;
            return Err(LinkError::ReplyTooLong {
                limit: self.config.max_line_length,
            }
            .into());
        }

        self.line.push(byte);
        Ok(None)
    }

    fn handle_line(&mut self, text: &str) -> Option<LinkEvent> {
        let response = self.parser.parse(text)?;

        let Some(outstanding) = self.outstanding.as_mut() else {
            return Some(LinkEvent::Unsolicited(response));
        };

        match response {
            MarlinResponse::Ok => {
                let completion = match self.outstanding.take().and_then(|o| o.rejection) {
                    Some(reason) => Completion::Rejected { reason },
                    None => Completion::Success,
                };
                Some(LinkEvent::Completed(completion))
            }
            MarlinResponse::Error(reason) => {
                if self.config.error_completes_immediately {
                    self.outstanding = None;
                    return Some(LinkEvent::Completed(Completion::Rejected { reason }));
                }
                if outstanding.rejection.is_none() {
                    outstanding.rejection = Some(reason.clone());
                }
                Some(LinkEvent::Reply(MarlinResponse::Error(reason)))
            }
            other => Some(LinkEvent::Reply(other)),
        }
    }
}

impl Default for ControllerLink {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}
