//! Marlin Response Parser
//!
//! Classifies the reply lines Marlin sends over the serial link.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marlin response types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarlinResponse {
    /// Positive acknowledgment of the last line
    Ok,
    /// The last line was refused; carries the text after `Error:`
    Error(String),
    /// Request to resend from the given line number
    Resend(u32),
    /// `echo:busy:` keep-alive while a long command runs
    Busy(String),
    /// Other `echo:` output
    Echo(String),
    /// Anything else
    Message(String),
}

impl MarlinResponse {
    /// Whether this reply refuses the outstanding line
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for MarlinResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error(msg) => write!(f, "Error:{}", msg),
            Self::Resend(line) => write!(f, "Resend: {}", line),
            Self::Busy(msg) => write!(f, "echo:busy: {}", msg),
            Self::Echo(msg) => write!(f, "echo:{}", msg),
            Self::Message(msg) => write!(f, "{}", msg),
        }
    }
}

/// Marlin response parser
#[derive(Debug, Clone, Copy, Default)]
pub struct MarlinResponseParser;

impl MarlinResponseParser {
    /// Create a new Marlin response parser
    pub fn new() -> Self {
        Self
    }

    /// Parse one reply line, without its line terminator
    ///
    /// Only an exact `ok` is an acknowledgment.
    pub fn parse(&self, line: &str) -> Option<MarlinResponse> {
        let line = line.trim();

        if line.is_empty() {
            return None;
        }

        if line == "ok" {
            return Some(MarlinResponse::Ok);
        }

        if let Some(msg) = line.strip_prefix("Error:") {
            return Some(MarlinResponse::Error(msg.trim().to_string()));
        }

        if let Some(rest) = line
            .strip_prefix("Resend:")
            .or_else(|| line.strip_prefix("rs "))
        {
            if let Ok(number) = rest.trim().parse::<u32>() {
                return Some(MarlinResponse::Resend(number));
            }
        }

        if let Some(msg) = line.strip_prefix("echo:busy:") {
            return Some(MarlinResponse::Busy(msg.trim().to_string()));
        }

        if let Some(msg) = line.strip_prefix("echo:") {
            return Some(MarlinResponse::Echo(msg.to_string()));
        }

        Some(MarlinResponse::Message(line.to_string()))
    }
}
