//! Marlin commands used around an upload

use std::fmt;

/// Un-numbered commands sent synchronously outside the frame stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarlinCommand {
    /// `M28 <file>`: start writing to an SD file
    BeginWrite(String),
    /// `M29`: stop writing to the SD file
    EndWrite,
    /// `M23 <file>`: select an SD file for printing
    SelectFile(String),
    /// `M24`: start or resume the selected print
    StartPrint,
    /// `M117 <text>`: show a message on the display
    LcdMessage(String),
}

impl MarlinCommand {
    /// The command as a wire line, without the terminator
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MarlinCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeginWrite(file) => write!(f, "M28 {}", file),
            Self::EndWrite => write!(f, "M29"),
            Self::SelectFile(file) => write!(f, "M23 {}", file),
            Self::StartPrint => write!(f, "M24"),
            Self::LcdMessage(text) => write!(f, "M117 {}", text),
        }
    }
}
