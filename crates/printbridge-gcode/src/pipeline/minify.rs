//! Whitespace and comment stripping

use super::ByteProcessor;
use printbridge_core::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MinifyState {
    /// Forwarding bytes
    Emit,
    /// Inside a run of spaces, tabs or carriage returns
    Whitespace,
    /// Inside a `;` comment, until end of line
    Comment,
}

/// Removes whitespace, `;` comments, blank lines and control bytes
///
/// G-code words need no separators, so every space between tokens is
/// dropped: `G1  X10 ; move` becomes `G1X10`. A newline is forwarded only
/// when it terminates a non-empty output line.
///
/// Control bytes other than LF, CR and TAB are discarded, which keeps the
/// flow-control symbols out of every frame payload.
#[derive(Debug, Clone)]
pub struct Minifier {
    state: MinifyState,
    last_emitted: Option<u8>,
}

impl Minifier {
    /// Create a new minifier
    pub fn new() -> Self {
        Self {
            state: MinifyState::Emit,
            last_emitted: None,
        }
    }

    fn is_blank(byte: u8) -> bool {
        matches!(byte, b' ' | b'\t' | b'\r')
    }

    fn emit(&mut self, byte: u8, out: &mut dyn FnMut(u8) -> Result<()>) -> Result<()> {
        self.last_emitted = Some(byte);
        out(byte)
    }
}

impl Default for Minifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteProcessor for Minifier {
    fn name(&self) -> &str {
        "minify"
    }

    fn description(&self) -> &str {
        "Strips whitespace, comments, blank lines and control bytes"
    }

    fn process(&mut self, byte: u8, out: &mut dyn FnMut(u8) -> Result<()>) -> Result<()> {
        // Leaving Whitespace or Comment re-examines the same byte in Emit
        loop {
            match self.state {
                MinifyState::Emit => {
                    return match byte {
                        b if Self::is_blank(b) => {
                            self.state = MinifyState::Whitespace;
                            Ok(())
                        }
                        b';' => {
                            self.state = MinifyState::Comment;
                            Ok(())
                        }
                        b'\n' => match self.last_emitted {
                            Some(prev) if prev != b'\n' => self.emit(byte, out),
                            _ => Ok(()),
                        },
                        b if b.is_ascii_control() => {
                            tracing::trace!("Dropping control byte 0x{:02x}", b);
                            Ok(())
                        }
                        _ => self.emit(byte, out),
                    };
                }
                MinifyState::Whitespace => {
                    if Self::is_blank(byte) {
                        return Ok(());
                    }
                    self.state = MinifyState::Emit;
                }
                MinifyState::Comment => {
                    if byte != b'\n' && byte != b'\r' {
                        return Ok(());
                    }
                    self.state = MinifyState::Emit;
                }
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::process_all;

    fn minify(input: &str) -> String {
        let out = process_all(&mut Minifier::new(), input.as_bytes()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_strips_spaces_comments_and_blank_lines() {
        assert_eq!(minify("G1  X10 ; move\n\n\nG1 Y5\n"), "G1X10\nG1Y5\n");
    }

    #[test]
    fn test_leading_blank_lines_and_comment_only_lines() {
        assert_eq!(minify("\n\n; header\n;another\nM104 S200\n"), "M104S200\n");
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(minify("G28\r\nG1 X1\r\n"), "G28\nG1X1\n");
    }

    #[test]
    fn test_tabs_are_whitespace() {
        assert_eq!(minify("\tG1\tX1\n"), "G1X1\n");
    }

    #[test]
    fn test_control_bytes_are_dropped() {
        assert_eq!(minify("G1\x13X1\x11\n"), "G1X1\n");
    }

    #[test]
    fn test_comment_without_newline_swallows_rest() {
        assert_eq!(minify("G1 X2 ;tail"), "G1X2");
    }
}
