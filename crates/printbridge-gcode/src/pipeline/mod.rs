//! G-Code rewrite pipeline
//!
//! A chain of byte-stream transforms that shrink each source line and frame
//! it for the controller's line-checksum protocol:
//!
//! ```text
//! raw bytes -> Minifier -> NumericTrimmer -> LineNumberer -> sink
//! ```
//!
//! Every stage consumes one byte at a time and keeps only a few bytes of
//! carry-over state, so no stage ever buffers a whole line.

pub mod minify;
pub mod numbering;
pub mod trim;

pub use minify::Minifier;
pub use numbering::{line_checksum, LineNumberer, NumberingConfig, RESET_COMMAND};
pub use trim::NumericTrimmer;

use printbridge_core::Result;

/// Trait for byte-stream G-code processors
///
/// A processor receives its input one byte at a time and forwards zero or
/// more bytes to `out` for each one. Errors returned by `out` propagate
/// back to the caller unchanged.
pub trait ByteProcessor: Send {
    /// Get the name/identifier of this processor
    fn name(&self) -> &str;

    /// Get a description of what this processor does
    fn description(&self) -> &str;

    /// Process one input byte
    fn process(&mut self, byte: u8, out: &mut dyn FnMut(u8) -> Result<()>) -> Result<()>;

    /// Return to the state of a freshly created processor
    fn reset(&mut self);
}

/// Run a whole buffer through a processor and collect its output
pub fn process_all<P>(processor: &mut P, input: &[u8]) -> Result<Vec<u8>>
where
    P: ByteProcessor + ?Sized,
{
    let mut output = Vec::with_capacity(input.len());
    for &byte in input {
        processor.process(byte, &mut |b| {
            output.push(b);
            Ok(())
        })?;
    }
    Ok(output)
}

/// The three rewrite stages chained in their fixed order
#[derive(Debug, Clone, Default)]
pub struct RewritePipeline {
    minifier: Minifier,
    trimmer: NumericTrimmer,
    numberer: LineNumberer,
}

impl RewritePipeline {
    /// Create a pipeline with the given line numbering policy
    pub fn new(numbering: NumberingConfig) -> Self {
        Self {
            minifier: Minifier::new(),
            trimmer: NumericTrimmer::new(),
            numberer: LineNumberer::new(numbering),
        }
    }

    /// Terminate a partial trailing line as if a newline had arrived
    ///
    /// Does nothing when the last line was already terminated.
    pub fn flush(&mut self, out: &mut dyn FnMut(u8) -> Result<()>) -> Result<()> {
        self.process(b'\n', out)
    }

    /// Emit a numbered line-counter reset (`N0M110*<cs>`)
    ///
    /// Subsequent lines are numbered from 1.
    pub fn emit_reset_line(&mut self, out: &mut dyn FnMut(u8) -> Result<()>) -> Result<()> {
        self.numberer.emit_reset_line(out)
    }

    /// Line number the next encoded line will carry
    pub fn next_line_number(&self) -> u32 {
        self.numberer.next_line_number()
    }

    /// The stages in processing order
    pub fn stages(&self) -> [&dyn ByteProcessor; 3] {
        [&self.minifier, &self.trimmer, &self.numberer]
    }
}

impl ByteProcessor for RewritePipeline {
    fn name(&self) -> &str {
        "rewrite"
    }

    fn description(&self) -> &str {
        "Minifies, trims and line-numbers G-code for checksummed transmission"
    }

    fn process(&mut self, byte: u8, out: &mut dyn FnMut(u8) -> Result<()>) -> Result<()> {
        let Self {
            minifier,
            trimmer,
            numberer,
        } = self;

        minifier.process(byte, &mut |b| {
            trimmer.process(b, &mut |c| numberer.process(c, &mut *out))
        })
    }

    fn reset(&mut self) {
        self.minifier.reset();
        self.trimmer.reset();
        self.numberer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let pipeline = RewritePipeline::default();
        let names: Vec<&str> = pipeline.stages().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["minify", "numeric_trim", "line_number"]);
    }

    #[test]
    fn test_flush_terminates_partial_line() {
        let mut pipeline = RewritePipeline::default();
        let mut out = process_all(&mut pipeline, b"G28").unwrap();
        assert!(out.is_empty() || !out.ends_with(b"\n"));

        pipeline
            .flush(&mut |b| {
                out.push(b);
                Ok(())
            })
            .unwrap();
        let expected_cs = line_checksum(b"N0G28");
        assert_eq!(out, format!("N0G28*{}\n", expected_cs).into_bytes());

        // A second flush has nothing to terminate
        let mut extra = Vec::new();
        pipeline
            .flush(&mut |b| {
                extra.push(b);
                Ok(())
            })
            .unwrap();
        assert!(extra.is_empty());
    }

    #[test]
    fn test_reset_restarts_numbering() {
        let mut pipeline = RewritePipeline::default();
        process_all(&mut pipeline, b"G1\nG1\n").unwrap();
        assert_eq!(pipeline.next_line_number(), 2);
        pipeline.reset();
        assert_eq!(pipeline.next_line_number(), 0);
    }
}
