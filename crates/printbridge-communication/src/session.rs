//! Upload sessions
//!
//! An [`UploadSession`] owns everything one controller connection needs to
//! stream a file: the frame ring, the rewrite pipeline, the line assembler
//! and the transmit driver. It drives Marlin's SD upload sequence:
//!
//! ```text
//! begin_upload  ->  N0M110*cs, M28 <file>
//! write         ->  numbered, checksummed lines
//! end_upload    ->  M29, optionally M23 <file> and M24
//! ```

use crate::communication::assembler::LineAssembler;
use crate::communication::flow_control::FlowControl;
use crate::communication::transmit::{ReplyListener, TransmitDriver, TransmitStats};
use crate::communication::Transport;
use crate::firmware::marlin::{Completion, LinkConfig, MarlinCommand};
use printbridge_core::{ControllerError, Error, FrameRing, Result, DEFAULT_RING_CAPACITY};
use printbridge_gcode::{ByteProcessor, NumberingConfig, RewritePipeline};
use serde::{Deserialize, Serialize};

/// Streaming behavior of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Line numbering policy
    pub numbering: NumberingConfig,
    /// Reply handling
    pub link: LinkConfig,
    /// Software flow control
    pub flow_control: FlowControl,
}

/// Where a session is in the upload lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    /// No upload in progress
    #[default]
    Idle,
    /// Lines are being streamed into `filename`
    Active {
        /// Target file on the controller
        filename: String,
    },
    /// The last upload stopped on an error
    Failed {
        /// Target file on the controller
        filename: String,
        /// The error that stopped it
        reason: String,
    },
}

/// Upload lifecycle over one transport
pub struct UploadSession<T: Transport, const N: usize = DEFAULT_RING_CAPACITY> {
    ring: FrameRing<N>,
    pipeline: RewritePipeline,
    assembler: LineAssembler,
    driver: TransmitDriver<T>,
    state: UploadState,
    /// Whether the controller may still be writing to an SD file
    file_open: bool,
}

impl<T: Transport, const N: usize> UploadSession<T, N> {
    /// Create a session over `transport`
    pub fn new(transport: T, config: StreamConfig) -> Result<Self> {
        Ok(Self {
            ring: FrameRing::new(),
            pipeline: RewritePipeline::new(config.numbering),
            assembler: LineAssembler::new(),
            driver: TransmitDriver::new(transport, config.link, config.flow_control)?,
            state: UploadState::Idle,
            file_open: false,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Whether an upload is in progress
    pub fn is_uploading(&self) -> bool {
        matches!(self.state, UploadState::Active { .. })
    }

    /// Transmission counters
    pub fn stats(&self) -> TransmitStats {
        self.driver.stats()
    }

    /// Lines framed in the current upload, line-number resets included
    pub fn lines_framed(&self) -> u32 {
        self.assembler.lines()
    }

    /// The frame ring, for inspection
    pub fn ring(&self) -> &FrameRing<N> {
        &self.ring
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        self.driver.transport()
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        self.driver.transport_mut()
    }

    /// Install a callback for informational and unsolicited replies
    pub fn set_listener(&mut self, listener: ReplyListener) {
        self.driver.set_listener(listener);
    }

    /// Start an upload into `filename` on the controller's SD card
    ///
    /// Resets line numbering on both ends, then sends `M28 <filename>`.
    pub fn begin_upload(&mut self, filename: &str) -> Result<()> {
        if let UploadState::Active { filename } = &self.state {
            return Err(ControllerError::UploadInProgress {
                filename: filename.clone(),
            }
            .into());
        }
        if filename.trim().is_empty() || filename.contains(['\n', '\r']) {
            return Err(Error::other(format!("Invalid upload filename: {:?}", filename)));
        }

        if matches!(self.state, UploadState::Failed { .. }) {
            self.discard_pending()?;
        }

        tracing::info!("Starting upload of {}", filename);
        self.pipeline.reset();
        self.assembler.reset();
        self.state = UploadState::Active {
            filename: filename.to_string(),
        };

        let started = self.start_upload(filename);
        self.fail_on_error(started)
    }

    fn start_upload(&mut self, filename: &str) -> Result<()> {
        {
            let Self {
                ring,
                pipeline,
                assembler,
                driver,
                ..
            } = self;
            pipeline.emit_reset_line(&mut |b| assembler.push(ring, b, &mut |r| driver.drain(r)))?;
            driver.flush(ring)?;
        }
        self.run(MarlinCommand::BeginWrite(filename.to_string()))?;
        self.file_open = true;
        Ok(())
    }

    /// Stream a chunk of the file being uploaded
    ///
    /// Chunks may split lines anywhere. Blocks while the ring is full.
    pub fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.require_active()?;

        let Self {
            ring,
            pipeline,
            assembler,
            driver,
            ..
        } = self;
        let written = chunk.iter().try_for_each(|&byte| {
            pipeline.process(byte, &mut |b| assembler.push(ring, b, &mut |r| driver.drain(r)))
        });
        self.fail_on_error(written)
    }

    /// Finish the upload, optionally starting a print of the file
    ///
    /// Terminates a partial trailing line, waits for every line to be
    /// acknowledged, then sends `M29` and, if `print` is set, `M23` and `M24`.
    pub fn end_upload(&mut self, print: bool) -> Result<()> {
        let filename = self.require_active()?;
        let finished = self.finish_upload(&filename, print);
        self.fail_on_error(finished)?;

        let stats = self.driver.stats();
        tracing::info!(
            "Finished upload of {}: {} lines, {} frames sent, {} resent",
            filename,
            self.assembler.lines(),
            stats.frames_sent,
            stats.frames_rejected
        );
        self.state = UploadState::Idle;
        Ok(())
    }

    fn finish_upload(&mut self, filename: &str, print: bool) -> Result<()> {
        {
            let Self {
                ring,
                pipeline,
                assembler,
                driver,
                ..
            } = self;
            pipeline.flush(&mut |b| assembler.push(ring, b, &mut |r| driver.drain(r)))?;
            driver.flush(ring)?;
        }

        self.run(MarlinCommand::EndWrite)?;
        self.file_open = false;
        if print {
            self.run(MarlinCommand::SelectFile(filename.to_string()))?;
            self.run(MarlinCommand::StartPrint)?;
            tracing::info!("Printing {}", filename);
        }
        Ok(())
    }

    /// Send an un-numbered command and wait for its completion
    ///
    /// Refused while an upload is active, since the controller would store
    /// the command in the file.
    pub fn command(&mut self, line: &str) -> Result<()> {
        if let UploadState::Active { filename } = &self.state {
            return Err(ControllerError::UploadInProgress {
                filename: filename.clone(),
            }
            .into());
        }
        self.run_line(line)
    }

    /// Show `text` on the controller's display
    pub fn lcd_message(&mut self, text: &str) -> Result<()> {
        self.command(&MarlinCommand::LcdMessage(text.to_string()).to_line())
    }

    /// One drain pass, for the caller's main loop
    pub fn poll(&mut self) -> Result<()> {
        self.driver.drain(&mut self.ring)
    }

    fn run(&mut self, command: MarlinCommand) -> Result<()> {
        self.run_line(&command.to_line())
    }

    fn run_line(&mut self, line: &str) -> Result<()> {
        match self.driver.command(&mut self.ring, line)? {
            Completion::Success => Ok(()),
            Completion::Rejected { reason } => {
                tracing::warn!("Command '{}' rejected: {}", line, reason);
                Err(ControllerError::CommandRejected {
                    command: line.to_string(),
                    reason,
                }
                .into())
            }
        }
    }

    fn require_active(&self) -> Result<String> {
        match &self.state {
            UploadState::Active { filename } => Ok(filename.clone()),
            UploadState::Failed { reason, .. } => Err(ControllerError::UploadAborted {
                reason: reason.clone(),
            }
            .into()),
            UploadState::Idle => Err(ControllerError::UploadNotActive.into()),
        }
    }

    fn fail_on_error(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            if let UploadState::Active { filename } = &self.state {
                tracing::error!("Upload of {} failed: {}", filename, e);
                self.state = UploadState::Failed {
                    filename: filename.clone(),
                    reason: e.to_string(),
                };
            }
        }
        result
    }

    fn discard_pending(&mut self) -> Result<()> {
        if !self.ring.is_empty() {
            tracing::debug!(
                "Discarding {} frame(s) left by the failed upload",
                self.ring.len()
            );
        }
        self.ring = FrameRing::new();
        self.driver.resync(&mut self.ring)?;

        if self.file_open {
            self.file_open = false;
            tracing::info!("Closing the file left open by the failed upload");
            if let Err(e) = self.run(MarlinCommand::EndWrite) {
                tracing::warn!("Could not close the abandoned file: {}", e);
                if !matches!(e, Error::Controller(_)) {
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

impl<T: Transport, const N: usize> std::fmt::Debug for UploadSession<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("state", &self.state)
            .field("ring", &self.ring)
            .field("driver", &self.driver)
            .finish()
    }
}
