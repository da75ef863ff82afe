//! File uploads driven from the command line

use anyhow::Context;
use printbridge_communication::{TransmitStats, Transport, UploadSession};
use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant};

/// Summary of a finished upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// Name of the file on the controller
    pub target: String,
    /// Source bytes read
    pub bytes_read: u64,
    /// Lines framed, line-number resets included
    pub lines: u32,
    /// Transmission counters at the end of the upload
    pub stats: TransmitStats,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl std::fmt::Display for UploadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} bytes, {} lines, {} frames sent, {} resent in {:.1}s",
            self.target,
            self.bytes_read,
            self.lines,
            self.stats.frames_sent,
            self.stats.frames_rejected,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Controller file name for a local `path`
pub fn target_name(path: &Path) -> anyhow::Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    Ok(name.to_ascii_lowercase())
}

/// Upload everything `reader` yields into `target`, `chunk_size` bytes at a time
pub fn upload_reader<T: Transport, const N: usize, R: Read>(
    session: &mut UploadSession<T, N>,
    target: &str,
    mut reader: R,
    chunk_size: usize,
    print: bool,
) -> anyhow::Result<UploadReport> {
    let started = Instant::now();
    let before = session.stats();

    session
        .begin_upload(target)
        .with_context(|| format!("Failed to start upload of {}", target))?;

    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut bytes_read = 0u64;
    loop {
        let n = reader.read(&mut buffer).context("Failed to read source file")?;
        if n == 0 {
            break;
        }
        bytes_read += n as u64;
        session
            .write(&buffer[..n])
            .with_context(|| format!("Upload of {} failed", target))?;
    }

    let lines = session.lines_framed();
    session
        .end_upload(print)
        .with_context(|| format!("Failed to finish upload of {}", target))?;

    let after = session.stats();
    Ok(UploadReport {
        target: target.to_string(),
        bytes_read,
        lines,
        stats: TransmitStats {
            frames_sent: after.frames_sent - before.frames_sent,
            frames_acknowledged: after.frames_acknowledged - before.frames_acknowledged,
            frames_rejected: after.frames_rejected - before.frames_rejected,
            commands_sent: after.commands_sent - before.commands_sent,
            bytes_written: after.bytes_written - before.bytes_written,
            pauses: after.pauses - before.pauses,
            replies_discarded: after.replies_discarded - before.replies_discarded,
        },
        elapsed: started.elapsed(),
    })
}
