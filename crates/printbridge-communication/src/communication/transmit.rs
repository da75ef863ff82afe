//! Frame transmission with flow control, acknowledgment and retransmission
//!
//! Implements the line-checksum streaming protocol over a [`Transport`]:
//!
//! - One line outstanding at a time
//! - Each written byte is followed by a read of at most one reply byte
//! - A pause symbol blocks writing until the resume symbol arrives
//! - `ok` removes the acknowledged frame from the ring
//! - A refused line rewinds the ring so every unacknowledged frame is sent
//!   again in order
//!
//! There is no timeout and no retry ceiling: a controller that never answers
//! stalls the sender, and one that keeps refusing a line gets it forever.
//!
//! A reply line longer than [`LinkConfig::max_line_length`] is dropped and
//! counted in [`TransmitStats::replies_discarded`]; transmission carries on.

use crate::communication::flow_control::FlowControl;
use crate::communication::Transport;
use crate::firmware::marlin::{Completion, ControllerLink, LinkConfig, LinkEvent, MarlinResponse};
use printbridge_core::{Error, FrameRing, LinkError, Result};

/// Callback receiving every informational and unsolicited reply
pub type ReplyListener = Box<dyn FnMut(&MarlinResponse) + Send>;

/// Counters for one driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmitStats {
    /// Frames written, resends included
    pub frames_sent: u64,
    /// Frames acknowledged and removed from the ring
    pub frames_acknowledged: u64,
    /// Frames refused by the controller
    pub frames_rejected: u64,
    /// Synchronous commands sent
    pub commands_sent: u64,
    /// Bytes written to the transport
    pub bytes_written: u64,
    /// Times the controller paused transmission
    pub pauses: u64,
    /// Overlong reply lines dropped
    pub replies_discarded: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Frame,
    Command,
}

/// Drains a [`FrameRing`] over a transport
pub struct TransmitDriver<T: Transport> {
    transport: T,
    link: ControllerLink,
    flow: FlowControl,
    paused: bool,
    in_flight: Option<InFlight>,
    command_result: Option<Completion>,
    mid_line: bool,
    scratch: Vec<u8>,
    stats: TransmitStats,
    listener: Option<ReplyListener>,
}

impl<T: Transport> TransmitDriver<T> {
    /// Create a driver over `transport`
    pub fn new(transport: T, link: LinkConfig, flow: FlowControl) -> Result<Self> {
        flow.validate()?;
        Ok(Self {
            transport,
            link: ControllerLink::new(link),
            flow,
            paused: false,
            in_flight: None,
            command_result: None,
            mid_line: false,
            scratch: Vec::with_capacity(printbridge_core::MAX_FRAME_PAYLOAD),
            stats: TransmitStats::default(),
            listener: None,
        })
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the driver, returning its transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Transmission counters
    pub fn stats(&self) -> TransmitStats {
        self.stats
    }

    /// Whether the controller has paused transmission
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether nothing is waiting for a reply
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    /// Install a callback for informational and unsolicited replies
    pub fn set_listener(&mut self, listener: ReplyListener) {
        self.listener = Some(listener);
    }

    /// Stop waiting for the outstanding reply
    ///
    /// A late reply to the abandoned line is treated as unsolicited.
    pub fn abandon(&mut self) {
        if self.in_flight.take().is_some() {
            tracing::debug!("Abandoning outstanding reply");
        }
        self.link.reset();
        self.command_result = None;
    }

    /// Put the link back in a known state after a failed transfer
    ///
    /// Abandons the outstanding reply, terminates a line left half written
    /// on the wire, then consumes every reply already available. Replies to
    /// the cut-off line are treated as unsolicited.
    pub fn resync<const N: usize>(&mut self, ring: &mut FrameRing<N>) -> Result<()> {
        self.abandon();
        if self.mid_line {
            tracing::debug!("Terminating partially written line");
            self.transport.write_byte(b'\n')?;
            self.stats.bytes_written += 1;
            self.mid_line = false;
            self.transport.flush()?;
        }
        self.service(ring)
    }

    /// One pass: handle every available reply byte, then send the next
    /// frame if nothing is outstanding and the controller is not pausing
    pub fn drain<const N: usize>(&mut self, ring: &mut FrameRing<N>) -> Result<()> {
        self.service(ring)?;
        if self.in_flight.is_none() && !self.paused && ring.unsent() > 0 {
            self.send_frame(ring)?;
        }
        Ok(())
    }

    /// Drain until every committed frame is acknowledged
    pub fn flush<const N: usize>(&mut self, ring: &mut FrameRing<N>) -> Result<()> {
        while ring.len() > 0 || self.in_flight.is_some() {
            self.drain(ring)?;
        }
        self.transport.flush()
    }

    /// Send one un-numbered line and wait for its completion
    ///
    /// Waits for any outstanding frame first. The ring is only touched by
    /// the acknowledgment of that frame.
    pub fn command<const N: usize>(
        &mut self,
        ring: &mut FrameRing<N>,
        line: &str,
    ) -> Result<Completion> {
        if line.bytes().any(|b| b == b'\n' || b == b'\r') {
            return Err(Error::other(format!(
                "Command must be a single line: {:?}",
                line
            )));
        }

        while self.in_flight.is_some() {
            self.service(ring)?;
        }
        // A result left by an earlier command that failed while waiting
        self.command_result = None;

        tracing::debug!("Sending command: {}", line);
        for byte in line.bytes().chain(std::iter::once(b'\n')) {
            self.write_paced(byte, ring)?;
        }
        self.transport.flush()?;
        self.link.expect_reply()?;
        self.in_flight = Some(InFlight::Command);
        self.stats.commands_sent += 1;

        loop {
            self.service(ring)?;
            if let Some(completion) = self.command_result.take() {
                return Ok(completion);
            }
        }
    }

    fn send_frame<const N: usize>(&mut self, ring: &mut FrameRing<N>) -> Result<()> {
        let mut frame = std::mem::take(&mut self.scratch);
        frame.clear();
        ring.read_next(|b| frame.push(b))?;

        let written = frame
            .iter()
            .try_for_each(|&byte| self.write_paced(byte, ring));
        self.scratch = frame;
        written?;

        self.transport.flush()?;
        ring.advance_read()?;
        self.link.expect_reply()?;
        self.in_flight = Some(InFlight::Frame);
        self.stats.frames_sent += 1;
        tracing::debug!(
            "Sent frame ({} bytes, {} awaiting ack, {} unsent)",
            self.scratch.len(),
            ring.awaiting_ack(),
            ring.unsent()
        );
        Ok(())
    }

    /// Wait out a pause, write one byte, then take at most one reply byte
    fn write_paced<const N: usize>(&mut self, byte: u8, ring: &mut FrameRing<N>) -> Result<()> {
        while self.paused {
            if let Some(reply) = self.transport.read_byte()? {
                self.receive(reply, ring)?;
            }
        }

        self.transport.write_byte(byte)?;
        self.stats.bytes_written += 1;
        self.mid_line = byte != b'\n';

        if let Some(reply) = self.transport.read_byte()? {
            self.receive(reply, ring)?;
        }
        Ok(())
    }

    fn service<const N: usize>(&mut self, ring: &mut FrameRing<N>) -> Result<()> {
        while let Some(byte) = self.transport.read_byte()? {
            self.receive(byte, ring)?;
        }
        Ok(())
    }

    fn receive<const N: usize>(&mut self, byte: u8, ring: &mut FrameRing<N>) -> Result<()> {
        if self.flow.is_pause(byte) {
            if !self.paused {
                tracing::trace!("Controller paused transmission");
                self.stats.pauses += 1;
            }
            self.paused = true;
            return Ok(());
        }
        if self.flow.is_resume(byte) {
            if self.paused {
                tracing::trace!("Controller resumed transmission");
            }
            self.paused = false;
            return Ok(());
        }

        match self.link.feed(byte) {
            Ok(Some(event)) => self.handle_event(event, ring),
            Ok(None) => Ok(()),
            Err(Error::Link(LinkError::ReplyTooLong { .. })) => {
                self.stats.replies_discarded += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn handle_event<const N: usize>(
        &mut self,
        event: LinkEvent,
        ring: &mut FrameRing<N>,
    ) -> Result<()> {
        match event {
            LinkEvent::Completed(completion) => match self.in_flight.take() {
                Some(InFlight::Frame) => self.complete_frame(completion, ring),
                Some(InFlight::Command) => {
                    self.command_result = Some(completion);
                    Ok(())
                }
                None => Ok(()),
            },
            LinkEvent::Reply(response) => {
                tracing::trace!("Reply: {}", response);
                self.notify(&response);
                Ok(())
            }
            LinkEvent::Unsolicited(response) => {
                match response {
                    MarlinResponse::Ok | MarlinResponse::Error(_) => {
                        tracing::warn!("Unexpected reply with nothing outstanding: {}", response)
                    }
                    _ => tracing::info!("Controller: {}", response),
                }
                self.notify(&response);
                Ok(())
            }
        }
    }

    fn complete_frame<const N: usize>(
        &mut self,
        completion: Completion,
        ring: &mut FrameRing<N>,
    ) -> Result<()> {
        match completion {
            Completion::Success => {
                ring.pop()?;
                self.stats.frames_acknowledged += 1;
            }
            Completion::Rejected { reason } => {
                self.stats.frames_rejected += 1;
                tracing::warn!(
                    "Line rejected ({}), resending {} unacknowledged frame(s)",
                    reason,
                    ring.len()
                );
                ring.rewind_read();
            }
        }
        Ok(())
    }

    fn notify(&mut self, response: &MarlinResponse) {
        if let Some(listener) = self.listener.as_mut() {
            listener(response);
        }
    }
}

impl<T: Transport> std::fmt::Debug for TransmitDriver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransmitDriver")
            .field("transport", &self.transport.name())
            .field("paused", &self.paused)
            .field("in_flight", &self.in_flight)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::flow_control::{XOFF, XON};
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Io {
        Write(u8),
        Read(u8),
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Byte(u8),
        Idle,
        Fail,
    }

    /// Replays scripted replies, one step per read
    #[derive(Default)]
    struct ScriptedTransport {
        replies: VecDeque<Step>,
        log: Vec<Io>,
    }

    impl ScriptedTransport {
        fn reply(&mut self, text: &[u8]) {
            self.replies.extend(text.iter().map(|&b| Step::Byte(b)));
        }

        fn idle(&mut self, polls: usize) {
            self.replies.extend(std::iter::repeat(Step::Idle).take(polls));
        }

        fn fail_read(&mut self) {
            self.replies.push_back(Step::Fail);
        }

        fn written(&self) -> Vec<u8> {
            self.log
                .iter()
                .filter_map(|io| match io {
                    Io::Write(b) => Some(*b),
                    Io::Read(_) => None,
                })
                .collect()
        }
    }

    impl Transport for ScriptedTransport {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        fn write_byte(&mut self, byte: u8) -> Result<()> {
            self.log.push(Io::Write(byte));
            Ok(())
        }

        fn read_byte(&mut self) -> Result<Option<u8>> {
            match self.replies.pop_front() {
                Some(Step::Byte(b)) => {
                    self.log.push(Io::Read(b));
                    Ok(Some(b))
                }
                Some(Step::Fail) => Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "read failed",
                )
                .into()),
                Some(Step::Idle) | None => Ok(None),
            }
        }
    }

    fn ring_with(lines: &[&str]) -> FrameRing<128> {
        let mut ring = FrameRing::new();
        for line in lines {
            for b in line.bytes() {
                ring.append(b).unwrap();
            }
            ring.finish().unwrap();
        }
        ring
    }

    fn driver(transport: ScriptedTransport) -> TransmitDriver<ScriptedTransport> {
        TransmitDriver::new(transport, LinkConfig::default(), FlowControl::default()).unwrap()
    }

    #[test]
    fn test_sends_one_frame_per_ack() {
        let mut ring = ring_with(&["A\n", "B\n"]);
        let mut driver = driver(ScriptedTransport::default());

        driver.drain(&mut ring).unwrap();
        assert_eq!(driver.transport().written(), b"A\n");
        assert!(!driver.is_idle());

        // Nothing more goes out until the first frame is acknowledged
        driver.drain(&mut ring).unwrap();
        assert_eq!(driver.transport().written(), b"A\n");

        driver.transport_mut().reply(b"ok\n");
        driver.drain(&mut ring).unwrap();
        assert_eq!(driver.transport().written(), b"A\nB\n");
        assert_eq!(ring.len(), 1);

        driver.transport_mut().reply(b"ok\n");
        driver.flush(&mut ring).unwrap();
        assert!(ring.is_empty());
        assert_eq!(driver.stats().frames_acknowledged, 2);
        assert_eq!(driver.stats().bytes_written, 4);
    }

    #[test]
    fn test_error_rewinds_and_resends() {
        let mut ring = ring_with(&["A\n", "B\n"]);
        let mut transport = ScriptedTransport::default();
        transport.idle(4);
        transport.reply(b"Error:checksum mismatch\nResend: 0\nok\n");
        transport.idle(3);
        transport.reply(b"ok\n");
        transport.idle(3);
        transport.reply(b"ok\n");
        let mut driver = driver(transport);

        driver.flush(&mut ring).unwrap();

        assert_eq!(driver.transport().written(), b"A\nA\nB\n");
        let stats = driver.stats();
        assert_eq!(stats.frames_sent, 3);
        assert_eq!(stats.frames_rejected, 1);
        assert_eq!(stats.frames_acknowledged, 2);
    }

    #[test]
    fn test_pause_blocks_writes_until_resume() {
        let mut ring = ring_with(&["G28\n"]);
        let mut transport = ScriptedTransport::default();
        transport.reply(&[XOFF]);
        transport.idle(3);
        transport.reply(b"echo:busy: processing\n");
        transport.reply(&[XON]);
        transport.idle(4);
        transport.reply(b"ok\n");
        let mut driver = driver(transport);

        driver.flush(&mut ring).unwrap();

        let log = &driver.transport().log;
        let paused_at = log.iter().position(|io| *io == Io::Read(XOFF)).unwrap();
        let resumed_at = log.iter().position(|io| *io == Io::Read(XON)).unwrap();
        assert!(log[paused_at..resumed_at]
            .iter()
            .all(|io| matches!(io, Io::Read(_))));
        assert_eq!(driver.transport().written(), b"G28\n");
        assert_eq!(driver.stats().pauses, 1);
        assert!(!driver.is_paused());
    }

    #[test]
    fn test_pause_mid_frame_holds_remaining_bytes() {
        let mut ring = ring_with(&["G28\n"]);
        let mut transport = ScriptedTransport::default();
        transport.idle(1);
        transport.reply(&[XOFF]);
        transport.idle(2);
        transport.reply(&[XON]);
        transport.idle(3);
        transport.reply(b"ok\n");
        let mut driver = driver(transport);

        driver.flush(&mut ring).unwrap();

        assert_eq!(
            driver.transport().log[..5],
            [
                Io::Write(b'G'),
                Io::Read(XOFF),
                Io::Read(XON),
                Io::Write(b'2'),
                Io::Write(b'8'),
            ]
        );
        assert!(ring.is_empty());
    }

    #[test]
    fn test_command_waits_for_outstanding_frame() {
        let mut ring = ring_with(&["A\n"]);
        let mut transport = ScriptedTransport::default();
        transport.idle(2);
        let mut driver = driver(transport);
        driver.drain(&mut ring).unwrap();

        driver.transport_mut().reply(b"ok\n");
        driver.transport_mut().idle(1);
        driver.transport_mut().reply(b"Writing to file: a.gco\nok\n");
        let completion = driver.command(&mut ring, "M28 a.gco").unwrap();

        assert_eq!(completion, Completion::Success);
        assert!(ring.is_empty());
        assert_eq!(driver.transport().written(), b"A\nM28 a.gco\n");
        assert_eq!(driver.stats().commands_sent, 1);
    }

    #[test]
    fn test_command_rejection() {
        let mut ring = FrameRing::<16>::new();
        let mut transport = ScriptedTransport::default();
        transport.idle(8);
        transport.reply(b"Error:Unknown command: \"M999X\"\nok\n");
        let mut driver = driver(transport);

        let completion = driver.command(&mut ring, "M999X").unwrap();
        assert_eq!(
            completion,
            Completion::Rejected {
                reason: "Unknown command: \"M999X\"".to_string()
            }
        );
    }

    #[test]
    fn test_multi_line_command_is_refused() {
        let mut ring = FrameRing::<16>::new();
        let mut driver = driver(ScriptedTransport::default());
        assert!(driver.command(&mut ring, "M117 a\nM24").is_err());
        assert!(driver.transport().written().is_empty());
    }

    #[test]
    fn test_listener_sees_unsolicited_replies() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut transport = ScriptedTransport::default();
        transport.reply(b"echo:SD card ok\n");
        let mut driver = driver(transport);
        driver.set_listener(Box::new(move |r: &MarlinResponse| sink.lock().unwrap().push(r.clone())));

        let mut ring = FrameRing::<16>::new();
        driver.drain(&mut ring).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![MarlinResponse::Echo("SD card ok".to_string())]
        );
    }

    #[test]
    fn test_abandon_clears_outstanding_frame() {
        let mut ring = ring_with(&["A\n"]);
        let mut driver = driver(ScriptedTransport::default());
        driver.drain(&mut ring).unwrap();
        assert!(!driver.is_idle());
        driver.abandon();
        assert!(driver.is_idle());
    }

    fn overlong_echo() -> Vec<u8> {
        let mut line = b"echo:".to_vec();
        line.extend(std::iter::repeat(b'x').take(110));
        line.push(b'\n');
        line
    }

    #[test]
    fn test_overlong_reply_while_draining_is_dropped() {
        let mut ring = ring_with(&["A\n"]);
        let mut transport = ScriptedTransport::default();
        transport.reply(&overlong_echo());
        let mut driver = driver(transport);

        driver.drain(&mut ring).unwrap();
        driver.drain(&mut ring).unwrap();
        assert_eq!(driver.transport().written(), b"A\n");
        assert_eq!(driver.stats().replies_discarded, 1);

        driver.transport_mut().reply(b"ok\n");
        driver.flush(&mut ring).unwrap();
        assert!(ring.is_empty());
        assert_eq!(driver.stats().frames_acknowledged, 1);
    }

    #[test]
    fn test_overlong_reply_while_waiting_for_command() {
        let mut ring = FrameRing::<16>::new();
        let mut transport = ScriptedTransport::default();
        transport.idle(4);
        transport.reply(&overlong_echo());
        transport.idle(2);
        transport.reply(b"Error:no media\nok\n");
        let mut driver = driver(transport);

        let completion = driver.command(&mut ring, "M23 a.gco").unwrap();
        assert_eq!(
            completion,
            Completion::Rejected {
                reason: "no media".to_string()
            }
        );
        assert_eq!(driver.stats().replies_discarded, 1);
        assert!(driver.is_idle());
    }

    #[test]
    fn test_overlong_reply_mid_frame_does_not_cut_the_frame() {
        let line = format!("G1{}\n", "X".repeat(107));
        let mut ring = ring_with(&[line.as_str()]);
        let mut transport = ScriptedTransport::default();
        // One reply byte is read per written byte, so the limit is hit mid-frame
        transport.idle(1);
        transport.reply(&overlong_echo());
        transport.idle(5);
        transport.reply(b"ok\n");
        let mut driver = driver(transport);

        driver.flush(&mut ring).unwrap();

        assert_eq!(driver.transport().written(), line.as_bytes());
        assert_eq!(driver.stats().replies_discarded, 1);
        assert_eq!(driver.stats().frames_acknowledged, 1);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_failed_command_does_not_leak_its_result() {
        let mut ring = FrameRing::<16>::new();
        let mut transport = ScriptedTransport::default();
        transport.idle(3);
        transport.fail_read();
        // The first command's late ok, then the second command's refusal
        transport.reply(b"ok\n");
        transport.idle(5);
        transport.reply(b"Error:bad\nok\n");
        let mut driver = driver(transport);

        assert!(matches!(
            driver.command(&mut ring, "M1").unwrap_err(),
            Error::Io(_)
        ));
        let completion = driver.command(&mut ring, "M2").unwrap();
        assert_eq!(
            completion,
            Completion::Rejected {
                reason: "bad".to_string()
            }
        );
        assert_eq!(driver.transport().written(), b"M1\nM2\n");
    }

    #[test]
    fn test_resync_terminates_half_written_frame() {
        let mut ring = ring_with(&["G28\n"]);
        let mut transport = ScriptedTransport::default();
        transport.idle(2);
        transport.fail_read();
        let mut driver = driver(transport);

        assert!(driver.drain(&mut ring).is_err());
        assert_eq!(driver.transport().written(), b"G2");

        driver
            .transport_mut()
            .reply(b"Error:No Checksum with line number, Last Line: 0\nok\n");
        driver.resync(&mut ring).unwrap();
        assert_eq!(driver.transport().written(), b"G2\n");
        assert!(driver.is_idle());

        // Nothing already written is left over for the next command
        driver.transport_mut().idle(4);
        driver.transport_mut().reply(b"ok\n");
        let completion = driver.command(&mut FrameRing::<16>::new(), "M29").unwrap();
        assert_eq!(completion, Completion::Success);
    }
}
