//! Simulated Marlin controller
//!
//! An in-memory [`Transport`] that behaves like a Marlin board with an SD
//! card: it checks line numbers and checksums, answers `ok` or
//! `Error:`/`Resend:`/`ok`, honors `M110`, stores `M28`..`M29` uploads and
//! records every command it accepts. Faults and flow-control pauses can be
//! injected. Clones share state, so a test can keep a handle while a driver
//! owns the transport.

use crate::communication::flow_control::FlowControl;
use crate::communication::Transport;
use parking_lot::Mutex;
use printbridge_core::Result;
use printbridge_gcode::line_checksum;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug, Default)]
struct SimState {
    /// Line number the next numbered line must carry
    expected_line: u32,
    line: Vec<u8>,
    outbox: VecDeque<u8>,
    received: Vec<String>,
    accepted: Vec<String>,
    reject_once: HashSet<u32>,
    reject_prefixes: Vec<String>,
    rejections: usize,
    flow: Option<FlowControl>,
    pause_every: Option<usize>,
    lines_since_pause: usize,
    writing: Option<String>,
    files: BTreeMap<String, Vec<String>>,
    selected: Option<String>,
    printing: Option<String>,
    lcd_message: Option<String>,
}

impl SimState {
    fn reply(&mut self, text: &str) {
        self.outbox.extend(text.bytes());
        self.outbox.push_back(b'\n');
    }

    fn refuse(&mut self, reason: &str) {
        self.rejections += 1;
        let last = self.expected_line.saturating_sub(1);
        self.reply(&format!("Error:{}, Last Line: {}", reason, last));
        let resend = format!("Resend: {}", self.expected_line);
        self.reply(&resend);
        self.reply("ok");
    }

    fn receive(&mut self, byte: u8) {
        match byte {
            b'\n' => {
                let raw = String::from_utf8_lossy(&self.line).into_owned();
                self.line.clear();
                if !raw.trim().is_empty() {
                    self.handle_line(raw);
                }
            }
            b'\r' => {}
            _ => self.line.push(byte),
        }
    }

    fn handle_line(&mut self, raw: String) {
        self.received.push(raw.clone());

        if !raw.starts_with('N') {
            self.execute(raw.trim().to_string());
            return;
        }

        let Some((numbered, checksum)) = raw.rsplit_once('*') else {
            self.refuse("No Checksum with line number");
            return;
        };
        if checksum.trim().parse::<u8>().ok() != Some(line_checksum(numbered.as_bytes())) {
            self.refuse("checksum mismatch");
            return;
        }

        let digits = numbered[1..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let Ok(number) = numbered[1..1 + digits].parse::<u32>() else {
            self.refuse("Line Number is not Last Line Number+1");
            return;
        };
        let body = numbered[1 + digits..].trim().to_string();

        if body.starts_with("M110") {
            self.expected_line = number + 1;
            self.accepted.push(body);
            self.reply("ok");
            return;
        }

        if number != self.expected_line {
            self.refuse("Line Number is not Last Line Number+1");
            return;
        }

        if self.reject_once.remove(&number) {
            self.refuse("checksum mismatch");
            return;
        }

        self.expected_line = number + 1;
        self.execute(body);
    }

    fn execute(&mut self, command: String) {
        let refused = self
            .reject_prefixes
            .iter()
            .find(|p| command.starts_with(p.as_str()))
            .cloned();
        if let Some(prefix) = refused {
            let reason = format!("Unknown command: \"{}\"", prefix);
            self.rejections += 1;
            self.reply(&format!("Error:{}", reason));
            self.reply("ok");
            return;
        }

        if let Some(file) = self.writing.clone() {
            if command == "M29" {
                self.writing = None;
                self.accepted.push(command);
                self.reply("Done saving file.");
            } else {
                self.files.entry(file).or_default().push(command);
            }
            self.acknowledge();
            return;
        }

        let (code, argument) = match command.split_once(' ') {
            Some((code, argument)) => (code, argument.trim()),
            None => (command.as_str(), ""),
        };

        match code {
            "M28" => {
                let name = argument.to_string();
                self.files.insert(name.clone(), Vec::new());
                self.writing = Some(name.clone());
                self.reply(&format!("Writing to file: {}", name));
            }
            "M23" => {
                if let Some(lines) = self.files.get(argument) {
                    let size: usize = lines.iter().map(|l| l.len() + 1).sum();
                    let name = argument.to_string();
                    self.reply(&format!("File opened: {} Size: {}", name, size));
                    self.reply("File selected");
                    self.selected = Some(name);
                } else {
                    let message = format!("open failed, File: {}.", argument);
                    self.reply(&message);
                }
            }
            "M24" => self.printing = self.selected.clone(),
            "M117" => self.lcd_message = Some(argument.to_string()),
            _ => {}
        }

        self.accepted.push(command);
        self.acknowledge();
    }

    fn acknowledge(&mut self) {
        if let (Some(flow), Some(every)) = (self.flow, self.pause_every) {
            self.lines_since_pause += 1;
            if self.lines_since_pause >= every {
                self.lines_since_pause = 0;
                self.outbox.push_back(flow.pause);
                self.reply("echo:busy: processing");
                self.outbox.push_back(flow.resume);
            }
        }
        self.reply("ok");
    }
}

/// In-memory Marlin emulation
#[derive(Debug, Clone, Default)]
pub struct SimulatedPrinter {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPrinter {
    /// A controller expecting line 0 next, with no faults injected
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next arrival of line `number` once, as a corrupted line
    pub fn reject_line_once(&self, number: u32) {
        self.state.lock().reject_once.insert(number);
    }

    /// Refuse every command starting with `prefix` as unknown
    pub fn reject_command(&self, prefix: impl Into<String>) {
        self.state.lock().reject_prefixes.push(prefix.into());
    }

    /// Pause and resume transmission around every `every`-th acknowledgment
    pub fn pause_every(&self, every: usize, flow: FlowControl) {
        let mut state = self.state.lock();
        state.pause_every = (every > 0).then_some(every);
        state.flow = Some(flow);
    }

    /// Queue an unsolicited line, as the firmware does for status output
    pub fn push_message(&self, text: &str) {
        self.state.lock().reply(text);
    }

    /// Every non-empty line received, verbatim
    pub fn received_lines(&self) -> Vec<String> {
        self.state.lock().received.clone()
    }

    /// Commands executed, without line numbers and checksums
    pub fn accepted_commands(&self) -> Vec<String> {
        self.state.lock().accepted.clone()
    }

    /// Lines stored in an uploaded file
    pub fn file(&self, name: &str) -> Option<Vec<String>> {
        self.state.lock().files.get(name).cloned()
    }

    /// File currently being written, if any
    pub fn writing(&self) -> Option<String> {
        self.state.lock().writing.clone()
    }

    /// File started by `M24`, if any
    pub fn printing(&self) -> Option<String> {
        self.state.lock().printing.clone()
    }

    /// Last `M117` text
    pub fn lcd_message(&self) -> Option<String> {
        self.state.lock().lcd_message.clone()
    }

    /// Lines and commands refused so far
    pub fn rejections(&self) -> usize {
        self.state.lock().rejections
    }

    /// Line number the controller expects next
    pub fn expected_line(&self) -> u32 {
        self.state.lock().expected_line
    }
}

impl Transport for SimulatedPrinter {
    fn name(&self) -> String {
        "simulated".to_string()
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.state.lock().receive(byte);
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.state.lock().outbox.pop_front())
    }
}
