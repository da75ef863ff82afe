//! # PrintBridge Communication
//!
//! Everything between the rewrite pipeline and the wire:
//! - [`Transport`] implementations for real serial ports and a simulated
//!   Marlin controller
//! - [`LineAssembler`], which frames rewritten lines into the ring
//! - [`TransmitDriver`], which sends frames one at a time with software flow
//!   control and resends rejected lines
//! - The Marlin reply parser and [`ControllerLink`] completion tracking
//! - [`UploadSession`], the begin / write / end upload lifecycle

pub mod communication;
pub mod firmware;
pub mod session;

pub use communication::{
    assembler::LineAssembler,
    flow_control::{FlowControl, XOFF, XON},
    serial::{list_ports, SerialParams, SerialPortInfo, SerialTransport},
    simulated::SimulatedPrinter,
    transmit::{ReplyListener, TransmitDriver, TransmitStats},
    Transport,
};

pub use firmware::marlin::{
    Completion, ControllerLink, LinkConfig, LinkEvent, MarlinCommand, MarlinResponse,
    MarlinResponseParser,
};

pub use session::{StreamConfig, UploadSession, UploadState};
