//! Core functionalities: serial I/O, RTC line framing, capture log and recording.

pub mod error;
pub mod serial_service;
pub mod wire;
pub mod logbuf;
pub mod recorder;

pub use error::{CoreError, Result};
pub use serial_service::{SerialConfig, SerialEvent, SerialService, PortInfo};
pub use wire::{decode_line, parse_rtc_line, LineFramer, RtcLine, RTC_FORMAT, RTC_TEMPLATE};
pub use logbuf::{LogStore, LogEntry, EntryKind};
pub use recorder::TrialRecorder;
