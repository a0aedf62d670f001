//! Line protocol spoken by the RTC sketch: one `DD.MM.YYYY HH:MM:SS` line per poll.

use chrono::NaiveDateTime;

/// Shape of a well-formed timestamp line, used as a cheap length check.
pub const RTC_TEMPLATE: &str = "01.01.2000 00:00:00";
pub const RTC_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Lines longer than this without a terminator are flushed as-is.
const MAX_LINE: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum RtcLine {
    Timestamp(NaiveDateTime),
    /// Anything else the device printed (boot banners, driver errors, noise).
    Diagnostic(String),
}

pub fn parse_rtc_line(line: &str) -> RtcLine {
    let line = line.trim();
    if line.len() != RTC_TEMPLATE.len() {
        return RtcLine::Diagnostic(line.to_string());
    }
    match NaiveDateTime::parse_from_str(line, RTC_FORMAT) {
        Ok(ts) => RtcLine::Timestamp(ts),
        Err(e) => {
            log::debug!("rejecting {line:?}: {e}");
            RtcLine::Diagnostic(line.to_string())
        }
    }
}

/// Decodes a raw line, falling back to a hex dump for non-UTF-8 garbage
/// (typically a baud rate mismatch).
pub fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.trim_end_matches(['\r', '\n']).to_string(),
        Err(_) => format!("<{}>", hex::encode_upper(bytes)),
    }
}

/// Splits a byte stream into newline-terminated lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(line);
        }

        if self.buf.len() > MAX_LINE {
            lines.push(self.buf.drain(..).collect());
        }
        lines
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
