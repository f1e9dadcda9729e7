//! Capture records
//!
//! A record is one captured frame as the analysis layer sees it: the frame
//! number, its length, the top-level protocol, and a one-line info summary.
//! Dissection itself happens elsewhere; taps only ever see finished records.

/// One record of a loaded capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Frame number, 1-based in capture order
    pub number: u64,
    /// Frame length in bytes
    pub len: u32,
    /// Top-level protocol name, e.g. "tcp"
    pub protocol: String,
    /// One-line summary shown in the packet list
    pub info: String,
}

impl Record {
    /// Create a record
    pub fn new(number: u64, len: u32, protocol: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            number,
            len,
            protocol: protocol.into(),
            info: info.into(),
        }
    }

    /// Check whether this record carries the given protocol
    ///
    /// Protocol names are compared case-insensitively.
    pub fn is_protocol(&self, name: &str) -> bool {
        self.protocol.eq_ignore_ascii_case(name)
    }
}
