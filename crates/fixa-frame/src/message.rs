//! Message type codes carried in the frame header.
//!
//! The numeric values are part of the wire format and must never be
//! renumbered.

use std::fmt;

/// The kind of message a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    /// Unknown or unassigned type code.
    Invalid = 0,
    /// Device → controller: full configuration and value snapshot.
    RegisterFixables = 1,
    /// Either direction: changed values only.
    UpdateFixables = 2,
    /// Either direction: orderly end of session. Empty body.
    HangUp = 3,
}

impl MessageType {
    /// Map a raw header code to a message type.
    ///
    /// Unknown codes map to [`MessageType::Invalid`] instead of failing so the
    /// session layer can decide what to do with them.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::RegisterFixables,
            2 => Self::UpdateFixables,
            3 => Self::HangUp,
            _ => Self::Invalid,
        }
    }

    /// The raw header code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Human-readable name for logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::RegisterFixables => "REGISTER_FIXABLES",
            Self::UpdateFixables => "UPDATE_FIXABLES",
            Self::HangUp => "HANG_UP",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
