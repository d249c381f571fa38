//! Message type codes.
//!
//! Every message on the wire starts with a single type byte. Uses a
//! closed enum with `TryFrom`: unknown bytes become an error, never a
//! panic.

use crate::error::HeiError;
use std::fmt;

// ── MessageType ──────────────────────────────────────────────────

/// All message types understood by the protocol.
///
/// - `0x10..0x1F`: image transfer
/// - `0x50..0x5F`: server status
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Client asks for the current image; carries telemetry.
    GetImageRequest = 0x10,
    /// Image dimensions and block count.
    ImageHeaderResponse = 0x11,
    /// One compressed block of packed pixels.
    ImageBlockResponse = 0x12,
    /// The server cannot serve an image right now.
    ServerError = 0x50,
}

impl TryFrom<u8> for MessageType {
    type Error = HeiError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x10 => Ok(MessageType::GetImageRequest),
            0x11 => Ok(MessageType::ImageHeaderResponse),
            0x12 => Ok(MessageType::ImageBlockResponse),
            0x50 => Ok(MessageType::ServerError),
            _ => Err(HeiError::UnknownMessageType(value)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        value as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#04x})", self, *self as u8)
    }
}

impl MessageType {
    /// Size of the fixed payload that follows the type byte.
    ///
    /// For `ImageBlockResponse` this is only the block header; the
    /// compressed bytes follow it.
    pub const fn fixed_payload_len(self) -> usize {
        match self {
            MessageType::GetImageRequest => 14,
            MessageType::ImageHeaderResponse => 6,
            MessageType::ImageBlockResponse => 4,
            MessageType::ServerError => 0,
        }
    }

    /// Returns `true` for messages a client sends to the server.
    pub fn is_request(self) -> bool {
        matches!(self, MessageType::GetImageRequest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_roundtrip() {
        for ty in [
            MessageType::GetImageRequest,
            MessageType::ImageHeaderResponse,
            MessageType::ImageBlockResponse,
            MessageType::ServerError,
        ] {
            assert_eq!(MessageType::try_from(u8::from(ty)).unwrap(), ty);
        }
    }

    #[test]
    fn message_type_invalid() {
        assert!(matches!(
            MessageType::try_from(0xFF),
            Err(HeiError::UnknownMessageType(0xFF))
        ));
        assert!(MessageType::try_from(0x00).is_err());
    }

    #[test]
    fn only_get_image_is_a_request() {
        assert!(MessageType::GetImageRequest.is_request());
        assert!(!MessageType::ServerError.is_request());
        assert!(!MessageType::ImageHeaderResponse.is_request());
    }
}
