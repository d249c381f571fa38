//! Client → server messages.

use bytes::BufMut;

use crate::encoding::{self, ByteOrder, IntFormat, PackedInt};
use crate::error::HeiError;
use crate::message::MessageType;

// ── GetImageRequest ──────────────────────────────────────────────

/// Request for the current image.
///
/// The payload is battery telemetry from the display device. The server
/// only logs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetImageRequest {
    /// Whether the fuel gauge readings below are meaningful.
    pub fuel_gauge_valid: bool,
    /// Estimated runtime until empty.
    pub runtime_to_empty: u32,
    /// Estimated time until fully charged.
    pub runtime_to_full: u32,
    /// State of charge in percent.
    pub charge_percentage: u8,
    /// Battery voltage.
    pub voltage: u32,
}

impl GetImageRequest {
    /// Payload layout following the type byte.
    pub const LAYOUT: [IntFormat; 5] = [
        IntFormat::U8,
        IntFormat::U32,
        IntFormat::U32,
        IntFormat::U8,
        IntFormat::U32,
    ];

    /// Parse the fixed payload (type byte already consumed).
    pub fn decode(payload: &[u8]) -> Result<Self, HeiError> {
        let values = encoding::decode(payload, &Self::LAYOUT)?;
        let [valid, to_empty, to_full, charge, voltage] = values[..] else {
            return Err(HeiError::ProtocolViolation("get-image payload layout"));
        };

        Ok(Self {
            fuel_gauge_valid: u8::try_from(valid)? != 0,
            runtime_to_empty: u32::try_from(to_empty)?,
            runtime_to_full: u32::try_from(to_full)?,
            charge_percentage: u8::try_from(charge)?,
            voltage: u32::try_from(voltage)?,
        })
    }

    fn values(&self) -> [PackedInt; 6] {
        [
            u8::from(MessageType::GetImageRequest).into(),
            u8::from(self.fuel_gauge_valid).into(),
            self.runtime_to_empty.into(),
            self.runtime_to_full.into(),
            self.charge_percentage.into(),
            self.voltage.into(),
        ]
    }
}

// ── Request ──────────────────────────────────────────────────────

/// Every message a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetImage(GetImageRequest),
}

impl Request {
    pub fn message_type(&self) -> MessageType {
        match self {
            Request::GetImage(_) => MessageType::GetImageRequest,
        }
    }

    /// Parse the fixed payload of a request of type `ty`.
    pub fn decode(ty: MessageType, payload: &[u8]) -> Result<Self, HeiError> {
        match ty {
            MessageType::GetImageRequest => GetImageRequest::decode(payload).map(Request::GetImage),
            other => Err(HeiError::UnexpectedMessage(other)),
        }
    }

    /// Append the type byte and payload to `dst`.
    pub fn encode_into<B: BufMut>(&self, dst: &mut B) {
        match self {
            Request::GetImage(req) => {
                encoding::encode_into(dst, ByteOrder::LittleEndian, &req.values())
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.message_type().fixed_payload_len());
        self.encode_into(&mut out);
        out
    }
}
