//! `tokio_util` codecs for both ends of a connection.
//!
//! [`ServerCodec`] decodes [`Request`]s and encodes [`Response`]s;
//! [`ClientCodec`] is its mirror image. Both reject an unknown type byte
//! as soon as it arrives instead of waiting for a payload that will
//! never be well-formed.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::HeiError;
use crate::message::MessageType;
use crate::protocol::{ImageBlockResponse, ImageHeaderResponse, Request, Response};

/// Peek the type byte at the front of `src`.
fn peek_type(src: &BytesMut) -> Result<Option<MessageType>, HeiError> {
    src.first().map(|&b| MessageType::try_from(b)).transpose()
}

fn eof_error(src: &BytesMut) -> HeiError {
    tracing::debug!("connection closed with {} buffered bytes", src.len());
    HeiError::ProtocolViolation("connection closed mid-message")
}

// ── ServerCodec ──────────────────────────────────────────────────

/// Server side: requests in, responses out.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServerCodec;

impl Decoder for ServerCodec {
    type Item = Request;
    type Error = HeiError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(ty) = peek_type(src)? else {
            return Ok(None);
        };
        if !ty.is_request() {
            return Err(HeiError::UnexpectedMessage(ty));
        }

        let frame_len = 1 + ty.fixed_payload_len();
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len);
        Request::decode(ty, &frame[1..]).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(request) => Ok(Some(request)),
            None if src.is_empty() => Ok(None),
            None => Err(eof_error(src)),
        }
    }
}

impl Encoder<Response> for ServerCodec {
    type Error = HeiError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.encoded_len());
        item.encode_into(dst);
        Ok(())
    }
}

// ── ClientCodec ──────────────────────────────────────────────────

/// Client side: responses in, requests out.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientCodec;

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = HeiError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(ty) = peek_type(src)? else {
            return Ok(None);
        };

        let header_len = 1 + ty.fixed_payload_len();
        if src.len() < header_len {
            src.reserve(header_len - src.len());
            return Ok(None);
        }

        match ty {
            MessageType::ServerError => {
                src.advance(1);
                Ok(Some(Response::ServerError))
            }
            MessageType::ImageHeaderResponse => {
                let frame = src.split_to(header_len);
                ImageHeaderResponse::decode(&frame[1..]).map(|h| Some(Response::ImageHeader(h)))
            }
            MessageType::ImageBlockResponse => {
                let (uncompressed, compressed) =
                    ImageBlockResponse::decode_header(&src[1..header_len])?;
                let frame_len = header_len + compressed as usize;
                if src.len() < frame_len {
                    src.reserve(frame_len - src.len());
                    return Ok(None);
                }

                let mut frame = src.split_to(frame_len);
                frame.advance(header_len);
                ImageBlockResponse::from_parts(uncompressed, frame.freeze())
                    .map(|b| Some(Response::ImageBlock(b)))
            }
            MessageType::GetImageRequest => Err(HeiError::UnexpectedMessage(ty)),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(response) => Ok(Some(response)),
            None if src.is_empty() => Ok(None),
            None => Err(eof_error(src)),
        }
    }
}

impl Encoder<Request> for ClientCodec {
    type Error = HeiError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(1 + item.message_type().fixed_payload_len());
        item.encode_into(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosted::Block;
    use crate::protocol::GetImageRequest;

    #[test]
    fn request_waits_for_full_payload() {
        let bytes = Request::GetImage(GetImageRequest::default()).to_bytes();
        let mut codec = ServerCodec;
        let mut buf = BytesMut::from(&bytes[..10]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&bytes[10..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Request::GetImage(GetImageRequest::default()))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn unknown_type_fails_immediately() {
        let mut buf = BytesMut::from(&[0xFFu8][..]);
        assert!(matches!(
            ServerCodec.decode(&mut buf),
            Err(HeiError::UnknownMessageType(0xFF))
        ));
    }

    #[test]
    fn server_rejects_response_types() {
        let mut buf = BytesMut::from(&[0x11u8][..]);
        assert!(matches!(
            ServerCodec.decode(&mut buf),
            Err(HeiError::UnexpectedMessage(MessageType::ImageHeaderResponse))
        ));
    }

    #[test]
    fn eof_mid_request_is_a_protocol_error() {
        let mut buf = BytesMut::from(&[0x10u8, 0x01, 0x02][..]);
        assert!(matches!(
            ServerCodec.decode_eof(&mut buf),
            Err(HeiError::ProtocolViolation(_))
        ));
        assert!(ServerCodec.decode_eof(&mut BytesMut::new()).unwrap().is_none());
    }

    #[test]
    fn client_reassembles_split_block() {
        let block = Block::compress(&[7u8; 4096]).unwrap();
        let msg = Response::ImageBlock(ImageBlockResponse { block });

        let mut wire = BytesMut::new();
        ServerCodec.encode(msg.clone(), &mut wire).unwrap();
        ServerCodec.encode(Response::ServerError, &mut wire).unwrap();

        let mut codec = ClientCodec;
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for chunk in wire.chunks(3) {
            buf.extend_from_slice(chunk);
            while let Some(resp) = codec.decode(&mut buf).unwrap() {
                decoded.push(resp);
            }
        }

        assert_eq!(decoded, vec![msg, Response::ServerError]);
    }
}
