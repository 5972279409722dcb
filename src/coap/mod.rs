//! CoAP message model shared by the dispatcher and the transport adapter.
//!
//! The stack parses incoming messages; this module only carries the parts
//! the resources care about (path, type, code, token, payload, peer) and
//! the response the dispatcher wants sent back.  Framing stays in the stack.

pub mod dispatcher;
pub mod resources;

/// Largest token CoAP allows (RFC 7252 §3).
pub const MAX_TOKEN_LEN: usize = 8;
/// Payload bytes kept from a request; every resource takes at most one.
pub const MAX_PAYLOAD_LEN: usize = 16;
/// Longest Uri-Path served.
pub const MAX_PATH_LEN: usize = 16;

pub type Token = heapless::Vec<u8, MAX_TOKEN_LEN>;
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;
pub type UriPath = heapless::String<MAX_PATH_LEN>;

// ── Header fields ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Confirmable = 0,
    NonConfirmable = 1,
    Acknowledgement = 2,
    Reset = 3,
}

impl MessageType {
    pub fn from_raw(raw: u8) -> Self {
        match raw & 0x03 {
            0 => Self::Confirmable,
            1 => Self::NonConfirmable,
            2 => Self::Acknowledgement,
            _ => Self::Reset,
        }
    }
}

/// Request methods and the response codes this node sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Get,
    Post,
    Put,
    Delete,
    /// 2.04
    Changed,
    /// 2.05
    Content,
    Other(u8),
}

impl Code {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x01 => Self::Get,
            0x02 => Self::Post,
            0x03 => Self::Put,
            0x04 => Self::Delete,
            0x44 => Self::Changed,
            0x45 => Self::Content,
            other => Self::Other(other),
        }
    }

    /// Wire value: class in the top 3 bits, detail in the low 5.
    pub fn raw(self) -> u8 {
        match self {
            Self::Get => 0x01,
            Self::Post => 0x02,
            Self::Put => 0x03,
            Self::Delete => 0x04,
            Self::Changed => 0x44,
            Self::Content => 0x45,
            Self::Other(raw) => raw,
        }
    }
}

/// Where a request came from, enough for the stack to address the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Peer {
    pub address: [u8; 16],
    pub port: u16,
}

// ── Request / Response ────────────────────────────────────────

/// A parsed inbound request.
///
/// `payload` keeps at most the first [`MAX_PAYLOAD_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: UriPath,
    pub message_type: MessageType,
    pub code: Code,
    pub message_id: u16,
    pub token: Token,
    pub payload: Payload,
    pub peer: Peer,
}

impl Request {
    /// Build a request, truncating path, token and payload to capacity.
    pub fn new(path: &str, message_type: MessageType, code: Code, token: &[u8], payload: &[u8]) -> Self {
        let mut p = UriPath::new();
        for ch in path.chars() {
            if p.push(ch).is_err() {
                break;
            }
        }
        Self {
            path: p,
            message_type,
            code,
            message_id: 0,
            token: truncated(token),
            payload: truncated(payload),
            peer: Peer::default(),
        }
    }

    pub fn with_peer(mut self, peer: Peer, message_id: u16) -> Self {
        self.peer = peer;
        self.message_id = message_id;
        self
    }
}

fn truncated<const N: usize>(bytes: &[u8]) -> heapless::Vec<u8, N> {
    let len = bytes.len().min(N);
    let mut v = heapless::Vec::new();
    let _ = v.extend_from_slice(&bytes[..len]);
    v
}

/// A response the dispatcher wants sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub message_type: MessageType,
    pub code: Code,
    pub token: Token,
    pub payload: Payload,
}

impl Response {
    /// Reply to `request` with `code` and `payload`, echoing its token.
    ///
    /// Confirmable requests get a piggybacked acknowledgement; everything
    /// else a non-confirmable reply.
    pub fn to(request: &Request, code: Code, payload: &[u8]) -> Self {
        let message_type = match request.message_type {
            MessageType::Confirmable => MessageType::Acknowledgement,
            _ => MessageType::NonConfirmable,
        };
        Self {
            message_type,
            code,
            token: request.token.clone(),
            payload: truncated(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_raw_values_follow_rfc7252() {
        assert_eq!(Code::Get.raw(), 0x01);
        assert_eq!(Code::Put.raw(), 0x03);
        assert_eq!(Code::Changed.raw(), (2 << 5) | 4);
        assert_eq!(Code::Content.raw(), (2 << 5) | 5);
        assert_eq!(Code::from_raw(0x45), Code::Content);
        assert_eq!(Code::from_raw(0x84), Code::Other(0x84));
    }

    #[test]
    fn response_echoes_token() {
        let req = Request::new("light", MessageType::NonConfirmable, Code::Get, &[1, 2, 3, 4], &[]);
        let resp = Response::to(&req, Code::Content, &[1]);
        assert_eq!(resp.token.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(resp.message_type, MessageType::NonConfirmable);
    }

    #[test]
    fn confirmable_request_gets_acknowledgement() {
        let req = Request::new("info", MessageType::Confirmable, Code::Get, &[9], &[]);
        assert_eq!(
            Response::to(&req, Code::Content, &[]).message_type,
            MessageType::Acknowledgement
        );
    }

    #[test]
    fn oversized_fields_are_truncated() {
        let req = Request::new(
            "a-very-long-resource-path",
            MessageType::NonConfirmable,
            Code::Put,
            &[0xAA; 12],
            &[b'1'; 40],
        );
        assert_eq!(req.path.len(), MAX_PATH_LEN);
        assert_eq!(req.token.len(), MAX_TOKEN_LEN);
        assert_eq!(req.payload.len(), MAX_PAYLOAD_LEN);
    }
}
