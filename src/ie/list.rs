//! Information-element list codec.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use super::element::{IeType, IeValue, InfoElement};
use crate::core::{IeError, MAX_IE_VALUE_LEN, PROTOCOL_VERSION};
use crate::frame::FrameType;

const AF_INET: u16 = 2;
const AF_INET6: u16 = 10;
const SOCKADDR_IN_LEN: usize = 16;
const SOCKADDR_IN6_LEN: usize = 28;

/// Ordered list of information elements from one full frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IeList {
    elements: Vec<InfoElement>,
}

impl IeList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the payload of a full frame of category `frame_type`.
    ///
    /// Voice and video frames carry no elements. A text frame carries its
    /// whole payload as one [`IeType::TextFrame`] element. Anything else is
    /// parsed as `[type][length][value]` triples; the first malformed
    /// element fails the whole list.
    pub fn decode(frame_type: FrameType, payload: &[u8]) -> Result<Self, IeError> {
        let mut list = Self::new();
        match frame_type {
            FrameType::Voice | FrameType::Video => return Ok(list),
            FrameType::Text => {
                list.elements.push(InfoElement::from_wire(IeType::TextFrame, payload)?);
                return Ok(list);
            }
            _ => {}
        }

        let mut offset = 0;
        while offset < payload.len() {
            if payload.len() - offset < 2 {
                return Err(IeError::Truncated { offset });
            }
            let ie_type = IeType::from_byte(payload[offset]);
            let len = usize::from(payload[offset + 1]);
            let start = offset + 2;
            let Some(value) = payload.get(start..start + len) else {
                return Err(IeError::Truncated { offset });
            };
            list.elements.push(InfoElement::from_wire(ie_type, value)?);
            offset = start + len;
        }
        Ok(list)
    }

    /// Serialize the list in order.
    ///
    /// A [`IeType::TextFrame`] element is written as its raw bytes, which is
    /// how a text frame's payload is laid out.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for element in &self.elements {
            if element.ie_type == IeType::TextFrame {
                buf.extend_from_slice(&element.value_bytes());
            } else {
                element.encode_into(&mut buf);
            }
        }
        buf
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &InfoElement> {
        self.elements.iter()
    }

    /// First element of type `ie_type`.
    pub fn get(&self, ie_type: IeType) -> Option<&InfoElement> {
        self.elements.iter().find(|e| e.ie_type == ie_type)
    }

    /// Whether an element of type `ie_type` is present.
    pub fn contains(&self, ie_type: IeType) -> bool {
        self.get(ie_type).is_some()
    }

    /// Integer value of `ie_type`.
    pub fn get_numeric(&self, ie_type: IeType) -> Option<u32> {
        match self.get(ie_type)?.value {
            IeValue::Numeric { value, .. } => Some(value),
            _ => None,
        }
    }

    /// String value of `ie_type`, `None` when it is not valid UTF-8.
    pub fn get_text(&self, ie_type: IeType) -> Option<&str> {
        std::str::from_utf8(self.get_text_bytes(ie_type)?).ok()
    }

    /// Raw bytes of a string element of `ie_type`.
    pub fn get_text_bytes(&self, ie_type: IeType) -> Option<&[u8]> {
        match &self.get(ie_type)?.value {
            IeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Binary value of `ie_type`.
    pub fn get_binary(&self, ie_type: IeType) -> Option<&[u8]> {
        match &self.get(ie_type)?.value {
            IeValue::Binary(data) => Some(data),
            _ => None,
        }
    }

    /// Address packed in an APPARENT_ADDR element.
    pub fn get_addr(&self) -> Option<SocketAddr> {
        unpack_addr(self.get_binary(IeType::ApparentAddr)?)
    }

    /// Append an element after checking its value against the type table.
    pub fn push(&mut self, element: InfoElement) -> Result<&mut Self, IeError> {
        let bytes = element.value_bytes();
        if bytes.len() > MAX_IE_VALUE_LEN {
            return Err(IeError::ValueTooLong {
                ie: element.ie_type,
                len: bytes.len(),
            });
        }
        let checked = InfoElement::from_wire(element.ie_type, &bytes)?;
        self.elements.push(checked);
        Ok(self)
    }

    /// Append an integer, sized by the type's shape.
    pub fn append_numeric(&mut self, ie_type: IeType, value: u32) -> &mut Self {
        let width = match ie_type.shape().fixed_len() {
            Some(1) => 1,
            Some(2) => 2,
            _ => 4,
        };
        self.elements.push(InfoElement {
            ie_type,
            value: IeValue::Numeric { width, value },
        });
        self
    }

    /// Append a string. Fails when longer than 255 bytes.
    pub fn append_text(&mut self, ie_type: IeType, text: &str) -> Result<&mut Self, IeError> {
        if text.len() > MAX_IE_VALUE_LEN {
            return Err(IeError::ValueTooLong {
                ie: ie_type,
                len: text.len(),
            });
        }
        self.elements.push(InfoElement {
            ie_type,
            value: IeValue::Text(text.as_bytes().to_vec()),
        });
        Ok(self)
    }

    /// Append opaque bytes. Fails when longer than 255 bytes.
    pub fn append_binary(&mut self, ie_type: IeType, data: &[u8]) -> Result<&mut Self, IeError> {
        if data.len() > MAX_IE_VALUE_LEN {
            return Err(IeError::ValueTooLong {
                ie: ie_type,
                len: data.len(),
            });
        }
        self.elements.push(InfoElement {
            ie_type,
            value: IeValue::Binary(data.to_vec()),
        });
        Ok(self)
    }

    /// Append a presence-only element.
    pub fn append_flag(&mut self, ie_type: IeType) -> &mut Self {
        self.elements.push(InfoElement {
            ie_type,
            value: IeValue::Flag,
        });
        self
    }

    /// Append an APPARENT_ADDR element.
    pub fn append_addr(&mut self, addr: SocketAddr) -> &mut Self {
        self.elements.push(InfoElement {
            ie_type: IeType::ApparentAddr,
            value: IeValue::Binary(pack_addr(addr)),
        });
        self
    }

    /// Prepend VERSION unless the list already has one.
    pub fn insert_version(&mut self) -> &mut Self {
        if !self.contains(IeType::Version) {
            self.elements.insert(
                0,
                InfoElement {
                    ie_type: IeType::Version,
                    value: IeValue::Numeric {
                        width: 2,
                        value: u32::from(PROTOCOL_VERSION),
                    },
                },
            );
        }
        self
    }

    /// Whether VERSION is present and matches this implementation.
    pub fn valid_version(&self) -> bool {
        self.get_numeric(IeType::Version) == Some(u32::from(PROTOCOL_VERSION))
    }
}

impl<'a> IntoIterator for &'a IeList {
    type Item = &'a InfoElement;
    type IntoIter = std::slice::Iter<'a, InfoElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// Pack an address the way peers lay out `sockaddr_in`/`sockaddr_in6`:
/// family in little-endian host order, port and address in network order.
pub fn pack_addr(addr: SocketAddr) -> Vec<u8> {
    match addr {
        SocketAddr::V4(v4) => {
            let mut buf = vec![0u8; SOCKADDR_IN_LEN];
            buf[0..2].copy_from_slice(&AF_INET.to_le_bytes());
            buf[2..4].copy_from_slice(&v4.port().to_be_bytes());
            buf[4..8].copy_from_slice(&v4.ip().octets());
            buf
        }
        SocketAddr::V6(v6) => {
            let mut buf = vec![0u8; SOCKADDR_IN6_LEN];
            buf[0..2].copy_from_slice(&AF_INET6.to_le_bytes());
            buf[2..4].copy_from_slice(&v6.port().to_be_bytes());
            buf[4..8].copy_from_slice(&v6.flowinfo().to_be_bytes());
            buf[8..24].copy_from_slice(&v6.ip().octets());
            buf[24..28].copy_from_slice(&v6.scope_id().to_le_bytes());
            buf
        }
    }
}

/// Inverse of [`pack_addr`]. Accepts the family in either byte order.
pub fn unpack_addr(data: &[u8]) -> Option<SocketAddr> {
    if data.len() < 4 {
        return None;
    }
    let family = u16::from_le_bytes([data[0], data[1]]);
    let family = if family > 0xff { family.swap_bytes() } else { family };
    let port = u16::from_be_bytes([data[2], data[3]]);
    match family {
        AF_INET if data.len() >= 8 => {
            let ip = Ipv4Addr::new(data[4], data[5], data[6], data[7]);
            Some(SocketAddr::new(IpAddr::V4(ip), port))
        }
        AF_INET6 if data.len() >= 24 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&data[8..24]);
            Some(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_list() {
        let payload = hex::decode("0b0200020603626f62090400000004").unwrap();
        let list = IeList::decode(FrameType::Iax, &payload).unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.valid_version());
        assert_eq!(list.get_text(IeType::Username), Some("bob"));
        assert_eq!(list.get_numeric(IeType::Format), Some(4));
        assert_eq!(list.encode(), payload);
    }

    #[test]
    fn test_length_mismatch_invalidates_list() {
        // VERSION declared with three bytes.
        let payload = hex::decode("0603626f620b03000002").unwrap();
        assert_eq!(
            IeList::decode(FrameType::Iax, &payload),
            Err(IeError::LengthMismatch {
                ie: IeType::Version,
                expected: 2,
                actual: 3
            })
        );

        for (ie_type, good) in [
            (IeType::CauseCode, 1usize),
            (IeType::Refresh, 2),
            (IeType::Capability, 4),
            (IeType::AutoAnswer, 0),
        ] {
            let bad = good + 1;
            let mut payload = vec![ie_type.as_byte(), bad as u8];
            payload.extend(std::iter::repeat_n(0u8, bad));
            assert!(IeList::decode(FrameType::Iax, &payload).is_err(), "{ie_type}");
        }
    }

    #[test]
    fn test_unknown_type_kept_as_binary() {
        let payload = hex::decode("7e02abcd0b020002").unwrap();
        let list = IeList::decode(FrameType::Iax, &payload).unwrap();
        assert_eq!(list.get_binary(IeType::Unknown(0x7e)), Some(&[0xab, 0xcd][..]));
        assert!(list.valid_version());
        assert_eq!(list.encode(), payload);
    }

    #[test]
    fn test_truncated_list() {
        assert_eq!(
            IeList::decode(FrameType::Iax, &[0x06]),
            Err(IeError::Truncated { offset: 0 })
        );
        assert_eq!(
            IeList::decode(FrameType::Iax, &[0x06, 0x05, b'a']),
            Err(IeError::Truncated { offset: 0 })
        );
        assert!(IeList::decode(FrameType::Iax, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_non_utf8_text_kept_verbatim() {
        // CALLING_NAME "J\xe9r" in Latin-1
        let payload = hex::decode("04034ae972").unwrap();
        let list = IeList::decode(FrameType::Iax, &payload).unwrap();
        assert_eq!(list.get_text(IeType::CallingName), None);
        assert_eq!(list.get_text_bytes(IeType::CallingName), Some(&[0x4a, 0xe9, 0x72][..]));
        assert_eq!(list.encode(), payload);

        let list = IeList::decode(FrameType::Text, &[0x68, 0xff]).unwrap();
        assert_eq!(list.encode(), vec![0x68, 0xff]);
    }

    #[test]
    fn test_media_and_text_frames() {
        assert!(IeList::decode(FrameType::Voice, &[1, 2, 3]).unwrap().is_empty());
        assert!(IeList::decode(FrameType::Video, &[0xff]).unwrap().is_empty());

        let list = IeList::decode(FrameType::Text, b"hello").unwrap();
        assert_eq!(list.get_text(IeType::TextFrame), Some("hello"));
        assert_eq!(list.encode(), b"hello".to_vec());
    }

    #[test]
    fn test_insert_version_idempotent() {
        let mut list = IeList::new();
        list.append_text(IeType::Username, "alice").unwrap();
        list.insert_version().insert_version();
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().next().unwrap().ie_type, IeType::Version);
        assert!(list.valid_version());
    }

    #[test]
    fn test_append_limits() {
        let mut list = IeList::new();
        let long = "x".repeat(256);
        assert!(matches!(
            list.append_text(IeType::Cause, &long),
            Err(IeError::ValueTooLong { len: 256, .. })
        ));
        assert!(list.append_binary(IeType::CallToken, &[0; 255]).is_ok());
        let oversized = InfoElement {
            ie_type: IeType::Version,
            value: IeValue::Numeric { width: 4, value: 2 },
        };
        assert!(list.push(oversized).is_err());
    }

    #[test]
    fn test_append_numeric_width() {
        let mut list = IeList::new();
        list.append_numeric(IeType::CauseCode, 16)
            .append_numeric(IeType::Refresh, 60)
            .append_numeric(IeType::Format, 4)
            .append_flag(IeType::AutoAnswer);
        assert_eq!(hex::encode(list.encode()), "2a01101302003c0904000000041900");
    }

    #[test]
    fn test_apparent_addr() {
        let v4: SocketAddr = "10.1.2.3:4569".parse().unwrap();
        let packed = pack_addr(v4);
        assert_eq!(hex::encode(&packed), "020011d90a0102030000000000000000");
        assert_eq!(unpack_addr(&packed), Some(v4));

        let mut swapped = packed.clone();
        swapped.swap(0, 1);
        assert_eq!(unpack_addr(&swapped), Some(v4));

        let v6: SocketAddr = "[2001:db8::1]:5000".parse().unwrap();
        let mut list = IeList::new();
        list.append_addr(v6);
        assert_eq!(list.get_addr(), Some(v6));
    }
}
