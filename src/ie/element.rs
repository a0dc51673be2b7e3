//! Information-element types, shapes and values.

use std::fmt;

use crate::core::IeError;

/// Shape of an element's value, fixed per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IeShape {
    /// Variable-length string.
    Text,
    /// Variable-length opaque bytes.
    Binary,
    /// Opaque bytes of exactly this length.
    FixedBinary(usize),
    /// One-byte integer.
    U8,
    /// Two-byte big-endian integer.
    U16,
    /// Four-byte big-endian integer.
    U32,
    /// Presence only, no value bytes.
    Flag,
}

impl IeShape {
    /// Required value length, `None` for variable-length shapes.
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            Self::Text | Self::Binary => None,
            Self::FixedBinary(len) => Some(len),
            Self::U8 => Some(1),
            Self::U16 => Some(2),
            Self::U32 => Some(4),
            Self::Flag => Some(0),
        }
    }
}

macro_rules! ie_types {
    ($($variant:ident = $tag:literal, $name:literal, $shape:expr;)+) => {
        /// Information-element type tag.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum IeType {
            $(
                #[doc = $name]
                $variant,
            )+
            /// Tag not known to this implementation, kept as binary.
            Unknown(u8),
        }

        impl IeType {
            /// Parse a type from its tag byte.
            pub fn from_byte(byte: u8) -> Self {
                match byte {
                    $($tag => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }

            /// Tag byte.
            pub fn as_byte(self) -> u8 {
                match self {
                    $(Self::$variant => $tag,)+
                    Self::Unknown(other) => other,
                }
            }

            /// Registry name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                    Self::Unknown(_) => "UNKNOWN",
                }
            }

            /// Value shape from the type table.
            pub fn shape(self) -> IeShape {
                match self {
                    $(Self::$variant => $shape,)+
                    Self::Unknown(_) => IeShape::Binary,
                }
            }
        }
    };
}

ie_types! {
    TextFrame = 0x00, "TEXTFRAME", IeShape::Text;
    CalledNumber = 0x01, "CALLED_NUMBER", IeShape::Text;
    CallingNumber = 0x02, "CALLING_NUMBER", IeShape::Text;
    CallingAni = 0x03, "CALLING_ANI", IeShape::Text;
    CallingName = 0x04, "CALLING_NAME", IeShape::Text;
    CalledContext = 0x05, "CALLED_CONTEXT", IeShape::Text;
    Username = 0x06, "USERNAME", IeShape::Text;
    Password = 0x07, "PASSWORD", IeShape::Text;
    Capability = 0x08, "CAPABILITY", IeShape::U32;
    Format = 0x09, "FORMAT", IeShape::U32;
    Language = 0x0a, "LANGUAGE", IeShape::Text;
    Version = 0x0b, "VERSION", IeShape::U16;
    AdsiCpe = 0x0c, "ADSICPE", IeShape::U16;
    Dnid = 0x0d, "DNID", IeShape::Text;
    AuthMethods = 0x0e, "AUTHMETHODS", IeShape::U16;
    Challenge = 0x0f, "CHALLENGE", IeShape::Text;
    Md5Result = 0x10, "MD5_RESULT", IeShape::Text;
    RsaResult = 0x11, "RSA_RESULT", IeShape::Text;
    ApparentAddr = 0x12, "APPARENT_ADDR", IeShape::Binary;
    Refresh = 0x13, "REFRESH", IeShape::U16;
    DpStatus = 0x14, "DPSTATUS", IeShape::U16;
    CallNo = 0x15, "CALLNO", IeShape::U16;
    Cause = 0x16, "CAUSE", IeShape::Text;
    IaxUnknown = 0x17, "IAX_UNKNOWN", IeShape::U8;
    MsgCount = 0x18, "MSGCOUNT", IeShape::U16;
    AutoAnswer = 0x19, "AUTOANSWER", IeShape::Flag;
    MusicOnHold = 0x1a, "MUSICONHOLD", IeShape::Text;
    TransferId = 0x1b, "TRANSFERID", IeShape::U32;
    Rdnis = 0x1c, "RDNIS", IeShape::Text;
    Provisioning = 0x1d, "PROVISIONING", IeShape::Binary;
    AesProvisioning = 0x1e, "AESPROVISIONING", IeShape::Binary;
    DateTime = 0x1f, "DATETIME", IeShape::U32;
    DeviceType = 0x20, "DEVICETYPE", IeShape::Text;
    ServiceIdent = 0x21, "SERVICEIDENT", IeShape::FixedBinary(6);
    FirmwareVer = 0x22, "FIRMWAREVER", IeShape::U16;
    FwBlockDesc = 0x23, "FWBLOCKDESC", IeShape::U32;
    FwBlockData = 0x24, "FWBLOCKDATA", IeShape::Binary;
    ProvVer = 0x25, "PROVVER", IeShape::U32;
    CallingPres = 0x26, "CALLINGPRES", IeShape::U8;
    CallingTon = 0x27, "CALLINGTON", IeShape::U8;
    CallingTns = 0x28, "CALLINGTNS", IeShape::U16;
    SamplingRate = 0x29, "SAMPLINGRATE", IeShape::U32;
    CauseCode = 0x2a, "CAUSECODE", IeShape::U8;
    Encryption = 0x2b, "ENCRYPTION", IeShape::U8;
    EnKey = 0x2c, "ENKEY", IeShape::Binary;
    CodecPrefs = 0x2d, "CODEC_PREFS", IeShape::Binary;
    RrJitter = 0x2e, "RR_JITTER", IeShape::U32;
    RrLoss = 0x2f, "RR_LOSS", IeShape::U32;
    RrPkts = 0x30, "RR_PKTS", IeShape::U32;
    RrDelay = 0x31, "RR_DELAY", IeShape::U16;
    RrDropped = 0x32, "RR_DROPPED", IeShape::U32;
    RrOoo = 0x33, "RR_OOO", IeShape::U32;
    CallToken = 0x36, "CALLTOKEN", IeShape::Binary;
    Capability2 = 0x37, "CAPABILITY2", IeShape::Binary;
    Format2 = 0x38, "FORMAT2", IeShape::Binary;
}

impl fmt::Display for IeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(tag) => write!(f, "UNKNOWN({tag:#04x})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Value of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IeValue {
    /// Integer of `width` bytes.
    Numeric {
        /// Wire width: 1, 2 or 4.
        width: u8,
        /// Value.
        value: u32,
    },
    /// String bytes as received. Peers may send non-UTF-8 text.
    Text(Vec<u8>),
    /// Opaque bytes.
    Binary(Vec<u8>),
    /// Presence only.
    Flag,
}

/// One `[type][length][value]` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoElement {
    /// Type tag.
    pub ie_type: IeType,
    /// Value.
    pub value: IeValue,
}

impl InfoElement {
    /// Interpret `value` according to the type's shape.
    pub fn from_wire(ie_type: IeType, value: &[u8]) -> Result<Self, IeError> {
        let shape = ie_type.shape();
        if let Some(expected) = shape.fixed_len() {
            if value.len() != expected {
                return Err(IeError::LengthMismatch {
                    ie: ie_type,
                    expected,
                    actual: value.len(),
                });
            }
        }
        let value = match shape {
            IeShape::Text => IeValue::Text(value.to_vec()),
            IeShape::Binary | IeShape::FixedBinary(_) => IeValue::Binary(value.to_vec()),
            IeShape::U8 => IeValue::Numeric {
                width: 1,
                value: u32::from(value[0]),
            },
            IeShape::U16 => IeValue::Numeric {
                width: 2,
                value: u32::from(u16::from_be_bytes([value[0], value[1]])),
            },
            IeShape::U32 => IeValue::Numeric {
                width: 4,
                value: u32::from_be_bytes([value[0], value[1], value[2], value[3]]),
            },
            IeShape::Flag => IeValue::Flag,
        };
        Ok(Self { ie_type, value })
    }

    /// Value bytes as they go on the wire.
    pub fn value_bytes(&self) -> Vec<u8> {
        match &self.value {
            IeValue::Numeric { width: 1, value } => vec![*value as u8],
            IeValue::Numeric { width: 2, value } => (*value as u16).to_be_bytes().to_vec(),
            IeValue::Numeric { value, .. } => value.to_be_bytes().to_vec(),
            IeValue::Text(text) => text.clone(),
            IeValue::Binary(data) => data.clone(),
            IeValue::Flag => Vec::new(),
        }
    }

    /// Append `[type][length][value]` to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let value = self.value_bytes();
        buf.push(self.ie_type.as_byte());
        buf.push(value.len() as u8);
        buf.extend_from_slice(&value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_table() {
        assert_eq!(IeType::from_byte(0x0b), IeType::Version);
        assert_eq!(IeType::Version.shape(), IeShape::U16);
        assert_eq!(IeType::Capability.shape(), IeShape::U32);
        assert_eq!(IeType::CauseCode.shape(), IeShape::U8);
        assert_eq!(IeType::AutoAnswer.shape(), IeShape::Flag);
        assert_eq!(IeType::ServiceIdent.shape(), IeShape::FixedBinary(6));
        assert_eq!(IeType::from_byte(0x7e), IeType::Unknown(0x7e));
        assert_eq!(IeType::Unknown(0x7e).shape(), IeShape::Binary);
        for tag in 0..=u8::MAX {
            assert_eq!(IeType::from_byte(tag).as_byte(), tag);
        }
    }

    #[test]
    fn test_from_wire_numeric() {
        let ie = InfoElement::from_wire(IeType::Format, &[0, 0, 0, 4]).unwrap();
        assert_eq!(ie.value, IeValue::Numeric { width: 4, value: 4 });
        assert_eq!(ie.value_bytes(), vec![0, 0, 0, 4]);

        let err = InfoElement::from_wire(IeType::Format, &[0, 4]).unwrap_err();
        assert_eq!(
            err,
            IeError::LengthMismatch {
                ie: IeType::Format,
                expected: 4,
                actual: 2
            }
        );
    }

    #[test]
    fn test_from_wire_flag_and_fixed_binary() {
        assert_eq!(
            InfoElement::from_wire(IeType::AutoAnswer, &[]).unwrap().value,
            IeValue::Flag
        );
        assert!(InfoElement::from_wire(IeType::AutoAnswer, &[1]).is_err());
        assert!(InfoElement::from_wire(IeType::ServiceIdent, &[1, 2, 3, 4, 5, 6]).is_ok());
        assert!(InfoElement::from_wire(IeType::ServiceIdent, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_encode_into() {
        let ie = InfoElement {
            ie_type: IeType::Username,
            value: IeValue::Text(b"bob".to_vec()),
        };
        let mut buf = Vec::new();
        ie.encode_into(&mut buf);
        assert_eq!(buf, vec![0x06, 3, b'b', b'o', b'b']);
    }
}
