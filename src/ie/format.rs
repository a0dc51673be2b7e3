//! Media format and authentication-method bit masks.

use std::fmt;

/// Media format bit mask (FORMAT and CAPABILITY elements, media subclasses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FormatMask(u32);

impl FormatMask {
    /// No format.
    pub const NONE: Self = Self(0);
    /// G.723.1.
    pub const G723_1: Self = Self(1 << 0);
    /// GSM full rate.
    pub const GSM: Self = Self(1 << 1);
    /// G.711 mu-law.
    pub const ULAW: Self = Self(1 << 2);
    /// G.711 A-law.
    pub const ALAW: Self = Self(1 << 3);
    /// G.726 (RFC 3551 packing).
    pub const G726: Self = Self(1 << 4);
    /// IMA ADPCM.
    pub const ADPCM: Self = Self(1 << 5);
    /// Signed linear 16-bit.
    pub const SLIN: Self = Self(1 << 6);
    /// LPC-10.
    pub const LPC10: Self = Self(1 << 7);
    /// G.729A.
    pub const G729: Self = Self(1 << 8);
    /// Speex.
    pub const SPEEX: Self = Self(1 << 9);
    /// iLBC.
    pub const ILBC: Self = Self(1 << 10);
    /// G.726 (AAL2 packing).
    pub const G726_AAL2: Self = Self(1 << 11);
    /// G.722.
    pub const G722: Self = Self(1 << 12);
    /// AMR.
    pub const AMR: Self = Self(1 << 13);
    /// GSM half rate.
    pub const GSM_HR: Self = Self(1 << 31);
    /// JPEG image.
    pub const JPEG: Self = Self(1 << 16);
    /// PNG image.
    pub const PNG: Self = Self(1 << 17);
    /// H.261 video.
    pub const H261: Self = Self(1 << 18);
    /// H.263 video.
    pub const H263: Self = Self(1 << 19);
    /// H.263+ video.
    pub const H263P: Self = Self(1 << 20);
    /// H.264 video.
    pub const H264: Self = Self(1 << 21);

    /// Every audio format.
    pub const AUDIO_MASK: Self = Self(0x0000_ffff | (1 << 31));
    /// Every video format.
    pub const VIDEO_MASK: Self = Self(0x003c_0000);

    const NAMES: [(Self, &'static str); 21] = [
        (Self::G723_1, "g723"),
        (Self::GSM, "gsm"),
        (Self::ULAW, "mulaw"),
        (Self::ALAW, "alaw"),
        (Self::G726, "g726"),
        (Self::ADPCM, "adpcm"),
        (Self::SLIN, "slin"),
        (Self::LPC10, "lpc10"),
        (Self::G729, "g729"),
        (Self::SPEEX, "speex"),
        (Self::ILBC, "ilbc"),
        (Self::G726_AAL2, "g726aal2"),
        (Self::G722, "g722"),
        (Self::AMR, "amr"),
        (Self::GSM_HR, "gsmhr"),
        (Self::JPEG, "jpeg"),
        (Self::PNG, "png"),
        (Self::H261, "h261"),
        (Self::H263, "h263"),
        (Self::H263P, "h263p"),
        (Self::H264, "h264"),
    ];

    /// Wrap raw bits.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Bits shared with `other`.
    pub fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Audio bits only.
    pub fn audio(self) -> Self {
        self.intersect(Self::AUDIO_MASK)
    }

    /// Video bits only.
    pub fn video(self) -> Self {
        self.intersect(Self::VIDEO_MASK)
    }

    /// Lowest set bit, used to pick one format from a capability.
    pub fn first(self) -> Self {
        Self(self.0 & self.0.wrapping_neg())
    }

    /// Name of a single-bit format.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .find(|(format, _)| *format == self)
            .map(|(_, name)| *name)
    }

    /// Names of every known bit that is set.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(format, _)| self.contains(*format))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for FormatMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(","))
    }
}

/// Authentication method mask (AUTHMETHODS element).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AuthMethods(u16);

impl AuthMethods {
    /// Plain text password.
    pub const TEXT: Self = Self(0x01);
    /// MD5 challenge/response.
    pub const MD5: Self = Self(0x02);
    /// RSA signature.
    pub const RSA: Self = Self(0x04);

    /// Wrap raw bits.
    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Names of the set methods.
    pub fn names(self) -> Vec<&'static str> {
        [(Self::TEXT, "Text"), (Self::MD5, "MD5"), (Self::RSA, "RSA")]
            .into_iter()
            .filter(|(method, _)| self.contains(*method))
            .map(|(_, name)| name)
            .collect()
    }
}

impl fmt::Display for AuthMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        let mask = FormatMask::from_bits(FormatMask::ULAW.bits() | FormatMask::GSM.bits());
        assert_eq!(mask.names(), vec!["gsm", "mulaw"]);
        assert_eq!(mask.to_string(), "gsm,mulaw");
        assert_eq!(FormatMask::H264.name(), Some("h264"));
        assert_eq!(FormatMask::from_bits(1 << 14).name(), None);
    }

    #[test]
    fn test_format_split() {
        let mask = FormatMask::from_bits(FormatMask::ALAW.bits() | FormatMask::H263.bits());
        assert_eq!(mask.audio(), FormatMask::ALAW);
        assert_eq!(mask.video(), FormatMask::H263);
        assert_eq!(mask.first(), FormatMask::ALAW);
        assert!(FormatMask::GSM_HR.audio().contains(FormatMask::GSM_HR));
        assert!(!FormatMask::NONE.contains(FormatMask::NONE));
    }

    #[test]
    fn test_auth_methods() {
        let methods = AuthMethods::from_bits(0x03);
        assert!(methods.contains(AuthMethods::MD5));
        assert!(!methods.contains(AuthMethods::RSA));
        assert_eq!(methods.to_string(), "Text,MD5");
    }
}
