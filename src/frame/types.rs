//! Frame categories and subclass enumerations.

use std::fmt;

/// Frame category (byte 10 of a full frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// DTMF digit; the subclass is the digit's character code.
    Dtmf,
    /// Audio; the subclass is the audio format.
    Voice,
    /// Video; the subclass is the video format.
    Video,
    /// Call-progress control, see [`ControlType`].
    Control,
    /// Empty frame.
    Null,
    /// IAX protocol control, see [`IaxControl`].
    Iax,
    /// Text message.
    Text,
    /// Still image.
    Image,
    /// HTML data.
    Html,
    /// Comfort noise.
    Noise,
    /// Category not known to this implementation.
    Unknown(u8),
}

impl FrameType {
    /// Parse a frame category from its wire byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => Self::Dtmf,
            0x02 => Self::Voice,
            0x03 => Self::Video,
            0x04 => Self::Control,
            0x05 => Self::Null,
            0x06 => Self::Iax,
            0x07 => Self::Text,
            0x08 => Self::Image,
            0x09 => Self::Html,
            0x0a => Self::Noise,
            other => Self::Unknown(other),
        }
    }

    /// Wire byte of this category.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Dtmf => 0x01,
            Self::Voice => 0x02,
            Self::Video => 0x03,
            Self::Control => 0x04,
            Self::Null => 0x05,
            Self::Iax => 0x06,
            Self::Text => 0x07,
            Self::Image => 0x08,
            Self::Html => 0x09,
            Self::Noise => 0x0a,
            Self::Unknown(other) => other,
        }
    }

    /// Printable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Dtmf => "DTMF",
            Self::Voice => "Voice",
            Self::Video => "Video",
            Self::Control => "Control",
            Self::Null => "Null",
            Self::Iax => "IAX",
            Self::Text => "Text",
            Self::Image => "Image",
            Self::Html => "HTML",
            Self::Noise => "Noise",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Media carried by mini frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Audio (voice frames and mini frames).
    Audio,
    /// Video (video frames and video meta frames).
    Video,
}

impl MediaType {
    /// Full frame category that carries this media.
    pub fn frame_type(self) -> FrameType {
        match self {
            Self::Audio => FrameType::Voice,
            Self::Video => FrameType::Video,
        }
    }
}

macro_rules! subclass_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            /// Parse from an unpacked subclass value.
            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Unpacked subclass value.
            pub fn as_u32(self) -> u32 {
                self as u32
            }

            /// Printable name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

subclass_enum! {
    /// Subclass of [`FrameType::Iax`] frames.
    IaxControl {
        /// Open a call.
        New = 0x01 => "NEW",
        /// Keepalive request.
        Ping = 0x02 => "PING",
        /// Keepalive or probe reply.
        Pong = 0x03 => "PONG",
        /// Explicit acknowledgement.
        Ack = 0x04 => "ACK",
        /// Call hangup.
        Hangup = 0x05 => "HANGUP",
        /// Call rejection.
        Reject = 0x06 => "REJECT",
        /// Call accepted.
        Accept = 0x07 => "ACCEPT",
        /// Authentication challenge.
        AuthReq = 0x08 => "AUTHREQ",
        /// Authentication reply.
        AuthRep = 0x09 => "AUTHREP",
        /// Invalid or stale frame.
        Inval = 0x0a => "INVAL",
        /// Lag request.
        LagRq = 0x0b => "LAGRQ",
        /// Lag reply.
        LagRp = 0x0c => "LAGRP",
        /// Registration request.
        RegReq = 0x0d => "REGREQ",
        /// Registration challenge.
        RegAuth = 0x0e => "REGAUTH",
        /// Registration accepted.
        RegAck = 0x0f => "REGACK",
        /// Registration rejected.
        RegRej = 0x10 => "REGREJ",
        /// Registration release.
        RegRel = 0x11 => "REGREL",
        /// Retransmission request.
        Vnak = 0x12 => "VNAK",
        /// Dialplan request.
        DpReq = 0x13 => "DPREQ",
        /// Dialplan reply.
        DpRep = 0x14 => "DPREP",
        /// Dial.
        Dial = 0x15 => "DIAL",
        /// Transfer request.
        TxReq = 0x16 => "TXREQ",
        /// Transfer connect.
        TxCnt = 0x17 => "TXCNT",
        /// Transfer accepted.
        TxAcc = 0x18 => "TXACC",
        /// Transfer ready.
        TxReady = 0x19 => "TXREADY",
        /// Transfer release.
        TxRel = 0x1a => "TXREL",
        /// Transfer rejected.
        TxRej = 0x1b => "TXREJ",
        /// Stop audio.
        Quelch = 0x1c => "QUELCH",
        /// Resume audio.
        Unquelch = 0x1d => "UNQUELCH",
        /// Liveness probe.
        Poke = 0x1e => "POKE",
        /// Message waiting indication.
        Mwi = 0x20 => "MWI",
        /// Unsupported message.
        Unsupport = 0x21 => "UNSUPPORT",
        /// Remote transfer.
        Transfer = 0x22 => "TRANSFER",
        /// Provisioning.
        Provision = 0x23 => "PROVISION",
        /// Firmware download.
        FwDownl = 0x24 => "FWDOWNL",
        /// Firmware data.
        FwData = 0x25 => "FWDATA",
        /// Call token.
        CallToken = 0x28 => "CALLTOKEN",
    }
}

subclass_enum! {
    /// Subclass of [`FrameType::Control`] frames.
    ControlType {
        /// Remote hangup.
        Hangup = 0x01 => "Hangup",
        /// Remote end is ringing.
        Ringing = 0x03 => "Ringing",
        /// Remote end answered.
        Answer = 0x04 => "Answer",
        /// Remote end is busy.
        Busy = 0x05 => "Busy",
        /// Network congestion.
        Congestion = 0x08 => "Congestion",
        /// Flash hook.
        FlashHook = 0x09 => "FlashHook",
        /// Option.
        Option = 0x0b => "Option",
        /// Key radio.
        KeyRadio = 0x0c => "KeyRadio",
        /// Unkey radio.
        UnkeyRadio = 0x0d => "UnkeyRadio",
        /// Call progress.
        Progressing = 0x0e => "Progressing",
        /// Call proceeding.
        Proceeding = 0x0f => "Proceeding",
        /// Call on hold.
        Hold = 0x10 => "Hold",
        /// Call off hold.
        Unhold = 0x11 => "Unhold",
        /// Video update request.
        VidUpdate = 0x12 => "VidUpdate",
        /// Media source update.
        SrcUpdate = 0x14 => "SrcUpdate",
        /// Stop playing sounds.
        StopSounds = 0xff => "StopSounds",
    }
}

impl IaxControl {
    /// Subclasses that carry no sequence number of their own.
    ///
    /// They never advance the inbound counter and are never checked
    /// against it.
    pub fn is_unsequenced(self) -> bool {
        matches!(
            self,
            Self::Ack | Self::Vnak | Self::TxAcc | Self::TxCnt | Self::Inval
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_type_bytes() {
        for byte in 0u8..=0x0c {
            assert_eq!(FrameType::from_byte(byte).as_byte(), byte);
        }
        assert_eq!(FrameType::from_byte(0x06), FrameType::Iax);
        assert_eq!(FrameType::from_byte(0x0b), FrameType::Unknown(0x0b));
        assert_eq!(FrameType::Noise.to_string(), "Noise");
    }

    #[test]
    fn test_iax_control_lookup() {
        assert_eq!(IaxControl::from_u32(0x01), Some(IaxControl::New));
        assert_eq!(IaxControl::from_u32(0x28), Some(IaxControl::CallToken));
        assert_eq!(IaxControl::from_u32(0x1f), None);
        assert_eq!(IaxControl::RegReq.as_u32(), 0x0d);
        assert_eq!(IaxControl::Vnak.to_string(), "VNAK");
    }

    #[test]
    fn test_unsequenced_subclasses() {
        assert!(IaxControl::Ack.is_unsequenced());
        assert!(IaxControl::Inval.is_unsequenced());
        assert!(!IaxControl::New.is_unsequenced());
        assert!(!IaxControl::Ping.is_unsequenced());
    }

    #[test]
    fn test_control_type_lookup() {
        assert_eq!(ControlType::from_u32(0xff), Some(ControlType::StopSounds));
        assert_eq!(ControlType::from_u32(0x02), None);
        assert_eq!(ControlType::Answer.as_u32(), 4);
    }
}
