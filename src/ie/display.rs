//! Human-readable rendering of information elements, for logs only.

use std::fmt;

use super::element::{IeType, IeValue, InfoElement};
use super::format::{AuthMethods, FormatMask};
use super::list::{IeList, unpack_addr};

impl fmt::Display for InfoElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ie_type)?;
        match (&self.value, self.ie_type) {
            (IeValue::Flag, _) => Ok(()),
            (IeValue::Text(text), _) => write!(f, ": {}", String::from_utf8_lossy(text)),
            (IeValue::Binary(data), IeType::ApparentAddr) => match unpack_addr(data) {
                Some(addr) => write!(f, ": {addr}"),
                None => write!(f, ": {}", HexBytes(data)),
            },
            (IeValue::Binary(data), _) => write!(f, ": {}", HexBytes(data)),
            (IeValue::Numeric { width, value }, ie_type) => {
                f.write_str(": ")?;
                render_numeric(f, ie_type, *width, *value)
            }
        }
    }
}

fn render_numeric(f: &mut fmt::Formatter<'_>, ie_type: IeType, width: u8, value: u32) -> fmt::Result {
    match ie_type {
        IeType::Refresh => write!(f, "{value} second(s)"),
        IeType::SamplingRate => write!(f, "{value} Hz"),
        IeType::MsgCount => write!(f, "{}new. {}old", value & 0xff, (value >> 8) & 0xff),
        IeType::RrLoss => write!(f, "{} ({}%)", value & 0x00ff_ffff, value >> 24),
        IeType::RrJitter
        | IeType::RrPkts
        | IeType::RrDropped
        | IeType::RrOoo
        | IeType::RrDelay => write!(f, "{value}"),
        IeType::Format | IeType::Capability => {
            write_hex(f, width, value)?;
            write!(f, " ({})", FormatMask::from_bits(value))
        }
        IeType::AuthMethods => {
            write_hex(f, width, value)?;
            write!(f, " ({})", AuthMethods::from_bits(value as u16))
        }
        _ => write_hex(f, width, value),
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, width: u8, value: u32) -> fmt::Result {
    let digits = usize::from(width) * 2;
    write!(f, "0x{value:0digits$x}")
}

struct HexBytes<'a>(&'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for IeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_rules() {
        let mut list = IeList::new();
        list.insert_version()
            .append_numeric(IeType::Refresh, 60)
            .append_numeric(IeType::Format, 0x0c)
            .append_numeric(IeType::AuthMethods, 0x02)
            .append_numeric(IeType::SamplingRate, 8000)
            .append_numeric(IeType::MsgCount, 0x0203)
            .append_numeric(IeType::RrLoss, 0x0500_0010)
            .append_flag(IeType::AutoAnswer)
            .append_addr("10.0.0.1:4569".parse().unwrap());
        list.append_text(IeType::Username, "bob").unwrap();
        list.append_binary(IeType::CallToken, &[0xde, 0xad, 0x01]).unwrap();

        let rendered = list.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "VERSION: 0x0002",
                "REFRESH: 60 second(s)",
                "FORMAT: 0x0000000c (mulaw,alaw)",
                "AUTHMETHODS: 0x0002 (MD5)",
                "SAMPLINGRATE: 8000 Hz",
                "MSGCOUNT: 3new. 2old",
                "RR_LOSS: 16 (5%)",
                "AUTOANSWER",
                "APPARENT_ADDR: 10.0.0.1:4569",
                "USERNAME: bob",
                "CALLTOKEN: de ad 01",
            ]
        );
    }

    #[test]
    fn test_render_unknown() {
        let mut list = IeList::new();
        list.append_binary(IeType::Unknown(0x70), &[1]).unwrap();
        assert_eq!(list.to_string(), "UNKNOWN(0x70): 01");
    }
}
