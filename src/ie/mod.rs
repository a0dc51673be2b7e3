//! Information-element codec.
//!
//! Full frames of most categories carry a packed list of
//! `[type:1][length:1][value:length]` elements. Each type has one value
//! shape taken from a fixed table ([`IeType::shape`]); a length that does not
//! fit the shape invalidates the whole list.

mod display;
mod element;
mod format;
mod list;

pub use element::{IeShape, IeType, IeValue, InfoElement};
pub use format::{AuthMethods, FormatMask};
pub use list::{IeList, pack_addr, unpack_addr};
