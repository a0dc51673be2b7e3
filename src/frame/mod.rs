//! IAX2 frame codec.
//!
//! Parses and serializes the four wire shapes carried on one UDP port:
//!
//! - **Full frames**: signaling with sequence numbers, see [`FullFrame`]
//! - **Mini frames**: audio with a 16-bit timestamp fragment
//! - **Video meta frames**: video with a 15-bit fragment and a mark bit
//! - **Trunk meta frames**: many calls' media in one datagram
//!
//! The codec is stateless. [`decode`] never panics on hostile input; it
//! logs and returns `None`.

mod codec;
mod subclass;
mod types;

pub use codec::{
    FrameKind, FullFrame, Frame, MiniFrame, build_mini_frame, build_video_meta_frame, decode,
    for_each_trunk_record,
};
pub use subclass::{pack_subclass, unpack_subclass};
pub use types::{ControlType, FrameType, IaxControl, MediaType};
