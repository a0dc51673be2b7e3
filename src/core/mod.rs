//! IAX2 core: constants, error types and collaborator traits.
//!
//! This module has no protocol logic of its own. It defines the vocabulary
//! shared by the codecs, the trunk aggregator and the transaction engine.

mod constants;
mod error;
mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
