//! Frame extraction and decoding
//!
//! Turns the indicator's raw byte stream into decoded readings:
//!
//! 1. [`FrameExtractor`] cuts delimiter-bounded frames out of a persistent
//!    accumulator, carrying partial frames over to the next call.
//! 2. [`decode`] trims each frame (prefix search or fixed index), applies the
//!    digit filter, leading-zero removal and reversal, then checks the length.
//!
//! Decoding never drops a frame. Anything unexpected is reported as a
//! [`DecodeWarning`] next to the text.

pub mod decoder;
mod extractor;

pub use decoder::{decode, DecodeWarning, DecodedFrame};
pub use extractor::{decode_text, FrameExtractor, MAX_PENDING_BYTES};
