//! Document codec
//!
//! Stores semi-structured API responses (mappings, lists, scalars) as a single
//! normalized text column and reads them back. "No data" in any shape collapses
//! to the empty string, and corrupt stored text reads back as an empty mapping.

mod document;

pub use document::{
    decode, decode_observed, empty_document, encode, is_empty_document, normalize, try_decode,
    validate, CodecError, RawDocument,
};
