//! Shared types for siteup.
//!
//! A site update is a JSON document that the client serializes, splits into
//! string chunks and uploads one chunk per request. The server stitches the
//! chunks back together once every index has arrived. This crate holds the
//! wire types both sides agree on, plus the client-side chunking helpers.

#![deny(
    asm_sub_register,
    deprecated,
    missing_abi,
    unsafe_code,
    unused_macros,
    unused_must_use,
    unused_unsafe
)]
#![deny(clippy::from_over_into, clippy::needless_question_mark)]

pub mod api;
pub mod chunking;
pub mod error;

pub use error::{SiteupError, SiteupResult};
