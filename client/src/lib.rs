//! Client for resumable chunked site update uploads.

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
pub mod chunked_upload;
pub mod document;
pub mod size_parser;
pub mod version;
