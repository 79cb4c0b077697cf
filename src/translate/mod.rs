//! API translation between the OpenAI chat shape callers use and NVIDIA NIM.
//!
//! Requests are restructured with defaults filled in; successful responses are
//! already compatible and pass through, so the reverse direction only covers
//! errors. All translation functions are pure (no I/O).

pub mod nim_types;
pub mod openai_types;
pub mod request;
pub mod response;
