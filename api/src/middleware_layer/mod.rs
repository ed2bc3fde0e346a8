//! Pipeline stages in front of the webhook handler.
//!
//! Ordered, short-circuiting layers: admission first, then signature
//! verification. Each stage either passes the request through or answers
//! with its own error response.

pub mod admission;
pub mod signature;
