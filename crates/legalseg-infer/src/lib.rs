//! Remote inference: job submission, result polling, and payload
//! normalization for the hosted rhetorical-role model.

pub mod client;
pub mod normalize;
pub mod stream;

pub use client::{HttpTransport, InferenceClient, InferenceTransport, PollPolicy};
pub use normalize::normalize;
