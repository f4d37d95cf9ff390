pub mod client;
pub mod types;

pub use client::BackendClient;
pub use types::{ChatMessage, Operation};
