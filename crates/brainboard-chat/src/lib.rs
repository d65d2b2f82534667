//! Chat feature state: the shared store, the stream-event reducer, and the
//! service that drives a conversation against the backend.

mod rehydrate;
mod service;
mod store;

pub use rehydrate::rehydrate_message;
pub use service::ChatService;
pub use store::{ChatStore, STREAM_FAILURE_MESSAGE};
