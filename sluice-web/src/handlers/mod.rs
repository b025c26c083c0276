//! HTTP request handlers organized by functionality

pub mod health;
pub mod stream;

// Re-export handler functions
pub use health::health;
pub use stream::stream_audio;
