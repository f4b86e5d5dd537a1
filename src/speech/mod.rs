//! Speech-to-Text client.
//!
//! Audio is coerced into a request payload locally (`audio.rs`); recognition
//! itself happens remotely (`client.rs`).

pub mod audio;
pub mod client;

pub use audio::{Audio, AudioEncoding, AudioSource, RecognitionAudio};
pub use client::{Alternative, Operation, RecognizeOptions, SpeechClient, SpeechResult, Word};
