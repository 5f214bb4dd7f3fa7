//! Relaychat - streaming chat relay and client pipeline
//!
//! This crate provides a credential-holding HTTP relay for OpenAI-compatible
//! chat-completion providers, together with the client side of an exchange:
//! stream decoding, reply assembly and segmentation, conversation history,
//! and the request controller that ties them together.

pub mod assembler;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod decoder;
pub mod error;
pub mod models;
pub mod relay;
pub mod session;
pub mod testing;

pub use error::RelayChatError;
