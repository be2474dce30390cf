//! Mail Relay — inbound email webhook → LLM job classification → downstream intake.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod webhook;
