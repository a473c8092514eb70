//! Service integrations for external APIs and clients.
//!
//! The assistant pipeline talks to exactly one external service: an
//! OpenAI-compatible completion endpoint (OpenRouter by default).
//!
//! Each service module defines both a generic trait and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod llm;
