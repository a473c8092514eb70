//! Core components, types, and utilities for the persona-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Prompt text for every pipeline stage.
//! - Lenient parsing of model replies.
//! - Common types and result handling.

pub mod config;
pub mod parse;
pub mod prompts;
pub mod types;
