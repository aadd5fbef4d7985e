//! TuxReader Library
//!
//! Core modules for the TuxReader narration tool.

pub mod config;
pub mod controller;
pub mod error;
pub mod settings;
pub mod tts;
