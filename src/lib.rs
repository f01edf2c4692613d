//! Minjo - Jokipremium customer assistant backend
//!
//! A small HTTP service wrapping a generative model with per-session chat
//! history, Indonesian-time awareness, and response shaping for the
//! Jokipremium intake flow.

pub mod chat;
pub mod config;
pub mod context;
pub mod llm;
pub mod prompt;
pub mod server;
pub mod session;
pub mod shaper;
