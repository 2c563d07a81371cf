//! Core module - configuration and link state

pub mod config;
pub mod state;
