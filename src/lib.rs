// src/lib.rs
pub mod config;
pub mod drivers;
pub mod engine;
pub mod types;
pub mod waveform;
