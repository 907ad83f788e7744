pub mod audio_models;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod state;
