pub mod energy_tracker;
pub mod pipeline;
pub mod spectrum_analyzer;
