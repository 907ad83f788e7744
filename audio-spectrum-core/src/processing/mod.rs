pub mod circular_buffer;
pub mod hop_queue;
pub mod mixer;
pub mod resampler;
