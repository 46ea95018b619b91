pub mod decoder;
pub mod dsp;
pub mod element;
pub mod engine;
pub mod hls;
pub mod output;
pub mod player;
pub mod queue;
pub mod stream_source;
