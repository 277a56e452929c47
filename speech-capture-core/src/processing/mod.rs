pub mod downmix;
pub mod levels;
pub mod pcm_encoder;
pub mod resampler;
pub mod ring_buffer;
