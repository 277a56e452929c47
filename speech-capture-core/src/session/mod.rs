mod block_pipeline;
pub mod controller;
mod shared;
