//! texscale - Bulk upscaler for pixel-art textures
//!
//! This library provides functionality to:
//! - Tile a border around each image so the kernel sees its real neighbors
//! - Upscale through a pluggable pixel-pattern kernel
//! - Crop, cull translucency and relayer the scaled result
//! - Classify asset paths into per-image settings
//! - Run the whole pipeline over hundreds of images on a worker pool

pub mod batch;
pub mod buffer;
pub mod cli;
pub mod codec;
pub mod config;
pub mod kernel;
pub mod pipeline;
pub mod postprocess;
pub mod settings;
pub mod tile;
