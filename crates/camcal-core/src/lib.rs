//! Core types and utilities shared by the `camcal-*` crates.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any image codec; images are plain row-major `u8` buffers.

mod corner;
mod homography;
mod image;
mod logger;

pub use corner::{Corner, GridCoords, LabeledCorner};
pub use homography::{estimate_homography, Homography};
pub use image::{downsample_box, sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{filter_directive, init_with_level, level_from_verbosity};
