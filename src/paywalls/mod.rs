//! Paywall component model

pub mod dimension;

pub use dimension::{Dimension, HorizontalAlignment, TwoDimensionAlignment, VerticalAlignment};
