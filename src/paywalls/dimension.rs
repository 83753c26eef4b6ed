//! Stack layout axis for paywall components.
//!
//! Encoded as `{"type": "vertical", "alignment": "leading"}`; the shape of
//! `alignment` depends on `type`.

use serde::{Deserialize, Serialize};

/// Cross-axis alignment of a vertical stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlignment {
    Leading,
    Center,
    Trailing,
}

/// Cross-axis alignment of a horizontal stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
}

/// Alignment of children layered on the z axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoDimensionAlignment {
    Center,
    Leading,
    Trailing,
    Top,
    Bottom,
    TopLeading,
    TopTrailing,
    BottomLeading,
    BottomTrailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "alignment", rename_all = "lowercase")]
pub enum Dimension {
    Vertical(HorizontalAlignment),
    Horizontal(VerticalAlignment),
    #[serde(rename = "zlayer")]
    ZLayer(TwoDimensionAlignment),
}

impl Dimension {
    /// Vertical stack, centered
    pub fn vertical() -> Self {
        Self::Vertical(HorizontalAlignment::Center)
    }

    /// Horizontal stack, centered
    pub fn horizontal() -> Self {
        Self::Horizontal(VerticalAlignment::Center)
    }
}
