//! Text overlay configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::encoding::{OVERLAY_EDGE_MARGIN, TEXT_ANCHOR_MARGIN};

/// Error returned when parsing a position or size name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseOptionError {
    pub kind: &'static str,
    pub value: String,
}

/// Vertical placement of the text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    Top,
    #[default]
    Middle,
    Bottom,
}

impl TextPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextPosition::Top => "top",
            TextPosition::Middle => "middle",
            TextPosition::Bottom => "bottom",
        }
    }

    /// Y coordinate the text block is centered on, for a canvas of `canvas_height`.
    pub fn anchor_y(&self, canvas_height: u32) -> f32 {
        match self {
            TextPosition::Top => TEXT_ANCHOR_MARGIN as f32,
            TextPosition::Middle => canvas_height as f32 / 2.0,
            TextPosition::Bottom => canvas_height.saturating_sub(TEXT_ANCHOR_MARGIN) as f32,
        }
    }

    /// FFmpeg `overlay` y expression placing the overlay image in the frame.
    pub fn overlay_y_expr(&self) -> String {
        match self {
            TextPosition::Top => OVERLAY_EDGE_MARGIN.to_string(),
            TextPosition::Middle => "(main_h-overlay_h)/2".to_string(),
            TextPosition::Bottom => format!("main_h-overlay_h-{}", OVERLAY_EDGE_MARGIN),
        }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextPosition {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(TextPosition::Top),
            "middle" | "center" => Ok(TextPosition::Middle),
            "bottom" => Ok(TextPosition::Bottom),
            other => Err(ParseOptionError {
                kind: "text position",
                value: other.to_string(),
            }),
        }
    }
}

/// Text size preset. Each preset maps to a fixed font size, weight and stroke width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TextSize {
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

impl TextSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextSize::Small => "small",
            TextSize::Medium => "medium",
            TextSize::Large => "large",
            TextSize::ExtraLarge => "extra-large",
        }
    }

    /// Font size in pixels.
    pub fn font_px(&self) -> u32 {
        match self {
            TextSize::Small => 40,
            TextSize::Medium => 56,
            TextSize::Large => 72,
            TextSize::ExtraLarge => 96,
        }
    }

    /// CSS-style font weight.
    pub fn font_weight(&self) -> u16 {
        match self {
            TextSize::ExtraLarge => 800,
            _ => 700,
        }
    }

    /// Outline stroke width in pixels.
    pub fn stroke_px(&self) -> u32 {
        match self {
            TextSize::Small => 6,
            TextSize::Medium => 7,
            TextSize::Large => 8,
            TextSize::ExtraLarge => 10,
        }
    }

    /// Distance between consecutive line centers.
    pub fn line_height(&self) -> f32 {
        self.font_px() as f32 * 1.25
    }
}

impl fmt::Display for TextSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextSize {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(TextSize::Small),
            "medium" => Ok(TextSize::Medium),
            "large" => Ok(TextSize::Large),
            "extra-large" | "extra_large" | "xl" => Ok(TextSize::ExtraLarge),
            other => Err(ParseOptionError {
                kind: "text size",
                value: other.to_string(),
            }),
        }
    }
}

/// Text rendered on top of every exported clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TextOverlayConfig {
    pub content: String,
    #[serde(default)]
    pub position: TextPosition,
    #[serde(default)]
    pub size: TextSize,
}

impl TextOverlayConfig {
    pub fn new(content: impl Into<String>, position: TextPosition, size: TextSize) -> Self {
        Self {
            content: content.into(),
            position,
            size,
        }
    }

    /// Whitespace-only content produces no overlay.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}
