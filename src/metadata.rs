//! Display metadata handed to the destination when it is finalized.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dims::ImageSize;

/// RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    /// Default 1.
    #[serde(default = "default_alpha")]
    pub a: f32,
}

fn default_alpha() -> f32 {
    1.0
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// How a single channel is displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorInfo {
    /// Used when the color table is empty.
    pub base_color: Color,
    /// Optional lookup table, overriding the base color.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub color_table: Vec<Color>,
    #[serde(default = "default_alpha")]
    pub opacity: f32,
    #[serde(default = "default_alpha")]
    pub gamma: f32,
}

impl ColorInfo {
    pub fn new(base_color: Color) -> Self {
        Self {
            base_color,
            color_table: Vec::new(),
            opacity: 1.0,
            gamma: 1.0,
        }
    }

    pub fn with_color_table(mut self, table: Vec<Color>) -> Self {
        self.color_table = table;
        self
    }
}

/// Colors for `n_channels` channels.
///
/// An explicit color is applied to every channel.
/// Otherwise a single channel is white, three channels are red, green and blue,
/// and any other count is left white for manual adjustment.
pub fn channel_colors(n_channels: u64, explicit: Option<Color>) -> Vec<ColorInfo> {
    let colors: Vec<Color> = match (explicit, n_channels) {
        (Some(c), n) => vec![c; n as usize],
        (None, 3) => vec![Color::RED, Color::GREEN, Color::BLUE],
        (None, n) => vec![Color::WHITE; n as usize],
    };
    colors.into_iter().map(ColorInfo::new).collect()
}

/// Physical bounding box of the image, in x/y/z order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageExtents {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl ImageExtents {
    /// Extents spanning the whole image, starting at the origin.
    pub fn from_image_size(image_size: &ImageSize, sample_size: &ImageSize) -> Self {
        Self {
            min: [0.0; 3],
            max: [
                (image_size.x * sample_size.x) as f32,
                (image_size.y * sample_size.y) as f32,
                (image_size.z * sample_size.z) as f32,
            ],
        }
    }
}

/// Free-form `section -> key -> value` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, BTreeMap<String, String>>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&mut self, section: &str, key: &str, value: impl ToString) {
        self.0
            .entry(section.to_owned())
            .or_default()
            .insert(key.to_owned(), value.to_string());
    }

    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.0.get(section)?.get(key).map(String::as_str)
    }

    /// Channels are numbered from 0.
    pub fn set_channel_name(&mut self, channel: u64, name: &str) {
        self.set_value(&format!("Channel {channel}"), "Name", name);
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_colors_by_channel_count() {
        let colors = |n| {
            channel_colors(n, None)
                .into_iter()
                .map(|c| c.base_color)
                .collect::<Vec<_>>()
        };
        assert_eq!(colors(1), vec![Color::WHITE]);
        assert_eq!(colors(3), vec![Color::RED, Color::GREEN, Color::BLUE]);
        assert_eq!(colors(5), vec![Color::WHITE; 5]);
        assert_eq!(colors(2), vec![Color::WHITE; 2]);
    }

    #[test]
    fn explicit_color_applies_to_all_channels() {
        let magenta = Color::new(1.0, 0.0, 1.0, 1.0);
        let colors = channel_colors(3, Some(magenta));
        assert!(colors.iter().all(|c| c.base_color == magenta));
    }

    #[test]
    fn parameters_round_trip_json() {
        let mut p = Parameters::new();
        p.set_value("Image", "Info", "title");
        p.set_channel_name(0, "Channel 1");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(
            json,
            r#"{"Channel 0":{"Name":"Channel 1"},"Image":{"Info":"title"}}"#
        );
        let back: Parameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value("Image", "Info"), Some("title"));
    }

    #[test]
    fn color_alpha_defaults_to_opaque() {
        let c: Color = serde_json::from_str(r#"{"r":0.5,"g":0.5,"b":0.5}"#).unwrap();
        assert_eq!(c, Color::new(0.5, 0.5, 0.5, 1.0));
    }
}
