//! Color parsing.

use serde_json::Value;

use crate::error::StyleError;

/// An RGBA color, one byte per channel.
pub type Rgba = [u8; 4];

const NAMED: &[(&str, Rgba)] = &[
    ("transparent", [0, 0, 0, 0]),
    ("black", [0, 0, 0, 255]),
    ("white", [255, 255, 255, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 128, 0, 255]),
    ("lime", [0, 255, 0, 255]),
    ("blue", [0, 0, 255, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("cyan", [0, 255, 255, 255]),
    ("aqua", [0, 255, 255, 255]),
    ("magenta", [255, 0, 255, 255]),
    ("fuchsia", [255, 0, 255, 255]),
    ("gray", [128, 128, 128, 255]),
    ("grey", [128, 128, 128, 255]),
    ("silver", [192, 192, 192, 255]),
    ("maroon", [128, 0, 0, 255]),
    ("olive", [128, 128, 0, 255]),
    ("purple", [128, 0, 128, 255]),
    ("teal", [0, 128, 128, 255]),
    ("navy", [0, 0, 128, 255]),
    ("orange", [255, 165, 0, 255]),
    ("pink", [255, 192, 203, 255]),
    ("brown", [165, 42, 42, 255]),
];

/// Parse a color from a JSON value.
///
/// Accepts CSS strings (hex, `rgb()`/`rgba()`, a subset of named colors)
/// and channel arrays `[r, g, b]` or `[r, g, b, a]` with channels in
/// `0..=255`.
pub fn parse_color(value: &Value) -> Result<Rgba, StyleError> {
    match value {
        Value::String(s) => parse_color_str(s),
        Value::Array(channels) => parse_channels(channels)
            .ok_or_else(|| StyleError::InvalidColor(value.to_string())),
        _ => Err(StyleError::InvalidColor(value.to_string())),
    }
}

pub fn parse_color_str(input: &str) -> Result<Rgba, StyleError> {
    let text = input.trim().to_ascii_lowercase();

    let parsed = if let Some(hex) = text.strip_prefix('#') {
        parse_hex(hex)
    } else if let Some(args) = functional(&text, "rgba").or_else(|| functional(&text, "rgb")) {
        parse_functional(args)
    } else {
        NAMED
            .iter()
            .find(|(name, _)| *name == text)
            .map(|(_, color)| *color)
    };

    parsed.ok_or_else(|| StyleError::InvalidColor(format!("{input:?}")))
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok();
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 | 4 => {
            let mut rgba = [0, 0, 0, 255];
            for (i, channel) in rgba.iter_mut().enumerate().take(hex.len()) {
                *channel = digit(i)? * 17;
            }
            Some(rgba)
        }
        6 | 8 => {
            let mut rgba = [0, 0, 0, 255];
            for (i, channel) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
                *channel = pair(i * 2)?;
            }
            Some(rgba)
        }
        _ => None,
    }
}

fn functional<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_functional(args: &str) -> Option<Rgba> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if !(3..=4).contains(&parts.len()) {
        return None;
    }

    let mut rgba = [0, 0, 0, 255];
    for (channel, part) in rgba.iter_mut().zip(&parts[..3]) {
        *channel = byte(part.parse().ok()?)?;
    }
    if let Some(alpha) = parts.get(3) {
        let alpha: f64 = alpha.parse().ok()?;
        if !(0.0..=1.0).contains(&alpha) {
            return None;
        }
        rgba[3] = (alpha * 255.0).round() as u8;
    }
    Some(rgba)
}

fn parse_channels(channels: &[Value]) -> Option<Rgba> {
    if !(3..=4).contains(&channels.len()) {
        return None;
    }
    let mut rgba = [0, 0, 0, 255];
    for (channel, value) in rgba.iter_mut().zip(channels) {
        *channel = byte(value.as_f64()?)?;
    }
    Some(rgba)
}

fn byte(value: f64) -> Option<u8> {
    (0.0..=255.0).contains(&value).then(|| value.round() as u8)
}

/// Linear interpolation between two colors, channel by channel.
pub(crate) fn interpolate(from: Rgba, to: Rgba, t: f64) -> Rgba {
    let mut out = [0; 4];
    for (i, channel) in out.iter_mut().enumerate() {
        let a = f64::from(from[i]);
        let b = f64::from(to[i]);
        *channel = (a + (b - a) * t).round().clamp(0.0, 255.0) as u8;
    }
    out
}
