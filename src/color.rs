//! Per-session overlay colours.
//!
//! Every field gets one colour for the whole render session, shared by all
//! of its bounding regions. A new upload starts a new session with fresh
//! draws, so the same field may change colour between documents.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// An opaque RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Colour from hue (degrees), saturation and lightness in `[0, 1]`.
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = lightness - c / 2.0;
        let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::new(to_u8(r), to_u8(g), to_u8(b))
    }

    /// `#rrggbb`
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// CSS `rgba(…)` with the given alpha.
    pub fn to_rgba(self, alpha: f64) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Assigns a colour to a field, stable for the lifetime of the assigner.
pub trait ColorAssigner: Send {
    /// Colour for `field`. Repeated calls with the same name return the
    /// same colour until the assigner is reset.
    fn assign(&mut self, field: &str) -> Color;

    /// Forget every assignment; the next upload draws fresh colours.
    fn reset(&mut self);
}

/// Random, memoised colours with fixed saturation and lightness so every
/// draw stays legible over a scanned page.
#[derive(Debug)]
pub struct PaletteColorAssigner {
    rng: StdRng,
    assigned: HashMap<String, Color>,
}

impl PaletteColorAssigner {
    const SATURATION: f64 = 0.85;
    const LIGHTNESS: f64 = 0.45;

    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            assigned: HashMap::new(),
        }
    }

    /// Deterministic draws, for reproducible renders.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            assigned: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

impl Default for PaletteColorAssigner {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorAssigner for PaletteColorAssigner {
    fn assign(&mut self, field: &str) -> Color {
        if let Some(c) = self.assigned.get(field) {
            return *c;
        }
        let hue = self.rng.gen_range(0.0..360.0);
        let color = Color::from_hsl(hue, Self::SATURATION, Self::LIGHTNESS);
        self.assigned.insert(field.to_string(), color);
        color
    }

    fn reset(&mut self) {
        self.assigned.clear();
    }
}

/// Every field in one colour, as the first overlay prototype drew them.
#[derive(Debug, Clone, Copy)]
pub struct FixedColorAssigner(pub Color);

impl ColorAssigner for FixedColorAssigner {
    fn assign(&mut self, _field: &str) -> Color {
        self.0
    }

    fn reset(&mut self) {}
}
