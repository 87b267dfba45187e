//! Collaborator stages around the analysis core.
//!
//! ```text
//! input ──▶ (submit + poll) ──▶ render ──▶ encode
//! (path/URL)                    (pdfium)   (PNG data URI)
//! ```
//!
//! 1. [`input`]  — canonicalise the user-supplied path or URL to a local PDF
//!    and its bytes
//! 2. [`render`] — page viewport size and optional page raster; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`] — PNG-encode and base64-wrap the raster for the SVG
//!    background

pub mod encode;
pub mod input;
pub mod render;
