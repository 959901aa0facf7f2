//! Kaleidoscopic reflection groups: mirror circle arrangements, their
//! regions, and reduction of plane points to a fundamental domain.

pub mod arrangement;
pub mod circle;
pub mod config;
pub mod geom;
pub mod group;
pub mod kaleidoscope;
pub mod pixels;
pub mod quadratic;
pub mod regions;
pub mod tiling;
