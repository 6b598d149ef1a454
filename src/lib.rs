#![warn(clippy::all, rust_2018_idioms)]

mod app;
mod rendering;
pub mod terrain;

pub use app::TerrainApp;
