// 地形模块: 高度/颜色合成与雕刻

pub mod color_map;
pub mod curve;
pub mod error;
pub mod falloff;
pub mod grid;
pub mod heightmap;
pub mod noise;
pub mod sculpt;
pub mod system;

pub use color_map::*;
pub use curve::*;
pub use error::*;
pub use falloff::*;
pub use grid::*;
pub use heightmap::*;
pub use self::noise::*;
pub use sculpt::*;
pub use system::*;
