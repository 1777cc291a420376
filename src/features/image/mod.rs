pub mod composition;
pub mod layout;
mod renderer;
pub mod styles;

pub use composition::{CANVAS_HEIGHT, CANVAS_WIDTH, Composition, Node, Region};
pub use renderer::{ArtifactRasterizer, SvgRasterizer, get_global_font_db, rasterize_blocking};
pub use styles::compose;
