//! 写真からの数独グリッド検出と正面化

pub mod preprocess;
pub mod grid_locator;
pub mod perspective;
pub mod cell_extractor;

pub use preprocess::{preprocess_image, to_grayscale};
pub use grid_locator::{find_grid, locate_grid};
pub use perspective::{four_point_transform, order_points};
pub use cell_extractor::{extract_digit, split_cells};
