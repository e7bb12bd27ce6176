pub mod sudoku_extractor;

pub use sudoku_extractor::{CellClassifier, extract_cells, extract_sudoku, extract_sudoku_from_image};
