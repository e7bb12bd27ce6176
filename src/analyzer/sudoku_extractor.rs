//! 写真から数独の盤面を読み取る共通処理

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage};
use std::path::Path;

use crate::model::AppConfig;
use crate::types::{SudokuGrid, GRID_SIZE};
use crate::vision::{
    extract_digit, four_point_transform, locate_grid, preprocess_image, split_cells, to_grayscale,
};

/// マス画像（数字部分のみ、空白マスは `None`）を数字に分類する
///
/// 空白マスは0を返すこと。
pub trait CellClassifier {
    fn classify(&self, digit: Option<&GrayImage>) -> Result<u8>;
}

/// 画像からグリッドを検出し、81マス分の数字画像を行優先で返す
pub fn extract_cells(image: &DynamicImage, config: &AppConfig) -> Result<Vec<Option<GrayImage>>> {
    let binary = preprocess_image(image, &config.preprocess);
    let grid = locate_grid(&binary, config.extraction.approx_epsilon_ratio)?;
    tracing::info!("グリッドを検出しました: {:?}", grid.points);

    let gray = to_grayscale(image);
    let warped = four_point_transform(&gray, &grid)?;
    tracing::info!("グリッドを正面化しました: {}x{}", warped.width(), warped.height());

    let cells = split_cells(&warped, GRID_SIZE)?;
    let digits: Vec<Option<GrayImage>> = cells
        .iter()
        .map(|cell| extract_digit(cell, config.extraction.min_fill_ratio))
        .collect();

    let non_empty = digits.iter().filter(|d| d.is_some()).count();
    tracing::info!("数字のあるマス: {} / {}", non_empty, digits.len());
    Ok(digits)
}

/// 読み込み済みの画像から盤面を認識する
pub fn extract_sudoku_from_image<C: CellClassifier>(
    image: &DynamicImage,
    classifier: &C,
    config: &AppConfig,
) -> Result<SudokuGrid> {
    let digits = extract_cells(image, config)?;

    let mut grid = SudokuGrid::default();
    for (index, digit) in digits.iter().enumerate() {
        let (row, col) = (index / GRID_SIZE, index % GRID_SIZE);
        let number = classifier
            .classify(digit.as_ref())
            .with_context(|| format!("マス ({}, {}) の分類に失敗しました", row, col))?;
        tracing::debug!("マス ({}, {}): {}", row, col, number);
        grid.set(row, col, number);
    }
    Ok(grid)
}

/// 画像ファイルから盤面を認識する
///
/// グリッドが見つからない場合はエラーを返す。
pub fn extract_sudoku<P: AsRef<Path>, C: CellClassifier>(
    image_path: P,
    classifier: &C,
    config: &AppConfig,
) -> Result<SudokuGrid> {
    let path = image_path.as_ref();
    let image = image::open(path).context(format!("Failed to open image: {:?}", path))?;
    tracing::info!("画像を読み込みました: {} ({}x{})", path.display(), image.width(), image.height());

    extract_sudoku_from_image(&image, classifier, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbImage};
    use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
    use imageproc::geometric_transformations::Projection;
    use imageproc::rect::Rect;

    use crate::vision::perspective::warp_gray;

    /// 数字があれば1、空白なら0を返す分類器
    struct PresenceClassifier;

    impl CellClassifier for PresenceClassifier {
        fn classify(&self, digit: Option<&GrayImage>) -> Result<u8> {
            Ok(if digit.is_some() { 1 } else { 0 })
        }
    }

    /// 白地に太い外枠を描いた合成盤面（罫線なし）
    fn synthetic_puzzle(filled: &[(usize, usize)]) -> DynamicImage {
        let size = 300u32;
        let origin = 30i32;
        let grid = 234u32;
        let cell = grid / 9;
        let mut gray = GrayImage::from_pixel(size, size, Luma([235u8]));

        for t in 0..4 {
            draw_hollow_rect_mut(
                &mut gray,
                Rect::at(origin + t, origin + t).of_size(grid - 2 * t as u32, grid - 2 * t as u32),
                Luma([15u8]),
            );
        }
        for &(row, col) in filled {
            let x = origin + (col as u32 * cell) as i32 + 10;
            let y = origin + (row as u32 * cell) as i32 + 6;
            draw_filled_rect_mut(&mut gray, Rect::at(x, y).of_size(6, 14), Luma([15u8]));
        }
        DynamicImage::ImageLuma8(gray)
    }

    #[test]
    fn test_extract_cells_finds_81_cells() {
        let image = synthetic_puzzle(&[(1, 1), (4, 4)]);
        let cells = extract_cells(&image, &AppConfig::default()).unwrap();
        assert_eq!(cells.len(), 81);
    }

    #[test]
    fn test_extract_sudoku_marks_filled_cells() {
        // 外周のマスには外枠の一部が写り込むので内側のマスで確認する
        let filled = [(1, 1), (4, 4), (7, 2)];
        let image = synthetic_puzzle(&filled);

        let grid = extract_sudoku_from_image(&image, &PresenceClassifier, &AppConfig::default()).unwrap();
        for &(row, col) in &filled {
            assert_eq!(grid.get(row, col), 1, "cell ({}, {})", row, col);
        }
        assert_eq!(grid.get(4, 5), 0);
    }

    /// 合成盤面を台形に歪めて撮影した画像
    fn skewed_puzzle(filled: &[(usize, usize)]) -> DynamicImage {
        let flat = synthetic_puzzle(filled).to_luma8();
        let projection = Projection::from_control_points(
            [(30.0, 30.0), (263.0, 30.0), (263.0, 263.0), (30.0, 263.0)],
            [(60.0, 40.0), (300.0, 70.0), (280.0, 320.0), (40.0, 290.0)],
        )
        .unwrap();
        DynamicImage::ImageLuma8(warp_gray(&flat, &projection, 360, 360, 235))
    }

    #[test]
    fn test_extract_sudoku_on_skewed_photo() {
        let filled = [(1, 1), (4, 4), (7, 2), (2, 6)];
        let image = skewed_puzzle(&filled);

        assert_eq!(extract_cells(&image, &AppConfig::default()).unwrap().len(), 81);

        let grid = extract_sudoku_from_image(&image, &PresenceClassifier, &AppConfig::default()).unwrap();
        for &(row, col) in &filled {
            assert_eq!(grid.get(row, col), 1, "cell ({}, {})", row, col);
        }
        for &(row, col) in &[(4, 5), (1, 2), (6, 6), (2, 1)] {
            assert_eq!(grid.get(row, col), 0, "cell ({}, {})", row, col);
        }
    }

    #[test]
    fn test_missing_grid_is_error() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 120, image::Rgb([250, 250, 250])));
        let err = extract_sudoku_from_image(&image, &PresenceClassifier, &AppConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Could not find Sudoku grid"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_sudoku(dir.path().join("nope.png"), &PresenceClassifier, &AppConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_sudoku_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puzzle.png");
        synthetic_puzzle(&[(2, 7)]).save(&path).unwrap();

        let grid = extract_sudoku(&path, &PresenceClassifier, &AppConfig::default()).unwrap();
        assert_eq!(grid.get(2, 7), 1);
    }
}
