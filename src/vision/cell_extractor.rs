//! マス画像の分割と数字領域の抽出

use anyhow::Result;
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

use crate::vision::grid_locator::{contour_area, external_contours};

/// 正面化したグリッド画像を `grid_size` x `grid_size` のマスに分割（行優先）
///
/// マスの大きさは画像サイズを整数除算したもの。端数の画素は使わない。
pub fn split_cells(warped: &GrayImage, grid_size: usize) -> Result<Vec<GrayImage>> {
    let grid = grid_size as u32;
    let cell_width = warped.width() / grid;
    let cell_height = warped.height() / grid;

    if cell_width == 0 || cell_height == 0 {
        anyhow::bail!(
            "グリッド画像が小さすぎます: {}x{} ({}x{}マス)",
            warped.width(),
            warped.height(),
            grid_size,
            grid_size
        );
    }

    let mut cells = Vec::with_capacity(grid_size * grid_size);
    for row in 0..grid {
        for col in 0..grid {
            let cell = image::imageops::crop_imm(
                warped,
                col * cell_width,
                row * cell_height,
                cell_width,
                cell_height,
            )
            .to_image();
            cells.push(cell);
        }
    }
    Ok(cells)
}

/// 大津の二値化（反転）: しきい値より明るい画素を0、それ以外を255にする
///
/// 一様なマスではしきい値が0になり、全画素が0（前景なし）になる。
pub fn otsu_binarize_inv(cell: &GrayImage) -> GrayImage {
    let level = otsu_level(cell);
    let (width, height) = cell.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if cell.get_pixel(x, y)[0] > level {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    })
}

/// 輪郭の内側（境界含む）を255で塗りつぶしたマスクを作る
fn fill_contour_mask(width: u32, height: u32, points: &[Point<i32>]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    let mut polygon: Vec<Point<i32>> = points.to_vec();
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }

    if polygon.len() < 3 {
        // 1〜2画素の輪郭は多角形として描けないので直接塗る
        for p in &polygon {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
                mask.put_pixel(p.x as u32, p.y as u32, Luma([255u8]));
            }
        }
    } else {
        draw_polygon_mut(&mut mask, &polygon, Luma([255u8]));
    }
    mask
}

/// マス画像から数字部分を抽出する
///
/// 前景の最大輪郭がマス面積の `min_fill_ratio` 未満なら空白マスとして `None` を返す。
pub fn extract_digit(cell: &GrayImage, min_fill_ratio: f32) -> Option<GrayImage> {
    let thresh = otsu_binarize_inv(cell);
    let contours = external_contours(&thresh);

    let largest = contours.iter().max_by(|a, b| {
        contour_area(&a.points)
            .partial_cmp(&contour_area(&b.points))
            .unwrap_or(std::cmp::Ordering::Equal)
    })?;

    let (width, height) = thresh.dimensions();
    let mask = fill_contour_mask(width, height, &largest.points);

    let filled = mask.pixels().filter(|p| p[0] > 0).count();
    let percent_filled = filled as f32 / (width * height) as f32;
    if percent_filled < min_fill_ratio {
        return None;
    }

    let digit = GrayImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] > 0 {
            *thresh.get_pixel(x, y)
        } else {
            Luma([0u8])
        }
    });
    Some(digit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn test_split_cells_count_and_size() {
        let warped = GrayImage::new(95, 91);
        let cells = split_cells(&warped, 9).unwrap();
        assert_eq!(cells.len(), 81);
        assert!(cells.iter().all(|c| c.dimensions() == (10, 10)));
    }

    #[test]
    fn test_split_cells_row_major() {
        let mut warped = GrayImage::new(90, 90);
        // 2行目3列目のマスだけ塗る
        draw_filled_rect_mut(&mut warped, Rect::at(20, 10).of_size(10, 10), Luma([255u8]));

        let cells = split_cells(&warped, 9).unwrap();
        assert_eq!(cells[9 + 2].get_pixel(5, 5)[0], 255);
        assert_eq!(cells[2 * 9 + 1].get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn test_split_cells_too_small() {
        let warped = GrayImage::new(8, 8);
        assert!(split_cells(&warped, 9).is_err());
    }

    #[test]
    fn test_blank_cell_is_empty() {
        let cell = GrayImage::from_pixel(30, 30, Luma([240u8]));
        assert!(extract_digit(&cell, 0.03).is_none());
    }

    #[test]
    fn test_uniform_cell_has_no_foreground() {
        let cell = GrayImage::from_pixel(30, 30, Luma([235u8]));
        assert!(otsu_binarize_inv(&cell).pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_faint_digit_is_extracted() {
        // 濃淡差12でも塗りつぶし率だけで判定する
        let mut cell = GrayImage::from_pixel(40, 40, Luma([200u8]));
        draw_filled_rect_mut(&mut cell, Rect::at(17, 8).of_size(6, 24), Luma([188u8]));

        let digit = extract_digit(&cell, 0.03).expect("faint stroke should be kept");
        assert_eq!(digit.get_pixel(20, 20)[0], 255);
        assert_eq!(digit.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn test_small_speck_is_rejected() {
        let mut cell = GrayImage::from_pixel(40, 40, Luma([240u8]));
        draw_filled_rect_mut(&mut cell, Rect::at(18, 18).of_size(3, 3), Luma([10u8]));
        // 9 / 1600 < 3%
        assert!(extract_digit(&cell, 0.03).is_none());
    }

    #[test]
    fn test_digit_stroke_is_extracted() {
        let mut cell = GrayImage::from_pixel(40, 40, Luma([240u8]));
        draw_filled_rect_mut(&mut cell, Rect::at(17, 8).of_size(6, 24), Luma([10u8]));
        // 離れた小さなノイズはマスクで除去される
        draw_filled_rect_mut(&mut cell, Rect::at(2, 2).of_size(2, 2), Luma([10u8]));

        let digit = extract_digit(&cell, 0.03).expect("digit should be found");
        assert_eq!(digit.dimensions(), (40, 40));
        assert_eq!(digit.get_pixel(20, 20)[0], 255);
        assert_eq!(digit.get_pixel(2, 2)[0], 0);
        assert_eq!(digit.get_pixel(30, 30)[0], 0);
    }
}
