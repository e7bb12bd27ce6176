//! 数独グリッドの検出
//!
//! 二値画像から外側輪郭を抽出し、面積の大きい順に多角形近似して
//! 最初に見つかった四角形をグリッドとみなします。

use anyhow::Result;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

use crate::types::{Point2, Quad};

/// 最上位の外側輪郭のみを抽出（入れ子の輪郭は除外）
pub fn external_contours(binary: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .collect()
}

/// 輪郭で囲まれた面積（靴紐公式）
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x as f64 * points[j].y as f64;
        area -= points[j].x as f64 * points[i].y as f64;
    }
    area.abs() / 2.0
}

/// 面積の大きい順に輪郭を並べる
pub fn sort_by_area_desc(contours: Vec<Contour<i32>>) -> Vec<Contour<i32>> {
    let mut with_area: Vec<(f64, Contour<i32>)> = contours
        .into_iter()
        .map(|c| (contour_area(&c.points), c))
        .collect();
    with_area.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    with_area.into_iter().map(|(_, c)| c).collect()
}

/// 閉曲線を多角形近似（許容誤差は周囲長 × `epsilon_ratio`）
pub fn approximate_polygon(points: &[Point<i32>], epsilon_ratio: f64) -> Vec<Point<i32>> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let perimeter = arc_length(points, true);
    let epsilon = epsilon_ratio * perimeter;
    if epsilon <= 0.0 {
        return points.to_vec();
    }
    approximate_polygon_dp(points, epsilon, true)
}

/// 面積最大の四角形輪郭を探す
pub fn find_grid(binary: &GrayImage, epsilon_ratio: f64) -> Option<Quad> {
    let contours = sort_by_area_desc(external_contours(binary));
    tracing::debug!("外側輪郭数: {}", contours.len());

    for contour in &contours {
        let approx = approximate_polygon(&contour.points, epsilon_ratio);
        if approx.len() == 4 {
            let points = [
                to_point2(&approx[0]),
                to_point2(&approx[1]),
                to_point2(&approx[2]),
                to_point2(&approx[3]),
            ];
            tracing::debug!("グリッド候補: {:?}", points);
            return Some(Quad::new(points));
        }
    }
    None
}

/// グリッドを検出し、見つからなければエラーを返す
pub fn locate_grid(binary: &GrayImage, epsilon_ratio: f64) -> Result<Quad> {
    find_grid(binary, epsilon_ratio).ok_or_else(|| anyhow::anyhow!("Could not find Sudoku grid"))
}

fn to_point2(p: &Point<i32>) -> Point2 {
    Point2::new(p.x as f32, p.y as f32)
}
