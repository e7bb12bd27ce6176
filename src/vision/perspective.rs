//! 透視変換によるグリッドの正面化

use anyhow::Result;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use crate::types::{Point2, Quad};

/// 四隅を [左上, 右上, 右下, 左下] の順に並べる
///
/// 左上は x+y が最小、右下は最大。右上は y-x が最小、左下は最大。
pub fn order_points(quad: &Quad) -> [Point2; 4] {
    let pts = &quad.points;

    let by_key = |key: fn(&Point2) -> f32, pick_max: bool| -> Point2 {
        let mut best = pts[0];
        for p in pts.iter().skip(1) {
            let better = if pick_max { key(p) > key(&best) } else { key(p) < key(&best) };
            if better {
                best = *p;
            }
        }
        best
    };

    let sum = |p: &Point2| p.x + p.y;
    let diff = |p: &Point2| p.y - p.x;

    [
        by_key(sum, false),
        by_key(diff, false),
        by_key(sum, true),
        by_key(diff, true),
    ]
}

/// 並べ替え済みの四隅から出力画像サイズを求める
///
/// 幅は上辺と下辺、高さは左辺と右辺の長い方（小数点以下切り捨て）。
pub fn output_size(rect: &[Point2; 4]) -> (u32, u32) {
    let [tl, tr, br, bl] = rect;
    let width = (br.distance(bl) as u32).max(tr.distance(tl) as u32);
    let height = (tr.distance(br) as u32).max(tl.distance(bl) as u32);
    (width, height)
}

/// 四角形領域を軸に平行な長方形へ射影変換する
pub fn four_point_transform(image: &GrayImage, quad: &Quad) -> Result<GrayImage> {
    let rect = order_points(quad);
    let (width, height) = output_size(&rect);

    if width < 2 || height < 2 {
        anyhow::bail!("グリッド領域が小さすぎます: {}x{}", width, height);
    }

    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let src = [
        (rect[0].x, rect[0].y),
        (rect[1].x, rect[1].y),
        (rect[2].x, rect[2].y),
        (rect[3].x, rect[3].y),
    ];
    let dst = [(0.0, 0.0), (max_x, 0.0), (max_x, max_y), (0.0, max_y)];

    let projection = Projection::from_control_points(src, dst)
        .ok_or_else(|| anyhow::anyhow!("射影変換行列を計算できませんでした: {:?}", rect))?;

    let warped = warp_gray(image, &projection, width, height, 0);

    tracing::debug!("透視変換後のサイズ: {}x{}", width, height);
    Ok(warped)
}

/// 射影変換でグレースケール画像を `width` x `height` に写す
///
/// 補間はf32で行い、最後に四捨五入する（一様な領域は一様なまま残る）。
pub fn warp_gray(image: &GrayImage, projection: &Projection, width: u32, height: u32, default: u8) -> GrayImage {
    let source: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(image.width(), image.height(), |x, y| Luma([image.get_pixel(x, y)[0] as f32]));

    let mut warped: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::new(width, height);
    warp_into(
        &source,
        projection,
        Interpolation::Bilinear,
        Luma([default as f32]),
        &mut warped,
    );

    GrayImage::from_fn(width, height, |x, y| {
        Luma([warped.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
    })
}
