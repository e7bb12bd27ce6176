//! 写真の前処理
//!
//! グレースケール化 → ガウシアンぼかし → 適応的二値化（ガウシアン重み） → 白黒反転 の順に処理し、
//! グリッド線や数字が前景（255）になる二値画像を生成します。

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::separable_filter_equal;

use crate::model::PreprocessSettings;

/// グレースケールに変換
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// 正規化済みの1次元ガウシアンカーネルを生成
///
/// `sigma <= 0` の場合はカーネルサイズから σ を導出する
/// （`0.3 * ((size - 1) * 0.5 - 1) + 0.8`）。
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let size = size.max(1) as i32;
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size - 1) as f32 * 0.5 - 1.0) + 0.8
    };
    let half = size / 2;

    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for value in kernel.iter_mut() {
        *value /= sum;
    }
    kernel
}

/// 指定カーネルサイズのガウシアンぼかし（偶数サイズは+1して奇数にする）
pub fn gaussian_blur(gray: &GrayImage, kernel_size: u32, sigma: f32) -> GrayImage {
    let size = if kernel_size % 2 == 0 { kernel_size + 1 } else { kernel_size };
    let kernel = gaussian_kernel(size, sigma);
    separable_filter_equal(gray, &kernel)
}

/// ガウシアン重みの適応的二値化
///
/// 各画素を `block_size` 近傍のガウシアン加重平均と比較し、
/// `pixel > mean - c` なら255、それ以外は0とする。
pub fn adaptive_threshold_gaussian(gray: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let local_mean = gaussian_blur(gray, block_size, 0.0);
    let (width, height) = gray.dimensions();

    GrayImage::from_fn(width, height, |x, y| {
        let pixel = gray.get_pixel(x, y)[0] as i32;
        let mean = local_mean.get_pixel(x, y)[0] as i32;
        if pixel > mean - c {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// 白黒反転
pub fn invert(image: &GrayImage) -> GrayImage {
    let mut inverted = image.clone();
    image::imageops::invert(&mut inverted);
    inverted
}

/// 写真を二値化して前景（線・数字）を255にした画像を返す
pub fn preprocess_image(image: &DynamicImage, settings: &PreprocessSettings) -> GrayImage {
    let gray = to_grayscale(image);
    let blurred = gaussian_blur(&gray, settings.blur_kernel, settings.blur_sigma);
    let thresh = adaptive_threshold_gaussian(
        &blurred,
        settings.threshold_block_size,
        settings.threshold_c,
    );
    let binary = invert(&thresh);

    tracing::debug!(
        "前処理完了: {}x{}, 前景画素数 {}",
        binary.width(),
        binary.height(),
        binary.pixels().filter(|p| p[0] > 0).count()
    );
    binary
}
