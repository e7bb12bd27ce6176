//! モデル推論機能

use anyhow::Result;
use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, ElementConversion, Tensor},
};
use image::{imageops::FilterType, GrayImage};
use std::path::Path;

use crate::analyzer::CellClassifier;
use crate::ml::training::normalize_pixels;
use crate::ml::{DigitClassifier, ModelConfig};
use crate::model::load_model_with_metadata;

/// マス画像の数字認識器
pub struct DigitRecognizer<B: Backend> {
    model: DigitClassifier<B>,
    device: B::Device,
    image_size: usize,
}

impl<B: Backend> DigitRecognizer<B> {
    /// 学習済み（またはメモリ上の）モデルから作成
    pub fn new(model: DigitClassifier<B>, device: B::Device, image_size: usize) -> Self {
        Self {
            model,
            device,
            image_size,
        }
    }

    /// tar.gzからモデルを読み込んで初期化
    pub fn load<P: AsRef<Path>>(model_path: P, device: B::Device) -> Result<Self> {
        let (metadata, model_binary) = load_model_with_metadata(model_path.as_ref())?;
        let image_size = metadata.image_size as usize;

        let model = ModelConfig::new()
            .with_num_classes(metadata.num_classes())
            .with_image_size(image_size)
            .init::<B>(&device)?;

        // モデルの重みを復元
        let record = BinBytesRecorder::<FullPrecisionSettings>::default()
            .load(model_binary, &device)
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;
        let model = model.load_record(record);

        tracing::info!(
            "モデルを読み込みました: {} ({}クラス, {}x{})",
            model_path.as_ref().display(),
            metadata.num_classes(),
            image_size,
            image_size
        );
        Ok(Self::new(model, device, image_size))
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// 数字画像を分類する（空白マスは0）
    pub fn recognize(&self, digit: Option<&GrayImage>) -> Result<u8> {
        let Some(digit) = digit else {
            return Ok(0);
        };

        let size = self.image_size as u32;
        let resized = image::imageops::resize(digit, size, size, FilterType::Triangle);
        let pixels = normalize_pixels(resized.as_raw());

        let tensor = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([1, 1, self.image_size, self.image_size]);

        let (predictions, _) = self.model.predict(tensor);
        let class_idx = predictions.flatten::<1>(0, 1).into_scalar().elem::<i64>();

        u8::try_from(class_idx)
            .map_err(|_| anyhow::anyhow!("クラスインデックス {} は範囲外です", class_idx))
    }
}

impl<B: Backend> CellClassifier for DigitRecognizer<B> {
    fn classify(&self, digit: Option<&GrayImage>) -> Result<u8> {
        self.recognize(digit)
    }
}
