//! MNISTデータセットとモデル学習

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoaderBuilder},
        dataset::{Dataset, InMemDataset},
    },
    module::Module,
    optim::AdamConfig,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
    train::{
        metric::{AccuracyMetric, LossMetric},
        ClassificationOutput, LearnerBuilder, LearningStrategy, TrainOutput, TrainStep, ValidStep,
    },
};
use burn_dataset::vision::{MnistDataset, MnistItem};

use crate::ml::{DigitClassifier, ModelConfig, CLASS_NAMES, IMAGE_SIZE, NUM_CLASSES};
use crate::model::{save_model_with_metadata, ModelMetadata, TrainingSettings};

/// 画素値を [0, 1] に正規化
pub fn normalize_pixels(pixels: &[u8]) -> Vec<f32> {
    pixels.iter().map(|&p| p as f32 / 255.0).collect()
}

/// `label` の位置だけ1.0のone-hotベクトル
pub fn one_hot(label: usize, num_classes: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; num_classes];
    if let Some(slot) = v.get_mut(label) {
        *slot = 1.0;
    }
    v
}

/// 正規化済みの学習サンプル
#[derive(Clone, Debug)]
pub struct DigitItem {
    /// 28x28 行優先、[0, 1]
    pub pixels: Vec<f32>,
    pub label: usize,
    pub one_hot: [f32; NUM_CLASSES],
}

impl From<MnistItem> for DigitItem {
    fn from(item: MnistItem) -> Self {
        let pixels = item
            .image
            .iter()
            .flat_map(|row| row.iter().map(|&p| p / 255.0))
            .collect();
        let label = item.label as usize;

        let mut encoded = [0.0f32; NUM_CLASSES];
        encoded.copy_from_slice(&one_hot(label, NUM_CLASSES));

        Self {
            pixels,
            label,
            one_hot: encoded,
        }
    }
}

/// MNISTの分割（元データへの参照とインデックス範囲のみ保持）
#[derive(Clone)]
pub struct MnistSplit {
    source: Arc<dyn Dataset<MnistItem>>,
    // データセット分割用のインデックス範囲
    start_idx: usize,
    end_idx: usize,
}

impl MnistSplit {
    /// 学習用60,000枚（初回はダウンロードしてキャッシュ）
    pub fn train() -> Self {
        Self::from_dataset(MnistDataset::train())
    }

    /// テスト用10,000枚
    pub fn test() -> Self {
        Self::from_dataset(MnistDataset::test())
    }

    /// メモリ上のサンプルから作成
    pub fn from_items(items: Vec<MnistItem>) -> Self {
        Self::from_dataset(InMemDataset::new(items))
    }

    fn from_dataset<D: Dataset<MnistItem> + 'static>(dataset: D) -> Self {
        let len = dataset.len();
        Self {
            source: Arc::new(dataset),
            start_idx: 0,
            end_idx: len,
        }
    }

    /// 末尾の `ratio` 分を検証用に切り出す（シャッフルしない）
    pub fn split_validation(self, ratio: f32) -> Result<(Self, Self)> {
        if !(ratio > 0.0 && ratio < 1.0) {
            anyhow::bail!("validation_split は 0 より大きく 1 未満である必要があります: {}", ratio);
        }

        let total_len = self.end_idx - self.start_idx;
        let valid_len = (total_len as f64 * f64::from(ratio)).round() as usize;
        let split_idx = self.end_idx - valid_len;

        let train = Self {
            source: Arc::clone(&self.source),
            start_idx: self.start_idx,
            end_idx: split_idx,
        };
        let valid = Self {
            source: self.source,
            start_idx: split_idx,
            end_idx: self.end_idx,
        };
        Ok((train, valid))
    }
}

impl Dataset<DigitItem> for MnistSplit {
    fn get(&self, index: usize) -> Option<DigitItem> {
        // インデックス範囲内のデータのみ返す
        let actual_index = self.start_idx + index;
        if actual_index >= self.end_idx {
            return None;
        }
        self.source.get(actual_index).map(DigitItem::from)
    }

    fn len(&self) -> usize {
        self.end_idx - self.start_idx
    }
}

/// バッチャー
#[derive(Clone)]
pub struct DigitBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
}

impl<B: Backend> DigitBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }
}

/// バッチデータ
#[derive(Clone, Debug)]
pub struct DigitBatch<B: Backend> {
    /// [batch_size, 1, size, size]
    pub images: Tensor<B, 4>,
    /// [batch_size, num_classes]
    pub one_hot: Tensor<B, 2>,
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, DigitItem, DigitBatch<B>> for DigitBatcher<B> {
    fn batch(&self, items: Vec<DigitItem>, _device: &B::Device) -> DigitBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let mut all_pixels = Vec::with_capacity(batch_size * size * size);
        let mut all_one_hot = Vec::with_capacity(batch_size * NUM_CLASSES);
        let mut targets_vec = Vec::with_capacity(batch_size);

        for item in items {
            all_pixels.extend_from_slice(&item.pixels);
            all_one_hot.extend_from_slice(&item.one_hot);
            targets_vec.push(item.label as i64);
        }

        // 1回の転送でバッチ全体をデバイスへ
        let images = Tensor::<B, 1>::from_floats(all_pixels.as_slice(), &self.device)
            .reshape([batch_size, 1, size, size]);
        let one_hot = Tensor::<B, 1>::from_floats(all_one_hot.as_slice(), &self.device)
            .reshape([batch_size, NUM_CLASSES]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets_vec.as_slice(), &self.device);

        DigitBatch {
            images,
            one_hot,
            targets,
        }
    }
}

/// TrainStep実装 (学習時の順伝播 + 逆伝播)
impl<B: AutodiffBackend> TrainStep<DigitBatch<B>, ClassificationOutput<B>> for DigitClassifier<B> {
    fn step(&self, batch: DigitBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.one_hot, batch.targets);
        let grads = item.loss.backward();
        TrainOutput::new(self, grads, item)
    }
}

/// ValidStep実装 (検証時の順伝播のみ)
impl<B: Backend> ValidStep<DigitBatch<B>, ClassificationOutput<B>> for DigitClassifier<B> {
    fn step(&self, batch: DigitBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.one_hot, batch.targets)
    }
}

/// 学習済みモデルとテスト精度
pub struct TrainedModel<B: Backend> {
    pub model: DigitClassifier<B>,
    pub test_accuracy: f64,
}

/// データセット全体に対する正解率を計算
pub fn evaluate_accuracy<B: Backend, D: Dataset<DigitItem>>(
    model: &DigitClassifier<B>,
    dataset: &D,
    batch_size: usize,
    device: &B::Device,
) -> f64 {
    let total = dataset.len();
    if total == 0 {
        return 0.0;
    }

    let batcher = DigitBatcher::<B>::new(device.clone(), IMAGE_SIZE);
    let batch_size = batch_size.max(1);
    let mut correct = 0i64;

    for start in (0..total).step_by(batch_size) {
        let end = (start + batch_size).min(total);
        let items: Vec<DigitItem> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }

        let batch = batcher.batch(items, device);
        let (predictions, _) = model.predict(batch.images);
        let hits = predictions
            .flatten::<1>(0, 1)
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        correct += hits;
    }

    correct as f64 / total as f64
}

/// 学習ログ用の一時ディレクトリ（drop時に削除される）
fn artifact_dir() -> Result<tempfile::TempDir> {
    Ok(tempfile::Builder::new().prefix("sudoku_extractor_training").tempdir()?)
}

/// モデルを学習し、テストデータでの正解率とともに返す
pub fn train_model<B: AutodiffBackend>(
    settings: &TrainingSettings,
    device: B::Device,
) -> Result<TrainedModel<B::InnerBackend>> {
    let dataset = MnistSplit::train();
    let dataset_test = MnistSplit::test();
    tracing::info!("学習データ: {} 枚, テストデータ: {} 枚", dataset.len(), dataset_test.len());

    let (dataset_train, dataset_val) = dataset.split_validation(settings.validation_split)?;
    tracing::info!("学習: {} 枚, 検証: {} 枚", dataset_train.len(), dataset_val.len());

    let model_config = ModelConfig::new();
    let model = model_config.init::<B>(&device)?;

    let batcher_train = DigitBatcher::<B>::new(device.clone(), model_config.image_size);
    let batcher_val = DigitBatcher::<B::InnerBackend>::new(device.clone(), model_config.image_size);

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(settings.num_workers)
        .build(dataset_train);

    let dataloader_val = DataLoaderBuilder::new(batcher_val)
        .batch_size(settings.batch_size)
        .num_workers(settings.num_workers)
        .build(dataset_val);

    let artifacts = artifact_dir()?;
    let artifact_dir_str = artifacts.path().to_string_lossy().to_string();

    tracing::info!(
        "学習を開始します: エポック数 {}, バッチサイズ {}, 学習率 {}",
        settings.num_epochs,
        settings.batch_size,
        settings.learning_rate
    );

    let learner = LearnerBuilder::new(&artifact_dir_str)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .learning_strategy(LearningStrategy::SingleDevice(device.clone()))
        .num_epochs(settings.num_epochs)
        .summary()
        .build(model, AdamConfig::new().init(), settings.learning_rate);

    let model_trained = learner.fit(dataloader_train, dataloader_val);
    let model = model_trained.model;
    tracing::info!("学習が完了しました (パラメータ数: {})", model.num_params());

    drop(artifacts);

    let test_accuracy = evaluate_accuracy(&model, &dataset_test, settings.batch_size, &device);
    tracing::info!("テスト正解率: {:.4}", test_accuracy);

    Ok(TrainedModel {
        model,
        test_accuracy,
    })
}

/// モデルの重みをバイト列に変換（f32精度）
pub fn model_to_bytes<B: Backend>(model: DigitClassifier<B>) -> Result<Vec<u8>> {
    BinBytesRecorder::<FullPrecisionSettings>::default()
        .record(model.into_record(), ())
        .map_err(|e| anyhow::anyhow!("モデル重みのシリアライズエラー: {:?}", e))
}

/// 学習済みモデルをメタデータとともにtar.gzへ保存
pub fn save_trained_model<B: Backend>(
    trained: TrainedModel<B>,
    num_epochs: usize,
    output_path: &Path,
) -> Result<std::path::PathBuf> {
    let metadata = ModelMetadata::new(
        CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        IMAGE_SIZE as u32,
        num_epochs as u32,
        Some(trained.test_accuracy),
    );
    let model_binary = model_to_bytes(trained.model)?;
    tracing::info!("モデルバイナリサイズ: {} バイト", model_binary.len());

    save_model_with_metadata(output_path, &metadata, &model_binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray<f32>;

    fn mnist_item(label: u8, value: f32) -> MnistItem {
        MnistItem {
            image: [[value; 28]; 28],
            label,
        }
    }

    fn synthetic_split(len: usize) -> MnistSplit {
        MnistSplit::from_items((0..len).map(|i| mnist_item((i % 10) as u8, 255.0)).collect())
    }

    #[test]
    fn test_normalize_and_one_hot() {
        assert_eq!(normalize_pixels(&[0, 255, 51]), vec![0.0, 1.0, 0.2]);
        assert_eq!(one_hot(3, 5), vec![0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(one_hot(7, 5), vec![0.0; 5]);
    }

    #[test]
    fn test_digit_item_from_mnist() {
        let item = DigitItem::from(mnist_item(4, 255.0));
        assert_eq!(item.pixels.len(), 784);
        assert!(item.pixels.iter().all(|&p| (p - 1.0).abs() < 1e-6));
        assert_eq!(item.label, 4);
        assert_eq!(item.one_hot[4], 1.0);
        assert_eq!(item.one_hot.iter().sum::<f32>(), 1.0);
    }

    #[test]
    fn test_split_validation_takes_trailing_share() {
        let (train, valid) = synthetic_split(10).split_validation(0.2).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(valid.len(), 2);

        // 末尾の2件（ラベル8, 9）が検証用
        assert_eq!(valid.get(0).unwrap().label, 8);
        assert_eq!(valid.get(1).unwrap().label, 9);
        assert!(valid.get(2).is_none());
        assert_eq!(train.get(7).unwrap().label, 7);
        assert!(train.get(8).is_none());
    }

    #[test]
    fn test_split_validation_rejects_bad_ratio() {
        assert!(synthetic_split(10).split_validation(0.0).is_err());
        assert!(synthetic_split(10).split_validation(1.0).is_err());
    }

    #[test]
    fn test_batcher_shapes() {
        let device = NdArrayDevice::default();
        let batcher = DigitBatcher::<TestBackend>::new(device, IMAGE_SIZE);
        let split = synthetic_split(3);
        let items: Vec<DigitItem> = (0..3).filter_map(|i| split.get(i)).collect();

        let batch = batcher.batch(items, &device);
        assert_eq!(batch.images.dims(), [3, 1, IMAGE_SIZE, IMAGE_SIZE]);
        assert_eq!(batch.one_hot.dims(), [3, NUM_CLASSES]);
        assert_eq!(batch.targets.dims(), [3]);
    }

    #[test]
    fn test_evaluate_accuracy_range() {
        let device = NdArrayDevice::default();
        let model = ModelConfig::new().init::<TestBackend>(&device).unwrap();
        let split = synthetic_split(5);

        let accuracy = evaluate_accuracy(&model, &split, 2, &device);
        assert!((0.0..=1.0).contains(&accuracy));

        let empty = MnistSplit::from_items(Vec::new());
        assert_eq!(evaluate_accuracy(&model, &empty, 2, &device), 0.0);
    }

    #[test]
    fn test_artifact_dir_is_removed_on_drop() {
        let first = artifact_dir().unwrap();
        let second = artifact_dir().unwrap();
        assert_ne!(first.path(), second.path());

        let path = first.path().to_path_buf();
        std::fs::write(path.join("log.txt"), "epoch 1").unwrap();
        drop(first);
        assert!(!path.exists());
    }
}
