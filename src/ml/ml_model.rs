//! 機械学習モデルの共通定義
//!
//! 手書き数字分類用のCNNモデルと関連する設定を提供します。

use anyhow::Result;
use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, Relu,
    },
    tensor::{
        activation::{log_softmax, softmax},
        backend::Backend,
        Int, Tensor,
    },
    train::ClassificationOutput,
};

/// クラス数（数字0〜9）
pub const NUM_CLASSES: usize = 10;

/// 画像サイズ（MNISTと同じ28x28）
pub const IMAGE_SIZE: usize = 28;

/// クラス名の定義
pub const CLASS_NAMES: [&str; NUM_CLASSES] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

/// 3層目の畳み込みの出力チャネル数
const CONV3_CHANNELS: usize = 64;

/// 全結合層の中間次元
const HIDDEN_DIM: usize = 64;

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    #[config(default = 10)]
    pub num_classes: usize,
    /// 入力画像サイズ（正方形）
    #[config(default = 28)]
    pub image_size: usize,
}

impl ModelConfig {
    /// Conv3後の特徴マップの一辺
    ///
    /// Conv (3x3, no padding) で2減少、Pool (2x2) で半分（切り捨て）。
    /// 入力が小さすぎて0になる場合は `None`。
    pub fn feature_map_size(&self) -> Option<usize> {
        let after_conv1 = self.image_size.checked_sub(2)?;
        let after_pool1 = after_conv1 / 2;
        let after_conv2 = after_pool1.checked_sub(2)?;
        let after_pool2 = after_conv2 / 2;
        let size = after_pool2.checked_sub(2)?;
        (size > 0).then_some(size)
    }

    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<DigitClassifier<B>> {
        let feature_map_size = self.feature_map_size().ok_or_else(|| {
            anyhow::anyhow!("入力サイズが小さすぎます: {} (最小14x14が必要)", self.image_size)
        })?;

        // Flatten後の特徴次元
        let d = CONV3_CHANNELS * feature_map_size * feature_map_size;

        tracing::debug!("[Model] 入力サイズ: {}x{}", self.image_size, self.image_size);
        tracing::debug!(
            "[Model] Conv3後: {} x {}x{}",
            CONV3_CHANNELS,
            feature_map_size,
            feature_map_size
        );
        tracing::debug!("[Model] FC1: {} -> {}", d, HIDDEN_DIM);
        tracing::debug!("[Model] FC2: {} -> {}", HIDDEN_DIM, self.num_classes);

        Ok(DigitClassifier {
            conv1: Conv2dConfig::new([1, 32], [3, 3]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).init(),
            conv2: Conv2dConfig::new([32, 64], [3, 3]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).init(),
            conv3: Conv2dConfig::new([64, CONV3_CHANNELS], [3, 3]).init(device),
            fc1: LinearConfig::new(d, HIDDEN_DIM).init(device),
            fc2: LinearConfig::new(HIDDEN_DIM, self.num_classes).init(device),
            activation: Relu::new(),
        })
    }
}

/// 手書き数字分類用CNNモデル
///
/// # アーキテクチャ
/// - Conv 3x3 (1 -> 32) + ReLU + MaxPool 2x2
/// - Conv 3x3 (32 -> 64) + ReLU + MaxPool 2x2
/// - Conv 3x3 (64 -> 64) + ReLU
/// - Flatten
/// - FC: d -> 64 + ReLU
/// - FC: 64 -> num_classes
/// - Softmax (予測時)
#[derive(Module, Debug)]
pub struct DigitClassifier<B: Backend> {
    conv1: Conv2d<B>,
    pool1: MaxPool2d,
    conv2: Conv2d<B>,
    pool2: MaxPool2d,
    conv3: Conv2d<B>,

    fc1: Linear<B>,
    fc2: Linear<B>,

    activation: Relu,
}

impl<B: Backend> DigitClassifier<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, 1, size, size]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.conv3.forward(x);
        let x = self.activation.forward(x);

        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);

        self.fc2.forward(x)
    }

    /// 予測を実行
    ///
    /// # 戻り値
    /// - (予測クラスID [batch_size, 1], クラス確率 [batch_size, num_classes])
    pub fn predict(&self, images: Tensor<B, 4>) -> (Tensor<B, 2, Int>, Tensor<B, 2>) {
        let output = self.forward(images);
        let probabilities = softmax(output, 1);
        let predictions = probabilities.clone().argmax(1);
        (predictions, probabilities)
    }

    /// 順伝播とカテゴリカル交差エントロピー（one-hotラベル）
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, 1, size, size]
    /// - `one_hot`: one-hotラベル [batch_size, num_classes]
    /// - `targets`: 正解クラスID [batch_size]（精度計算用）
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        one_hot: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = categorical_cross_entropy(output.clone(), one_hot);

        ClassificationOutput::new(loss, output, targets)
    }
}

/// `-(one_hot * log_softmax(logits)).sum(1).mean()`
pub fn categorical_cross_entropy<B: Backend>(logits: Tensor<B, 2>, one_hot: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (one_hot * log_probs).sum_dim(1).mean().neg()
}
