//! アプリケーション設定管理モジュール
//!
//! 計算デバイス、学習パラメータ、画像処理のしきい値などをJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::solver::SolverKind;

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    Wgpu,
    /// NdArray (CPU) バックエンド
    Cpu,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Wgpu
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

impl std::str::FromStr for DeviceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wgpu" | "gpu" => Ok(DeviceType::Wgpu),
            "cpu" | "ndarray" => Ok(DeviceType::Cpu),
            other => Err(anyhow::anyhow!("不明なデバイス種別です: {}", other)),
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// 学習済みモデル（tar.gz）のパス
    pub model_path: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/digit_classifier.tar.gz".to_string(),
        }
    }
}

/// トレーニング設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// エポック数
    pub num_epochs: usize,
    /// バッチサイズ
    pub batch_size: usize,
    /// ワーカー数
    pub num_workers: usize,
    /// 学習率
    pub learning_rate: f64,
    /// シャッフル用シード
    pub seed: u64,
    /// 学習データ末尾から検証用に取り分ける割合
    pub validation_split: f32,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            num_epochs: 5,
            batch_size: 64,
            num_workers: 1,
            learning_rate: 1e-3,
            seed: 42,
            validation_split: 0.2,
        }
    }
}

/// 前処理（二値化）設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessSettings {
    /// ガウシアンぼかしのカーネルサイズ（奇数）
    pub blur_kernel: u32,
    /// ガウシアンぼかしのσ
    pub blur_sigma: f32,
    /// 適応的二値化のブロックサイズ（奇数）
    pub threshold_block_size: u32,
    /// 適応的二値化で局所平均から引く定数
    pub threshold_c: i32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            blur_kernel: 7,
            blur_sigma: 3.0,
            threshold_block_size: 11,
            threshold_c: 2,
        }
    }
}

/// グリッド検出・マス抽出設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    /// 多角形近似の許容誤差（周囲長に対する割合）
    pub approx_epsilon_ratio: f64,
    /// 数字とみなす最小塗りつぶし率
    pub min_fill_ratio: f32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            approx_epsilon_ratio: 0.02,
            min_fill_ratio: 0.03,
        }
    }
}

/// ソルバー設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverSettings {
    /// 読み取った盤面を解くアルゴリズム
    pub algorithm: SolverKind,
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 計算デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// モデル設定
    #[serde(default)]
    pub model: ModelSettings,
    /// トレーニング設定
    #[serde(default)]
    pub training: TrainingSettings,
    /// 前処理設定
    #[serde(default)]
    pub preprocess: PreprocessSettings,
    /// 抽出設定
    #[serde(default)]
    pub extraction: ExtractionSettings,
    /// ソルバー設定
    #[serde(default)]
    pub solver: SolverSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 指定パスから設定を読み込む、存在しないか壊れている場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    tracing::info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 設定情報をログに出力
    pub fn display(&self) {
        tracing::info!("計算デバイス: {}", self.device_type);
        tracing::info!("モデルパス: {}", self.model.model_path);
        tracing::info!(
            "学習: エポック数 {}, バッチサイズ {}, 学習率 {}, 検証割合 {}",
            self.training.num_epochs,
            self.training.batch_size,
            self.training.learning_rate,
            self.training.validation_split
        );
        tracing::info!(
            "前処理: ぼかし {}x{} (σ={}), 二値化ブロック {} (C={})",
            self.preprocess.blur_kernel,
            self.preprocess.blur_kernel,
            self.preprocess.blur_sigma,
            self.preprocess.threshold_block_size,
            self.preprocess.threshold_c
        );
        tracing::info!(
            "抽出: 近似許容率 {}, 最小塗りつぶし率 {}",
            self.extraction.approx_epsilon_ratio,
            self.extraction.min_fill_ratio
        );
        tracing::info!("ソルバー: {}", self.solver.algorithm);
    }
}
