//! モデルメタデータの定義
//!
//! tar.gz形式でモデルの重みと一緒に保存される情報を定義します。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// クラスラベル（インデックス順）
    /// 例: ["0", "1", ..., "9"]
    pub class_labels: Vec<String>,

    /// モデル入力サイズ（正方形、通常28）
    pub image_size: u32,

    /// 学習エポック数
    pub num_epochs: u32,

    /// テストデータでの正解率（0.0〜1.0）
    #[serde(default)]
    pub test_accuracy: Option<f64>,

    /// モデルの学習時刻（ISO8601形式）
    pub trained_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(
        class_labels: Vec<String>,
        image_size: u32,
        num_epochs: u32,
        test_accuracy: Option<f64>,
    ) -> Self {
        let trained_at = chrono::Local::now().to_rfc3339();

        Self {
            class_labels,
            image_size,
            num_epochs,
            test_accuracy,
            trained_at,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit_labels() -> Vec<String> {
        (0..10).map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_metadata_json() {
        let metadata = ModelMetadata::new(digit_labels(), 28, 5, Some(0.98));
        let json = metadata.to_json_string().unwrap();
        let restored = ModelMetadata::from_json_string(&json).unwrap();

        assert_eq!(restored.num_classes(), 10);
        assert_eq!(restored.image_size, 28);
        assert_eq!(restored.num_epochs, 5);
        assert_eq!(restored.test_accuracy, Some(0.98));
        assert_eq!(restored.trained_at, metadata.trained_at);
    }

    #[test]
    fn test_metadata_without_accuracy() {
        let json = r#"{
            "class_labels": ["0", "1"],
            "image_size": 28,
            "num_epochs": 1,
            "trained_at": "2024-01-01T00:00:00+09:00"
        }"#;
        let metadata = ModelMetadata::from_json_string(json).unwrap();
        assert_eq!(metadata.test_accuracy, None);
    }

    #[test]
    fn test_invalid_json() {
        assert!(ModelMetadata::from_json_string("[]").is_err());
    }
}
