//! 学習済みモデル（tar.gz）のメタデータ確認用バイナリ

use clap::Parser;
use std::path::PathBuf;

use sudoku_extractor_lib::model::{load_metadata, print_metadata_info};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// 学習済みモデル（.tar.gz）
    #[clap(default_value = "models/digit_classifier.tar.gz")]
    model: PathBuf,
}

fn main() {
    sudoku_extractor_lib::init_tracing();
    let args = Args::parse();

    match load_metadata(&args.model) {
        Ok(metadata) => {
            println!("✓ モデルメタデータ読み込み成功: {}", args.model.display());
            print_metadata_info(&metadata);
        }
        Err(e) => {
            eprintln!("✗ エラー: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_defaults() {
        let args = Args::try_parse_from(["inspect_model"]).unwrap();
        assert_eq!(args.model, PathBuf::from("models/digit_classifier.tar.gz"));

        let args = Args::try_parse_from(["inspect_model", "digits.tar.gz"]).unwrap();
        assert_eq!(args.model, PathBuf::from("digits.tar.gz"));
    }
}
