pub mod types;
pub mod combinations;

// 盤面読み取り機能のモジュール
pub mod vision;
pub mod analyzer;
pub mod model;
pub mod solver;
#[cfg(feature = "ml")]
pub mod ml;

pub use types::{Point2, Quad, SudokuGrid, GRID_SIZE};

/// ログ出力を初期化（`RUST_LOG` 未設定時は info）
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // 二重初期化は無視する
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
