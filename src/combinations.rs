//! ソルバーのテスト入力用の組み合わせ生成
//!
//! 1..=n の各インデックスについて `i` と `~i` のどちらかを選ぶ全組み合わせ
//! （直積）を遅延列挙し、1行1組み合わせでファイルへ書き出します。

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// `(i, ~i)` の直積を辞書順に列挙するイテレータ
///
/// 先頭インデックスが最も遅く変化し、各位置では肯定形が否定形より先。
/// 2^n 個を事前に展開せず、オドメータ方式で1つずつ生成する。
pub struct Combinations {
    n: usize,
    negated: Vec<bool>,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            negated: vec![false; n],
            done: false,
        }
    }

    fn current(&self) -> Vec<String> {
        (1..=self.n)
            .zip(self.negated.iter())
            .map(|(value, &neg)| {
                if neg {
                    format!("~{}", value)
                } else {
                    value.to_string()
                }
            })
            .collect()
    }

    /// オドメータを1つ進める。桁あふれしたら終了
    fn advance(&mut self) {
        for slot in self.negated.iter_mut().rev() {
            if *slot {
                *slot = false;
            } else {
                *slot = true;
                return;
            }
        }
        self.done = true;
    }
}

impl Iterator for Combinations {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let combo = self.current();
        self.advance();
        Some(combo)
    }
}

/// 組み合わせを空白区切りの1行に整形
pub fn format_line(combo: &[String]) -> String {
    combo.join(" ")
}

/// 組み合わせを最大 `sample_size` 行まで書き込み、書き込んだ行数を返す
///
/// 1行書いてから上限を判定するため、`sample_size` が0でも最初の1行は書き込む。
pub fn write_combinations<W: Write>(writer: &mut W, n: usize, sample_size: usize) -> Result<usize> {
    let mut written = 0;
    for combo in Combinations::new(n).take(sample_size.max(1)) {
        writeln!(writer, "{}", format_line(&combo))?;
        written += 1;
    }
    Ok(written)
}

/// 組み合わせをファイルへ書き出す
///
/// ファイルは作成（既存なら切り詰め）、書き込み、クローズを1回ずつ行う。
pub fn generate_combinations_to_file<P: AsRef<Path>>(
    n: usize,
    file_name: P,
    sample_size: usize,
) -> Result<usize> {
    let path = file_name.as_ref();
    let file = File::create(path)
        .context(format!("Failed to create output file: {:?}", path))?;
    let mut writer = BufWriter::new(file);

    let written = write_combinations(&mut writer, n, sample_size)?;
    writer.flush().context("Failed to flush combinations file")?;

    tracing::info!("{} 件の組み合わせを書き込みました: {}", written, path.display());
    Ok(written)
}
