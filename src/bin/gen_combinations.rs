//! `i` / `~i` の組み合わせをファイルに書き出す

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use sudoku_extractor_lib::combinations::generate_combinations_to_file;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// 変数の数
    #[clap(default_value_t = 20)]
    n: usize,
    /// 出力ファイル
    #[clap(default_value = "combinations.txt")]
    output: PathBuf,
    /// 書き出す最大行数
    #[clap(default_value_t = 1024 * 1024)]
    sample_size: usize,
}

fn main() -> Result<()> {
    sudoku_extractor_lib::init_tracing();
    let args = Args::parse();

    let written = generate_combinations_to_file(args.n, &args.output, args.sample_size)?;
    println!("{} 行を {} に書き出しました", written, args.output.display());
    Ok(())
}
