//! 数字で書かれた盤面をSATソルバーで解く
//!
//! 入力は81個の数字（0は空白）。ファイル指定がなければ標準入力から読む。

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

use sudoku_extractor_lib::solver::{encode, new_solver, solve_sudoku, SolverKind};
use sudoku_extractor_lib::SudokuGrid;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// 盤面ファイル
    puzzle: Option<PathBuf>,
    /// dpll | cdcl
    #[clap(long, default_value_t = SolverKind::Dpll)]
    solver: SolverKind,
    /// 生成したCNFの保存先
    #[clap(long)]
    cnf: Option<PathBuf>,
}

fn main() -> Result<()> {
    sudoku_extractor_lib::init_tracing();
    let args = Args::parse();

    let text = match &args.puzzle {
        Some(path) => std::fs::read_to_string(path).context(format!("Failed to open puzzle: {:?}", path))?,
        None => {
            eprintln!("Enter the Sudoku puzzle (0 for empty cells):");
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    let puzzle: SudokuGrid = text.parse()?;

    if let Some(path) = &args.cnf {
        encode(&puzzle)?.write_to_file(path)?;
        tracing::info!("CNFを保存しました: {}", path.display());
    }

    let mut solver = new_solver(args.solver);
    match solve_sudoku(&puzzle, solver.as_mut())? {
        Some(solution) => {
            println!("Sudoku solution:");
            println!("{}", solution);
        }
        None => println!("UNSATISFIABLE"),
    }
    Ok(())
}
