//! CNFファイルの充足可能性を判定する
//!
//! 充足可能なら割り当てを1行1リテラルで書き出す（真の変数、続けて `~v` の偽の変数）。

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use sudoku_extractor_lib::solver::{new_solver, Cnf, SolveResult, SolverKind};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// 入力CNF（1行1節、否定は `~`）
    input: PathBuf,
    /// dpll | cdcl
    #[clap(long, default_value_t = SolverKind::Dpll)]
    solver: SolverKind,
    /// 割り当ての出力先
    #[clap(long, default_value = "output_dpll.txt")]
    output: PathBuf,
}

fn main() -> Result<()> {
    sudoku_extractor_lib::init_tracing();
    let args = Args::parse();

    let cnf = Cnf::read_from_file(&args.input)?;
    tracing::info!("{}節 / {}変数を {} で解きます", cnf.len(), cnf.variables().len(), args.solver);

    let mut solver = new_solver(args.solver);
    let result = solver.solve(&cnf);
    let stats = solver.stats();
    tracing::info!(
        "分岐 {}, 伝播 {}, 矛盾 {}",
        stats.decisions,
        stats.propagations,
        stats.conflicts
    );

    match result {
        SolveResult::Satisfiable(assignment) => {
            println!("SATISFIABLE");
            assignment.write_to_file(&args.output)?;
            println!("assignment written to {}", args.output.display());
        }
        SolveResult::Unsatisfiable => println!("UNSATISFIABLE"),
    }
    Ok(())
}
