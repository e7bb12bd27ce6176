//! 数独のCNF符号化と解の復元
//!
//! 変数 `row*100 + col*10 + num`（いずれも1始まり）が「(row, col) に num が入る」を表す。

use anyhow::Result;

use super::cnf::{Assignment, Clause, Cnf, Literal};
use super::{SatSolver, SolveResult};
use crate::types::{SudokuGrid, GRID_SIZE};

const N: u32 = GRID_SIZE as u32;

pub fn var_num(row: u32, col: u32, num: u32) -> u32 {
    row * 100 + col * 10 + num
}

/// 「少なくとも1つ」の節と、ペアごとの「高々1つ」の節を加える
fn exactly_one(cnf: &mut Cnf, vars: &[u32]) {
    cnf.add_clause(vars.iter().map(|&v| Literal::positive(v)).collect());
    for (i, &a) in vars.iter().enumerate() {
        for &b in &vars[i + 1..] {
            cnf.add_clause(vec![Literal::negative(a), Literal::negative(b)]);
        }
    }
}

/// 盤面をCNFにする
///
/// マス・行・列・ブロックの制約の後に、既知のマスを単位節として並べる。
pub fn encode(grid: &SudokuGrid) -> Result<Cnf> {
    let mut cnf = Cnf::new();

    for row in 1..=N {
        for col in 1..=N {
            let vars: Vec<u32> = (1..=N).map(|num| var_num(row, col, num)).collect();
            exactly_one(&mut cnf, &vars);
        }
    }
    for row in 1..=N {
        for num in 1..=N {
            let vars: Vec<u32> = (1..=N).map(|col| var_num(row, col, num)).collect();
            exactly_one(&mut cnf, &vars);
        }
    }
    for col in 1..=N {
        for num in 1..=N {
            let vars: Vec<u32> = (1..=N).map(|row| var_num(row, col, num)).collect();
            exactly_one(&mut cnf, &vars);
        }
    }
    for block in 0..N {
        for num in 1..=N {
            let vars: Vec<u32> = (0..N)
                .map(|k| var_num(3 * (block / 3) + k / 3 + 1, 3 * (block % 3) + k % 3 + 1, num))
                .collect();
            exactly_one(&mut cnf, &vars);
        }
    }

    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            let value = grid.get(row, col);
            if value == 0 {
                continue;
            }
            if value as u32 > N {
                anyhow::bail!("マス ({}, {}) の値 {} は範囲外です", row, col, value);
            }
            let clause: Clause = vec![Literal::positive(var_num(row as u32 + 1, col as u32 + 1, value as u32))];
            cnf.add_clause(clause);
        }
    }

    tracing::debug!("数独をCNFに変換しました: {}節 (既知 {}マス)", cnf.len(), grid.filled_count());
    Ok(cnf)
}

/// 割り当てから盤面を復元する（真の変数だけを見る）
pub fn decode(puzzle: &SudokuGrid, assignment: &Assignment) -> SudokuGrid {
    let mut grid = *puzzle;
    for var in assignment.true_vars() {
        let (row, col, num) = (var / 100, var / 10 % 10, var % 10);
        if (1..=N).contains(&row) && (1..=N).contains(&col) && (1..=N).contains(&num) {
            grid.set(row as usize - 1, col as usize - 1, num as u8);
        }
    }
    grid
}

/// 盤面を解く。解がなければ `None`
pub fn solve_sudoku(puzzle: &SudokuGrid, solver: &mut dyn SatSolver) -> Result<Option<SudokuGrid>> {
    let cnf = encode(puzzle)?;
    match solver.solve(&cnf) {
        SolveResult::Satisfiable(assignment) => {
            let solution = decode(puzzle, &assignment);
            tracing::info!("数独を解きました ({}マス)", solution.filled_count());
            Ok(Some(solution))
        }
        SolveResult::Unsatisfiable => {
            tracing::info!("数独に解がありません");
            Ok(None)
        }
    }
}
