//! SATソルバーと数独のCNF符号化

pub mod cnf;
pub mod dpll;
pub mod cdcl;
pub mod sudoku_encoder;

use serde::{Deserialize, Serialize};

pub use cnf::{Assignment, Clause, Cnf, Literal};
pub use cdcl::CdclSolver;
pub use dpll::DpllSolver;
pub use sudoku_encoder::{decode, encode, solve_sudoku, var_num};

/// 充足可能性判定の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveResult {
    /// 充足する割り当て（CNFに出現する全変数）
    Satisfiable(Assignment),
    Unsatisfiable,
}

impl SolveResult {
    pub fn is_satisfiable(&self) -> bool {
        matches!(self, SolveResult::Satisfiable(_))
    }
}

/// 探索の統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    /// 分岐の回数
    pub decisions: u64,
    /// 単位伝播（純リテラル除去を含む）の回数
    pub propagations: u64,
    /// 矛盾の回数
    pub conflicts: u64,
}

/// SATソルバー共通インターフェース
pub trait SatSolver {
    fn solve(&mut self, cnf: &Cnf) -> SolveResult;

    /// 直前の `solve` の統計
    fn stats(&self) -> SolveStats;
}

/// ソルバーの種類
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SolverKind {
    /// 単位伝播と純リテラル除去を行う素朴なDPLL
    #[default]
    Dpll,
    /// 節学習とVSIDS風の変数選択を行うCDCL
    Cdcl,
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverKind::Dpll => write!(f, "DPLL"),
            SolverKind::Cdcl => write!(f, "CDCL"),
        }
    }
}

impl std::str::FromStr for SolverKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dpll" => Ok(SolverKind::Dpll),
            "cdcl" => Ok(SolverKind::Cdcl),
            other => Err(anyhow::anyhow!("不明なソルバー種別です: {}", other)),
        }
    }
}

pub fn new_solver(kind: SolverKind) -> Box<dyn SatSolver> {
    match kind {
        SolverKind::Dpll => Box::new(DpllSolver::new()),
        SolverKind::Cdcl => Box::new(CdclSolver::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinations::write_combinations;

    fn combination_cnf(n: usize, lines: usize) -> Cnf {
        let mut buf = Vec::new();
        write_combinations(&mut buf, n, lines).unwrap();
        Cnf::parse(std::str::from_utf8(&buf).unwrap()).unwrap()
    }

    fn check_all(cnf: &Cnf, expect_sat: bool) {
        for kind in [SolverKind::Dpll, SolverKind::Cdcl] {
            let mut solver = new_solver(kind);
            match solver.solve(cnf) {
                SolveResult::Satisfiable(assignment) => {
                    assert!(expect_sat, "{} returned SAT", kind);
                    assert!(assignment.satisfies(cnf), "{} assignment is wrong", kind);
                    for var in cnf.variables() {
                        assert!(assignment.value(var).is_some(), "{} left {} unassigned", kind, var);
                    }
                }
                SolveResult::Unsatisfiable => assert!(!expect_sat, "{} returned UNSAT", kind),
            }
        }
    }

    #[test]
    fn test_all_sign_combinations_are_unsat() {
        // 全ての符号の組み合わせを節にすると充足不能
        check_all(&combination_cnf(3, 8), false);
        check_all(&combination_cnf(5, 32), false);
    }

    #[test]
    fn test_missing_one_combination_is_sat() {
        // 最後の `~1 ~2 ~3` だけが欠けるので全て真で充足する
        let cnf = combination_cnf(3, 7);
        check_all(&cnf, true);

        let mut solver = DpllSolver::new();
        let SolveResult::Satisfiable(assignment) = solver.solve(&cnf) else {
            panic!("expected SAT");
        };
        assert_eq!(assignment.true_vars().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_trivial_formulas() {
        check_all(&Cnf::new(), true);
        check_all(&Cnf::parse("1\n~1").unwrap(), false);
        check_all(&Cnf::parse("1 2\n\n").unwrap(), false);
        check_all(&Cnf::parse("1 ~1\n2").unwrap(), true);
    }

    #[test]
    fn test_pigeonhole_is_unsat() {
        // 鳩3羽を巣2つに入れる: 変数 p*10+h
        let mut cnf = Cnf::new();
        for p in 1..=3 {
            cnf.add_clause(vec![Literal::positive(p * 10 + 1), Literal::positive(p * 10 + 2)]);
        }
        for h in 1..=2 {
            for a in 1..=3 {
                for b in (a + 1)..=3 {
                    cnf.add_clause(vec![Literal::negative(a * 10 + h), Literal::negative(b * 10 + h)]);
                }
            }
        }
        check_all(&cnf, false);
    }

    #[test]
    fn test_chain_of_implications() {
        // 1 -> 2 -> ... -> 30 と 1 があれば全て真
        let mut cnf = Cnf::parse("1").unwrap();
        for v in 1..30 {
            cnf.add_clause(vec![Literal::negative(v), Literal::positive(v + 1)]);
        }
        check_all(&cnf, true);

        cnf.add_clause(vec![Literal::negative(30)]);
        check_all(&cnf, false);
    }

    #[test]
    fn test_solver_kind_parse_and_display() {
        assert_eq!("cdcl".parse::<SolverKind>().unwrap(), SolverKind::Cdcl);
        assert_eq!("DPLL".parse::<SolverKind>().unwrap(), SolverKind::Dpll);
        assert!("walksat".parse::<SolverKind>().is_err());
        assert_eq!(SolverKind::default().to_string(), "DPLL");
    }

    #[test]
    fn test_stats_are_recorded() {
        let cnf = combination_cnf(4, 16);
        let mut solver = new_solver(SolverKind::Cdcl);
        assert!(!solver.solve(&cnf).is_satisfiable());
        assert!(solver.stats().conflicts > 0);

        let mut solver = new_solver(SolverKind::Dpll);
        assert!(!solver.solve(&cnf).is_satisfiable());
        assert!(solver.stats().decisions > 0);
    }
}
