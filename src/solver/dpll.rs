//! 単位伝播と純リテラル除去によるDPLL
//!
//! 節集合を値として持ち回り、割り当てのたびに簡約した複製を作る。
//! 分岐変数は残った節に出現する最小の変数で、真を先に試す。

use std::collections::{BTreeMap, BTreeSet};

use super::cnf::{Assignment, Clause, Cnf, Literal};
use super::{SatSolver, SolveResult, SolveStats};

#[derive(Debug, Default)]
pub struct DpllSolver {
    stats: SolveStats,
}

impl DpllSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn search(&mut self, mut clauses: Vec<Clause>, trail: &mut Vec<Literal>) -> bool {
        let mark = trail.len();

        loop {
            for clause in clauses.iter_mut() {
                clause.sort();
                clause.dedup();
            }
            clauses.sort();
            clauses.dedup();

            if clauses.iter().any(|clause| clause.is_empty()) {
                self.stats.conflicts += 1;
                trail.truncate(mark);
                return false;
            }

            let forced = forced_literals(&clauses);
            if forced.is_empty() {
                break;
            }
            // 相反する単位節
            if forced.iter().any(|lit| forced.contains(&lit.negate())) {
                self.stats.conflicts += 1;
                trail.truncate(mark);
                return false;
            }
            self.stats.propagations += forced.len() as u64;
            trail.extend(forced.iter().copied());
            clauses = assign_all(clauses, &forced);
        }

        let Some(var) = clauses.iter().flatten().map(|lit| lit.var).min() else {
            return true;
        };

        self.stats.decisions += 1;
        for lit in [Literal::positive(var), Literal::negative(var)] {
            let before = trail.len();
            trail.push(lit);
            if self.search(assign(clauses.clone(), lit), trail) {
                return true;
            }
            trail.truncate(before);
        }

        trail.truncate(mark);
        false
    }
}

/// 単位節のリテラルと純リテラル
fn forced_literals(clauses: &[Clause]) -> BTreeSet<Literal> {
    let mut forced: BTreeSet<Literal> = clauses
        .iter()
        .filter(|clause| clause.len() == 1)
        .map(|clause| clause[0])
        .collect();

    // 変数ごとに (肯定で出現, 否定で出現)
    let mut polarity: BTreeMap<u32, (bool, bool)> = BTreeMap::new();
    for lit in clauses.iter().flatten() {
        let entry = polarity.entry(lit.var).or_default();
        if lit.negated {
            entry.1 = true;
        } else {
            entry.0 = true;
        }
    }
    for (var, seen) in polarity {
        match seen {
            (true, false) => {
                forced.insert(Literal::positive(var));
            }
            (false, true) => {
                forced.insert(Literal::negative(var));
            }
            _ => {}
        }
    }
    forced
}

/// `lit` を真にする: 充足した節を除き、残りから `~lit` を消す
fn assign(clauses: Vec<Clause>, lit: Literal) -> Vec<Clause> {
    let negated = lit.negate();
    clauses
        .into_iter()
        .filter(|clause| !clause.contains(&lit))
        .map(|clause| clause.into_iter().filter(|&l| l != negated).collect())
        .collect()
}

/// 互いに矛盾しないリテラルの集合をまとめて真にする
fn assign_all(clauses: Vec<Clause>, literals: &BTreeSet<Literal>) -> Vec<Clause> {
    clauses
        .into_iter()
        .filter(|clause| !clause.iter().any(|lit| literals.contains(lit)))
        .map(|clause| {
            clause
                .into_iter()
                .filter(|lit| !literals.contains(&lit.negate()))
                .collect()
        })
        .collect()
}

impl SatSolver for DpllSolver {
    fn solve(&mut self, cnf: &Cnf) -> SolveResult {
        self.stats = SolveStats::default();

        let mut trail = Vec::new();
        let satisfiable = self.search(cnf.clauses().to_vec(), &mut trail);
        tracing::debug!(
            "DPLL: 分岐 {}, 伝播 {}, 矛盾 {}",
            self.stats.decisions,
            self.stats.propagations,
            self.stats.conflicts
        );

        if !satisfiable {
            return SolveResult::Unsatisfiable;
        }

        // 簡約で消えた変数は偽にしておく
        let mut assignment = Assignment::new();
        for var in cnf.variables() {
            assignment.set(var, false);
        }
        for lit in trail {
            assignment.set(lit.var, !lit.negated);
        }
        SolveResult::Satisfiable(assignment)
    }

    fn stats(&self) -> SolveStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_propagation_only() {
        let cnf = Cnf::parse("1\n~1 2\n~2 3").unwrap();
        let mut solver = DpllSolver::new();
        let SolveResult::Satisfiable(assignment) = solver.solve(&cnf) else {
            panic!("expected SAT");
        };
        assert_eq!(assignment.true_vars().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(solver.stats().decisions, 0);
    }

    #[test]
    fn test_pure_literal_is_set() {
        let cnf = Cnf::parse("~1 2\n~1 ~2").unwrap();
        let mut solver = DpllSolver::new();
        let SolveResult::Satisfiable(assignment) = solver.solve(&cnf) else {
            panic!("expected SAT");
        };
        assert_eq!(assignment.value(1), Some(false));
        assert_eq!(solver.stats().decisions, 0);
    }

    #[test]
    fn test_backtracks_from_true_branch() {
        // 1 を真にすると矛盾するので偽側で充足する
        let cnf = Cnf::parse("~1 2\n~1 ~2\n1 3\n1 ~3 4\n1 ~4 ~3 5\n~5 3").unwrap();
        let mut solver = DpllSolver::new();
        let SolveResult::Satisfiable(assignment) = solver.solve(&cnf) else {
            panic!("expected SAT");
        };
        assert!(assignment.satisfies(&cnf));
        assert_eq!(assignment.value(1), Some(false));
    }

    #[test]
    fn test_forced_literals() {
        let clauses = Cnf::parse("1\n2 ~3\n~2 ~3").unwrap().clauses().to_vec();
        let forced: Vec<Literal> = forced_literals(&clauses).into_iter().collect();
        assert_eq!(forced, vec![Literal::positive(1), Literal::negative(3)]);
    }
}
