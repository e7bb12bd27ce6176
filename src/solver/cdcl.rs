//! 節学習（CDCL）によるSATソルバー
//!
//! 2リテラル監視で単位伝播し、矛盾からは First-UIP で節を学習して非時系列に戻る。
//! 変数選択はスコア最大の未割り当て変数（VSIDS風）:
//! 初期スコアは出現回数、学習節の変数に加点し、一定回数の矛盾ごとに全体を減衰させる。

use std::collections::BTreeMap;

use super::cnf::{Assignment, Cnf};
use super::{SatSolver, SolveResult, SolveStats};

/// 学習節の変数への加点
const SCORE_BONUS: f64 = 1.0;
/// 減衰させる矛盾回数の間隔
const DECAY_INTERVAL: u64 = 1000;
/// 減衰時にスコアを割る値
const DECAY_FACTOR: f64 = 2.0;

#[derive(Debug, Default)]
pub struct CdclSolver {
    stats: SolveStats,
}

impl CdclSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

/// リテラルの内部表現: 変数番号*2 + 否定なら1
type Lit = usize;

fn lit_var(lit: Lit) -> usize {
    lit >> 1
}

fn lit_value(values: &[Option<bool>], lit: Lit) -> Option<bool> {
    values[lit_var(lit)].map(|v| v != (lit & 1 == 1))
}

/// 1回の `solve` の探索状態
struct Search {
    clauses: Vec<Vec<Lit>>,
    /// リテラルごとの監視節（そのリテラルが偽になったら調べる）
    watches: Vec<Vec<usize>>,
    values: Vec<Option<bool>>,
    level: Vec<usize>,
    reason: Vec<Option<usize>>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    qhead: usize,
    scores: Vec<f64>,
    stats: SolveStats,
}

impl Search {
    fn new(num_vars: usize) -> Self {
        Self {
            clauses: Vec::new(),
            watches: vec![Vec::new(); num_vars * 2],
            values: vec![None; num_vars],
            level: vec![0; num_vars],
            reason: vec![None; num_vars],
            trail: Vec::new(),
            trail_lim: Vec::new(),
            qhead: 0,
            scores: vec![0.0; num_vars],
            stats: SolveStats::default(),
        }
    }

    fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    fn enqueue(&mut self, lit: Lit, reason: Option<usize>) {
        let var = lit_var(lit);
        self.values[var] = Some(lit & 1 == 0);
        self.level[var] = self.decision_level();
        self.reason[var] = reason;
        self.trail.push(lit);
    }

    /// 長さ2以上の節を監視付きで追加する
    fn attach(&mut self, clause: Vec<Lit>) -> usize {
        let index = self.clauses.len();
        self.watches[clause[0]].push(index);
        self.watches[clause[1]].push(index);
        self.clauses.push(clause);
        index
    }

    /// 単位伝播。矛盾した節があればその番号を返す
    fn propagate(&mut self) -> Option<usize> {
        while self.qhead < self.trail.len() {
            let false_lit = self.trail[self.qhead] ^ 1;
            self.qhead += 1;

            let mut watchers = std::mem::take(&mut self.watches[false_lit]);
            let mut i = 0;
            while i < watchers.len() {
                let ci = watchers[i];
                let clause = &mut self.clauses[ci];
                if clause[0] == false_lit {
                    clause.swap(0, 1);
                }
                let first = clause[0];
                if lit_value(&self.values, first) == Some(true) {
                    i += 1;
                    continue;
                }

                // 偽でないリテラルへ監視を移す
                let replacement = (2..clause.len()).find(|&k| lit_value(&self.values, clause[k]) != Some(false));
                if let Some(k) = replacement {
                    clause.swap(1, k);
                    self.watches[clause[1]].push(ci);
                    watchers.swap_remove(i);
                    continue;
                }

                if lit_value(&self.values, first) == Some(false) {
                    self.watches[false_lit] = watchers;
                    self.qhead = self.trail.len();
                    return Some(ci);
                }
                self.stats.propagations += 1;
                self.enqueue(first, Some(ci));
                i += 1;
            }
            self.watches[false_lit] = watchers;
        }
        None
    }

    /// First-UIP で学習節と戻り先のレベルを求める
    ///
    /// 学習節の先頭は現在レベルで唯一偽になるリテラル、2番目は戻り先レベルのリテラル。
    fn analyze(&mut self, conflict: usize) -> (Vec<Lit>, usize) {
        let current = self.decision_level();
        let mut seen = vec![false; self.values.len()];
        let mut learned: Vec<Lit> = vec![0];
        let mut pending = 0usize;
        let mut clause_index = conflict;
        let mut resolved: Option<usize> = None;
        let mut index = self.trail.len();

        loop {
            for &lit in &self.clauses[clause_index] {
                let var = lit_var(lit);
                if Some(var) == resolved || seen[var] || self.level[var] == 0 {
                    continue;
                }
                seen[var] = true;
                if self.level[var] == current {
                    pending += 1;
                } else {
                    learned.push(lit);
                }
            }

            // 印の付いた変数をトレイルの後ろから探す
            let lit = loop {
                index -= 1;
                if seen[lit_var(self.trail[index])] {
                    break self.trail[index];
                }
            };
            let var = lit_var(lit);
            seen[var] = false;
            resolved = Some(var);
            pending = pending.saturating_sub(1);

            match self.reason[var] {
                Some(reason) if pending > 0 => clause_index = reason,
                _ => {
                    learned[0] = lit ^ 1;
                    break;
                }
            }
        }

        // 戻り先レベルのリテラルを2番目に置く
        let mut backjump = 0;
        if learned.len() > 1 {
            let mut max_index = 1;
            for i in 2..learned.len() {
                if self.level[lit_var(learned[i])] > self.level[lit_var(learned[max_index])] {
                    max_index = i;
                }
            }
            learned.swap(1, max_index);
            backjump = self.level[lit_var(learned[1])];
        }

        for &lit in &learned {
            self.scores[lit_var(lit)] += SCORE_BONUS;
        }
        (learned, backjump)
    }

    fn backtrack(&mut self, level: usize) {
        if self.decision_level() <= level {
            return;
        }
        let limit = self.trail_lim[level];
        for &lit in &self.trail[limit..] {
            let var = lit_var(lit);
            self.values[var] = None;
            self.reason[var] = None;
        }
        self.trail.truncate(limit);
        self.trail_lim.truncate(level);
        self.qhead = self.trail.len();
    }

    /// スコア最大の未割り当て変数（同点なら番号の小さい方）
    fn pick_branch_var(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for var in 0..self.values.len() {
            if self.values[var].is_some() {
                continue;
            }
            if best.map_or(true, |b| self.scores[var] > self.scores[b]) {
                best = Some(var);
            }
        }
        best
    }

    fn run(&mut self) -> bool {
        loop {
            if let Some(conflict) = self.propagate() {
                self.stats.conflicts += 1;
                if self.decision_level() == 0 {
                    return false;
                }

                let (learned, backjump) = self.analyze(conflict);
                self.backtrack(backjump);
                let asserting = learned[0];
                if learned.len() == 1 {
                    self.enqueue(asserting, None);
                } else {
                    let index = self.attach(learned);
                    self.enqueue(asserting, Some(index));
                }

                if self.stats.conflicts % DECAY_INTERVAL == 0 {
                    for score in self.scores.iter_mut() {
                        *score /= DECAY_FACTOR;
                    }
                }
            } else {
                let Some(var) = self.pick_branch_var() else {
                    return true;
                };
                self.stats.decisions += 1;
                self.trail_lim.push(self.trail.len());
                self.enqueue(var * 2, None);
            }
        }
    }
}

impl SatSolver for CdclSolver {
    fn solve(&mut self, cnf: &Cnf) -> SolveResult {
        let vars: Vec<u32> = cnf.variables().into_iter().collect();
        let index_of: BTreeMap<u32, usize> = vars.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let mut search = Search::new(vars.len());

        let mut satisfiable = true;
        for clause in cnf.clauses() {
            let mut lits: Vec<Lit> = clause
                .iter()
                .map(|lit| index_of[&lit.var] * 2 + usize::from(lit.negated))
                .collect();
            lits.sort_unstable();
            lits.dedup();

            // 恒真な節は捨てる
            if lits.windows(2).any(|pair| pair[0] ^ 1 == pair[1]) {
                continue;
            }
            for &lit in &lits {
                search.scores[lit_var(lit)] += 1.0;
            }

            match lits.len() {
                0 => satisfiable = false,
                1 => match lit_value(&search.values, lits[0]) {
                    Some(false) => satisfiable = false,
                    Some(true) => {}
                    None => search.enqueue(lits[0], None),
                },
                _ => {
                    search.attach(lits);
                }
            }
        }

        let satisfiable = satisfiable && search.run();
        self.stats = search.stats;
        tracing::debug!(
            "CDCL: 分岐 {}, 伝播 {}, 矛盾 {}, 学習節込みの節数 {}",
            self.stats.decisions,
            self.stats.propagations,
            self.stats.conflicts,
            search.clauses.len()
        );

        if !satisfiable {
            return SolveResult::Unsatisfiable;
        }

        let mut assignment = Assignment::new();
        for (i, &var) in vars.iter().enumerate() {
            assignment.set(var, search.values[i].unwrap_or(false));
        }
        SolveResult::Satisfiable(assignment)
    }

    fn stats(&self) -> SolveStats {
        self.stats
    }
}
