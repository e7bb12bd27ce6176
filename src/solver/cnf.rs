//! CNF（連言標準形）のテキスト形式
//!
//! 1行が1節で、リテラルは空白区切り。否定は `~` を前に付ける（例: `1 ~2 3`）。
//! 空行は空節として扱う。

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// 変数とその極性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    pub var: u32,
    pub negated: bool,
}

impl Literal {
    pub fn positive(var: u32) -> Self {
        Self { var, negated: false }
    }

    pub fn negative(var: u32) -> Self {
        Self { var, negated: true }
    }

    pub fn negate(self) -> Self {
        Self {
            var: self.var,
            negated: !self.negated,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "~{}", self.var)
        } else {
            write!(f, "{}", self.var)
        }
    }
}

impl std::str::FromStr for Literal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negated, digits) = match s.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let var: u32 = digits
            .parse()
            .map_err(|_| anyhow::anyhow!("不正なリテラルです: {:?}", s))?;
        Ok(Self { var, negated })
    }
}

/// 節（リテラルの選言）
pub type Clause = Vec<Literal>;

/// 1行を節として読む
pub fn parse_clause(line: &str) -> Result<Clause> {
    line.split_whitespace().map(str::parse).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cnf {
    clauses: Vec<Clause>,
}

impl Cnf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_clauses(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    pub fn add_clause(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// 出現する変数（昇順）
    pub fn variables(&self) -> BTreeSet<u32> {
        self.clauses
            .iter()
            .flat_map(|clause| clause.iter().map(|lit| lit.var))
            .collect()
    }

    /// テキストから読み込む
    pub fn parse(text: &str) -> Result<Self> {
        let clauses = text
            .lines()
            .enumerate()
            .map(|(i, line)| parse_clause(line).with_context(|| format!("{}行目", i + 1)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { clauses })
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).context(format!("Failed to open CNF file: {:?}", path))?;
        let cnf = Self::parse(&text).with_context(|| format!("CNFの読み込みに失敗しました: {}", path.display()))?;
        tracing::debug!("CNFを読み込みました: {} ({}節)", path.display(), cnf.len());
        Ok(cnf)
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_string())
            .with_context(|| format!("CNFの書き込みに失敗しました: {}", path.display()))?;
        Ok(())
    }
}

impl std::fmt::Display for Cnf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for clause in &self.clauses {
            let line: Vec<String> = clause.iter().map(|lit| lit.to_string()).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

/// 変数への真偽値の割り当て
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    values: BTreeMap<u32, bool>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, var: u32, value: bool) {
        self.values.insert(var, value);
    }

    pub fn value(&self, var: u32) -> Option<bool> {
        self.values.get(&var).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 真になった変数（昇順）
    pub fn true_vars(&self) -> impl Iterator<Item = u32> + '_ {
        self.values.iter().filter(|&(_, &v)| v).map(|(&var, _)| var)
    }

    pub fn literal_holds(&self, lit: Literal) -> bool {
        self.value(lit.var).map_or(false, |v| v != lit.negated)
    }

    /// 全ての節が充足されているか
    pub fn satisfies(&self, cnf: &Cnf) -> bool {
        cnf.clauses()
            .iter()
            .all(|clause| clause.iter().any(|&lit| self.literal_holds(lit)))
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_string())
            .with_context(|| format!("割り当ての書き込みに失敗しました: {}", path.display()))?;
        Ok(())
    }
}

/// 真の変数を先に、続けて偽の変数を `~v` で1行ずつ書く
impl std::fmt::Display for Assignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for var in self.true_vars() {
            writeln!(f, "{}", var)?;
        }
        for (var, _) in self.values.iter().filter(|&(_, &v)| !v) {
            writeln!(f, "~{}", var)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinations::write_combinations;

    #[test]
    fn test_parse_and_format() {
        let cnf = Cnf::parse("1 ~2 3\n~1\n2 3\n").unwrap();
        assert_eq!(cnf.len(), 3);
        assert_eq!(
            cnf.clauses()[0],
            vec![Literal::positive(1), Literal::negative(2), Literal::positive(3)]
        );
        assert_eq!(cnf.variables().into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(cnf.to_string(), "1 ~2 3\n~1\n2 3\n");
    }

    #[test]
    fn test_blank_line_is_empty_clause() {
        let cnf = Cnf::parse("1\n\n2").unwrap();
        assert_eq!(cnf.len(), 3);
        assert!(cnf.clauses()[1].is_empty());
    }

    #[test]
    fn test_bad_literal_reports_line() {
        let err = Cnf::parse("1 2\n~x 3\n").unwrap_err();
        assert!(format!("{:#}", err).contains("2行目"));
        assert!("~".parse::<Literal>().is_err());
        assert!("".parse::<Literal>().is_err());
    }

    #[test]
    fn test_assignment_satisfies_and_display() {
        let cnf = Cnf::parse("1 ~2\n2 3").unwrap();
        let mut assignment = Assignment::new();
        assignment.set(3, true);
        assignment.set(2, false);
        assignment.set(1, false);
        assert!(assignment.satisfies(&cnf));
        assert_eq!(assignment.to_string(), "3\n~1\n~2\n");

        assignment.set(3, false);
        assert!(!assignment.satisfies(&cnf));
    }

    #[test]
    fn test_combination_output_is_cnf() {
        let mut buf = Vec::new();
        write_combinations(&mut buf, 3, 100).unwrap();
        let cnf = Cnf::parse(std::str::from_utf8(&buf).unwrap()).unwrap();
        assert_eq!(cnf.len(), 8);
        assert!(cnf.clauses().iter().all(|clause| clause.len() == 3));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.cnf");
        let cnf = Cnf::parse("1 ~2\n~1 2\n").unwrap();
        cnf.write_to_file(&path).unwrap();
        assert_eq!(Cnf::read_from_file(&path).unwrap(), cnf);
        assert!(Cnf::read_from_file(dir.path().join("missing.cnf")).is_err());
    }
}
