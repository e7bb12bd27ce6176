/// 数独の一辺のマス数
pub const GRID_SIZE: usize = 9;

/// 画像上の2次元座標（ピクセル）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// グリッド輪郭を近似した四角形（頂点順は未整列）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub points: [Point2; 4],
}

impl Quad {
    pub fn new(points: [Point2; 4]) -> Self {
        Self { points }
    }
}

/// 9x9の認識結果
///
/// 各マスは認識された数字(1-9)、空白マスは0。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SudokuGrid {
    pub cells: [[u8; GRID_SIZE]; GRID_SIZE],
}

impl Default for SudokuGrid {
    fn default() -> Self {
        Self {
            cells: [[0; GRID_SIZE]; GRID_SIZE],
        }
    }
}

impl SudokuGrid {
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.cells[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        self.cells[row][col] = value;
    }

    /// 数字が入っているマスの数
    pub fn filled_count(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .filter(|&&v| v != 0)
            .count()
    }

    /// 全マスが埋まり、行・列・3x3ブロックのどれにも重複がないか
    pub fn is_solved(&self) -> bool {
        let complete = |values: &mut dyn Iterator<Item = u8>| {
            let mut seen = [false; GRID_SIZE + 1];
            for v in values {
                if v == 0 || v as usize > GRID_SIZE || seen[v as usize] {
                    return false;
                }
                seen[v as usize] = true;
            }
            true
        };

        (0..GRID_SIZE).all(|i| {
            let block_row = (i / 3) * 3;
            let block_col = (i % 3) * 3;
            complete(&mut (0..GRID_SIZE).map(|c| self.cells[i][c]))
                && complete(&mut (0..GRID_SIZE).map(|r| self.cells[r][i]))
                && complete(&mut (0..GRID_SIZE).map(|k| self.cells[block_row + k / 3][block_col + k % 3]))
        })
    }
}

impl std::str::FromStr for SudokuGrid {
    type Err = anyhow::Error;

    /// 空白区切りの81個の数字（0は空白）を読み込む
    ///
    /// 区切りのない `530070000` のような行も受け付ける。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<u8> = s
            .split_whitespace()
            .flat_map(|token| token.chars())
            .map(|c| {
                c.to_digit(10)
                    .map(|d| d as u8)
                    .ok_or_else(|| anyhow::anyhow!("盤面に数字以外の文字があります: {:?}", c))
            })
            .collect::<anyhow::Result<_>>()?;

        if digits.len() != GRID_SIZE * GRID_SIZE {
            anyhow::bail!("盤面のマス数が {} です（81個必要）", digits.len());
        }

        let mut grid = SudokuGrid::default();
        for (index, value) in digits.into_iter().enumerate() {
            grid.set(index / GRID_SIZE, index % GRID_SIZE, value);
        }
        Ok(grid)
    }
}

impl std::fmt::Display for SudokuGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.cells {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_display() {
        let mut grid = SudokuGrid::default();
        grid.set(0, 0, 5);
        grid.set(8, 8, 9);

        let text = grid.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "5 0 0 0 0 0 0 0 0");
        assert_eq!(lines[8], "0 0 0 0 0 0 0 0 9");
        assert_eq!(grid.filled_count(), 2);
    }

    #[test]
    fn test_grid_parse_and_is_solved() {
        let solved: SudokuGrid = "534678912 672195348 198342567 859761423 426853791 \
                                  713924856 961537284 287419635 345286179"
            .parse()
            .unwrap();
        assert_eq!(solved.get(0, 0), 5);
        assert_eq!(solved.get(8, 8), 9);
        assert!(solved.is_solved());

        // 表示形式もそのまま読み戻せる
        let reparsed: SudokuGrid = solved.to_string().parse().unwrap();
        assert_eq!(reparsed, solved);

        let mut broken = solved;
        broken.set(0, 0, 3);
        assert!(!broken.is_solved());
        broken.set(0, 0, 0);
        assert!(!broken.is_solved());
    }

    #[test]
    fn test_grid_parse_errors() {
        assert!("1 2 3".parse::<SudokuGrid>().is_err());
        assert!("x".repeat(81).parse::<SudokuGrid>().is_err());
    }

    #[test]
    fn test_point_distance() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }
}
