//! 同時に変更されるファイルのペアを集計するモジュール（変更結合度分析）
//!
//! ファイルパスは初出時に整数IDへインターンされ、ペアはIDの組で保持されます。
//! 1コミットで`k`個のファイルが変更されると`k(k-1)/2`個のペアが更新されるため、
//! ファイル数の上限を超えるコミットは集計から除外できます。

use super::config::CouplingThresholds;
use super::git::CommitInfo;
use super::metrics::{round2, CouplingResult};
use indexmap::IndexSet;
use std::collections::HashMap;

/// インターンされたファイルの識別子
pub type FileId = u32;

/// 順序に依存しないファイルペアのキー
///
/// `(a, b)`と`(b, a)`は常に同じキーになり、同じファイル同士のペアは作れません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(FileId, FileId);

impl PairKey {
    pub fn new(a: FileId, b: FileId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(PairKey(a, b)),
            std::cmp::Ordering::Greater => Some(PairKey(b, a)),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn ids(&self) -> (FileId, FileId) {
        (self.0, self.1)
    }
}

/// ペアごとの統計情報
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PairStats {
    pub changes_together: u32,
}

/// 1コミットを集計した結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// 集計した（ペアの更新数）
    Counted { pairs: usize },
    /// 対象ファイルがなかった
    Empty,
    /// ファイル数の上限を超えたため除外した
    Oversized { files: usize },
}

/// ファイルの変更回数と同時変更回数を集計する構造体
#[derive(Debug, Default)]
pub struct CoChangeAggregator {
    max_files_per_commit: Option<usize>,
    files: IndexSet<String>,
    file_changes: Vec<u32>,
    pairs: HashMap<PairKey, PairStats>,
}

impl CoChangeAggregator {
    pub fn new(max_files_per_commit: Option<usize>) -> Self {
        Self {
            max_files_per_commit,
            ..Self::default()
        }
    }

    fn intern(&mut self, path: &str) -> FileId {
        if let Some(id) = self.files.get_index_of(path) {
            return id as FileId;
        }
        let (id, _) = self.files.insert_full(path.to_string());
        self.file_changes.push(0);
        id as FileId
    }

    /// フィルタ済みのコミットを1件集計します
    pub fn record(&mut self, commit: &CommitInfo) -> Recorded {
        let file_count = commit.files.len();
        if file_count == 0 {
            return Recorded::Empty;
        }
        if matches!(self.max_files_per_commit, Some(cap) if file_count > cap) {
            return Recorded::Oversized { files: file_count };
        }

        let mut ids: Vec<FileId> = commit.files.iter().map(|f| self.intern(f)).collect();
        ids.sort_unstable();
        ids.dedup();

        for &id in &ids {
            self.file_changes[id as usize] += 1;
        }

        let mut pairs = 0;
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                if let Some(key) = PairKey::new(a, b) {
                    self.pairs.entry(key).or_default().changes_together += 1;
                    pairs += 1;
                }
            }
        }

        Recorded::Counted { pairs }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// ファイルの変更回数（ペアとは独立）
    pub fn changes(&self, path: &str) -> u32 {
        self.files
            .get_index_of(path)
            .map_or(0, |id| self.file_changes[id])
    }

    /// 2つのファイルが同時に変更された回数
    pub fn pair(&self, a: &str, b: &str) -> Option<PairStats> {
        let a = self.files.get_index_of(a)? as FileId;
        let b = self.files.get_index_of(b)? as FileId;
        self.pairs.get(&PairKey::new(a, b)?).copied()
    }

    fn path(&self, id: FileId) -> &str {
        self.files
            .get_index(id as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// しきい値を適用して結合度を算出します（順位付け前）
    pub fn finalize(&self, thresholds: &CouplingThresholds) -> Vec<CouplingResult> {
        self.pairs
            .iter()
            .filter_map(|(key, stats)| {
                let (a, b) = key.ids();
                let changes_a = self.file_changes[a as usize];
                let changes_b = self.file_changes[b as usize];

                if changes_a < thresholds.min_changes || changes_b < thresholds.min_changes {
                    return None;
                }

                let (path_a, path_b) = (self.path(a), self.path(b));
                let result = if path_a <= path_b {
                    CouplingResult::new(
                        path_a.to_string(),
                        path_b.to_string(),
                        stats.changes_together,
                        changes_a,
                        changes_b,
                    )
                } else {
                    CouplingResult::new(
                        path_b.to_string(),
                        path_a.to_string(),
                        stats.changes_together,
                        changes_b,
                        changes_a,
                    )
                };

                // しきい値は表示と同じ小数第2位で比較する
                (round2(result.coupling_percent) >= thresholds.min_coupling_percent)
                    .then_some(result)
            })
            .collect()
    }
}
