//! ファイルごとの変更統計を集計するモジュール（ホットスポット分析）
//!
//! コミットストリームから変更回数と開発者の集合をファイルごとに集計し、
//! ストリーム終了後にブランチ先頭時点の行数を並列に計測して
//! `lines_of_code × revisions × authors`のスコアを算出します。

use super::error::FileReadError;
use super::git::CommitInfo;
use super::metrics::HotspotResult;
use indexmap::IndexSet;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// バイナリ判定で先頭から調べるバイト数（gitと同じ）
const BINARY_PROBE_LEN: usize = 8000;

/// 開発者の識別子のインデックス
type AuthorId = u32;

/// ファイルの現在の行数を読み出す元
///
/// 計測はワーカーごとに`handle`で取得したハンドルを使って並列に行われます。
pub trait LineSource: Sync {
    type Handle;

    fn handle(&self) -> Result<Self::Handle, FileReadError>;

    fn count_lines(&self, handle: &mut Self::Handle, path: &str) -> Result<u64, FileReadError>;
}

/// 内容の行数を数えます
///
/// 改行の数に、末尾が改行で終わらない場合の1行を加えます。
/// バイナリや空のファイルは計測対象外です。
pub fn count_lines(content: &[u8]) -> Result<u64, FileReadError> {
    let probe = &content[..content.len().min(BINARY_PROBE_LEN)];
    if probe.contains(&0) {
        return Err(FileReadError::Binary);
    }

    let newlines = content.iter().filter(|&&b| b == b'\n').count() as u64;
    let lines = match content.last() {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    };

    if lines == 0 {
        return Err(FileReadError::Empty);
    }
    Ok(lines)
}

/// ファイルごとの統計情報
///
/// # フィールド
///
/// - `revisions`: ファイルの変更回数
/// - `authors`: ファイルを変更した開発者のセット
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub revisions: u32,
    authors: HashSet<AuthorId>,
}

impl FileStats {
    pub fn author_count(&self) -> u32 {
        self.authors.len() as u32
    }

    /// 計測した行数からメトリクスを算出します
    fn into_result(self, path: String, lines_of_code: u64) -> HotspotResult {
        HotspotResult::new(path, lines_of_code, self.revisions, self.author_count())
    }
}

/// 行数を計測できず結果から除外されたファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedFile {
    pub path: String,
    pub revisions: u32,
    pub authors: u32,
    pub reason: FileReadError,
}

/// 集計の最終結果（順位付け前）
#[derive(Debug, Default)]
pub struct HotspotAggregate {
    pub results: Vec<HotspotResult>,
    pub excluded: Vec<ExcludedFile>,
}

/// 変更回数と開発者をファイルごとに集計する構造体
///
/// 開発者の識別子はインターンされ、ファイルごとには整数のセットとして保持されます。
#[derive(Debug, Default)]
pub struct FileMetricsAggregator {
    authors: IndexSet<String>,
    file_stats: HashMap<String, FileStats>,
}

impl FileMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// フィルタ済みのコミットを1件集計します
    pub fn record(&mut self, commit: &CommitInfo) {
        if commit.files.is_empty() {
            return;
        }

        let (author, _) = self.authors.insert_full(commit.author.clone());
        let author = author as AuthorId;

        // 1コミット内で同じパスは1回だけ数える
        let mut seen = HashSet::with_capacity(commit.files.len());
        for file_path in commit.files.iter().filter(|path| seen.insert(*path)) {
            let stats = self.file_stats.entry(file_path.clone()).or_default();
            stats.revisions += 1;
            stats.authors.insert(author);
        }
    }

    pub fn stats(&self, path: &str) -> Option<&FileStats> {
        self.file_stats.get(path)
    }

    pub fn file_count(&self) -> usize {
        self.file_stats.len()
    }

    pub fn total_revisions(&self) -> u64 {
        self.file_stats
            .values()
            .map(|stats| u64::from(stats.revisions))
            .sum()
    }

    /// 各ファイルの現在の行数を並列に計測し、スコアを算出します
    ///
    /// 行数を計測できないファイルは`excluded`に移され、エラーにはなりません。
    pub fn finalize<S: LineSource>(self, source: &S) -> HotspotAggregate {
        let mut entries: Vec<(String, FileStats)> = self.file_stats.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let measured: Vec<Result<u64, FileReadError>> = entries
            .par_iter()
            .map_init(
                || source.handle(),
                |handle, (path, _)| match handle {
                    Ok(handle) => source.count_lines(handle, path),
                    Err(e) => Err(e.clone()),
                },
            )
            .collect();

        let mut aggregate = HotspotAggregate::default();
        for ((path, stats), lines) in entries.into_iter().zip(measured) {
            match lines {
                Ok(lines_of_code) => aggregate
                    .results
                    .push(stats.into_result(path, lines_of_code)),
                Err(reason) => {
                    debug!(file = %path, %reason, "excluding file from hotspots");
                    aggregate.excluded.push(ExcludedFile {
                        revisions: stats.revisions,
                        authors: stats.author_count(),
                        path,
                        reason,
                    });
                }
            }
        }
        aggregate
    }
}
