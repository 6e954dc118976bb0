//! 履歴分析の中核となるモジュール
//!
//! このモジュールは、Gitリポジトリの分析に必要な主要なコンポーネントを提供します。
//! 分析プロセスは以下の流れで行われます：
//!
//! 1. 指定された期間内のコミット履歴の取得
//! 2. パスフィルタによる変更ファイルの選別
//! 3. ファイルごとの統計（ホットスポット）またはペアごとの同時変更（変更結合度）の集計
//! 4. スコアの算出としきい値の適用、順位付け
//!
//! # 主要なコンポーネント
//!
//! - `HotspotAnalyzer`: ホットスポット分析全体を制御する構造体
//! - `CouplingAnalyzer`: 変更結合度分析全体を制御する構造体
//! - `RunSummary`: 読み飛ばしたコミットや除外したファイルの件数

mod config;
mod coupling;
mod error;
mod filter;
mod git;
mod hotspot;
mod metrics;
mod ranking;

pub use config::{CouplingOptions, CouplingThresholds, HotspotOptions, Window};
pub use coupling::{CoChangeAggregator, PairKey, PairStats, Recorded};
pub use error::{AnalyzerError, FileReadError};
pub use filter::{load_ignore_file, FilterOptions, PathFilter, DEFAULT_EXCLUDE_PATTERNS};
pub use git::{is_remote_url, redact_url, Auth, CommitInfo, CommitStream, GitRepository, HeadTree};
pub use hotspot::{
    count_lines, ExcludedFile, FileMetricsAggregator, FileStats, HotspotAggregate, LineSource,
};
pub use metrics::{CouplingResult, HotspotResult};
pub use ranking::{rank_couplings, rank_hotspots, top_n};

use chrono::Utc;
use tracing::{info, warn};

/// 1回の分析で発生した件数の集計
///
/// 致命的でない問題（読めないコミット、行数を計測できないファイル）も
/// ここに記録され、黙って捨てられることはありません。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// 期間内で読み込んだコミット数
    pub commits_read: usize,
    /// 読み込みに失敗して読み飛ばしたコミット数
    pub commits_unreadable: usize,
    /// フィルタ後に対象ファイルが残らなかったコミット数
    pub commits_without_files: usize,
    /// ファイル数の上限を超えて除外したコミット数
    pub commits_oversized: usize,
    /// 集計されたファイル数
    pub files_tracked: usize,
    /// 行数を計測できず除外したファイル数
    pub files_excluded: usize,
}

impl RunSummary {
    fn log(&self) {
        info!(
            commits = self.commits_read,
            without_files = self.commits_without_files,
            files = self.files_tracked,
            "history analyzed"
        );
        if self.commits_unreadable > 0 {
            warn!("{} commits skipped due to read errors", self.commits_unreadable);
        }
        if self.commits_oversized > 0 {
            warn!(
                "{} commits skipped for touching too many files",
                self.commits_oversized
            );
        }
        if self.files_excluded > 0 {
            warn!("{} files excluded due to read errors", self.files_excluded);
        }
    }
}

/// ホットスポット分析の結果
#[derive(Debug)]
pub struct HotspotReport {
    /// 順位付け済みの全件
    pub hotspots: Vec<HotspotResult>,
    /// 行数を計測できなかったファイル
    pub excluded: Vec<ExcludedFile>,
    pub summary: RunSummary,
    top_n: usize,
}

impl HotspotReport {
    /// 上位N件
    pub fn top(&self) -> &[HotspotResult] {
        top_n(&self.hotspots, self.top_n)
    }

    /// 変更履歴のある全ファイルの一覧（パス順）
    ///
    /// 行数を計測できなかったファイルは行数0・スコア0として含まれます。
    pub fn inventory(&self) -> Vec<HotspotResult> {
        let mut files: Vec<HotspotResult> = self
            .hotspots
            .iter()
            .cloned()
            .chain(self.excluded.iter().map(|excluded| {
                HotspotResult::new(excluded.path.clone(), 0, excluded.revisions, excluded.authors)
            }))
            .collect();
        files.sort_by(|a, b| a.file.cmp(&b.file));
        files
    }
}

/// 変更結合度分析の結果
#[derive(Debug)]
pub struct CouplingReport {
    /// 順位付け済みの全件
    pub couplings: Vec<CouplingResult>,
    pub summary: RunSummary,
    top_n: usize,
}

impl CouplingReport {
    /// 上位N件
    pub fn top(&self) -> &[CouplingResult] {
        top_n(&self.couplings, self.top_n)
    }
}

/// ホットスポット分析を実行するメインの構造体
///
/// # フィールド
///
/// - `repo`: Gitリポジトリへのアクセスを管理するインスタンス
/// - `options`: 検証済みの分析オプション
/// - `filter`: コンパイル済みのパスフィルタ
pub struct HotspotAnalyzer {
    repo: GitRepository,
    options: HotspotOptions,
    filter: PathFilter,
}

impl HotspotAnalyzer {
    /// 新しいHotspotAnalyzerインスタンスを作成します
    ///
    /// # エラー
    ///
    /// 以下の場合に履歴を読む前にエラーを返します：
    /// - オプションが範囲外（`InvalidConfiguration`）
    /// - パターンが無効な正規表現として解釈できない（`InvalidPattern`）
    pub fn new(repo: GitRepository, options: HotspotOptions) -> Result<Self, AnalyzerError> {
        options.validate()?;
        let filter = PathFilter::new(&options.filter)?;
        Ok(Self {
            repo,
            options,
            filter,
        })
    }

    /// リポジトリの分析を実行し、ホットスポットを算出します
    ///
    /// # エラー
    ///
    /// ブランチが存在しない場合など、致命的なエラーのみを返します。
    /// 個々のコミットやファイルの読み込み失敗は`RunSummary`に記録されます。
    pub fn analyze(&self) -> Result<HotspotReport, AnalyzerError> {
        let since = self.options.window.since(Utc::now());
        let commits =
            self.repo
                .commits(&self.options.branch, since, self.options.include_merges)?;
        let head = self.repo.head_tree(&self.options.branch)?;

        analyze_hotspots(commits, &self.filter, &head, self.options.top_n)
    }
}

/// 変更結合度分析を実行するメインの構造体
pub struct CouplingAnalyzer {
    repo: GitRepository,
    options: CouplingOptions,
    filter: PathFilter,
}

impl CouplingAnalyzer {
    /// 新しいCouplingAnalyzerインスタンスを作成します
    ///
    /// # エラー
    ///
    /// しきい値やファイル数の上限が範囲外の場合、履歴を読む前に
    /// `InvalidConfiguration`を返します
    pub fn new(repo: GitRepository, options: CouplingOptions) -> Result<Self, AnalyzerError> {
        options.validate()?;
        let filter = PathFilter::new(&options.filter)?;
        Ok(Self {
            repo,
            options,
            filter,
        })
    }

    /// リポジトリの分析を実行し、変更結合度を算出します
    pub fn analyze(&self) -> Result<CouplingReport, AnalyzerError> {
        let since = self.options.window.since(Utc::now());
        let commits =
            self.repo
                .commits(&self.options.branch, since, self.options.include_merges)?;

        analyze_coupling(commits, &self.filter, &self.options)
    }
}

/// コミットストリームからホットスポットを算出します
pub fn analyze_hotspots<I, S>(
    commits: I,
    filter: &PathFilter,
    source: &S,
    top_n: usize,
) -> Result<HotspotReport, AnalyzerError>
where
    I: IntoIterator<Item = Result<CommitInfo, AnalyzerError>>,
    S: LineSource,
{
    let mut aggregator = FileMetricsAggregator::new();
    let mut summary = RunSummary::default();

    for_each_commit(commits, filter, &mut summary, |commit| {
        aggregator.record(commit);
        Ok(())
    })?;

    summary.files_tracked = aggregator.file_count();
    let aggregate = aggregator.finalize(source);
    summary.files_excluded = aggregate.excluded.len();
    summary.log();

    Ok(HotspotReport {
        hotspots: rank_hotspots(aggregate.results, 0),
        excluded: aggregate.excluded,
        summary,
        top_n,
    })
}

/// コミットストリームから変更結合度を算出します
pub fn analyze_coupling<I>(
    commits: I,
    filter: &PathFilter,
    options: &CouplingOptions,
) -> Result<CouplingReport, AnalyzerError>
where
    I: IntoIterator<Item = Result<CommitInfo, AnalyzerError>>,
{
    let mut aggregator = CoChangeAggregator::new(options.max_files_per_commit);
    let mut summary = RunSummary::default();
    let mut oversized = 0;

    for_each_commit(commits, filter, &mut summary, |commit| {
        if let Recorded::Oversized { files } = aggregator.record(commit) {
            warn!(commit = %commit.id, files, "skipping commit that touches too many files");
            oversized += 1;
        }
        Ok(())
    })?;

    summary.commits_oversized = oversized;
    summary.files_tracked = aggregator.file_count();
    summary.log();

    Ok(CouplingReport {
        couplings: rank_couplings(aggregator.finalize(&options.thresholds), 0),
        summary,
        top_n: options.top_n,
    })
}

/// コミットストリームを順に読み、フィルタ済みのコミットを`record`に渡します
///
/// 読み込みに失敗したコミットは警告を出して読み飛ばし、それ以外のエラーで中断します。
fn for_each_commit<I, F>(
    commits: I,
    filter: &PathFilter,
    summary: &mut RunSummary,
    mut record: F,
) -> Result<(), AnalyzerError>
where
    I: IntoIterator<Item = Result<CommitInfo, AnalyzerError>>,
    F: FnMut(&CommitInfo) -> Result<(), AnalyzerError>,
{
    for commit in commits {
        let mut commit = match commit {
            Ok(commit) => commit,
            Err(e) if e.is_recoverable() => {
                warn!("{}", e);
                summary.commits_unreadable += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        summary.commits_read += 1;
        commit.files.retain(|file| filter.include(file));
        if commit.files.is_empty() {
            summary.commits_without_files += 1;
            continue;
        }

        record(&commit)?;
    }
    Ok(())
}
