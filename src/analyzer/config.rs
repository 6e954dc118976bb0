//! 分析の設定値と検証を担当するモジュール
//!
//! 各オプション構造体は`Default`で既定値を持ち、`validate`で範囲外の値を
//! 分析開始前に`AnalyzerError::InvalidConfiguration`として弾きます。

use super::error::AnalyzerError;
use super::filter::FilterOptions;
use chrono::{DateTime, Duration, Utc};

/// 指定できる期間の上限（約1万年）
pub const MAX_WINDOW_DAYS: u32 = 3_650_000;

/// 分析対象とする履歴の期間
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    /// 全履歴
    #[default]
    Unbounded,
    /// 直近N日
    Days(u32),
}

impl Window {
    pub fn from_days(days: Option<u32>) -> Self {
        days.map_or(Window::Unbounded, Window::Days)
    }

    /// `now`を基準にした下限時刻。これより古いコミットは対象外
    ///
    /// 日時の表現範囲を超える期間は全履歴として扱います。
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Window::Unbounded => None,
            Window::Days(days) => now.checked_sub_signed(Duration::days(i64::from(*days))),
        }
    }

    fn validate(&self) -> Result<(), AnalyzerError> {
        match self {
            Window::Days(0) => Err(AnalyzerError::InvalidConfiguration(
                "time window must be at least 1 day".to_string(),
            )),
            Window::Days(days) if *days > MAX_WINDOW_DAYS => {
                Err(AnalyzerError::InvalidConfiguration(format!(
                    "time window must be at most {} days, got {}",
                    MAX_WINDOW_DAYS, days
                )))
            }
            _ => Ok(()),
        }
    }
}

/// ホットスポット分析のオプション
///
/// # フィールド
///
/// - `branch`: 分析対象のブランチ
/// - `window`: 分析対象期間
/// - `top_n`: 表示件数（0は全件）
/// - `include_merges`: マージコミットを含めるかどうか
/// - `filter`: パスフィルタの設定
#[derive(Debug, Clone)]
pub struct HotspotOptions {
    pub branch: String,
    pub window: Window,
    pub top_n: usize,
    pub include_merges: bool,
    pub filter: FilterOptions,
}

impl Default for HotspotOptions {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            window: Window::Unbounded,
            top_n: 20,
            include_merges: true,
            filter: FilterOptions::default(),
        }
    }
}

impl HotspotOptions {
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        validate_branch(&self.branch)?;
        self.window.validate()
    }
}

/// 変更結合度のしきい値
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingThresholds {
    /// ペアの両ファイルに必要な最小変更回数
    pub min_changes: u32,
    /// 報告する最小の結合度（%）
    pub min_coupling_percent: f64,
}

impl Default for CouplingThresholds {
    fn default() -> Self {
        Self {
            min_changes: 3,
            min_coupling_percent: 30.0,
        }
    }
}

impl CouplingThresholds {
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        if self.min_changes == 0 {
            return Err(AnalyzerError::InvalidConfiguration(
                "minimum changes must be at least 1".to_string(),
            ));
        }
        if !self.min_coupling_percent.is_finite()
            || !(0.0..=100.0).contains(&self.min_coupling_percent)
        {
            return Err(AnalyzerError::InvalidConfiguration(format!(
                "coupling threshold must be between 0 and 100, got {}",
                self.min_coupling_percent
            )));
        }
        Ok(())
    }
}

/// 変更結合度分析のオプション
///
/// `max_files_per_commit`を超えるファイル数を含むコミットは、
/// ペア数の爆発を避けるため集計から除外されます。
#[derive(Debug, Clone)]
pub struct CouplingOptions {
    pub branch: String,
    pub window: Window,
    pub top_n: usize,
    pub include_merges: bool,
    pub thresholds: CouplingThresholds,
    pub max_files_per_commit: Option<usize>,
    pub filter: FilterOptions,
}

impl Default for CouplingOptions {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            window: Window::Days(90),
            top_n: 20,
            include_merges: true,
            thresholds: CouplingThresholds::default(),
            max_files_per_commit: Some(50),
            filter: FilterOptions {
                source_only: true,
                ..FilterOptions::default()
            },
        }
    }
}

impl CouplingOptions {
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        validate_branch(&self.branch)?;
        self.window.validate()?;
        self.thresholds.validate()?;
        if let Some(cap) = self.max_files_per_commit {
            if cap < 2 {
                return Err(AnalyzerError::InvalidConfiguration(format!(
                    "max files per commit must be at least 2, got {}",
                    cap
                )));
            }
        }
        Ok(())
    }
}

fn validate_branch(branch: &str) -> Result<(), AnalyzerError> {
    if branch.trim().is_empty() {
        return Err(AnalyzerError::InvalidConfiguration(
            "branch name must not be empty".to_string(),
        ));
    }
    Ok(())
}
