//! Gitリポジトリのホットスポットと変更結合度の分析ツール
//!
//! このクレートは、Gitリポジトリのコミット履歴を分析し、
//! 大きく、頻繁に変更され、多くの開発者が関与しているファイル（ホットスポット）と、
//! 同じコミットで一緒に変更されやすいファイルのペア（変更結合度）を
//! 特定するための機能を提供します。
//!
//! # 主な機能
//!
//! - 期間を指定したコミット履歴の取得
//! - 組み込みルールとglobパターンによるファイルの選別
//! - ファイルごとの変更回数・開発者数・行数の集計
//! - ファイルペアごとの同時変更回数の集計
//! - スコアの算出と順位付け
//!
//! # 使用例
//!
//! ```no_run
//! use crimescene_analyzer::{GitRepository, HotspotAnalyzer, HotspotOptions};
//!
//! let repo = GitRepository::open("path/to/repo").unwrap();
//! let analyzer = HotspotAnalyzer::new(repo, HotspotOptions::default()).unwrap();
//!
//! let report = analyzer.analyze().unwrap();
//! for hotspot in report.top() {
//!     println!("{} {}", hotspot.file, hotspot.hotspot_score);
//! }
//! ```

pub mod analyzer;
pub mod output;

pub use analyzer::{
    Auth, CouplingAnalyzer, CouplingOptions, CouplingReport, CouplingResult, GitRepository,
    HotspotAnalyzer, HotspotOptions, HotspotReport, HotspotResult,
};
