//! 分析結果の順位付け
//!
//! 同点の場合も挿入順に依存しないよう、比較は常に全順序で行います。
//! 上位N件への切り詰めはソートの後に行い、`top_n == 0`は切り詰めなしを意味します。

use super::metrics::{CouplingResult, HotspotResult};
use std::cmp::Ordering;

/// ホットスポットをスコアの降順に並べます
///
/// 同点はrevisionsの降順、さらにパスの辞書順で決定します。
pub fn rank_hotspots(mut results: Vec<HotspotResult>, top_n: usize) -> Vec<HotspotResult> {
    results.sort_by(compare_hotspots);
    truncate(results, top_n)
}

/// 変更結合度をスコアの降順に並べます
///
/// 同点はcoupling_percentの降順、changes_togetherの降順、ペアのパスの辞書順で決定します。
pub fn rank_couplings(mut results: Vec<CouplingResult>, top_n: usize) -> Vec<CouplingResult> {
    results.sort_by(compare_couplings);
    truncate(results, top_n)
}

/// 順位付け済みの結果の上位N件
pub fn top_n<T>(ranked: &[T], n: usize) -> &[T] {
    if n == 0 {
        ranked
    } else {
        &ranked[..n.min(ranked.len())]
    }
}

fn truncate<T>(mut results: Vec<T>, top_n: usize) -> Vec<T> {
    if top_n > 0 {
        results.truncate(top_n);
    }
    results
}

fn compare_hotspots(a: &HotspotResult, b: &HotspotResult) -> Ordering {
    b.hotspot_score
        .cmp(&a.hotspot_score)
        .then_with(|| b.revisions.cmp(&a.revisions))
        .then_with(|| a.file.cmp(&b.file))
}

fn compare_couplings(a: &CouplingResult, b: &CouplingResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.coupling_percent.total_cmp(&a.coupling_percent))
        .then_with(|| b.changes_together.cmp(&a.changes_together))
        .then_with(|| a.file1.cmp(&b.file1))
        .then_with(|| a.file2.cmp(&b.file2))
}
