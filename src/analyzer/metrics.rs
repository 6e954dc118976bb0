//! 分析結果の表現を担当するモジュール
//!
//! このモジュールは、ホットスポット分析と変更結合度分析の結果を表現するための
//! データ構造と、分析結果のシリアライズに関する機能を提供します。
//! CSVとJSONは同じフィールド構成で出力されます。

use serde::{Deserialize, Serialize};

/// ファイルごとのホットスポット分析結果
///
/// # フィールド
///
/// - `file`: 分析対象ファイルのパス
/// - `lines_of_code`: ブランチ先頭時点の行数
/// - `revisions`: ファイルの変更回数
/// - `authors`: ファイルに貢献した開発者の数
/// - `hotspot_score`: `lines_of_code × revisions × authors`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotResult {
    pub file: String,
    pub lines_of_code: u64,
    pub revisions: u32,
    pub authors: u32,
    pub hotspot_score: u64,
}

impl HotspotResult {
    pub fn new(file: String, lines_of_code: u64, revisions: u32, authors: u32) -> Self {
        let hotspot_score = lines_of_code * u64::from(revisions) * u64::from(authors);
        Self {
            file,
            lines_of_code,
            revisions,
            authors,
            hotspot_score,
        }
    }
}

/// ファイルペアごとの変更結合度の分析結果
///
/// # フィールド
///
/// - `file1`, `file2`: ペアのファイル（辞書順で`file1 < file2`）
/// - `coupling_percent`: 同時に変更された割合（%）
/// - `changes_together`: 両方が変更されたコミット数
/// - `file1_changes`, `file2_changes`: 各ファイルの変更回数
/// - `score`: `coupling_percent × ln(changes_together + 1)`。順位付けにのみ使い、出力はしない
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingResult {
    pub file1: String,
    pub file2: String,
    #[serde(serialize_with = "round_to_2", deserialize_with = "deserialize_f64")]
    pub coupling_percent: f64,
    pub changes_together: u32,
    pub file1_changes: u32,
    pub file2_changes: u32,
    #[serde(skip)]
    pub score: f64,
}

impl CouplingResult {
    /// 変更回数から結合度とスコアを算出します
    ///
    /// 分母は2つのファイルの変更回数の大きい方です。
    pub fn new(
        file1: String,
        file2: String,
        changes_together: u32,
        file1_changes: u32,
        file2_changes: u32,
    ) -> Self {
        let denominator = file1_changes.max(file2_changes).max(1);
        let coupling_percent = f64::from(changes_together) / f64::from(denominator) * 100.0;
        let score = coupling_percent * (f64::from(changes_together) + 1.0).ln();
        Self {
            file1,
            file2,
            coupling_percent,
            changes_together,
            file1_changes,
            file2_changes,
            score,
        }
    }
}

/// 浮動小数点数を2桁に丸める補助関数
///
/// # 引数
///
/// - `value`: 丸める浮動小数点数
/// - `serializer`: serdeシリアライザ
fn round_to_2<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(round2(*value))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// f64値をデシリアライズする補助関数
fn deserialize_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    f64::deserialize(deserializer)
}
