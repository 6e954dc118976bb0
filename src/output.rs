//! 分析結果の出力を担当するモジュール
//!
//! 表形式のテキスト、CSV、JSONで結果を書き出します。
//! CSVは結果が0件でもヘッダー行を出力します。

use crate::analyzer::{CouplingResult, HotspotResult};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// CSV/JSONとして出力できる結果レコード
pub trait Record: Serialize {
    const HEADERS: &'static [&'static str];

    /// 表形式で出力する際のヘッダーと列幅
    const COLUMNS: &'static [(&'static str, usize)];

    fn cells(&self) -> Vec<String>;
}

impl Record for HotspotResult {
    const HEADERS: &'static [&'static str] = &[
        "file",
        "lines_of_code",
        "revisions",
        "authors",
        "hotspot_score",
    ];

    const COLUMNS: &'static [(&'static str, usize)] = &[
        ("File", 60),
        ("LOC", 8),
        ("Revisions", 10),
        ("Authors", 8),
        ("Score", 12),
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.file.clone(),
            self.lines_of_code.to_string(),
            self.revisions.to_string(),
            self.authors.to_string(),
            self.hotspot_score.to_string(),
        ]
    }
}

impl Record for CouplingResult {
    const HEADERS: &'static [&'static str] = &[
        "file1",
        "file2",
        "coupling_percent",
        "changes_together",
        "file1_changes",
        "file2_changes",
    ];

    const COLUMNS: &'static [(&'static str, usize)] = &[
        ("File 1", 40),
        ("File 2", 40),
        ("Coupling %", 10),
        ("Together", 10),
        ("File1 Chg", 10),
        ("File2 Chg", 10),
        ("Score", 10),
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.file1.clone(),
            self.file2.clone(),
            format!("{:.2}", self.coupling_percent),
            self.changes_together.to_string(),
            self.file1_changes.to_string(),
            self.file2_changes.to_string(),
            format!("{:.2}", self.score),
        ]
    }
}

/// 結果をCSVで書き出します
pub fn write_csv<T: Record, W: Write>(writer: W, records: &[T]) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(T::HEADERS)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()
}

/// 結果をJSON配列で書き出します
pub fn write_json<T: Record, W: Write>(mut writer: W, records: &[T]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)
}

/// 拡張子が`.json`ならJSON、それ以外はCSVでファイルに書き出します
pub fn write_file<T: Record>(path: &Path, records: &[T]) -> io::Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        write_json(writer, records)
    } else {
        write_csv(writer, records)
    }
}

/// 結果を表形式のテキストにします
pub fn render_table<T: Record>(title: &str, records: &[T]) -> String {
    let width: usize = T::COLUMNS.iter().map(|(_, w)| w + 1).sum();
    let mut out = String::new();

    let _ = writeln!(out, "\n{}", title);
    let _ = writeln!(out, "{}", "-".repeat(width));
    let header: Vec<String> = T::COLUMNS
        .iter()
        .map(|(name, w)| format!("{:<w$}", name, w = *w))
        .collect();
    let _ = writeln!(out, "{}", header.join(" ").trim_end());
    let _ = writeln!(out, "{}", "-".repeat(width));

    for record in records {
        let row: Vec<String> = record
            .cells()
            .iter()
            .zip(T::COLUMNS)
            .map(|(cell, (_, w))| format!("{:<w$}", fit(cell, *w), w = *w))
            .collect();
        let _ = writeln!(out, "{}", row.join(" ").trim_end());
    }
    out
}

/// 列幅に収まらないパスは先頭を省略します
fn fit(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len < width || width <= 3 {
        return value.to_string();
    }
    let keep = width - 4;
    let tail: String = value.chars().skip(len - keep).collect();
    format!("...{}", tail)
}
