//! 分析対象のファイルを選別するモジュール
//!
//! ロックファイルやビルド成果物などの組み込み除外ルールと、
//! ユーザーが指定したglobパターンを組み合わせて、各コミットの変更ファイルを
//! 集計に渡すかどうかを判定します。パターンは構築時に一度だけ正規表現へ変換されます。

use super::error::AnalyzerError;
use rayon::prelude::*;
use regex::Regex;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

/// 組み込みの除外パターン
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    // ビルド成果物・依存関係のディレクトリ
    "target/",
    "node_modules/",
    "dist/",
    "build/",
    "vendor/",
    ".git/",
    // minifyされたファイル
    "*.min.*",
    // ロックファイル
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
    // ツールの設定ファイル
    ".eslintrc*",
    ".prettierrc*",
    ".babelrc",
    ".editorconfig",
    ".gitignore",
    ".travis.yml",
    ".gitlab-ci.yml",
    "package.json",
    "tsconfig.json",
    // テスト専用のマニフェスト
    "jest.config.*",
    "karma.conf.js",
    "pytest.ini",
    "tox.ini",
];

/// ソースコードとみなす拡張子
const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "java", "js", "jsx", "ts", "tsx", "c", "cpp", "h", "hpp", "cs", "go", "rb", "php",
    "swift", "kt", "rs", "scala", "sh", "html", "css", "scss", "sql", "xml", "json", "yaml",
    "yml",
];

/// これ以上の除外パターン数では並列にマッチングする
const PARALLEL_PATTERN_THRESHOLD: usize = 64;

/// パスフィルタの設定
///
/// # フィールド
///
/// - `include_patterns`: 指定された場合、いずれかにマッチするファイルのみ対象とする
/// - `exclude_patterns`: マッチしたファイルを除外する
/// - `use_default_excludes`: 組み込みの除外パターンを使うかどうか
/// - `source_only`: ソースコードの拡張子を持つファイルに限定するかどうか
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub use_default_excludes: bool,
    pub source_only: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            use_default_excludes: true,
            source_only: false,
        }
    }
}

/// コンパイル済みのパスフィルタ
#[derive(Debug)]
pub struct PathFilter {
    include_patterns: Vec<Regex>,
    exclude_patterns: Vec<Regex>,
    source_only: bool,
}

impl PathFilter {
    /// 設定からフィルタを構築します
    ///
    /// # エラー
    ///
    /// パターンが正規表現に変換できない場合は`InvalidPattern`を返します
    pub fn new(options: &FilterOptions) -> Result<Self, AnalyzerError> {
        let defaults = if options.use_default_excludes {
            DEFAULT_EXCLUDE_PATTERNS
        } else {
            &[]
        };

        let exclude_patterns = defaults
            .iter()
            .map(|p| p.to_string())
            .chain(options.exclude_patterns.iter().cloned())
            .map(|p| compile(&p))
            .collect::<Result<Vec<_>, _>>()?;

        let include_patterns = options
            .include_patterns
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include_patterns,
            exclude_patterns,
            source_only: options.source_only,
        })
    }

    /// 指定されたファイルパスが分析対象に含まれるかどうかを判定します
    pub fn include(&self, file_path: &str) -> bool {
        if file_path.is_empty() || file_path.ends_with('/') {
            return false;
        }

        if self.is_excluded(file_path) {
            return false;
        }

        if !self.include_patterns.is_empty()
            && !self
                .include_patterns
                .iter()
                .any(|pattern| pattern.is_match(file_path))
        {
            return false;
        }

        !self.source_only || is_source_file(file_path)
    }

    fn is_excluded(&self, file_path: &str) -> bool {
        if self.exclude_patterns.len() >= PARALLEL_PATTERN_THRESHOLD {
            self.exclude_patterns
                .par_iter()
                .any(|pattern| pattern.is_match(file_path))
        } else {
            self.exclude_patterns
                .iter()
                .any(|pattern| pattern.is_match(file_path))
        }
    }
}

/// 除外パターンファイルを読み込みます
///
/// 1行に1パターン。空行と`#`で始まる行は無視します。
pub fn load_ignore_file(path: impl AsRef<Path>) -> Result<Vec<String>, AnalyzerError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_ignore_patterns(&content))
}

fn parse_ignore_patterns(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn is_source_file(file_path: &str) -> bool {
    Path::new(file_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SOURCE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn compile(pattern: &str) -> Result<Regex, AnalyzerError> {
    Regex::new(&glob_to_regex(pattern))
        .map_err(|e| AnalyzerError::InvalidPattern(format!("{}: {}", pattern, e)))
}

/// globパターンを正規表現に変換します
///
/// `/`を含まないパターンは任意のディレクトリ内の名前にマッチし、
/// ディレクトリにマッチしたパターンはその配下すべてにマッチします。
fn glob_to_regex(pattern: &str) -> String {
    let anchored = pattern.starts_with('/');
    let body = pattern.trim_start_matches('/').trim_end_matches('/');

    let mut regex = String::new();
    regex.push('^');
    if !anchored && !body.contains('/') {
        regex.push_str("(?:.*/)?");
    }

    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next(); // 2つ目の'*'を消費
                    if chars.peek() == Some(&'/') {
                        chars.next(); // '/'を消費
                        regex.push_str("(?:.*/)?"); // 0個以上のディレクトリ
                    } else {
                        regex.push_str(".*");
                    }
                } else {
                    regex.push_str("[^/]*"); // 単一の*は現在のディレクトリ内のみマッチ
                }
            }
            '?' => regex.push_str("[^/]"),
            '[' => match char_class(&mut chars) {
                Some(class) => regex.push_str(&class),
                None => regex.push_str("\\["), // 閉じていない'['は文字そのもの
            },
            '/' => regex.push('/'),
            c if c.is_alphanumeric() => regex.push(c),
            _ => regex.push_str(&regex::escape(&c.to_string())),
        }
    }

    regex.push_str("(?:/.*)?$");
    regex
}

/// `[seq]`と`[!seq]`を正規表現の文字クラスに変換します
///
/// 閉じ括弧が見つからない場合は何も消費せず`None`を返します。
/// 文字クラスは`/`にマッチしません。
fn char_class(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut lookahead = chars.clone();
    let negated = lookahead.next_if_eq(&'!').is_some();

    let mut members = String::new();
    let mut first = true;
    loop {
        match lookahead.next()? {
            ']' if !first => break,
            '/' => return None,
            '-' if !first && lookahead.peek() != Some(&']') => members.push('-'),
            c => members.push_str(&regex::escape(&c.to_string())),
        }
        first = false;
    }

    *chars = lookahead;
    Some(if negated {
        format!("[^/{}]", members)
    } else {
        format!("[{}]", members)
    })
}
