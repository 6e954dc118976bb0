use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Git error: {0}")]
    GitError(#[from] git2::Error),

    #[error("Repository unavailable: {location}: {message}")]
    RepositoryUnavailable { location: String, message: String },

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Unreadable commit {commit}: {message}")]
    HistoryRead { commit: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyzerError {
    /// 1コミット単位で読み飛ばせるエラーかどうか
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AnalyzerError::HistoryRead { .. })
    }
}

/// 現在の行数を計測できなかった理由
///
/// 致命的なエラーではなく、該当ファイルをホットスポット結果から除外するために使います。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileReadError {
    #[error("file no longer exists at head")]
    Missing,

    #[error("not a regular file")]
    NotAFile,

    #[error("binary content")]
    Binary,

    #[error("empty file")]
    Empty,

    #[error("unreadable: {0}")]
    Unreadable(String),
}
