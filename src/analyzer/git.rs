//! Gitリポジトリとの対話を担当するモジュール
//!
//! このモジュールは、libgit2を使用してGitリポジトリからコミット履歴を取得し、
//! 各コミットで変更されたファイルと、ブランチ先頭時点のファイル内容を読み出します。
//! リモートURLの場合は認証情報を使ってクローンします。

use super::error::{AnalyzerError, FileReadError};
use super::hotspot::{count_lines, LineSource};
use chrono::{DateTime, Utc};
use git2::build::RepoBuilder;
use git2::{
    Commit, Cred, CredentialType, ErrorCode, FetchOptions, ObjectType, Oid, RemoteCallbacks,
    Repository, Revwalk,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// シンボリックリンクのファイルモード
const SYMLINK_FILEMODE: i32 = 0o120000;

/// 認証コールバックの最大試行回数
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// Gitリポジトリへのアクセスを管理する構造体
pub struct GitRepository {
    repo: Repository,
}

/// コミット情報を保持する構造体
///
/// # フィールド
///
/// - `id`: コミットID
/// - `author`: コミット作成者（メールアドレス、無ければ名前）
/// - `timestamp`: コミットのタイムスタンプ
/// - `files`: コミットで変更されたファイルのリスト（ソート済み・重複なし）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub files: Vec<String>,
}

impl CommitInfo {
    pub fn new(
        id: impl Into<String>,
        author: impl Into<String>,
        timestamp: DateTime<Utc>,
        files: Vec<String>,
    ) -> Self {
        let mut files = files;
        files.sort();
        files.dedup();
        Self {
            id: id.into(),
            author: author.into(),
            timestamp,
            files,
        }
    }
}

/// リモートリポジトリの認証方式
#[derive(Debug, Clone, Default)]
pub enum Auth {
    #[default]
    None,
    /// 鍵ファイル未指定の場合はssh-agentを使う
    Ssh { key: Option<PathBuf> },
    /// gitのcredential helperに保存された認証情報を使う
    Https { username: Option<String> },
    /// アクセストークン
    Token {
        token: String,
        username: Option<String>,
    },
}

impl Auth {
    fn credentials(
        &self,
        url: &str,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> Result<Cred, git2::Error> {
        match self {
            Auth::None => Err(git2::Error::from_str(
                "repository requires authentication, choose an --auth method",
            )),
            Auth::Ssh { key } => {
                let user = username_from_url.unwrap_or("git");
                if allowed.contains(CredentialType::USERNAME) {
                    return Cred::username(user);
                }
                match key {
                    Some(key) => Cred::ssh_key(user, None, key, None),
                    None => Cred::ssh_key_from_agent(user),
                }
            }
            Auth::Https { username } => {
                let config = git2::Config::open_default()?;
                Cred::credential_helper(
                    &config,
                    url,
                    username.as_deref().or(username_from_url),
                )
            }
            Auth::Token { token, username } => {
                let user = username
                    .as_deref()
                    .unwrap_or_else(|| default_token_user(url));
                Cred::userpass_plaintext(user, token)
            }
        }
    }
}

fn default_token_user(url: &str) -> &'static str {
    if url.contains("gitlab") {
        "oauth2"
    } else {
        "x-access-token"
    }
}

/// URLに含まれる認証情報を伏せた表示用文字列
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}{}", &url[..scheme_end + 3], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

/// ローカルパスではなくリモートURLかどうか
pub fn is_remote_url(location: &str) -> bool {
    location.contains("://") || (location.starts_with("git@") && location.contains(':'))
}

impl GitRepository {
    /// 指定されたパスのGitリポジトリをオープンします
    ///
    /// # エラー
    ///
    /// リポジトリとして開けない場合は`RepositoryUnavailable`を返します
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|e| AnalyzerError::RepositoryUnavailable {
            location: path.display().to_string(),
            message: e.message().to_string(),
        })?;
        Ok(Self { repo })
    }

    /// リモートリポジトリを`dest`にクローンします
    ///
    /// # エラー
    ///
    /// - ブランチが存在しない場合は`BranchNotFound`
    /// - それ以外のクローン失敗（認証・ネットワーク）は`RepositoryUnavailable`
    pub fn clone(
        url: &str,
        branch: &str,
        auth: &Auth,
        dest: impl AsRef<Path>,
    ) -> Result<Self, AnalyzerError> {
        info!(url = %redact_url(url), branch, "cloning repository");

        let mut attempts = 0;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(|url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }
            auth.credentials(url, username_from_url, allowed)
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        let repo = RepoBuilder::new()
            .branch(branch)
            .fetch_options(fetch_options)
            .clone(url, dest.as_ref())
            .map_err(|e| match e.code() {
                ErrorCode::NotFound => AnalyzerError::BranchNotFound(branch.to_string()),
                _ => AnalyzerError::RepositoryUnavailable {
                    location: redact_url(url),
                    message: e.message().to_string(),
                },
            })?;

        Ok(Self { repo })
    }

    /// ブランチ名（またはgitが解決できるリビジョン）をコミットIDに解決します
    fn resolve_branch(&self, branch: &str) -> Result<Oid, AnalyzerError> {
        let candidates = [branch.to_string(), format!("origin/{}", branch)];
        for name in &candidates {
            if let Ok(object) = self.repo.revparse_single(name) {
                if let Ok(commit) = object.peel_to_commit() {
                    return Ok(commit.id());
                }
            }
        }
        Err(AnalyzerError::BranchNotFound(branch.to_string()))
    }

    /// 指定されたブランチのコミット履歴を新しい順に遅延読み込みします
    ///
    /// # 引数
    ///
    /// - `branch`: 対象ブランチ
    /// - `since`: この日時より古いコミットは除外（`None`は全履歴）
    /// - `include_merges`: マージコミットを含めるかどうか
    ///
    /// # エラー
    ///
    /// ブランチが解決できない場合は`BranchNotFound`を返します。
    /// 個々のコミットの読み込み失敗はストリームの要素として`HistoryRead`で返されます。
    pub fn commits(
        &self,
        branch: &str,
        since: Option<DateTime<Utc>>,
        include_merges: bool,
    ) -> Result<CommitStream<'_>, AnalyzerError> {
        let tip = self.resolve_branch(branch)?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(tip)?;
        revwalk.set_sorting(git2::Sort::TIME)?;

        Ok(CommitStream {
            repo: &self.repo,
            revwalk,
            since,
            include_merges,
        })
    }

    /// ブランチ先頭のツリーを行数の読み出し元として取得します
    pub fn head_tree(&self, branch: &str) -> Result<HeadTree, AnalyzerError> {
        let tip = self.resolve_branch(branch)?;
        let commit = self.repo.find_commit(tip)?;
        Ok(HeadTree {
            repo_dir: self.repo.path().to_path_buf(),
            tree_id: commit.tree_id(),
        })
    }
}

/// コミット履歴の遅延ストリーム
///
/// 巻き戻しはできません。最初から読み直すには`GitRepository::commits`を再度呼び出します。
pub struct CommitStream<'repo> {
    repo: &'repo Repository,
    revwalk: Revwalk<'repo>,
    since: Option<DateTime<Utc>>,
    include_merges: bool,
}

impl<'repo> CommitStream<'repo> {
    /// 対象外のコミットは`Ok(None)`を返します
    fn read_commit(&self, oid: Oid) -> Result<Option<CommitInfo>, git2::Error> {
        let commit = self.repo.find_commit(oid)?;

        let timestamp = DateTime::from_timestamp(commit.time().seconds(), 0)
            .ok_or_else(|| git2::Error::from_str("Invalid commit timestamp"))?;

        // 指定された日時より前のコミットはスキップ
        if matches!(self.since, Some(since) if timestamp < since) {
            return Ok(None);
        }

        if !self.include_merges && commit.parent_count() > 1 {
            return Ok(None);
        }

        let signature = commit.author();
        let author = signature
            .email()
            .filter(|email| !email.is_empty())
            .or_else(|| signature.name())
            .unwrap_or("unknown")
            .to_string();

        let files = self.get_changed_files(&commit)?;
        debug!(commit = %oid, files = files.len(), "read commit");

        Ok(Some(CommitInfo::new(oid.to_string(), author, timestamp, files)))
    }

    /// マージコミットの変更ファイルは常に空です（`git log --name-only`と同じ）
    fn get_changed_files(&self, commit: &Commit) -> Result<Vec<String>, git2::Error> {
        let parent_tree = match commit.parent_count() {
            0 => None,
            1 => Some(commit.parent(0)?.tree()?),
            _ => return Ok(Vec::new()),
        };
        let tree = commit.tree()?;

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            if let Some(path) = delta.new_file().path() {
                if let Some(path_str) = path.to_str() {
                    files.push(path_str.to_string());
                }
            }
        }

        Ok(files)
    }
}

impl<'repo> Iterator for CommitStream<'repo> {
    type Item = Result<CommitInfo, AnalyzerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let oid = match self.revwalk.next()? {
                Ok(oid) => oid,
                Err(e) => {
                    return Some(Err(AnalyzerError::HistoryRead {
                        commit: "<revwalk>".to_string(),
                        message: e.message().to_string(),
                    }))
                }
            };

            match self.read_commit(oid) {
                Ok(Some(commit)) => return Some(Ok(commit)),
                Ok(None) => continue,
                Err(e) => {
                    return Some(Err(AnalyzerError::HistoryRead {
                        commit: oid.to_string(),
                        message: e.message().to_string(),
                    }))
                }
            }
        }
    }
}

/// ブランチ先頭のツリー
///
/// `git2::Repository`はスレッド間で共有できないため、ワーカーごとに
/// リポジトリを開き直してblobを読み出します。
#[derive(Debug, Clone)]
pub struct HeadTree {
    repo_dir: PathBuf,
    tree_id: Oid,
}

impl LineSource for HeadTree {
    type Handle = Repository;

    fn handle(&self) -> Result<Repository, FileReadError> {
        Repository::open(&self.repo_dir).map_err(unreadable)
    }

    fn count_lines(&self, repo: &mut Repository, path: &str) -> Result<u64, FileReadError> {
        let tree = repo.find_tree(self.tree_id).map_err(unreadable)?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Err(FileReadError::Missing),
            Err(e) => return Err(unreadable(e)),
        };

        if entry.kind() != Some(ObjectType::Blob) || entry.filemode() == SYMLINK_FILEMODE {
            return Err(FileReadError::NotAFile);
        }

        let blob = repo.find_blob(entry.id()).map_err(unreadable)?;
        count_lines(blob.content())
    }
}

fn unreadable(e: git2::Error) -> FileReadError {
    FileReadError::Unreadable(e.message().to_string())
}
