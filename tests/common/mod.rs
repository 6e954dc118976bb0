//! テスト用のGitリポジトリを組み立てる補助モジュール

#![allow(dead_code)]

use chrono::{Duration, Utc};
use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use std::path::Path;
use tempfile::TempDir;

pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

/// コミットで行う変更
pub enum Change<'a> {
    Write(&'a str, &'a str),
    WriteBytes(&'a str, &'a [u8]),
    Delete(&'a str),
}

impl TestRepo {
    /// `main`ブランチで初期化された空のリポジトリ
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut options = RepositoryInitOptions::new();
        options.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &options).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `days_ago`日前の日時で`HEAD`にコミットします
    pub fn commit(&self, author: &str, days_ago: i64, changes: &[Change]) -> Oid {
        let parents = match self.repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap().id()],
            Err(_) => Vec::new(),
        };
        self.commit_on("HEAD", &parents, author, days_ago, changes)
    }

    /// 任意の参照と親を指定してコミットします
    pub fn commit_on(
        &self,
        reference: &str,
        parents: &[Oid],
        author: &str,
        days_ago: i64,
        changes: &[Change],
    ) -> Oid {
        let mut index = self.repo.index().unwrap();

        // 最初の親のツリーから始める
        match parents.first() {
            Some(parent) => {
                let tree = self.repo.find_commit(*parent).unwrap().tree().unwrap();
                index.read_tree(&tree).unwrap();
            }
            None => index.clear().unwrap(),
        }

        for change in changes {
            match change {
                Change::Write(path, content) => self.add(&mut index, path, content.as_bytes()),
                Change::WriteBytes(path, content) => self.add(&mut index, path, content),
                Change::Delete(path) => {
                    index.remove_path(Path::new(path)).unwrap();
                    let full = self.path().join(path);
                    if full.exists() {
                        std::fs::remove_file(full).unwrap();
                    }
                }
            }
        }
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let when = Utc::now() - Duration::days(days_ago);
        let name = author.split('@').next().unwrap();
        let signature = Signature::new(name, author, &Time::new(when.timestamp(), 0)).unwrap();

        let parents: Vec<git2::Commit> = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid).unwrap())
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        self.repo
            .commit(
                Some(reference),
                &signature,
                &signature,
                "change",
                &tree,
                &parent_refs,
            )
            .unwrap()
    }

    fn add(&self, index: &mut git2::Index, path: &str, content: &[u8]) {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }
}

/// `n`行のテキスト
pub fn lines(n: usize) -> String {
    (0..n).map(|i| format!("line {}\n", i)).collect()
}
