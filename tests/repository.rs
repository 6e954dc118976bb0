mod common;

use common::{lines, Change, TestRepo};
use crimescene_analyzer::analyzer::{
    AnalyzerError, CouplingThresholds, FileReadError, FilterOptions, Window,
};
use crimescene_analyzer::{
    CouplingAnalyzer, CouplingOptions, GitRepository, HotspotAnalyzer, HotspotOptions,
};

fn hotspot_options() -> HotspotOptions {
    HotspotOptions {
        top_n: 0,
        ..HotspotOptions::default()
    }
}

fn coupling_options() -> CouplingOptions {
    CouplingOptions {
        thresholds: CouplingThresholds {
            min_changes: 1,
            min_coupling_percent: 0.0,
        },
        top_n: 0,
        ..CouplingOptions::default()
    }
}

fn sample_history() -> TestRepo {
    let repo = TestRepo::new();
    repo.commit(
        "alice@example.com",
        30,
        &[
            Change::Write("src/core.rs", &lines(10)),
            Change::Write("src/util.rs", &lines(4)),
            Change::Write("Cargo.lock", &lines(50)),
        ],
    );
    repo.commit(
        "bob@example.com",
        20,
        &[Change::Write("src/core.rs", &lines(12))],
    );
    repo.commit(
        "alice@example.com",
        10,
        &[
            Change::Write("src/core.rs", &lines(15)),
            Change::Delete("src/util.rs"),
            Change::WriteBytes("assets/logo.png", &[0x89, b'P', b'N', b'G', 0, 0, 1]),
        ],
    );
    repo
}

fn merged_history() -> TestRepo {
    let repo = TestRepo::new();
    let base = repo.commit(
        "alice@example.com",
        5,
        &[Change::Write("src/a.rs", &lines(3))],
    );
    let side = repo.commit_on(
        "refs/heads/side",
        &[base],
        "bob@example.com",
        4,
        &[Change::Write("src/b.rs", &lines(3))],
    );
    let main = repo.commit(
        "alice@example.com",
        3,
        &[Change::Write("src/a.rs", &lines(4))],
    );
    repo.commit_on(
        "HEAD",
        &[main, side],
        "carol@example.com",
        2,
        &[Change::Write("src/b.rs", &lines(3))],
    );
    repo
}

#[test]
fn test_commit_stream_is_newest_first() {
    let repo = sample_history();
    let git = GitRepository::open(repo.path()).unwrap();

    let commits: Vec<_> = git
        .commits("main", None, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(commits.len(), 3);
    assert!(commits[0].timestamp > commits[1].timestamp);
    assert!(commits[1].timestamp > commits[2].timestamp);
    assert_eq!(commits[0].author, "alice@example.com");
    assert_eq!(
        commits[0].files,
        vec![
            "assets/logo.png".to_string(),
            "src/core.rs".to_string(),
            "src/util.rs".to_string(),
        ]
    );
    assert_eq!(
        commits[2].files,
        vec![
            "Cargo.lock".to_string(),
            "src/core.rs".to_string(),
            "src/util.rs".to_string(),
        ]
    );
}

#[test]
fn test_commit_stream_respects_window() {
    let repo = sample_history();
    let git = GitRepository::open(repo.path()).unwrap();

    let since = Window::Days(15).since(chrono::Utc::now());
    let commits: Vec<_> = git
        .commits("main", since, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].author, "alice@example.com");
}

#[test]
fn test_missing_branch() {
    let repo = sample_history();
    let git = GitRepository::open(repo.path()).unwrap();

    assert!(matches!(
        git.commits("does-not-exist", None, true),
        Err(AnalyzerError::BranchNotFound(_))
    ));

    let analyzer = HotspotAnalyzer::new(
        GitRepository::open(repo.path()).unwrap(),
        HotspotOptions {
            branch: "does-not-exist".to_string(),
            ..hotspot_options()
        },
    )
    .unwrap();
    assert!(matches!(
        analyzer.analyze(),
        Err(AnalyzerError::BranchNotFound(_))
    ));
}

#[test]
fn test_hotspots_end_to_end() {
    let repo = sample_history();
    let analyzer =
        HotspotAnalyzer::new(GitRepository::open(repo.path()).unwrap(), hotspot_options())
            .unwrap();

    let report = analyzer.analyze().unwrap();

    assert_eq!(report.hotspots.len(), 1);
    let core = &report.hotspots[0];
    assert_eq!(core.file, "src/core.rs");
    assert_eq!(core.lines_of_code, 15);
    assert_eq!(core.revisions, 3);
    assert_eq!(core.authors, 2);
    assert_eq!(core.hotspot_score, 90);

    // Cargo.lockは組み込みルールで除外され、集計にも現れない
    assert!(report.inventory().iter().all(|r| r.file != "Cargo.lock"));

    let mut excluded: Vec<(&str, &FileReadError)> = report
        .excluded
        .iter()
        .map(|e| (e.path.as_str(), &e.reason))
        .collect();
    excluded.sort_by(|a, b| a.0.cmp(b.0));
    assert_eq!(
        excluded,
        vec![
            ("assets/logo.png", &FileReadError::Binary),
            ("src/util.rs", &FileReadError::Missing),
        ]
    );

    assert_eq!(report.summary.commits_read, 3);
    assert_eq!(report.summary.files_tracked, 3);
    assert_eq!(report.summary.files_excluded, 2);
}

#[test]
fn test_hotspots_measure_branch_head() {
    let repo = TestRepo::new();
    let base = repo.commit(
        "alice@example.com",
        5,
        &[Change::Write("src/lib.rs", &lines(10))],
    );
    // featureブランチの変更はmainの分析に影響しない
    repo.commit_on(
        "refs/heads/feature",
        &[base],
        "bob@example.com",
        1,
        &[Change::Write("src/lib.rs", &lines(500))],
    );

    let analyzer =
        HotspotAnalyzer::new(GitRepository::open(repo.path()).unwrap(), hotspot_options())
            .unwrap();
    let report = analyzer.analyze().unwrap();
    assert_eq!(report.hotspots[0].lines_of_code, 10);
    assert_eq!(report.hotspots[0].revisions, 1);

    let analyzer = HotspotAnalyzer::new(
        GitRepository::open(repo.path()).unwrap(),
        HotspotOptions {
            branch: "feature".to_string(),
            ..hotspot_options()
        },
    )
    .unwrap();
    let report = analyzer.analyze().unwrap();
    assert_eq!(report.hotspots[0].lines_of_code, 500);
    assert_eq!(report.hotspots[0].revisions, 2);
    assert_eq!(report.hotspots[0].authors, 2);
}

#[test]
fn test_merge_commits_can_be_skipped() {
    let repo = merged_history();

    let git = GitRepository::open(repo.path()).unwrap();
    let with_merges = git.commits("main", None, true).unwrap().count();
    let without_merges = git.commits("main", None, false).unwrap().count();

    assert_eq!(with_merges, 4);
    assert_eq!(without_merges, 3);

    // マージコミットは変更ファイルを持たない
    let merge = git
        .commits("main", None, true)
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    assert!(merge.files.is_empty());
}

#[test]
fn test_merged_changes_are_counted_once() {
    let repo = merged_history();
    let analyzer =
        HotspotAnalyzer::new(GitRepository::open(repo.path()).unwrap(), hotspot_options())
            .unwrap();

    let report = analyzer.analyze().unwrap();
    let b = report
        .hotspots
        .iter()
        .find(|r| r.file == "src/b.rs")
        .unwrap();
    assert_eq!(b.revisions, 1);
    assert_eq!(b.authors, 1);
    assert_eq!(report.summary.commits_without_files, 1);
}

#[test]
fn test_coupling_end_to_end() {
    let repo = TestRepo::new();
    repo.commit(
        "dev@example.com",
        3,
        &[
            Change::Write("a.rs", "a1\n"),
            Change::Write("b.rs", "b1\n"),
        ],
    );
    repo.commit(
        "dev@example.com",
        2,
        &[
            Change::Write("a.rs", "a2\n"),
            Change::Write("c.rs", "c1\n"),
        ],
    );
    repo.commit(
        "dev@example.com",
        1,
        &[
            Change::Write("a.rs", "a3\n"),
            Change::Write("b.rs", "b2\n"),
            Change::Write("c.rs", "c2\n"),
            Change::Write("README.md", "docs\n"),
        ],
    );

    let analyzer =
        CouplingAnalyzer::new(GitRepository::open(repo.path()).unwrap(), coupling_options())
            .unwrap();
    let report = analyzer.analyze().unwrap();

    let pairs: Vec<(&str, &str, u32, f64)> = report
        .couplings
        .iter()
        .map(|r| {
            (
                r.file1.as_str(),
                r.file2.as_str(),
                r.changes_together,
                (r.coupling_percent * 100.0).round() / 100.0,
            )
        })
        .collect();

    // README.mdはソースコードの拡張子ではないため対象外
    assert_eq!(
        pairs,
        vec![
            ("a.rs", "b.rs", 2, 66.67),
            ("a.rs", "c.rs", 2, 66.67),
            ("b.rs", "c.rs", 1, 50.0),
        ]
    );
}

#[test]
fn test_coupling_outside_window_is_empty() {
    let repo = TestRepo::new();
    repo.commit(
        "dev@example.com",
        400,
        &[
            Change::Write("a.rs", "a\n"),
            Change::Write("b.rs", "b\n"),
        ],
    );

    let analyzer =
        CouplingAnalyzer::new(GitRepository::open(repo.path()).unwrap(), coupling_options())
            .unwrap();
    let report = analyzer.analyze().unwrap();

    assert!(report.couplings.is_empty());
    assert_eq!(report.summary.commits_read, 0);
}

#[test]
fn test_invalid_configuration_is_rejected_before_analysis() {
    let repo = sample_history();
    let result = CouplingAnalyzer::new(
        GitRepository::open(repo.path()).unwrap(),
        CouplingOptions {
            thresholds: CouplingThresholds {
                min_changes: 1,
                min_coupling_percent: 150.0,
            },
            ..CouplingOptions::default()
        },
    );
    assert!(matches!(
        result,
        Err(AnalyzerError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_user_exclude_patterns() {
    let repo = sample_history();
    let analyzer = HotspotAnalyzer::new(
        GitRepository::open(repo.path()).unwrap(),
        HotspotOptions {
            filter: FilterOptions {
                exclude_patterns: vec!["assets/".to_string(), "src/util.rs".to_string()],
                ..FilterOptions::default()
            },
            ..hotspot_options()
        },
    )
    .unwrap();

    let report = analyzer.analyze().unwrap();
    assert_eq!(report.summary.files_tracked, 1);
    assert!(report.excluded.is_empty());
}
