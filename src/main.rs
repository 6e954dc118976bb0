use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use crimescene_analyzer::analyzer::{
    is_remote_url, load_ignore_file, CouplingThresholds, FilterOptions, Window,
};
use crimescene_analyzer::output::{self, Record};
use crimescene_analyzer::{
    Auth, CouplingAnalyzer, CouplingOptions, GitRepository, HotspotAnalyzer, HotspotOptions,
};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    version,
    about = "Analyzes Git history to find code hotspots and change coupling",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug). RUST_LOG overrides this
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank files by lines of code × revisions × authors
    Hotspots(HotspotArgs),
    /// Rank pairs of files that change in the same commits
    Coupling(CouplingArgs),
}

#[derive(Args)]
struct RepoArgs {
    /// Path or URL of the Git repository
    #[arg(short, long)]
    repo: String,

    /// Branch to analyze
    #[arg(short, long, default_value = "main")]
    branch: String,

    /// Authentication method used when cloning a URL
    #[arg(long, value_enum, default_value_t = AuthMethod::None)]
    auth: AuthMethod,

    /// Username for https or token authentication
    #[arg(long)]
    username: Option<String>,

    /// Private key for ssh authentication (ssh-agent is used when omitted)
    #[arg(long)]
    ssh_key: Option<PathBuf>,

    /// Personal access token for token authentication
    #[arg(long)]
    token: Option<String>,

    /// Skip merge commits
    #[arg(long)]
    no_merges: bool,
}

#[derive(Args)]
struct FilterArgs {
    /// File with ignore patterns, one glob per line
    #[arg(long)]
    ignore_file: Option<PathBuf>,

    /// Include only files matching these patterns (glob format, e.g., "*.rs", "src/**/*.py")
    #[arg(short = 'i', long = "include")]
    include_patterns: Vec<String>,

    /// Exclude files matching these patterns
    #[arg(short = 'e', long = "exclude")]
    exclude_patterns: Vec<String>,

    /// Do not exclude lock files, build directories and tool configuration by default
    #[arg(long)]
    no_default_excludes: bool,
}

#[derive(Args)]
struct OutputArgs {
    /// Number of top results to show (0 shows everything)
    #[arg(short = 'n', long, default_value_t = 20)]
    top: usize,

    /// Output format for stdout
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    format: Format,

    /// Write all ranked results to this file (JSON when it ends with .json, CSV otherwise)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct HotspotArgs {
    #[command(flatten)]
    repo: RepoArgs,

    #[command(flatten)]
    filter: FilterArgs,

    #[command(flatten)]
    output: OutputArgs,

    /// Time window in days (whole history when omitted)
    #[arg(short = 'w', long)]
    days: Option<u32>,

    /// Write every changed file, sorted by path, to this CSV file
    #[arg(long)]
    full_report: Option<PathBuf>,
}

#[derive(Args)]
struct CouplingArgs {
    #[command(flatten)]
    repo: RepoArgs,

    #[command(flatten)]
    filter: FilterArgs,

    #[command(flatten)]
    output: OutputArgs,

    /// Time window in days
    #[arg(short = 'w', long, default_value_t = 90)]
    days: u32,

    /// Minimum number of changes for both files of a pair
    #[arg(long, default_value_t = 3)]
    min_changes: u32,

    /// Minimum coupling percentage
    #[arg(short, long, default_value_t = 30.0)]
    threshold: f64,

    /// Skip commits touching more files than this (0 disables the cap)
    #[arg(long, default_value_t = 50)]
    max_files_per_commit: usize,

    /// Consider every file, not only source code extensions
    #[arg(long)]
    all_files: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Csv,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum AuthMethod {
    None,
    Ssh,
    Https,
    Token,
}

impl RepoArgs {
    fn auth(&self) -> anyhow::Result<Auth> {
        Ok(match self.auth {
            AuthMethod::None => Auth::None,
            AuthMethod::Ssh => Auth::Ssh {
                key: self.ssh_key.clone(),
            },
            AuthMethod::Https => Auth::Https {
                username: self.username.clone(),
            },
            AuthMethod::Token => Auth::Token {
                token: self
                    .token
                    .clone()
                    .context("--auth token requires --token")?,
                username: self.username.clone(),
            },
        })
    }

    /// ローカルパスならそのまま開き、URLなら一時ディレクトリにクローンします
    ///
    /// 返される`TempDir`は分析が終わるまで保持する必要があります。
    fn open(&self) -> anyhow::Result<(GitRepository, Option<TempDir>)> {
        if !is_remote_url(&self.repo) {
            let repo = GitRepository::open(&self.repo).context("Failed to open repository")?;
            return Ok((repo, None));
        }

        let dir = tempfile::Builder::new()
            .prefix("crimescene-")
            .tempdir()
            .context("Failed to create a directory for the clone")?;
        let repo = GitRepository::clone(&self.repo, &self.branch, &self.auth()?, dir.path())
            .context("Failed to clone repository")?;
        info!(path = %dir.path().display(), "repository cloned");
        Ok((repo, Some(dir)))
    }
}

impl FilterArgs {
    fn options(&self, source_only: bool) -> anyhow::Result<FilterOptions> {
        let mut exclude_patterns = Vec::new();

        if let Some(ref path) = self.ignore_file {
            if path.exists() {
                let patterns = load_ignore_file(path)
                    .with_context(|| format!("Failed to read ignore file {}", path.display()))?;
                info!(count = patterns.len(), file = %path.display(), "loaded ignore patterns");
                exclude_patterns.extend(patterns);
            } else {
                warn!(
                    "Ignore file {} not found, only default exclusions apply",
                    path.display()
                );
            }
        }

        exclude_patterns.extend(self.exclude_patterns.iter().cloned());

        Ok(FilterOptions {
            include_patterns: self.include_patterns.clone(),
            exclude_patterns,
            use_default_excludes: !self.no_default_excludes,
            source_only,
        })
    }
}

impl OutputArgs {
    fn emit<T: Record>(&self, title: &str, top: &[T], all: &[T]) -> anyhow::Result<()> {
        let stdout = std::io::stdout();
        let mut stdout = stdout.lock();

        match self.format {
            Format::Table => {
                if top.is_empty() {
                    writeln!(stdout, "No results found.")?;
                } else {
                    write!(stdout, "{}", output::render_table(title, top))?;
                }
            }
            Format::Csv => output::write_csv(&mut stdout, top).context("Failed to write CSV")?,
            Format::Json => {
                output::write_json(&mut stdout, top).context("Failed to serialize to JSON")?
            }
        }

        if let Some(ref path) = self.output {
            output::write_file(path, all)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(file = %path.display(), records = all.len(), "results saved");
        }
        Ok(())
    }
}

fn run_hotspots(args: HotspotArgs) -> anyhow::Result<()> {
    let options = HotspotOptions {
        branch: args.repo.branch.clone(),
        window: Window::from_days(args.days),
        top_n: args.output.top,
        include_merges: !args.repo.no_merges,
        filter: args.filter.options(false)?,
    };
    options.validate()?;

    let (repo, _clone_dir) = args.repo.open()?;
    let analyzer =
        HotspotAnalyzer::new(repo, options).context("Failed to initialize analyzer")?;
    let report = analyzer
        .analyze()
        .context("Failed to analyze repository")?;

    let title = format!("Top {} Hotspots:", report.top().len());
    args.output.emit(&title, report.top(), &report.hotspots)?;

    if let Some(ref path) = args.full_report {
        let inventory = report.inventory();
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        output::write_csv(std::io::BufWriter::new(file), &inventory)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(file = %path.display(), records = inventory.len(), "full report saved");
    }

    Ok(())
}

fn run_coupling(args: CouplingArgs) -> anyhow::Result<()> {
    let options = CouplingOptions {
        branch: args.repo.branch.clone(),
        window: Window::Days(args.days),
        top_n: args.output.top,
        include_merges: !args.repo.no_merges,
        thresholds: CouplingThresholds {
            min_changes: args.min_changes,
            min_coupling_percent: args.threshold,
        },
        max_files_per_commit: Some(args.max_files_per_commit).filter(|&cap| cap > 0),
        filter: args.filter.options(!args.all_files)?,
    };
    options.validate()?;

    let (repo, _clone_dir) = args.repo.open()?;
    let analyzer =
        CouplingAnalyzer::new(repo, options).context("Failed to initialize analyzer")?;
    let report = analyzer
        .analyze()
        .context("Failed to analyze repository")?;

    let title = format!("Top {} Change Coupling Results:", report.top().len());
    args.output.emit(&title, report.top(), &report.couplings)
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Hotspots(args) => run_hotspots(args),
        Command::Coupling(args) => run_coupling(args),
    }
}
