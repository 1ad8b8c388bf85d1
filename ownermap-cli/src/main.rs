use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ownermap::{parser, Owner, Rule, RuleSet};

#[derive(Parser)]
#[command(version, about = "Print the CODEOWNERS owners of files in a repository")]
struct Cli {
    /// Files or directories to resolve. Defaults to the whole repository.
    paths: Vec<PathBuf>,

    /// Repository root. Paths are matched relative to it.
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// CODEOWNERS file to use instead of searching the repository for one.
    #[arg(short = 'f', long = "file", env = "CODEOWNERS_FILE")]
    codeowners_file: Option<PathBuf>,

    /// List every rule that matches each path, not just the deciding one.
    #[arg(long)]
    all_matching_rules: bool,

    /// Only print paths that have no owners.
    #[arg(long)]
    unowned: bool,

    /// Check the CODEOWNERS file for syntax errors and exit.
    #[arg(long)]
    check: bool,

    /// Increase log verbosity. Overridden by RUST_LOG.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn codeowners_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.codeowners_file {
            return Ok(path.clone());
        }
        ownermap::find_codeowners_file(&self.root).ok_or_else(|| {
            anyhow!(
                "no CODEOWNERS file found (looked in {})",
                ownermap::CODEOWNERS_LOCATIONS.join(", ")
            )
        })
    }

    fn target_paths(&self) -> Vec<PathBuf> {
        if self.paths.is_empty() {
            vec![self.root.clone()]
        } else {
            self.paths.clone()
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let codeowners_path = cli.codeowners_path()?;
    if cli.check {
        return check(&codeowners_path);
    }

    let ruleset = ownermap::from_path(&codeowners_path)
        .with_context(|| format!("loading {}", codeowners_path.display()))?;

    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("resolving repository root {}", cli.root.display()))?;

    let mut files = Vec::new();
    for target in cli.target_paths() {
        if !target.exists() {
            eprintln!("error: path does not exist: {}", target.display());
            continue;
        }
        let relative = match repo_relative(&root, &target) {
            Ok(relative) => relative,
            Err(err) => {
                eprintln!("error: {:#}", err);
                continue;
            }
        };

        if target.is_dir() {
            let paths = walk_files(&target, &relative).collect::<Vec<_>>();
            tracing::debug!(dir = %target.display(), files = paths.len(), "walked directory");
            let matches = ruleset.all_matching_rules_for_paths(paths.as_slice());
            for path in &paths {
                let rules = matches.get(path).map(Vec::as_slice).unwrap_or_default();
                print_path(&cli, path, rules);
            }
        } else {
            files.push(relative);
        }
    }

    for (path, rules) in resolve_files(&ruleset, &files) {
        print_path(&cli, &path, &rules);
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("ownermap={level},ownermap_cli={level}")))
        .context("creating log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn check(codeowners_path: &Path) -> Result<ExitCode> {
    let source = fs::read_to_string(codeowners_path)
        .with_context(|| format!("reading {}", codeowners_path.display()))?;
    let result = parser::parse(&source);
    for error in &result.errors {
        let (line, col) = error.span.line_col(&source);
        println!(
            "{}:{}:{}: {}",
            codeowners_path.display(),
            line,
            col,
            error.message
        );
    }
    tracing::info!(
        rules = result.rules.len(),
        errors = result.errors.len(),
        "checked {}",
        codeowners_path.display()
    );

    if result.is_ok() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

// Resolve explicitly named files. These don't share a walk, so each is matched
// on its own, in parallel when the `rayon` feature is enabled.
#[cfg(feature = "rayon")]
fn resolve_files<'a>(ruleset: &'a RuleSet, files: &[String]) -> Vec<(String, Vec<(usize, &'a Rule)>)> {
    use rayon::prelude::*;

    files
        .par_iter()
        .map(|path| (path.clone(), ruleset.all_matching_rules(path)))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn resolve_files<'a>(ruleset: &'a RuleSet, files: &[String]) -> Vec<(String, Vec<(usize, &'a Rule)>)> {
    files
        .iter()
        .map(|path| (path.clone(), ruleset.all_matching_rules(path)))
        .collect()
}

fn print_path(cli: &Cli, path: &str, rules: &[(usize, &Rule)]) {
    let owners = rules
        .last()
        .map(|(_, rule)| rule.owners.as_slice())
        .filter(|owners| !owners.is_empty());
    if cli.unowned && owners.is_some() {
        return;
    }

    println!("{}", format_owners_line(path, owners));
    if cli.all_matching_rules {
        for (idx, rule) in rules {
            println!("{}", format_rule_line(*idx, rule));
        }
    }
}

fn format_owners_line(path: &str, owners: Option<&[Owner]>) -> String {
    match owners {
        Some(owners) => format!("{:<70}  {}", path, join_owners(owners)),
        None => format!("{:<70}  (unowned)", path),
    }
}

fn format_rule_line(idx: usize, rule: &Rule) -> String {
    let owners = if rule.owners.is_empty() {
        "(unowned)".to_owned()
    } else {
        join_owners(&rule.owners)
    };
    format!("  rule {:>3}: {:<40}  {}", idx + 1, rule.pattern, owners)
}

fn join_owners(owners: &[Owner]) -> String {
    owners
        .iter()
        .map(|o| o.value.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// The path of `target` inside the repository at `root`, which must already be
// canonical. Works for absolute paths and paths through `..` alike.
fn repo_relative(root: &Path, target: &Path) -> Result<String> {
    let absolute = target
        .canonicalize()
        .with_context(|| format!("resolving {}", target.display()))?;
    let relative = absolute.strip_prefix(root).map_err(|_| {
        anyhow!(
            "{} is outside the repository at {}",
            target.display(),
            root.display()
        )
    })?;
    Ok(slash_path(relative))
}

// CODEOWNERS paths always use `/`, whatever the platform.
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// Files below `dir`, named by their repository path. `prefix` is the
// repository path of `dir` itself, empty for the root.
fn walk_files<'a>(dir: &'a Path, prefix: &'a str) -> impl Iterator<Item = String> + 'a {
    walkdir::WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(move |entry| {
            let below = slash_path(entry.path().strip_prefix(dir).ok()?);
            Some(if prefix.is_empty() {
                below
            } else {
                format!("{}/{}", prefix, below)
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, owners: &[&str]) -> Rule {
        Rule::new(
            pattern,
            owners.iter().map(|o| Owner::try_from(*o).unwrap()),
        )
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "ownermap",
            "-f",
            "custom/CODEOWNERS",
            "--all-matching-rules",
            "-vv",
            "docs",
        ])
        .unwrap();
        assert_eq!(cli.codeowners_path().unwrap(), PathBuf::from("custom/CODEOWNERS"));
        assert_eq!(cli.target_paths(), vec![PathBuf::from("docs")]);
        assert_eq!(cli.root, PathBuf::from("."));

        let cli = Cli::try_parse_from(["ownermap", "--root", "../repo"]).unwrap();
        assert_eq!(cli.target_paths(), vec![PathBuf::from("../repo")]);
        assert!(cli.all_matching_rules);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_owners_line() {
        let owners = [
            Owner::try_from("@medubelko").unwrap(),
            Owner::try_from("@lengau").unwrap(),
        ];
        let line = format_owners_line("docs/readme.md", Some(&owners));
        assert!(line.starts_with("docs/readme.md "));
        assert!(line.ends_with("  @medubelko @lengau"));
        assert_eq!(line.len(), 70 + 2 + "@medubelko @lengau".len());

        assert!(format_owners_line("setup.cfg", None).ends_with("  (unowned)"));
    }

    #[test]
    fn test_rule_line() {
        assert!(format_rule_line(4, &rule("/craft_platforms/rock", &["@tigarmo"]))
            .starts_with("  rule   5: /craft_platforms/rock"));
        assert!(format_rule_line(0, &rule("/vendor/", &[])).ends_with("(unowned)"));
    }

    #[test]
    fn test_repo_relative() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        fs::create_dir_all(root.join("docs/howto")).unwrap();
        fs::write(root.join("docs/howto/build.md"), "").unwrap();
        fs::write(dir.path().join("outside.md"), "").unwrap();
        let root = root.canonicalize().unwrap();

        let absolute = root.join("docs/howto/build.md");
        assert_eq!(repo_relative(&root, &absolute).unwrap(), "docs/howto/build.md");

        let dotted = root.join("docs/howto/../howto/build.md");
        assert_eq!(repo_relative(&root, &dotted).unwrap(), "docs/howto/build.md");

        assert_eq!(repo_relative(&root, &root.join("docs")).unwrap(), "docs");
        assert_eq!(repo_relative(&root, &root).unwrap(), "");

        let err = repo_relative(&root, &root.join("../outside.md")).unwrap_err();
        assert!(err.to_string().contains("is outside the repository"));
        assert!(repo_relative(&root, &root.join("missing.md")).is_err());
    }

    #[test]
    fn test_walk_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        fs::create_dir_all(dir.path().join("docs/howto")).unwrap();
        fs::write(dir.path().join(".git/objects/pack"), "").unwrap();
        fs::write(dir.path().join("docs/howto/build.md"), "").unwrap();

        assert_eq!(
            walk_files(dir.path(), "").collect::<Vec<_>>(),
            vec!["docs/howto/build.md".to_owned()]
        );
        assert_eq!(
            walk_files(&dir.path().join("docs"), "docs").collect::<Vec<_>>(),
            vec!["docs/howto/build.md".to_owned()]
        );
    }

    #[test]
    fn test_resolve_files() {
        let ruleset = RuleSet::new(vec![
            rule("*", &["@lengau"]),
            rule("/craft_platforms/rock", &["@tigarmo"]),
        ]);
        let files = vec!["craft_platforms/rock/bar.py".to_owned(), "tox.ini".to_owned()];
        let resolved = resolve_files(&ruleset, &files);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].0, "craft_platforms/rock/bar.py");
        assert_eq!(resolved[0].1.last().map(|(idx, _)| *idx), Some(1));
        assert_eq!(resolved[1].1.len(), 1);
    }
}
