use crate::cmd_diff::{format_change, policy};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use dbus_api::ParseError;
use dbus_deviation_git::{
    CheckReport, CheckRequest, DistReport, FileReport, GitBackend, GitLocation, HelperConfig,
    InstallReport, ListEntry, PushOutcome, check_at, dist, install, list,
};
use std::path::PathBuf;
use tracing::debug;

#[derive(Args, Debug)]
pub struct GitArgs {
    /// Silence all non-error output
    #[arg(long)]
    pub silent: bool,

    /// Path to the git directory in the project checkout
    #[arg(long, value_name = "PATH")]
    pub git_dir: Option<PathBuf>,

    /// Path to the git work tree for the project
    #[arg(long, value_name = "PATH")]
    pub git_work_tree: Option<PathBuf>,

    /// git remote to push notes to and fetch them from
    #[arg(long, value_name = "REMOTE", default_value = "origin")]
    pub git_remote: String,

    /// Path beneath refs/ where the notes are stored
    #[arg(long, value_name = "REF-PATH", default_value = "notes/dbus/api")]
    pub git_refs: String,

    /// Print the push command instead of pushing the notes
    #[arg(long)]
    pub no_push: bool,
}

impl GitArgs {
    fn location(&self) -> GitLocation {
        GitLocation {
            git_dir: self.git_dir.clone(),
            work_tree: self.git_work_tree.clone(),
        }
    }

    fn config(&self) -> HelperConfig {
        HelperConfig {
            namespace: self.git_refs.clone(),
            remote: self.git_remote.clone(),
            push: !self.no_push,
        }
    }

    fn open(&self) -> Result<GitBackend> {
        debug!(git_dir = ?self.git_dir, work_tree = ?self.git_work_tree, "opening repository");
        GitBackend::open(&self.location()).context("Failed to open git repository")
    }
}

#[derive(Subcommand, Debug)]
pub enum VcsOp {
    /// Record snapshots of API files for every release tag that lacks one
    Install {
        /// D-Bus API XML files, as paths in the repository
        #[arg(required = true, value_name = "API-FILE")]
        files: Vec<String>,
    },
    /// Record snapshots of API files for the latest release tag
    Dist {
        /// D-Bus API XML files, as paths in the repository
        #[arg(required = true, value_name = "API-FILE")]
        files: Vec<String>,

        /// Skip files that already have a snapshot rather than failing
        #[arg(long)]
        ignore_existing: bool,
    },
    /// Compare API snapshots between two refs
    Check {
        /// Old ref to compare; defaults to the latest release tag
        #[arg(value_name = "OLD-REF")]
        old_ref: Option<String>,

        /// New ref to compare; defaults to the work tree
        #[arg(value_name = "NEW-REF")]
        new_ref: Option<String>,

        /// Categories and change codes to report
        #[arg(long, value_name = "CATEGORY,…", default_value = "all")]
        diff_warnings: String,

        /// Categories and change codes never to report
        #[arg(long, value_name = "CATEGORY,…", default_value = "")]
        diff_no_warnings: String,

        /// Categories and change codes that fail the check (all if no value
        /// is given)
        #[arg(
            long,
            value_name = "CATEGORY,…",
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "all"
        )]
        fatal_warnings: Option<String>,

        /// Also check this file when it has no snapshot yet
        #[arg(long = "file", value_name = "API-FILE")]
        files: Vec<String>,
    },
    /// Show which release tags have snapshots
    List {
        /// Limit to these files; defaults to every file with a snapshot
        #[arg(value_name = "API-FILE")]
        files: Vec<String>,
    },
}

pub fn run(git: GitArgs, op: VcsOp) -> Result<bool> {
    match op {
        VcsOp::Install { files } => run_install(&git, &files),
        VcsOp::Dist {
            files,
            ignore_existing,
        } => run_dist(&git, &files, ignore_existing),
        VcsOp::Check {
            old_ref,
            new_ref,
            diff_warnings,
            diff_no_warnings,
            fatal_warnings,
            files,
        } => {
            let request = CheckRequest {
                old_ref,
                new_ref,
                files,
                policy: policy(&diff_warnings, &diff_no_warnings, fatal_warnings.as_deref())?,
            };
            run_check(&git, &request)
        }
        VcsOp::List { files } => run_list(&git, &files),
    }
}

fn print_push(push: Option<&PushOutcome>) {
    if let Some(PushOutcome::Skipped { command }) = push {
        println!("Run this command to push the API signature database:");
        println!("   {}", command);
    }
}

fn install_lines(report: &InstallReport) -> Vec<String> {
    let mut lines: Vec<String> = report.added.iter().map(ToString::to_string).collect();
    lines.extend(
        report
            .unchanged
            .iter()
            .map(|tag| format!("{}: Nothing to do", tag)),
    );
    lines
}

fn run_install(git: &GitArgs, files: &[String]) -> Result<bool> {
    let mut backend = git.open()?;
    let report = install(&mut backend, &git.config(), files)
        .context("Failed to install API signatures")?;
    if !git.silent {
        for line in install_lines(&report) {
            println!("{}", line);
        }
    }
    print_push(report.push.as_ref());
    Ok(true)
}

fn dist_lines(report: &DistReport) -> Vec<String> {
    let mut lines: Vec<String> = report.added.iter().map(ToString::to_string).collect();
    lines.extend(report.ignored.iter().map(|file| {
        format!(
            "{}: Ignored XML file ‘{}’; already has a note",
            report.tag, file
        )
    }));
    lines
}

fn run_dist(git: &GitArgs, files: &[String], ignore_existing: bool) -> Result<bool> {
    let mut backend = git.open()?;
    let report = dist(&mut backend, &git.config(), files, ignore_existing)
        .context("Failed to store API signatures")?;
    if !git.silent {
        for line in dist_lines(&report) {
            println!("{}", line);
        }
    }
    print_push(report.push.as_ref());
    Ok(true)
}

fn print_file(file: &FileReport, old_ref: &str, silent: bool) {
    if silent {
        println!(" DIFF      {}", file.file);
    } else {
        println!("Comparing {}", file.file);
        if file.old_missing {
            println!(
                "{}: No API signature stored for ‘{}’; comparing against an empty API",
                file.file, old_ref
            );
        }
    }
    match &file.result {
        Ok(outcome) => {
            for change in &outcome.changes {
                println!("{}", format_change(&file.file, change));
            }
        }
        Err(failure) => {
            if let ParseError::Structural { diagnostics } = &failure.error {
                for diagnostic in diagnostics {
                    eprintln!("{}", diagnostic);
                }
            }
            eprintln!(
                "error: Failed to parse {} API of ‘{}’: {}",
                failure.side, file.file, failure.error
            );
        }
    }
}

fn print_check(report: &CheckReport, silent: bool) {
    if report.skipped {
        eprintln!("Could not find git repository. Skipping.");
        return;
    }
    let Some(old_ref) = &report.old_ref else {
        if !silent {
            println!("No release tags; nothing to compare against.");
        }
        return;
    };
    for file in &report.files {
        print_file(file, old_ref, silent);
    }
}

fn run_check(git: &GitArgs, request: &CheckRequest) -> Result<bool> {
    let report =
        check_at(&git.location(), &git.config(), request).context("Failed to check API")?;
    print_check(&report, git.silent);
    let failed = report.files.iter().filter(|f| !f.passed()).count();
    debug!(files = report.files.len(), failed, "API check finished");
    Ok(report.passed())
}

fn list_line(entry: &ListEntry) -> String {
    let date = entry
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    let note = entry.note.as_deref().unwrap_or("-");
    format!("{}\t{}\t{}\t{}", entry.tag, date, entry.file, note)
}

fn run_list(git: &GitArgs, files: &[String]) -> Result<bool> {
    let backend = git.open()?;
    let entries = list(&backend, &git.config(), files).context("Failed to list API signatures")?;
    for entry in &entries {
        println!("{}", list_line(entry));
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use dbus_deviation_git::Snapshot;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        git: GitArgs,
        #[command(subcommand)]
        op: VcsOp,
    }

    fn parse(args: &[&str]) -> TestCli {
        TestCli::try_parse_from(std::iter::once("vcs").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_git_args_defaults() {
        let cli = parse(&["install", "api.xml"]);
        assert_eq!(cli.git.config(), HelperConfig::default());
        assert!(cli.git.location().git_dir.is_none());
    }

    #[test]
    fn test_git_args_overrides() {
        let cli = parse(&[
            "--git-dir",
            "/tmp/repo.git",
            "--git-refs",
            "notes/api",
            "--git-remote",
            "upstream",
            "--no-push",
            "dist",
            "api.xml",
            "--ignore-existing",
        ]);
        let config = cli.git.config();
        assert_eq!(config.namespace, "notes/api");
        assert_eq!(config.remote, "upstream");
        assert!(!config.push);
        assert_eq!(
            cli.git.location().git_dir,
            Some(PathBuf::from("/tmp/repo.git"))
        );
        assert!(matches!(cli.op, VcsOp::Dist { ignore_existing: true, .. }));
    }

    #[test]
    fn test_check_arguments() {
        let cli = parse(&["check", "v1", "--fatal-warnings", "--file", "a.xml"]);
        match cli.op {
            VcsOp::Check {
                old_ref,
                new_ref,
                fatal_warnings,
                files,
                ..
            } => {
                assert_eq!(old_ref.as_deref(), Some("v1"));
                assert!(new_ref.is_none());
                assert_eq!(fatal_warnings.as_deref(), Some("all"));
                assert_eq!(files, vec!["a.xml"]);
            }
            other => panic!("unexpected {:?}", other),
        }

        let cli = parse(&["check", "--fatal-warnings=info", "v1", "v2"]);
        assert!(matches!(
            cli.op,
            VcsOp::Check { fatal_warnings: Some(ref f), new_ref: Some(_), .. } if f == "info"
        ));
    }

    #[test]
    fn test_install_requires_files() {
        assert!(TestCli::try_parse_from(["vcs", "install"]).is_err());
    }

    #[test]
    fn test_report_lines() {
        let report = InstallReport {
            added: vec![Snapshot {
                tag: "v1".to_string(),
                file: "api.xml".to_string(),
                notes_ref: "refs/notes/dbus/api/api.xml".to_string(),
                note: "abc123".to_string(),
            }],
            unchanged: vec!["v0".to_string()],
            push: None,
        };
        assert_eq!(
            install_lines(&report),
            vec![
                "v1: Added note ‘abc123’ for XML file ‘api.xml’",
                "v0: Nothing to do"
            ]
        );

        let report = DistReport {
            tag: "v2".to_string(),
            added: Vec::new(),
            ignored: vec!["api.xml".to_string()],
            push: None,
        };
        assert_eq!(
            dist_lines(&report),
            vec!["v2: Ignored XML file ‘api.xml’; already has a note"]
        );
    }

    #[test]
    fn test_list_line() {
        let entry = ListEntry {
            tag: "v1".to_string(),
            date: None,
            file: "api.xml".to_string(),
            note: None,
        };
        assert_eq!(list_line(&entry), "v1\t-\tapi.xml\t-");
    }
}
