use crate::cmd_parse::{display_name, parse_file, to_json};
use anyhow::{Context, Result};
use clap::Args;
use dbus_deviation::{Change, ChangeKind, CheckPolicy, WarningFilter, check, parse_list};
use std::path::PathBuf;
use tracing::debug;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Old interface XML file
    pub old_file: PathBuf,

    /// New interface XML file
    pub new_file: PathBuf,

    /// Categories and change codes to report
    #[arg(long, value_name = "CATEGORY,…", default_value = "all")]
    pub warnings: String,

    /// Categories and change codes never to report
    #[arg(long, value_name = "CATEGORY,…", default_value = "")]
    pub no_warnings: String,

    /// Categories and change codes that fail the comparison (all if no value
    /// is given; backwards-compatibility if the flag is absent)
    #[arg(
        long,
        value_name = "CATEGORY,…",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "all"
    )]
    pub fatal_warnings: Option<String>,

    /// Name to show for both files in the output
    #[arg(long)]
    pub file_display_name: Option<String>,

    /// Print the changes as JSON
    #[arg(long)]
    pub json: bool,
}

/// Build a policy from comma-separated `--warnings`, `--no-warnings` and
/// `--fatal-warnings` lists.
pub(crate) fn policy(enabled: &str, disabled: &str, fatal: Option<&str>) -> Result<CheckPolicy> {
    let mut policy = CheckPolicy {
        filter: WarningFilter::parse(enabled, disabled).context("Invalid warning list")?,
        ..Default::default()
    };
    if let Some(fatal) = fatal {
        policy.fatal = parse_list(fatal).context("Invalid fatal warning list")?;
    }
    Ok(policy)
}

/// `file:line: category (code): message`
pub(crate) fn format_change(file: &str, change: &Change) -> String {
    format!("{}:{}: {}", file, change.location.line, change)
}

pub fn run(args: DiffArgs, pretty: bool) -> Result<bool> {
    let policy = policy(&args.warnings, &args.no_warnings, args.fatal_warnings.as_deref())?;
    let old_name = args
        .file_display_name
        .clone()
        .or_else(|| display_name(&args.old_file));
    let new_name = args
        .file_display_name
        .clone()
        .or_else(|| display_name(&args.new_file));

    let old = parse_file(&args.old_file, old_name.clone())?;
    let new = parse_file(&args.new_file, new_name.clone())?;
    let outcome = check(&old.root, &new.root, &policy);
    debug!(
        changes = outcome.changes.len(),
        passed = outcome.passed,
        "compared"
    );

    if args.json {
        println!("{}", to_json(&outcome, pretty)?);
    } else {
        let old_name = old_name.unwrap_or_else(|| "<stdin>".to_string());
        let new_name = new_name.unwrap_or_else(|| "<stdin>".to_string());
        for change in &outcome.changes {
            let file = match change.kind {
                ChangeKind::Removed => &old_name,
                _ => &new_name,
            };
            println!("{}", format_change(file, change));
        }
    }
    Ok(outcome.passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbus_deviation::{ChangeCode, compare};

    fn parse(xml: &str) -> dbus_api::Node {
        dbus_api::parse_str(xml).unwrap().root
    }

    #[test]
    fn test_policy_defaults() {
        let policy = policy("all", "", None).unwrap();
        assert_eq!(policy, CheckPolicy::default());
    }

    #[test]
    fn test_policy_fatal_all() {
        let policy = policy("info", "", Some("all")).unwrap();
        assert_eq!(policy.fatal.len(), 3);
        assert_eq!(policy.filter.enabled.len(), 1);
    }

    #[test]
    fn test_policy_rejects_unknown_entries() {
        let err = policy("info,bogus", "", None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid warning list");
        assert!(policy("all", "", Some("nope")).is_err());
    }

    #[test]
    fn test_format_change() {
        let old = parse("<node><interface name='org.example.Foo'>\n<method name='Bar'/></interface></node>");
        let new = parse("<node><interface name='org.example.Foo'/></node>");
        let changes = compare(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].code, ChangeCode::MethodRemoved);
        let line = format_change("foo.xml", &changes[0]);
        assert!(line.starts_with("foo.xml:2: backwards-compatibility (method-removed): "));
    }
}
