// Parsing for `git status --porcelain=v1 --branch`.

use quay_core::StatusSummary;

/// Parse porcelain v1 output into a summary and the current branch name.
/// A detached HEAD yields `branch = None`.
pub fn parse_porcelain(output: &str) -> (StatusSummary, Option<String>) {
    let mut summary = StatusSummary::default();
    let mut branch = None;
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            branch = parse_branch_header(rest);
        } else if line.starts_with("??") {
            summary.untracked += 1;
        } else if line.len() >= 2 {
            let columns = line.as_bytes();
            if columns[0] != b' ' {
                summary.staged += 1;
            }
            if columns[1] != b' ' {
                summary.changed += 1;
            }
        }
    }
    (summary, branch)
}

/// `rest` is the header with `## ` already stripped, e.g.
/// `main...origin/main [ahead 1]`, `feature`, or `HEAD (no branch)`.
fn parse_branch_header(rest: &str) -> Option<String> {
    if rest.starts_with("HEAD") {
        return None;
    }
    let name = rest.split("...").next().unwrap_or(rest);
    let name = name.split(' ').next().unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_branch_with_upstream() {
        let (_, branch) = parse_porcelain("## main...origin/main [ahead 2]\n");
        assert_eq!(branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_parse_branch_without_upstream() {
        let (_, branch) = parse_porcelain("## feature/watch-roots\n");
        assert_eq!(branch.as_deref(), Some("feature/watch-roots"));
    }

    #[test]
    fn test_detached_head_is_no_branch() {
        let (_, branch) = parse_porcelain("## HEAD (no branch)\n M file.rs\n");
        assert_eq!(branch, None);
    }

    #[test]
    fn test_counts_staged_changed_untracked() {
        let output = "\
## main
M  staged_only.rs
 M changed_only.rs
MM both.rs
A  added.rs
?? new_file.rs
?? another_new.rs
";
        let (summary, _) = parse_porcelain(output);
        // Column 0 non-space: staged_only, both, added.
        assert_eq!(summary.staged, 3);
        // Column 1 non-space: changed_only, both.
        assert_eq!(summary.changed, 2);
        assert_eq!(summary.untracked, 2);
    }

    #[test]
    fn test_empty_output_is_clean() {
        let (summary, branch) = parse_porcelain("");
        assert_eq!(summary, StatusSummary::default());
        assert_eq!(branch, None);
    }

    #[test]
    fn test_rename_status_counts_as_staged() {
        let (summary, _) = parse_porcelain("## main\nR  old.rs -> new.rs\n");
        assert_eq!(summary.staged, 1);
        assert_eq!(summary.changed, 0);
    }
}
