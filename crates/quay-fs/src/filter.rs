// Per-worktree path classification: git-internal paths, gitignored paths,
// and everything else (projected). Gitignore rules are compiled to regexes
// once and re-applied per path.

use std::path::Path;

use log::debug;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Interesting to consumers; carried in `FilesChanged.paths`.
    Projected,
    /// Lives under a `.git` directory; suppressed but counted, and flagged
    /// on the changeset so git consumers still learn something happened.
    GitInternal,
    /// Matched by the worktree's `.gitignore`; suppressed and counted.
    IgnoredByPolicy,
}

#[derive(Debug)]
struct Rule {
    negated: bool,
    regex: Regex,
}

/// Compiled `.gitignore` subset for one worktree root.
///
/// Supported semantics: `!` negation, leading-`/` anchoring (and implicit
/// anchoring for patterns containing `/`), trailing-`/` directory rules,
/// `*` / `**` / `?` globs, `#` comments, blank lines. Rules apply in file
/// order and the last match wins.
#[derive(Debug, Default)]
pub struct PathFilter {
    rules: Vec<Rule>,
}

impl PathFilter {
    /// Read `<root>/.gitignore`. A missing or unreadable file yields an
    /// empty filter; unreadable ignore rules never block projection.
    pub fn load(root: &Path) -> Self {
        match std::fs::read_to_string(root.join(".gitignore")) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut rules = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match compile_rule(line) {
                Some(rule) => rules.push(rule),
                None => debug!("skipping unparsable gitignore pattern {line:?}"),
            }
        }
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn classify(&self, rel_path: &str) -> PathClass {
        let path = normalize(rel_path);
        if path.is_empty() || path == "." {
            return PathClass::Projected;
        }
        if path.split('/').any(|component| component == ".git") {
            return PathClass::GitInternal;
        }

        // Sequential application, last matching rule wins.
        let mut ignored = false;
        for rule in &self.rules {
            if rule.regex.is_match(&path) {
                ignored = !rule.negated;
            }
        }
        if ignored {
            PathClass::IgnoredByPolicy
        } else {
            PathClass::Projected
        }
    }
}

/// Trim whitespace, then leading `./` and `/`.
fn normalize(raw: &str) -> String {
    let mut path = raw.trim();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.trim_start_matches('/').to_string()
}

fn compile_rule(line: &str) -> Option<Rule> {
    let mut pattern = line;

    let negated = pattern.starts_with('!');
    if negated {
        pattern = &pattern[1..];
    }

    // Trailing slash marks a directory rule: it matches the directory path
    // itself and anything beneath it. Since classification only ever sees
    // paths, that is also what a plain name rule matches, so the two forms
    // compile identically once the slash is stripped.
    let pattern = pattern.strip_suffix('/').unwrap_or(pattern);

    // A leading slash, or any slash inside the pattern, anchors it to the
    // worktree root. Bare patterns match at any depth.
    let anchored = pattern.starts_with('/') || pattern.contains('/');
    let pattern = pattern.strip_prefix('/').unwrap_or(pattern);
    if pattern.is_empty() {
        return None;
    }

    let body = glob_to_regex(pattern);
    let full = if anchored {
        format!("^{body}(?:/.*)?$")
    } else {
        format!("^(?:.*/)?{body}(?:/.*)?$")
    };
    let regex = Regex::new(&full).ok()?;
    Some(Rule { negated, regex })
}

/// Translate one gitignore glob into a regex body. `**` crosses directory
/// boundaries, `*` and `?` do not.
fn glob_to_regex(pattern: &str) -> String {
    let mut body = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // Collapse "**/" so "a/**/b" also matches "a/b".
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        body.push_str("(?:.*/)?");
                    } else {
                        body.push_str(".*");
                    }
                } else {
                    body.push_str("[^/]*");
                }
            }
            '?' => body.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                body.push('\\');
                body.push(ch);
            }
            _ => body.push(ch),
        }
    }
    body
}
