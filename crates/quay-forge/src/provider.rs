// GitHub forge provider: shell out to `gh pr list` and count open pull
// requests per head branch.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use quay_core::{ForgeError, ForgeStatusProvider, ProcessExecutor, ProcessSpec};
use serde::Deserialize;

const PR_LIST_TIMEOUT: Duration = Duration::from_secs(8);
const PR_LIST_LIMIT: u32 = 200;

/// Extract `owner/repo` from a GitHub remote URL. Handles the ssh scp form
/// (`git@github.com:owner/repo.git`), plain ssh, and https.
pub fn parse_github_slug(origin: &str) -> Option<String> {
    let origin = origin.trim().trim_end_matches('/');
    let origin = origin.strip_suffix(".git").unwrap_or(origin);

    let rest = if let Some(rest) = origin.strip_prefix("git@github.com:") {
        rest
    } else {
        let marker = "github.com/";
        let index = origin.find(marker)?;
        &origin[index + marker.len()..]
    };

    let mut segments = rest.split('/');
    let owner = segments.next()?;
    let repo = segments.next()?;
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(format!("{owner}/{repo}"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrHead {
    head_ref_name: String,
}

pub struct GithubCliForgeProvider {
    executor: Arc<dyn ProcessExecutor>,
    timeout: Duration,
}

impl GithubCliForgeProvider {
    pub fn new(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self {
            executor,
            timeout: PR_LIST_TIMEOUT,
        }
    }
}

#[async_trait]
impl ForgeStatusProvider for GithubCliForgeProvider {
    fn name(&self) -> &'static str {
        "github-cli"
    }

    async fn pull_request_counts(
        &self,
        origin: &str,
        branches: &BTreeSet<String>,
    ) -> Result<HashMap<String, u32>, ForgeError> {
        let slug = parse_github_slug(origin)
            .ok_or_else(|| ForgeError::UnsupportedOrigin(origin.to_string()))?;

        let spec = ProcessSpec::new("gh")
            .args(["pr", "list", "--repo", &slug])
            .args(["--state", "open"])
            .args(["--json", "headRefName"])
            .args(["--limit", &PR_LIST_LIMIT.to_string()])
            .env("GH_PROMPT_DISABLED", "1")
            .env("NO_COLOR", "1")
            .timeout(self.timeout);
        let output = self
            .executor
            .execute(spec)
            .await
            .map_err(|err| ForgeError::Command(err.to_string()))?;
        if !output.succeeded() {
            return Err(ForgeError::Command(format!(
                "gh pr list exited {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }

        let heads: Vec<PrHead> = serde_json::from_str(&output.stdout)
            .map_err(|err| ForgeError::Parse(err.to_string()))?;

        // Tracked branches with no open PR are reported as zero; PRs from
        // branches nobody tracks are ignored.
        let mut counts: HashMap<String, u32> =
            branches.iter().map(|branch| (branch.clone(), 0)).collect();
        for head in heads {
            if let Some(count) = counts.get_mut(&head.head_ref_name) {
                *count += 1;
            } else {
                debug!("ignoring PR for untracked branch {}", head.head_ref_name);
            }
        }
        Ok(counts)
    }
}
