//! Issue host: the issue tracker plus the git remote a fix is pushed to.
//!
//! The pipeline only sees [`IssueHost`]. [`GhCliHost`] shells out to the
//! `gh` and `git` binaries with argument vectors (never through a shell).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{bail, Context, Result};
use coordination::shell_safety::{validate_arg, validate_branch_name};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Longest stderr excerpt carried into an error.
const MAX_STDERR: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Issue {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Tracker and VCS operations the pipeline needs.
///
/// Comment ids are positive; `0` means "no comment".
#[cfg_attr(test, mockall::automock)]
pub trait IssueHost: Send + Sync {
    fn read_issue(&self, issue: u64) -> Result<Issue>;

    /// Post a new comment and return its id.
    fn post_comment(&self, issue: u64, body: &str) -> Result<u64>;

    /// Edit a comment in place without notifying watchers.
    /// Returns `false` when `comment_id` is 0 or the edit was refused.
    fn update_comment(&self, comment_id: u64, body: &str) -> Result<bool>;

    /// Edit `comment_id` if possible, otherwise post. Returns the comment id.
    fn silent_update(&self, issue: u64, comment_id: u64, body: &str) -> Result<u64> {
        if comment_id > 0 && self.update_comment(comment_id, body)? {
            return Ok(comment_id);
        }
        self.post_comment(issue, body)
    }

    fn add_reaction(&self, comment_id: u64, reaction: &str) -> Result<bool>;

    /// Fresh branch from the base branch, replacing any stale one.
    fn create_branch(&self, name: &str) -> Result<()>;

    fn commit_and_push(&self, branch: &str, message: &str) -> Result<()>;

    /// Open a pull request and return its URL.
    fn create_pull_request(&self, branch: &str, issue: u64, title: &str, body: &str)
        -> Result<String>;
}

// ---------------------------------------------------------------------------
// gh / git implementation
// ---------------------------------------------------------------------------

/// [`IssueHost`] backed by the GitHub CLI and local git.
pub struct GhCliHost {
    repo: String,
    root: PathBuf,
    base_branch: String,
}

impl GhCliHost {
    /// `repo` is `owner/name`; `root` is the git checkout fixes are made in.
    pub fn new(repo: &str, root: impl AsRef<Path>) -> Result<Self> {
        validate_arg(repo).context("Invalid repository name")?;
        Ok(Self {
            repo: repo.to_string(),
            root: root.as_ref().to_path_buf(),
            base_branch: "main".to_string(),
        })
    }

    pub fn with_base_branch(mut self, branch: &str) -> Result<Self> {
        validate_branch_name(branch).context("Invalid base branch")?;
        self.base_branch = branch.to_string();
        Ok(self)
    }

    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<Output> {
        debug!(program, args = ?args, "Running command");
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to run `{program}`. Is it installed?"))?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .with_context(|| format!("Failed to write stdin of `{program}`"))?;
        }
        child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for `{program}`"))
    }

    /// Run and fail on a non-zero exit.
    fn run_checked(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<Output> {
        let output = self.run(program, args, stdin)?;
        if !output.status.success() {
            bail!(
                "{program} {} failed: {}",
                args.first().copied().unwrap_or(""),
                stderr_excerpt(&output)
            );
        }
        Ok(output)
    }

    /// Best effort; a failure is logged and ignored.
    fn run_quiet(&self, program: &str, args: &[&str]) {
        match self.run(program, args, None) {
            Ok(output) if !output.status.success() => {
                debug!(program, args = ?args, stderr = %stderr_excerpt(&output), "Ignored command failure");
            }
            Err(e) => debug!(program, error = %e, "Ignored command failure"),
            Ok(_) => {}
        }
    }

    fn gh_api(&self, endpoint: &str, method: &str, body: &serde_json::Value) -> Result<Output> {
        let input = body.to_string();
        self.run("gh", &["api", endpoint, "-X", method, "--input", "-"], Some(&input))
    }
}

fn stderr_excerpt(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .trim()
        .chars()
        .take(MAX_STDERR)
        .collect()
}

#[derive(Deserialize)]
struct Created {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl IssueHost for GhCliHost {
    fn read_issue(&self, issue: u64) -> Result<Issue> {
        let number = issue.to_string();
        let output = self.run_checked(
            "gh",
            &["issue", "view", &number, "--repo", &self.repo, "--json", "title,body"],
            None,
        )?;
        serde_json::from_slice(&output.stdout).context("Failed to parse gh issue view output")
    }

    fn post_comment(&self, issue: u64, body: &str) -> Result<u64> {
        let endpoint = format!("repos/{}/issues/{issue}/comments", self.repo);
        let output = self.gh_api(&endpoint, "POST", &json!({ "body": body }))?;
        if !output.status.success() {
            bail!("gh api post comment failed: {}", stderr_excerpt(&output));
        }
        let created: Created =
            serde_json::from_slice(&output.stdout).context("Failed to parse comment response")?;
        info!(issue, comment = created.id, "Comment posted");
        Ok(created.id)
    }

    fn update_comment(&self, comment_id: u64, body: &str) -> Result<bool> {
        if comment_id == 0 {
            return Ok(false);
        }
        let endpoint = format!("repos/{}/issues/comments/{comment_id}", self.repo);
        let output = self.gh_api(&endpoint, "PATCH", &json!({ "body": body }))?;
        if !output.status.success() {
            warn!(comment = comment_id, stderr = %stderr_excerpt(&output), "Comment update refused");
            return Ok(false);
        }
        debug!(comment = comment_id, "Comment updated");
        Ok(true)
    }

    fn add_reaction(&self, comment_id: u64, reaction: &str) -> Result<bool> {
        if comment_id == 0 {
            return Ok(false);
        }
        let endpoint = format!("repos/{}/issues/comments/{comment_id}/reactions", self.repo);
        let output = self.gh_api(&endpoint, "POST", &json!({ "content": reaction }))?;
        Ok(output.status.success())
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        validate_branch_name(name)?;
        self.run_quiet("git", &["push", "origin", "--delete", name]);
        self.run_quiet("git", &["branch", "-D", name]);
        self.run_checked("git", &["checkout", &self.base_branch], None)?;
        self.run_checked("git", &["clean", "-fd"], None)?;
        self.run_checked("git", &["checkout", "--", "."], None)?;
        self.run_checked("git", &["checkout", "-b", name], None)?;
        info!(branch = name, base = %self.base_branch, "Branch created");
        Ok(())
    }

    fn commit_and_push(&self, branch: &str, message: &str) -> Result<()> {
        validate_branch_name(branch)?;
        self.run_checked("git", &["add", "-A"], None)?;
        self.run_checked("git", &["commit", "-m", message], None)?;
        self.run_checked("git", &["push", "origin", branch], None)?;
        info!(branch, "Committed and pushed");
        Ok(())
    }

    fn create_pull_request(
        &self,
        branch: &str,
        issue: u64,
        title: &str,
        body: &str,
    ) -> Result<String> {
        validate_branch_name(branch)?;
        let endpoint = format!("repos/{}/pulls", self.repo);
        let payload = json!({
            "title": title,
            "body": body,
            "head": branch,
            "base": self.base_branch,
        });
        let output = self.gh_api(&endpoint, "POST", &payload)?;
        if !output.status.success() {
            bail!("gh api create pull request failed: {}", stderr_excerpt(&output));
        }
        let created: Created = serde_json::from_slice(&output.stdout)
            .context("Failed to parse pull request response")?;
        let url = created.html_url.or(created.url).unwrap_or_else(|| {
            format!(
                "https://github.com/{}/compare/{}...{branch}",
                self.repo, self.base_branch
            )
        });
        info!(issue, url = %url, "Pull request opened");
        Ok(url)
    }
}
