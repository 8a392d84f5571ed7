use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::Document;

/// External collaborator that yields the raw documents of a corpus.
#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    /// All documents on the given branch whose file name carries one of
    /// the extensions (no leading dot, e.g. "rs", "md").
    async fn list_documents(&self, branch: &str, extensions: &[String]) -> Result<Vec<Document>>;
}

/// Split "https://github.com/{owner}/{repo}" into owner and repository
/// name, tolerating a `.git` suffix and trailing `#` or `/` noise.
pub fn parse_repo_url(url: &str) -> Result<(String, String)> {
    let trimmed = url.trim().trim_end_matches(['#', '/']);
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let rest = trimmed
        .strip_prefix("https://github.com/")
        .or_else(|| trimmed.strip_prefix("http://github.com/"))
        .ok_or_else(|| Error::Source(format!("not a GitHub repository URL: {url}")))?;

    match rest.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(Error::Source(format!("not a GitHub repository URL: {url}"))),
    }
}

/// Document source backed by the GitHub REST API.
///
/// Listing uses the recursive tree endpoint; file content comes from the
/// contents endpoint with the raw media type.
pub struct GithubSource {
    client: Client,
    api_url: String,
    token: String,
    owner: String,
    repo: String,
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: Option<String>,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GithubSource {
    pub fn new(api_url: String, token: String, owner: String, repo: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("repoqa/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url,
            token,
            owner,
            repo,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        if !self.token.is_empty() {
            request = request.header("Authorization", format!("token {}", self.token));
        }
        request
    }

    /// The repository's default branch; "main" when the API does not
    /// report one.
    pub async fn default_branch(&self) -> Result<String> {
        let url = format!("{}/repos/{}/{}", self.api_url, self.owner, self.repo);
        let response = self.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Source(format!(
                "GitHub returned {} for {}/{}",
                response.status(),
                self.owner,
                self.repo
            )));
        }

        let info: RepoInfo = response.json().await?;
        Ok(info.default_branch.unwrap_or_else(|| "main".to_string()))
    }

    async fn fetch_file(&self, branch: &str, path: &str) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            self.api_url, self.owner, self.repo, path, branch
        );
        let response = self
            .get(&url)
            .header("Accept", "application/vnd.github.raw")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Source(format!(
                "GitHub returned {} fetching {path}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl DocumentSource for GithubSource {
    async fn list_documents(&self, branch: &str, extensions: &[String]) -> Result<Vec<Document>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_url, self.owner, self.repo, branch
        );
        let response = self.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Source(format!(
                "GitHub returned {} listing branch {branch} of {}/{}",
                response.status(),
                self.owner,
                self.repo
            )));
        }

        let listing: TreeResponse = response.json().await?;
        if listing.truncated {
            warn!(
                "tree listing for {}/{} is truncated; some files will be skipped",
                self.owner, self.repo
            );
        }

        let mut documents = Vec::new();
        // One file at a time; the GitHub rate limit punishes fan-out.
        for entry in listing.tree.iter().filter(|e| e.kind == "blob") {
            if !matches_extension(&entry.path, extensions) {
                continue;
            }
            debug!("fetching {}", entry.path);
            let content = self.fetch_file(branch, &entry.path).await?;
            documents.push(
                Document::new(entry.path.clone(), content)
                    .with_metadata("path", entry.path.clone())
                    .with_metadata("branch", branch.to_string()),
            );
        }

        info!(
            "loaded {} documents from {}/{}@{}",
            documents.len(),
            self.owner,
            self.repo,
            branch
        );
        Ok(documents)
    }
}

fn matches_extension(path: &str, extensions: &[String]) -> bool {
    match path.rsplit_once('.') {
        Some((_, ext)) => extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_url() {
        let (owner, repo) = parse_repo_url("https://github.com/rust-lang/cargo").unwrap();
        assert_eq!(owner, "rust-lang");
        assert_eq!(repo, "cargo");
    }

    #[test]
    fn test_parse_strips_git_suffix_and_trailing_noise() {
        let (owner, repo) = parse_repo_url("https://github.com/rust-lang/cargo.git").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("rust-lang", "cargo"));

        let (owner, repo) = parse_repo_url("https://github.com/rust-lang/cargo/#").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("rust-lang", "cargo"));
    }

    #[test]
    fn test_parse_rejects_non_github_urls() {
        for url in [
            "https://gitlab.com/owner/repo",
            "https://github.com/owner",
            "https://github.com//repo",
            "not a url",
        ] {
            assert!(
                matches!(parse_repo_url(url), Err(Error::Source(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_extension_filter() {
        let extensions = vec!["rs".to_string(), "md".to_string()];
        assert!(matches_extension("src/lib.rs", &extensions));
        assert!(matches_extension("README.md", &extensions));
        assert!(matches_extension("docs/GUIDE.MD", &extensions));
        assert!(!matches_extension("image.png", &extensions));
        assert!(!matches_extension("Makefile", &extensions));
    }
}
