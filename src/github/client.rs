//! GitHub REST client that collects one repository's statistics.
//!
//! Traffic endpoints need a token with push access to the repository.
//! Rate limiting is handled here: a throttled request is retried after the
//! wait GitHub asks for, up to a configured number of times.

use crate::models::{RepoSnapshot, Target, TrafficPoint};
use crate::pipeline::Fetcher;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, LINK, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const JSON: &str = "application/vnd.github+json";
const STAR_JSON: &str = "application/vnd.github.star+json";
const API_VERSION: &str = "2022-11-28";

/// Wait used when a throttled response carries no hint.
const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(60);

/// Settings for the GitHub client.
#[derive(Debug, Clone)]
pub struct GithubSettings {
    /// API base URL, e.g. `https://api.github.com`.
    pub api_url: String,
    /// Token sent as a bearer credential.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout_seconds: u64,
    /// Retries for rate-limited requests.
    pub retries: usize,
    /// Longest single wait before a retry.
    pub max_retry_wait: Duration,
    /// Page size for list endpoints.
    pub per_page: usize,
    /// Upper bound on pages fetched per list endpoint.
    pub max_pages: usize,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token: None,
            timeout_seconds: 30,
            retries: 3,
            max_retry_wait: Duration::from_secs(300),
            per_page: 100,
            max_pages: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    full_name: String,
    stargazers_count: u64,
    forks_count: u64,
}

#[derive(Debug, Deserialize)]
struct ViewsResponse {
    #[serde(default)]
    views: Vec<TrafficPoint>,
}

#[derive(Debug, Deserialize)]
struct ClonesResponse {
    #[serde(default)]
    clones: Vec<TrafficPoint>,
}

#[derive(Debug, Deserialize)]
struct StargazerResponse {
    starred_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ForkResponse {
    created_at: DateTime<Utc>,
}

/// Fetches repository statistics from the GitHub REST API.
pub struct GithubFetcher {
    settings: GithubSettings,
    http: reqwest::Client,
}

impl GithubFetcher {
    pub fn new(settings: GithubSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .user_agent(concat!("repostats/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { settings, http })
    }

    /// GET `path`, retrying while GitHub reports rate limiting.
    async fn get(&self, path: &str, accept: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = format!("{}{}", self.settings.api_url.trim_end_matches('/'), path);
        let mut attempt = 0;

        loop {
            let mut request = self
                .http
                .get(&url)
                .query(query)
                .header(ACCEPT, accept)
                .header("X-GitHub-Api-Version", API_VERSION);
            if let Some(ref token) = self.settings.token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    anyhow!(
                        "Request to {} timed out after {}s",
                        path,
                        self.settings.timeout_seconds
                    )
                } else if e.is_connect() {
                    anyhow!("Cannot connect to GitHub API at {}", self.settings.api_url)
                } else {
                    anyhow!("Failed to send request to {}: {}", path, e)
                }
            })?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if let Some(wait) = rate_limit_wait(status, response.headers(), Utc::now().timestamp())
            {
                if attempt < self.settings.retries {
                    attempt += 1;
                    let wait = wait.min(self.settings.max_retry_wait);
                    warn!(
                        path,
                        attempt,
                        wait_seconds = wait.as_secs(),
                        "Rate limited by GitHub; retrying"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
            }

            let body = response.text().await.unwrap_or_default();
            bail!("GitHub API error {} for {}: {}", status, path, body.trim());
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path, JSON, &[])
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }

    /// Fetch one page of a list endpoint, with the last page number from
    /// the `Link` header when GitHub sends one.
    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        accept: &str,
        extra: &[(&str, &str)],
        page: usize,
    ) -> Result<(Vec<T>, Option<usize>)> {
        let mut query: Vec<(&str, String)> =
            extra.iter().map(|(k, v)| (*k, v.to_string())).collect();
        query.push(("per_page", self.settings.per_page.max(1).to_string()));
        query.push(("page", page.to_string()));

        let response = self.get(path, accept, &query).await?;
        let last = last_page(response.headers());
        let batch = response
            .json()
            .await
            .with_context(|| format!("Failed to parse page {} of {}", page, path))?;

        Ok((batch, last))
    }

    /// Collect the pages of an oldest-first list endpoint, up to `max_pages`.
    ///
    /// When the list is longer than the page limit, the newest pages are
    /// kept.
    async fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        accept: &str,
        extra: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let per_page = self.settings.per_page.max(1);
        let max_pages = self.settings.max_pages.max(1);
        let (mut batch, last) = self.get_page::<T>(path, accept, extra, 1).await?;

        if let Some(last) = last.filter(|&last| last > max_pages) {
            warn!(path, pages = last, max_pages, "Fetching only the newest pages");
            let mut items = Vec::new();
            for page in (last + 1 - max_pages)..=last {
                let (batch, _) = self.get_page::<T>(path, accept, extra, page).await?;
                items.extend(batch);
            }
            return Ok(items);
        }

        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let len = batch.len();
            items.extend(batch);
            if len < per_page {
                return Ok(items);
            }
            if page >= max_pages {
                warn!(path, max_pages, "Stopped paginating at page limit");
                return Ok(items);
            }
            page += 1;
            batch = self.get_page::<T>(path, accept, extra, page).await?.0;
        }
    }
}

#[async_trait]
impl Fetcher for GithubFetcher {
    async fn fetch(&self, target: &Target) -> Result<RepoSnapshot> {
        debug!(repo = %target, "Fetching statistics");

        let repo_path = format!("/repos/{}", target);
        let views_path = format!("/repos/{}/traffic/views", target);
        let clones_path = format!("/repos/{}/traffic/clones", target);
        let stars_path = format!("/repos/{}/stargazers", target);
        let forks_path = format!("/repos/{}/forks", target);

        let (repo, views, clones, stargazers, forks) = tokio::try_join!(
            self.get_json::<RepoResponse>(&repo_path),
            self.get_json::<ViewsResponse>(&views_path),
            self.get_json::<ClonesResponse>(&clones_path),
            self.paginate::<StargazerResponse>(&stars_path, STAR_JSON, &[]),
            self.paginate::<ForkResponse>(&forks_path, JSON, &[("sort", "oldest")]),
        )
        .with_context(|| format!("Failed to fetch statistics for {}", target))?;

        info!(
            repo = %target,
            stars = repo.stargazers_count,
            forks = repo.forks_count,
            "Fetched statistics"
        );

        Ok(RepoSnapshot {
            full_name: repo.full_name,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            views: views.views,
            clones: clones.clones,
            stargazers: stargazers.into_iter().map(|s| s.starred_at).collect(),
            fork_events: forks.into_iter().map(|f| f.created_at).collect(),
            fetched_at: Utc::now(),
        })
    }
}

/// Page number of the `rel="last"` link, if any.
fn last_page(headers: &HeaderMap) -> Option<usize> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, rel) = part.split_once(';')?;
        if rel.trim() != r#"rel="last""# {
            return None;
        }
        let url = target.trim().trim_start_matches('<').trim_end_matches('>');
        let url = reqwest::Url::parse(url).ok()?;
        let page = url.query_pairs().find(|(k, _)| k == "page")?.1;
        page.parse().ok()
    })
}

/// How long to wait before retrying a throttled response, or `None` if the
/// response is not a rate-limit rejection.
fn rate_limit_wait(status: StatusCode, headers: &HeaderMap, now: i64) -> Option<Duration> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let exhausted = header("x-ratelimit-remaining") == Some("0");
    let retry_after = header(RETRY_AFTER.as_str()).and_then(|v| v.parse::<u64>().ok());

    let throttled = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (exhausted || retry_after.is_some()));
    if !throttled {
        return None;
    }

    if let Some(secs) = retry_after {
        return Some(Duration::from_secs(secs));
    }

    if exhausted {
        if let Some(reset) = header("x-ratelimit-reset").and_then(|v| v.parse::<i64>().ok()) {
            return Some(Duration::from_secs((reset - now).max(1) as u64));
        }
    }

    Some(DEFAULT_RETRY_WAIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use reqwest::header::HeaderValue;

    fn settings(api_url: String) -> GithubSettings {
        GithubSettings {
            api_url,
            token: Some("test-token".to_string()),
            retries: 0,
            ..Default::default()
        }
    }

    async fn mock_json(server: &mut mockito::Server, path: &str, body: &str) -> mockito::Mock {
        server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let mut server = mockito::Server::new_async().await;
        let repo = server
            .mock("GET", "/repos/octo/cat")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(include_str!("../../fixtures/github/repo.json"))
            .create_async()
            .await;
        mock_json(
            &mut server,
            "/repos/octo/cat/traffic/views",
            include_str!("../../fixtures/github/views.json"),
        )
        .await;
        mock_json(
            &mut server,
            "/repos/octo/cat/traffic/clones",
            include_str!("../../fixtures/github/clones.json"),
        )
        .await;
        mock_json(
            &mut server,
            "/repos/octo/cat/stargazers",
            include_str!("../../fixtures/github/stargazers.json"),
        )
        .await;
        mock_json(
            &mut server,
            "/repos/octo/cat/forks",
            include_str!("../../fixtures/github/forks.json"),
        )
        .await;

        let fetcher = GithubFetcher::new(settings(server.url())).unwrap();
        let snapshot = fetcher
            .fetch(&Target::parse("octo/cat").unwrap())
            .await
            .unwrap();

        repo.assert_async().await;
        assert_eq!(snapshot.full_name, "octo/cat");
        assert_eq!(snapshot.stars, 3);
        assert_eq!(snapshot.forks, 2);
        assert_eq!(snapshot.views.len(), 2);
        assert_eq!(snapshot.views[1].uniques, 5);
        assert_eq!(snapshot.clones.len(), 1);
        assert_eq!(snapshot.stargazers.len(), 3);
        assert_eq!(snapshot.fork_events.len(), 2);
    }

    #[tokio::test]
    async fn test_paginate_follows_full_pages() {
        let mut server = mockito::Server::new_async().await;
        let page1 = server
            .mock("GET", "/repos/octo/cat/stargazers")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(
                r#"[{"starred_at":"2026-01-01T00:00:00Z"},{"starred_at":"2026-01-02T00:00:00Z"}]"#,
            )
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/repos/octo/cat/stargazers")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(r#"[{"starred_at":"2026-01-03T00:00:00Z"}]"#)
            .create_async()
            .await;

        let fetcher = GithubFetcher::new(GithubSettings {
            per_page: 2,
            ..settings(server.url())
        })
        .unwrap();
        let stars: Vec<StargazerResponse> = fetcher
            .paginate("/repos/octo/cat/stargazers", STAR_JSON, &[])
            .await
            .unwrap();

        page1.assert_async().await;
        page2.assert_async().await;
        assert_eq!(stars.len(), 3);
    }

    #[tokio::test]
    async fn test_paginate_keeps_newest_pages() {
        let mut server = mockito::Server::new_async().await;
        let link = format!(
            r#"<{0}/repos/octo/cat/stargazers?per_page=2&page=2>; rel="next", <{0}/repos/octo/cat/stargazers?per_page=2&page=3>; rel="last""#,
            server.url()
        );
        let first = server
            .mock("GET", "/repos/octo/cat/stargazers")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_header("link", &link)
            .with_body(
                r#"[{"starred_at":"2025-01-01T00:00:00Z"},{"starred_at":"2025-02-01T00:00:00Z"}]"#,
            )
            .create_async()
            .await;
        let middle = server
            .mock("GET", "/repos/octo/cat/stargazers")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .expect(0)
            .create_async()
            .await;
        let newest = server
            .mock("GET", "/repos/octo/cat/stargazers")
            .match_query(Matcher::UrlEncoded("page".into(), "3".into()))
            .with_status(200)
            .with_body(r#"[{"starred_at":"2026-10-14T00:00:00Z"}]"#)
            .create_async()
            .await;

        let fetcher = GithubFetcher::new(GithubSettings {
            per_page: 2,
            max_pages: 1,
            ..settings(server.url())
        })
        .unwrap();
        let stars: Vec<StargazerResponse> = fetcher
            .paginate("/repos/octo/cat/stargazers", STAR_JSON, &[])
            .await
            .unwrap();

        first.assert_async().await;
        middle.assert_async().await;
        newest.assert_async().await;
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].starred_at.to_rfc3339(), "2026-10-14T00:00:00+00:00");
    }

    #[test]
    fn test_last_page_from_link_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(last_page(&headers), None);

        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/repositories/1/stargazers?page=2>; rel="next", <https://api.github.com/repositories/1/stargazers?page=34>; rel="last""#,
            ),
        );
        assert_eq!(last_page(&headers), Some(34));
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let throttled = server
            .mock("GET", "/repos/octo/cat")
            .with_status(429)
            .with_header("retry-after", "0")
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/repos/octo/cat")
            .with_status(200)
            .with_body(include_str!("../../fixtures/github/repo.json"))
            .expect(1)
            .create_async()
            .await;

        let fetcher = GithubFetcher::new(GithubSettings {
            retries: 2,
            ..settings(server.url())
        })
        .unwrap();
        let repo: RepoResponse = fetcher.get_json("/repos/octo/cat").await.unwrap();

        throttled.assert_async().await;
        ok.assert_async().await;
        assert_eq!(repo.stargazers_count, 3);
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_retries() {
        let mut server = mockito::Server::new_async().await;
        let throttled = server
            .mock("GET", "/repos/octo/cat")
            .with_status(429)
            .with_header("retry-after", "0")
            .with_body(r#"{"message":"API rate limit exceeded"}"#)
            .expect(3)
            .create_async()
            .await;

        let fetcher = GithubFetcher::new(GithubSettings {
            retries: 2,
            ..settings(server.url())
        })
        .unwrap();
        let err = fetcher
            .get_json::<RepoResponse>("/repos/octo/cat")
            .await
            .unwrap_err();

        throttled.assert_async().await;
        let msg = format!("{:#}", err);
        assert!(msg.contains("429"));
        assert!(msg.contains("rate limit"));
    }

    #[tokio::test]
    async fn test_rate_limit_wait_is_capped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/octo/cat")
            .with_status(429)
            .with_header("retry-after", "3600")
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/octo/cat")
            .with_status(200)
            .with_body(include_str!("../../fixtures/github/repo.json"))
            .create_async()
            .await;

        let fetcher = GithubFetcher::new(GithubSettings {
            retries: 1,
            max_retry_wait: Duration::ZERO,
            ..settings(server.url())
        })
        .unwrap();
        let repo = tokio::time::timeout(
            Duration::from_secs(10),
            fetcher.get_json::<RepoResponse>("/repos/octo/cat"),
        )
        .await
        .expect("capped wait should not sleep for an hour")
        .unwrap();

        assert_eq!(repo.full_name, "octo/cat");
    }

    #[tokio::test]
    async fn test_error_status_fails_with_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/octo/gone")
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let fetcher = GithubFetcher::new(settings(server.url())).unwrap();
        let err = fetcher
            .get_json::<RepoResponse>("/repos/octo/gone")
            .await
            .unwrap_err();

        let msg = format!("{:#}", err);
        assert!(msg.contains("404"));
        assert!(msg.contains("Not Found"));
    }

    #[test]
    fn test_rate_limit_wait() {
        let now = 1_700_000_000;
        let mut headers = HeaderMap::new();
        assert_eq!(rate_limit_wait(StatusCode::NOT_FOUND, &headers, now), None);
        assert_eq!(rate_limit_wait(StatusCode::FORBIDDEN, &headers, now), None);
        assert_eq!(
            rate_limit_wait(StatusCode::TOO_MANY_REQUESTS, &headers, now),
            Some(DEFAULT_RETRY_WAIT)
        );

        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(
            rate_limit_wait(StatusCode::FORBIDDEN, &headers, now),
            Some(Duration::from_secs(7))
        );

        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000042"));
        assert_eq!(
            rate_limit_wait(StatusCode::FORBIDDEN, &headers, now),
            Some(Duration::from_secs(42))
        );
    }
}
