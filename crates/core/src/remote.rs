//! Remote store protocol contract and HTTP client.
//!
//! The sync engine consumes the narrow [`Remote`] trait: a cursor-paginated
//! pull and a per-chunk push. [`HttpRemote`] is the reqwest-backed
//! implementation talking to a branch-aware translation store; tests supply
//! in-memory implementations.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::errors::RemoteError;
use crate::filter::SetFilter;
use crate::model::TranslationSet;

/// Bounded retry count for rate-limited dispatches.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Fallback wait when the server omits a Retry-After hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// One pull page request.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Opaque cursor from the previous page, `None` for the first page.
    pub cursor: Option<String>,
    pub page_size: usize,
    /// Passed through as request parameters; the remote applies it
    /// server-side.
    pub filter: SetFilter,
}

/// One page of incoming translation sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullPage {
    pub sets: Vec<TranslationSet>,
    pub cursor: Option<String>,
    pub has_more: bool,
}

/// Remote store boundary consumed by the sync engine.
pub trait Remote: Send + Sync {
    /// Fetch one page of incoming sets.
    fn pull_page(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<PullPage, RemoteError>> + Send;

    /// Submit one drained chunk as a single request carrying an ordered
    /// list of sets.
    fn push_chunk(
        &self,
        sets: &[TranslationSet],
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PushPayload<'a> {
    sets: &'a [TranslationSet],
}

/// Asynchronous client for the remote translation store API.
#[derive(Clone)]
pub struct HttpRemote {
    http: reqwest::Client,
    base_url: String,
    project: String,
    branch: String,
    token: String,
}

impl HttpRemote {
    pub fn new(
        base_url: impl Into<String>,
        project: impl Into<String>,
        branch: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("langsync/0.1"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("failed to build reqwest client");
        let project = project.into();
        let branch = branch.into();
        info!(base_url = %base_url, project = %project, branch = %branch, "created remote client");
        Self {
            http,
            base_url,
            project,
            branch,
            token: token.into(),
        }
    }

    fn sets_url(&self) -> String {
        format!(
            "{}/projects/{}/branches/{}/sets",
            self.base_url, self.project, self.branch
        )
    }

    fn filter_params(filter: &SetFilter) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let mut extend = |name: &'static str, values: &[String]| {
            for value in values {
                params.push((name, value.clone()));
            }
        };
        extend("only_locale", &filter.only_locales);
        extend("except_locale", &filter.except_locales);
        extend("only_group", &filter.only_groups);
        extend("except_group", &filter.except_groups);
        extend("only_namespace", &filter.only_namespaces);
        extend("except_namespace", &filter.except_namespaces);
        params
    }

    /// Triage a non-success response into the matching error.
    fn check_response(resp: &reqwest::Response) -> Result<(), RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RemoteError::AuthenticationFailed(format!("HTTP {}", status)));
        }
        if status.as_u16() == 429 {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(RemoteError::RateLimited {
                retries: 0,
                retry_after_secs,
            });
        }
        Err(RemoteError::ApiError {
            status: status.as_u16(),
            body: format!("HTTP {}", status),
        })
    }
}

impl Remote for HttpRemote {
    #[instrument(skip(self, request), fields(cursor = ?request.cursor))]
    async fn pull_page(&self, request: PageRequest) -> Result<PullPage, RemoteError> {
        let mut req = self
            .http
            .get(self.sets_url())
            .bearer_auth(&self.token)
            .query(&[("per_page", request.page_size.to_string())])
            .query(&Self::filter_params(&request.filter));
        if let Some(cursor) = &request.cursor {
            req = req.query(&[("cursor", cursor)]);
        }

        let resp = req.send().await?;
        Self::check_response(&resp)?;
        let page: PullPage = resp
            .json()
            .await
            .map_err(|e| RemoteError::ParseError(e.to_string()))?;
        debug!(count = page.sets.len(), has_more = page.has_more, "fetched pull page");
        Ok(page)
    }

    /// Submit one chunk, retrying only rate-limited responses a bounded
    /// number of times while honoring the server's wait hint. Any other
    /// failure propagates immediately and is terminal for the push.
    #[instrument(skip(self, sets), fields(count = sets.len()))]
    async fn push_chunk(&self, sets: &[TranslationSet]) -> Result<(), RemoteError> {
        let payload = PushPayload { sets };
        let mut attempts = 0u32;

        loop {
            let resp = self
                .http
                .post(self.sets_url())
                .bearer_auth(&self.token)
                .json(&payload)
                .send()
                .await?;

            match Self::check_response(&resp) {
                Ok(()) => {
                    debug!("pushed chunk");
                    return Ok(());
                }
                Err(RemoteError::RateLimited {
                    retry_after_secs, ..
                }) => {
                    attempts += 1;
                    if attempts > MAX_RATE_LIMIT_RETRIES {
                        return Err(RemoteError::RateLimited {
                            retries: MAX_RATE_LIMIT_RETRIES,
                            retry_after_secs,
                        });
                    }
                    warn!(
                        attempt = attempts,
                        wait_secs = retry_after_secs,
                        "rate limited, retrying after server hint"
                    );
                    tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with(status: u16, headers: &[(&str, &str)]) -> reqwest::Response {
        let mut builder = http::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        reqwest::Response::from(builder.body("").unwrap())
    }

    #[test]
    fn test_check_response_accepts_success() {
        assert!(HttpRemote::check_response(&response_with(200, &[])).is_ok());
        assert!(HttpRemote::check_response(&response_with(204, &[])).is_ok());
    }

    #[test]
    fn test_check_response_parses_rate_limit_hint() {
        let err = HttpRemote::check_response(&response_with(429, &[("retry-after", "7")]))
            .expect_err("429 must triage as rate limited");
        assert!(matches!(
            err,
            RemoteError::RateLimited {
                retry_after_secs: 7,
                ..
            }
        ));
    }

    #[test]
    fn test_check_response_rate_limit_hint_fallback() {
        // Absent header.
        let err = HttpRemote::check_response(&response_with(429, &[])).unwrap_err();
        assert!(matches!(
            err,
            RemoteError::RateLimited {
                retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
                ..
            }
        ));

        // Unparsable header.
        let err =
            HttpRemote::check_response(&response_with(429, &[("retry-after", "soon")])).unwrap_err();
        assert!(matches!(
            err,
            RemoteError::RateLimited {
                retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
                ..
            }
        ));
    }

    #[test]
    fn test_check_response_auth_failures() {
        for status in [401, 403] {
            let err = HttpRemote::check_response(&response_with(status, &[])).unwrap_err();
            assert!(matches!(err, RemoteError::AuthenticationFailed(_)));
        }
    }

    #[test]
    fn test_check_response_other_statuses_are_api_errors() {
        let err = HttpRemote::check_response(&response_with(500, &[])).unwrap_err();
        assert!(matches!(err, RemoteError::ApiError { status: 500, .. }));

        let err = HttpRemote::check_response(&response_with(404, &[])).unwrap_err();
        assert!(matches!(err, RemoteError::ApiError { status: 404, .. }));
    }

    #[test]
    fn test_filter_params_pass_through() {
        let filter = SetFilter {
            only_locales: vec!["en".into(), "de".into()],
            except_groups: vec!["internal".into()],
            ..Default::default()
        };
        let params = HttpRemote::filter_params(&filter);
        assert!(params.contains(&("only_locale", "en".into())));
        assert!(params.contains(&("only_locale", "de".into())));
        assert!(params.contains(&("except_group", "internal".into())));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_sets_url_shape() {
        let remote = HttpRemote::new("https://api.example.com/", "acme", "main", "token");
        assert_eq!(
            remote.sets_url(),
            "https://api.example.com/projects/acme/branches/main/sets"
        );
    }
}
