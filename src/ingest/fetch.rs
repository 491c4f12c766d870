// src/ingest/fetch.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};

use crate::ingest::extract::host_name;
use crate::ingest::politeness::{NoDelay, Politeness};
use crate::ingest::types::{Fault, Harvest};

pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Html,
    Json,
}

impl Accept {
    fn header_value(self) -> &'static str {
        match self {
            Accept::Html => {
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
            }
            Accept::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub accept: Accept,
    /// Skip TLS certificate verification for this request.
    pub insecure_tls: bool,
    /// Apply the politeness delay before sending.
    pub polite: bool,
}

impl FetchRequest {
    /// Markup page: polite by default.
    pub fn html(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept: Accept::Html,
            insecure_tls: false,
            polite: true,
        }
    }

    pub fn json(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept: Accept::Json,
            insecure_tls: false,
            polite: false,
        }
    }

    pub fn insecure(mut self) -> Self {
        self.insecure_tls = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport seam between adapters and the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// `Err` means the request never produced a response (DNS, TLS, timeout).
    async fn fetch(&self, req: &FetchRequest) -> Result<Page>;
}

/// Fetch `req` and hand back the body of a 2xx response. Anything else is
/// logged and recorded as a transport fault on `harvest`.
pub async fn fetch_body<R>(
    fetcher: &dyn Fetcher,
    adapter: &'static str,
    req: &FetchRequest,
    harvest: &mut Harvest<R>,
) -> Option<String> {
    match fetcher.fetch(req).await {
        Ok(page) if page.is_success() => {
            tracing::debug!(adapter, url = %req.url, bytes = page.body.len(), "fetched");
            Some(page.body)
        }
        Ok(page) => {
            tracing::warn!(
                adapter,
                url = %req.url,
                status = page.status,
                "upstream returned error status"
            );
            harvest.fault(Fault::Transport {
                url: req.url.clone(),
                detail: format!("HTTP {}", page.status),
            });
            None
        }
        Err(e) => {
            tracing::warn!(adapter, url = %req.url, error = ?e, "upstream request failed");
            harvest.fault(Fault::Transport {
                url: req.url.clone(),
                detail: format!("{e:#}"),
            });
            None
        }
    }
}

/// reqwest-backed fetcher with a browser user agent and a hard timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
    politeness: Arc<dyn Politeness>,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        politeness: Arc<dyn Politeness>,
    ) -> Result<Self> {
        let build = |insecure: bool| {
            let mut headers = HeaderMap::new();
            headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
            reqwest::Client::builder()
                .user_agent(user_agent)
                .default_headers(headers)
                .timeout(timeout)
                .connect_timeout(timeout.min(Duration::from_secs(10)))
                .danger_accept_invalid_certs(insecure)
                .build()
        };
        Ok(Self {
            client: build(false).context("building http client")?,
            insecure_client: build(true).context("building insecure http client")?,
            politeness,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<Page> {
        if req.polite {
            let host = host_name(&req.url).unwrap_or_default();
            self.politeness.before_request(&host).await;
        }
        let client = if req.insecure_tls {
            &self.insecure_client
        } else {
            &self.client
        };
        let resp = client
            .get(&req.url)
            .header(ACCEPT, req.accept.header_value())
            .send()
            .await
            .with_context(|| format!("GET {}", req.url))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading body of {}", req.url))?;
        Ok(Page {
            url: req.url.clone(),
            status,
            body,
        })
    }
}

/// Serves canned pages by URL. Unknown URLs fail like a refused connection.
pub struct FixtureFetcher {
    pages: HashMap<String, (u16, String)>,
    politeness: Arc<dyn Politeness>,
    seen: std::sync::Mutex<Vec<FetchRequest>>,
}

impl Default for FixtureFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            politeness: Arc::new(NoDelay),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_page(
        mut self,
        url: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        self.pages.insert(url.into(), (status, body.into()));
        self
    }

    pub fn with_politeness(mut self, politeness: Arc<dyn Politeness>) -> Self {
        self.politeness = politeness;
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        match self.seen.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<Page> {
        if req.polite {
            let host = host_name(&req.url).unwrap_or_default();
            self.politeness.before_request(&host).await;
        }
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(req.clone());
        }
        let (status, body) = self
            .pages
            .get(&req.url)
            .cloned()
            .with_context(|| format!("no fixture for {}", req.url))?;
        Ok(Page {
            url: req.url.clone(),
            status,
            body,
        })
    }
}
