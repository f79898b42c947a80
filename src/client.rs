use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::cache::{DEFAULT_TTL, ResponseCache};
use crate::config::{DEFAULT_TIMEOUT, load_config};
use crate::decode::decode_str;
use crate::error::{Error, Result};
use crate::query::{DataQuery, DataRequest, QueryBuilder};
use crate::record::Table;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SDMX REST endpoint, e.g.
    /// `https://sdmx.data.unicef.org/ws/public/sdmxapi/rest`.
    pub url: String,
    /// Whether to verify TLS certificates.
    pub verify: bool,
    /// Response cache directory; `None` uses [`ResponseCache::default_dir`].
    pub cache_dir: Option<PathBuf>,
    /// Freshness window of cached responses.
    pub cache_ttl: Duration,
    /// Request timeout handed to the HTTP transport.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Defaults for everything but the endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            verify: true,
            cache_dir: None,
            cache_ttl: DEFAULT_TTL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Timing and size of one `get_data` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchStats {
    /// Full request URL, including the query string.
    pub url: String,
    /// The body came from the response cache.
    pub from_cache: bool,
    pub download: Duration,
    pub parse: Duration,
    /// Number of decoded records.
    pub records: usize,
}

/// Callback receiving [`FetchStats`] after every successful call.
pub type StatsHook = Arc<dyn Fn(&FetchStats) + Send + Sync>;

#[derive(Clone)]
pub struct Client {
    builder: QueryBuilder,
    cache: Option<ResponseCache>,
    timeout: Duration,
    progress: bool,
    stats_hook: Option<StatsHook>,

    http: HttpClient,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.builder.endpoint())
            .field("cache", &self.cache)
            .field("timeout", &self.timeout)
            .field("progress", &self.progress)
            .field("stats_hook", &self.stats_hook.is_some())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client using environment variables and/or `.sdmxrc`.
    ///
    /// This is equivalent to `Client::new(None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`verify` arguments
    /// - environment variables `SDMX_URL` / `SDMX_VERIFY` (and `SDMX_CACHE_DIR`,
    ///   `SDMX_CACHE_TTL`, `SDMX_TIMEOUT`)
    /// - config file from `SDMX_RC` or `.sdmxrc`
    pub fn new(url: Option<String>, verify: Option<bool>) -> Result<Self> {
        Self::from_config(load_config(url, verify)?)
    }

    /// Creates a client from an explicit configuration, ignoring the
    /// environment.
    pub fn from_config(cfg: ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sdmx-json-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("sdmx-json-rs")),
        );
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(cfg.timeout);

        if !cfg.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build()?;
        let cache_dir = cfg.cache_dir.unwrap_or_else(ResponseCache::default_dir);

        Ok(Self {
            builder: QueryBuilder::new(&cfg.url),
            cache: Some(ResponseCache::new(cache_dir, cfg.cache_ttl)),
            timeout: cfg.timeout,
            progress: false,
            stats_hook: None,
            http,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the response cache; `None` disables caching.
    pub fn with_cache(mut self, cache: Option<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Shows a spinner on stderr while a live download runs.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_stats_hook(mut self, hook: impl Fn(&FetchStats) + Send + Sync + 'static) -> Self {
        self.stats_hook = Some(Arc::new(hook));
        self
    }

    pub fn endpoint(&self) -> &str {
        self.builder.endpoint()
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Downloads (or reads from cache) and decodes one data query.
    ///
    /// A non-success HTTP status is an [`Error::Connection`], a payload that
    /// is not an SDMX-JSON data message an [`Error::Decode`]. Neither is
    /// retried.
    pub fn get_data(&self, query: &DataQuery) -> Result<Table> {
        let request = self.builder.build(query);
        let url = request.url()?.to_string();

        let start = Instant::now();
        let (body, from_cache) = self.fetch(&request, &url)?;
        let download = start.elapsed();

        let start = Instant::now();
        let records = decode_str(&body, query.labels)?;
        let table = Table::from_records(&records)?;
        let parse = start.elapsed();

        // Only bodies that decoded are worth serving again.
        if !from_cache {
            if let Some(cache) = &self.cache {
                cache.put(&url, &body);
            }
        }

        let stats = FetchStats {
            url,
            from_cache,
            download,
            parse,
            records: records.len(),
        };
        if query.print_stats {
            info!(
                url = %stats.url,
                from_cache = stats.from_cache,
                download_secs = stats.download.as_secs_f64(),
                parse_secs = stats.parse.as_secs_f64(),
                records = stats.records,
                "get_data finished"
            );
        } else {
            debug!(url = %stats.url, records = stats.records, "get_data finished");
        }
        if let Some(hook) = &self.stats_hook {
            hook(&stats);
        }

        Ok(table)
    }

    /// Returns the response body and whether it came from the cache.
    fn fetch(&self, request: &DataRequest, url: &str) -> Result<(String, bool)> {
        if let Some(body) = self.cache.as_ref().and_then(|c| c.get(url)) {
            debug!(url, "serving response from cache");
            return Ok((body, true));
        }

        debug!(url, "requesting data");
        let spinner = self.progress.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} {elapsed} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!("downloading {}", request.path));
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let result = self.http.get(url).timeout(self.timeout).send();
        if let Some(pb) = &spinner {
            pb.finish_and_clear();
        }
        let resp = result?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(Error::connection(status, url, &text));
        }
        Ok((resp.text()?, false))
    }
}
