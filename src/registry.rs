use crate::{
    error::{ModError, ModResult},
    mod_id::ModIdentity,
};
use serde::Deserialize;
use std::{io, path::PathBuf, thread, time::Duration};
use tracing::{debug, warn};

pub const DEFAULT_API_BASE: &str = "https://thunderstore.io";
pub const DEFAULT_CDN_BASE: &str = "https://gcdn.thunderstore.io/live/repository/packages";
const USER_AGENT: &str = concat!("lethalkit/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModMetadata {
    pub downloads: u64,
    pub rating: i64,
    pub latest_version: String,
}

/// What the installer needs from a package registry.
pub trait Registry {
    fn fetch_metadata(&self, id: &ModIdentity) -> ModResult<ModMetadata>;

    /// Downloads the package archive to a new temporary file and returns its path.
    /// The caller owns the file.
    fn download_package(&self, id: &ModIdentity, version: &str) -> ModResult<PathBuf>;
}

impl<R: Registry + ?Sized> Registry for &R {
    fn fetch_metadata(&self, id: &ModIdentity) -> ModResult<ModMetadata> {
        (**self).fetch_metadata(id)
    }

    fn download_package(&self, id: &ModIdentity, version: &str) -> ModResult<PathBuf> {
        (**self).download_package(id, version)
    }
}

/// Retry schedule for rate-limited downloads. Only HTTP 429 is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PackageMetrics {
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    rating_score: i64,
    latest_version: String,
}

pub struct ThunderstoreClient {
    agent: ureq::Agent,
    api_base: String,
    cdn_base: String,
    retry: RetryPolicy,
}

impl Default for ThunderstoreClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ThunderstoreClient {
    pub fn new() -> Self {
        Self::with_endpoints(DEFAULT_API_BASE, DEFAULT_CDN_BASE)
    }

    pub fn with_endpoints(api_base: &str, cdn_base: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(60))
            .timeout_write(Duration::from_secs(10))
            .build();
        Self {
            agent,
            api_base: api_base.trim_end_matches('/').to_string(),
            cdn_base: cdn_base.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn metrics_url(&self, id: &ModIdentity) -> String {
        format!(
            "{}/api/v1/package-metrics/{}/{}",
            self.api_base,
            id.author(),
            id.name()
        )
    }

    fn package_url(&self, id: &ModIdentity, version: &str) -> String {
        format!("{}/{}", self.cdn_base, id.package_file_name(version))
    }

    fn get(&self, url: &str) -> Result<ureq::Response, ureq::Error> {
        self.agent.get(url).set("User-Agent", USER_AGENT).call()
    }
}

impl Registry for ThunderstoreClient {
    fn fetch_metadata(&self, id: &ModIdentity) -> ModResult<ModMetadata> {
        let url = self.metrics_url(id);
        debug!(%url, "fetching package metrics");

        let response = match self.get(&url) {
            Ok(response) => response,
            Err(err) => return Err(request_error(&url, err)),
        };
        if !is_success(response.status()) {
            return Err(ModError::RegistryBadStatus {
                url,
                status: response.status(),
            });
        }

        let metrics: PackageMetrics = response
            .into_json()
            .map_err(|source| ModError::RegistryMalformedResponse {
                url: url.clone(),
                source,
            })?;

        Ok(ModMetadata {
            downloads: metrics.downloads,
            rating: metrics.rating_score,
            latest_version: metrics.latest_version,
        })
    }

    fn download_package(&self, id: &ModIdentity, version: &str) -> ModResult<PathBuf> {
        let url = self.package_url(id, version);
        let attempts = self.retry.attempts.max(1);

        for attempt in 1..=attempts {
            debug!(%url, attempt, "downloading package");
            match self.get(&url) {
                Ok(response) if is_success(response.status()) => {
                    return save_to_temp(&url, response)
                }
                Ok(response) => {
                    return Err(ModError::RegistryBadStatus {
                        url,
                        status: response.status(),
                    })
                }
                Err(ureq::Error::Status(429, _)) => {
                    warn!(%url, attempt, "rate limited by registry");
                    if attempt < attempts {
                        thread::sleep(self.retry.interval);
                    }
                }
                Err(err) => return Err(request_error(&url, err)),
            }
        }

        Err(ModError::DownloadExhausted { url, attempts })
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn request_error(url: &str, err: ureq::Error) -> ModError {
    match err {
        ureq::Error::Status(status, _) => ModError::RegistryBadStatus {
            url: url.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => ModError::RegistryUnavailable {
            url: url.to_string(),
            source: Box::new(transport),
        },
    }
}

fn save_to_temp(url: &str, response: ureq::Response) -> ModResult<PathBuf> {
    let mut temp = tempfile::Builder::new()
        .prefix("mod-")
        .suffix(".zip")
        .tempfile()
        .map_err(|source| ModError::io(std::env::temp_dir(), source))?;

    let mut reader = response.into_reader();
    io::copy(&mut reader, temp.as_file_mut()).map_err(|source| {
        ModError::RegistryUnavailable {
            url: url.to_string(),
            source: Box::new(source),
        }
    })?;

    let (_, path) = temp
        .keep()
        .map_err(|err| ModError::io(std::env::temp_dir(), err.error))?;
    debug!(%url, path = %path.display(), "package saved");
    Ok(path)
}
