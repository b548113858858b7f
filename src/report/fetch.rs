use crate::config::OutputFileSettings;
use std::io::Read;
use std::time::Duration;

pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 20;
pub const DEFAULT_MAX_OUTPUT_FILE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("output file url `{url}` must use http or https")]
    UnsupportedScheme { url: String },
    #[error("output file request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("output file {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("output file {url} exceeds {max_bytes} bytes")]
    TooLarge { url: String, max_bytes: u64 },
    #[error("output file {url} is not valid utf-8")]
    Encoding { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedFile {
    pub fn declares_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
    }
}

/// Resolves `output_file` attachment urls to their content.
pub trait OutputFileFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedFile, FetchError>;
}

impl<T: OutputFileFetcher + ?Sized> OutputFileFetcher for &T {
    fn fetch(&self, url: &str) -> Result<FetchedFile, FetchError> {
        (**self).fetch(url)
    }
}

#[derive(Debug, Clone)]
pub struct HttpOutputFileFetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl HttpOutputFileFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            max_bytes,
        }
    }

    pub fn from_settings(settings: &OutputFileSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.fetch_timeout_seconds),
            settings.max_bytes,
        )
    }
}

impl Default for HttpOutputFileFetcher {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
            DEFAULT_MAX_OUTPUT_FILE_BYTES,
        )
    }
}

impl OutputFileFetcher for HttpOutputFileFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedFile, FetchError> {
        let lowered = url.trim().to_ascii_lowercase();
        if !lowered.starts_with("http://") && !lowered.starts_with("https://") {
            return Err(FetchError::UnsupportedScheme {
                url: url.to_string(),
            });
        }

        let response = match self.agent.get(url.trim()).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                })
            }
            Err(err) => {
                return Err(FetchError::Request {
                    url: url.to_string(),
                    reason: err.to_string(),
                })
            }
        };

        let content_type = response.header("content-type").map(str::to_string);
        let mut body = Vec::new();
        response
            .into_reader()
            .take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|err| FetchError::Request {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        if body.len() as u64 > self.max_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                max_bytes: self.max_bytes,
            });
        }

        let body = String::from_utf8(body).map_err(|_| FetchError::Encoding {
            url: url.to_string(),
        })?;
        Ok(FetchedFile { content_type, body })
    }
}

/// Fetcher for contexts where attachments must not be resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl OutputFileFetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedFile, FetchError> {
        Err(FetchError::Request {
            url: url.to_string(),
            reason: "output file fetching is disabled".to_string(),
        })
    }
}
