use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::thread;
use std::time::Duration;

use flate2::read::MultiGzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::config::Settings;
use crate::error::PhewasError;

/// Plain HTTP access to the remote association resources.
pub trait RemoteFiles: Send + Sync {
    /// First line of the decompressed resource at `url`, without its line ending.
    fn header_line(&self, url: &str) -> Result<String, PhewasError>;
    /// Streams `url` to `destination`, returning the number of bytes written.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, PhewasError>;
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: usize,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self, PhewasError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("panukb-phewas/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PhewasError::FetchHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.http_timeout())
            .build()
            .map_err(|err| PhewasError::FetchHttp(err.to_string()))?;
        Ok(Self {
            client,
            max_retries: settings.max_retries,
        })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, PhewasError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        debug!(status, attempt, "retrying request");
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        debug!(error = %err, attempt, "retrying request");
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(PhewasError::FetchHttp(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PhewasError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        Err(PhewasError::FetchStatus { status, message })
    }
}

impl RemoteFiles for HttpClient {
    fn header_line(&self, url: &str) -> Result<String, PhewasError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        let response = Self::handle_status(response)?;
        read_first_line(response)?.ok_or(PhewasError::EmptyHeader)
    }

    fn download(&self, url: &str, destination: &Path) -> Result<u64, PhewasError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        let mut response = Self::handle_status(response)?;
        let mut file =
            File::create(destination).map_err(|err| PhewasError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| PhewasError::FetchHttp(err.to_string()))
    }
}

/// Decompresses just enough of a (multi-member) gzip stream to return its first line.
///
/// Returns `None` for an empty stream or an empty first line.
pub fn read_first_line<R: Read>(reader: R) -> Result<Option<String>, PhewasError> {
    let mut reader = BufReader::new(MultiGzDecoder::new(reader));
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|err| PhewasError::FetchHttp(format!("decompressing header: {err}")))?;
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(line.to_string()))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
