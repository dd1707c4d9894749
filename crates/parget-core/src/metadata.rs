//! Metadata probing: size, range support, and a file name for a URL

use reqwest::header::{ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::error::DownloadError;

const DEFAULT_FILE_NAME: &str = "download";

/// What the probe learned about a remote resource. Computed once per
/// download and immutable thereafter.
#[derive(Debug, Clone)]
pub struct ResourceMetadata {
    pub url: Url,
    /// Total size in bytes; `None` means the server did not reveal it.
    pub size: Option<u64>,
    pub accepts_ranges: bool,
    /// Name derived from Content-Disposition or the URL path.
    pub file_name: String,
}

/// Probe `url` for content length, range support, and a file name
/// without transferring the body.
///
/// A HEAD request goes first. If it is rejected or leaves size or
/// range support unknown, a trial GET for `bytes=0-0` settles both: a
/// 206 confirms ranges (total size comes from Content-Range), a 200
/// means the server ignores ranges and the Content-Length is the full
/// size. Ambiguity resolves to `accepts_ranges = false`.
pub async fn probe(client: &Client, url: &Url) -> Result<ResourceMetadata, DownloadError> {
    let mut size: Option<u64> = None;
    let mut accepts_ranges = false;
    let mut file_name: Option<String> = None;
    let mut head_ok = false;

    match client.head(url.as_str()).send().await {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                head_ok = true;
                accepts_ranges = header_str(&response, ACCEPT_RANGES.as_str()) == Some("bytes");
                size = header_str(&response, CONTENT_LENGTH.as_str()).and_then(parse_length);
                file_name = header_str(&response, CONTENT_DISPOSITION.as_str())
                    .and_then(file_name_from_disposition);
            } else if status == StatusCode::METHOD_NOT_ALLOWED
                || status == StatusCode::NOT_IMPLEMENTED
            {
                debug!(%status, "server rejects HEAD, falling back to trial range request");
            } else {
                return Err(DownloadError::Metadata {
                    url: url.to_string(),
                    reason: format!("HEAD returned {status}"),
                });
            }
        }
        Err(e) => {
            return Err(DownloadError::Metadata {
                url: url.to_string(),
                reason: e.to_string(),
            })
        }
    }

    // The Accept-Ranges header is optional even on servers that honor
    // ranges, and some CDNs omit Content-Length from HEAD responses.
    // A one-byte trial range settles whatever is still unknown.
    if !accepts_ranges || size.is_none() {
        match client
            .get(url.as_str())
            .header(RANGE, "bytes=0-0")
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::PARTIAL_CONTENT {
                    accepts_ranges = true;
                    if size.is_none() {
                        size = header_str(&response, CONTENT_RANGE.as_str())
                            .and_then(total_from_content_range);
                    }
                } else if status.is_success() {
                    // Full-content answer to a range request: the
                    // server ignores ranging, but its Content-Length
                    // is the whole resource.
                    accepts_ranges = false;
                    if size.is_none() {
                        size = header_str(&response, CONTENT_LENGTH.as_str())
                            .and_then(parse_length);
                    }
                } else if !head_ok {
                    return Err(DownloadError::Metadata {
                        url: url.to_string(),
                        reason: format!("trial range request returned {status}"),
                    });
                } else {
                    accepts_ranges = false;
                }

                if file_name.is_none() {
                    file_name = header_str(&response, CONTENT_DISPOSITION.as_str())
                        .and_then(file_name_from_disposition);
                }
            }
            Err(e) if !head_ok => {
                return Err(DownloadError::Metadata {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                warn!(error = %e, "trial range probe failed, assuming no range support");
                accepts_ranges = false;
            }
        }
    }

    let file_name = file_name.unwrap_or_else(|| file_name_from_url(url));
    debug!(%url, ?size, accepts_ranges, file_name, "probe complete");

    Ok(ResourceMetadata {
        url: url.clone(),
        size,
        accepts_ranges,
        file_name,
    })
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn file_name_from_disposition(value: &str) -> Option<String> {
    let raw = value.split("filename=").nth(1)?;
    let raw = raw.split(';').next()?;
    let name = raw.trim().trim_matches('"').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|s| s.last())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

/// Parse the total from `bytes 0-0/TOTAL`; `*` means unknown.
fn total_from_content_range(value: &str) -> Option<u64> {
    let total = value.split('/').last()?;
    if total == "*" {
        None
    } else {
        parse_length(total)
    }
}

/// Parse a length header value. A zero length carries no more
/// information than a missing one (an empty resource has no
/// satisfiable range), so it reads as unknown.
fn parse_length(value: &str) -> Option<u64> {
    value.parse().ok().filter(|&n| n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_filename_is_extracted() {
        assert_eq!(
            file_name_from_disposition("attachment; filename=\"report.pdf\""),
            Some("report.pdf".to_string())
        );
        assert_eq!(
            file_name_from_disposition("attachment; filename=data.bin; size=42"),
            Some("data.bin".to_string())
        );
        assert_eq!(file_name_from_disposition("inline"), None);
        assert_eq!(file_name_from_disposition("attachment; filename=\"\""), None);
    }

    #[test]
    fn url_filename_strips_query() {
        let url = Url::parse("https://example.com/files/image.iso?token=abc").unwrap();
        assert_eq!(file_name_from_url(&url), "image.iso");
    }

    #[test]
    fn url_without_path_gets_default_name() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(file_name_from_url(&url), DEFAULT_FILE_NAME);
    }

    #[test]
    fn content_range_total_is_parsed() {
        assert_eq!(total_from_content_range("bytes 0-0/1048576"), Some(1048576));
        assert_eq!(total_from_content_range("bytes 0-0/*"), None);
        assert_eq!(total_from_content_range("garbage"), None);
    }

    #[test]
    fn zero_length_reads_as_unknown() {
        assert_eq!(parse_length("0"), None);
        assert_eq!(parse_length("1"), Some(1));
        assert_eq!(total_from_content_range("bytes 0-0/0"), None);
    }
}
