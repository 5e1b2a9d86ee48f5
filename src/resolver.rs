//! Track id to stream location.

use reqwest::Url;

use crate::error::ResolveError;

const FILE_ENDPOINT: &str = "/v1/file/";

/// Where a pipeline fetches a track from, plus the credential to send along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    pub url: String,
    pub token: Option<String>,
}

pub trait StreamResolver {
    fn resolve(&self, track_id: &str) -> Result<StreamSource, ResolveError>;
}

/// Resolves ids against a media server's `/v1/file/{id}` endpoint.
#[derive(Debug, Clone)]
pub struct ServiceResolver {
    address: String,
    token: Option<String>,
}

impl ServiceResolver {
    pub fn new(address: impl Into<String>, token: Option<String>) -> Self {
        Self {
            address: address.into(),
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

impl StreamResolver for ServiceResolver {
    fn resolve(&self, track_id: &str) -> Result<StreamSource, ResolveError> {
        if track_id.is_empty() {
            return Err(ResolveError::InvalidId(track_id.to_string()));
        }
        let mut url = build_url(&self.address, FILE_ENDPOINT)?;
        url.path_segments_mut()
            .map_err(|_| invalid(&self.address, "address cannot be a base"))?
            .pop_if_empty()
            .push(track_id);
        Ok(StreamSource {
            url: url.into(),
            token: self.token.clone(),
        })
    }
}

/// Join `endpoint` onto the server address.
///
/// A bare host (`https://music.example.com`) gets the endpoint at its root.
/// An address with a path (`https://example.com/euterpe`) is treated as a
/// directory, so the endpoint is appended below it instead of replacing it.
pub fn build_url(address: &str, endpoint: &str) -> Result<Url, ResolveError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ResolveError::NoAddress);
    }

    let base = if address.ends_with('/') {
        Url::parse(address)
    } else {
        Url::parse(&format!("{address}/"))
    }
    .map_err(|e| invalid(address, &e.to_string()))?;

    base.join(endpoint.trim_start_matches('/'))
        .map_err(|e| invalid(address, &e.to_string()))
}

fn invalid(address: &str, reason: &str) -> ResolveError {
    ResolveError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests;
