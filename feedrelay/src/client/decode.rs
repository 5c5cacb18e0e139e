//! URL building and response decoding.

use super::options::ResponseType;
use crate::cache::Payload;
use crate::error::FetchError;
use crate::transport::HttpResponse;
use std::collections::BTreeMap;
use url::Url;

/// Join `endpoint` onto `base_url` and set `params` as query pairs.
///
/// Absolute `http(s)://` endpoints bypass the base URL. Parameters replace
/// any existing query pair with the same name.
pub fn build_url(
    base_url: &str,
    endpoint: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, FetchError> {
    let full = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("{}{}", base_url, endpoint)
    };

    let mut url = Url::parse(&full).map_err(|e| FetchError::InvalidUrl {
        url: full.clone(),
        reason: e.to_string(),
    })?;

    if !params.is_empty() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !params.contains_key(k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in kept.iter().map(|(k, v)| (k, v)).chain(params.iter()) {
            query.append_pair(k, v);
        }
        drop(query);
    }

    Ok(url.to_string())
}

/// Decode a successful response body.
///
/// Text is returned as-is when requested or when the content type is
/// textual (`text/*` or anything mentioning `xml`); otherwise the body is
/// parsed as JSON.
pub fn decode_response(
    response: HttpResponse,
    response_type: ResponseType,
) -> Result<Payload, FetchError> {
    let content_type = response.content_type.as_deref().unwrap_or("");
    let textual = content_type.contains("text/") || content_type.contains("xml");

    if response_type == ResponseType::Text || textual {
        return Ok(Payload::Text(response.body));
    }

    serde_json::from_str(&response.body)
        .map(Payload::Json)
        .map_err(|e| FetchError::InvalidResponse(format!("JSON parse error: {}", e)))
}

/// Error for a non-2xx response.
pub fn status_error(status: u16, url: &str) -> FetchError {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status");
    FetchError::http_status(status, format!("{} from {}", reason, url))
}
