//! Cache key normalisation.

use url::{form_urlencoded, Url};

/// Build a deterministic cache key for a URL and its query parameters.
///
/// Parameters from both the URL's own query string and `params` are merged
/// and sorted by name (then value), so the key does not depend on the order
/// they were supplied in. URLs that parse are normalised by the `url` crate
/// (scheme and host lower-cased, default port dropped, fragment removed).
///
/// ```
/// use feedrelay::cache::generate_key;
///
/// let a = generate_key("https://api.example.com/quote", [("b", "2"), ("a", "1")]);
/// let b = generate_key("https://API.example.com:443/quote?a=1", [("b", "2")]);
/// assert_eq!(a, b);
/// assert_eq!(a, "https://api.example.com/quote|a=1&b=2");
/// ```
pub fn generate_key<'a, I>(url: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let base = match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            pairs.extend(parsed.query_pairs().into_owned());
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    };

    if pairs.is_empty() {
        return base;
    }

    pairs.sort();
    // Re-encode so separators inside names or values cannot merge pairs
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();

    format!("{}|{}", base, query)
}
