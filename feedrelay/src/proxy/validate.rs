//! Heuristic detection of relay error pages.

/// Whether a relay response body looks like an error page rather than the
/// upstream content.
///
/// Matches, on the trimmed body: empty; starting with `<!DOCTYPE`, `<html`
/// or `<HTML`; containing `error code:`, `Error:` or `ERROR:`; or starting
/// with `<` and containing a closing tag.
///
/// The last rule also matches well-formed XML feeds. Callers that relay RSS
/// should expect such bodies to be rejected.
pub fn looks_like_error_page(body: &str) -> bool {
    let trimmed = body.trim();

    trimmed.is_empty()
        || trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML")
        || trimmed.contains("error code:")
        || trimmed.contains("Error:")
        || trimmed.contains("ERROR:")
        || (trimmed.starts_with('<') && trimmed.contains("</"))
}
