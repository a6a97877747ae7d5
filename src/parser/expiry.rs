use url::Url;

/// Unix expiry carried by a signed trailer URL in its `Expires` query parameter.
///
/// Returns `None` when the URL does not parse, has no `Expires` parameter or
/// the value is not an integer.
///
/// # Examples
///
/// ```rust
/// use trailerfin::parser::expiry::parse_expiry;
///
/// let url = "https://cdn.example/v.mp4?Expires=1700000000&Signature=x#t=10";
/// assert_eq!(parse_expiry(url), Some(1_700_000_000));
/// assert_eq!(parse_expiry("https://cdn.example/v.mp4"), None);
/// ```
#[must_use]
pub fn parse_expiry(url: &str) -> Option<i64> {
    let parsed = Url::parse(url.trim()).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "Expires")
        .and_then(|(_, value)| value.parse().ok())
}

/// Renders a remaining duration as `"<m>min <s>sec"` for log lines.
#[must_use]
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}min {}sec", seconds / 60, seconds % 60)
}
