use url::Url;

/// Escapes text for use in HTML element bodies and quoted attributes.
pub fn escape(text: &str) -> String {
    ammonia::clean_text(text)
}

/// Escaped `href`/`src` value. Only http(s), mailto and relative references
/// survive; anything else (e.g. `javascript:`) collapses to `#`.
pub fn safe_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "mailto") => escape(trimmed),
        Ok(_) => "#".to_string(),
        Err(url::ParseError::RelativeUrlWithoutBase) => escape(trimmed),
        Err(_) => "#".to_string(),
    }
}

/// Opens `tag` with a single class attribute.
pub fn open(tag: &str, class: &str) -> String {
    format!("<{} class=\"{}\">", tag, escape(class))
}
