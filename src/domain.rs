use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::table::Value;

/// News portal whose two-letter region sections are tracked as separate keys.
pub const REGIONAL_PORTAL: &str = "g1.globo.com";

static HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\d*\.)?([a-zA-Z0-9-]+(?:\.[a-zA-Z]{2,})+)")
        .expect("host pattern is valid")
});

// Applied to the text right after a portal host.
static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/([a-z]{2})/").expect("region pattern is valid"));

/// Canonical join key between uploaded rows and the traffic table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainKey(String);

impl DomainKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DomainKey> for Value {
    fn from(key: DomainKey) -> Self {
        Value::Text(key.0)
    }
}

/// Extract the domain key from a raw URL.
///
/// Pattern based and best effort: the first host-like substring after an
/// `http(s)://` scheme wins, with an optional `www`/`www2.` prefix dropped.
/// Portal URLs with a region section (`g1.globo.com/sp/...`) keep the region.
pub fn extract_domain(url: &str) -> Option<DomainKey> {
    let captures = HOST_RE.captures(url)?;
    let host = captures.get(1)?;

    if host.as_str() != REGIONAL_PORTAL {
        return Some(DomainKey(host.as_str().to_string()));
    }

    let key = match REGION_RE.captures(&url[host.end()..]).and_then(|c| c.get(1)) {
        Some(region) => format!("{}/{}", REGIONAL_PORTAL, region.as_str()),
        None => REGIONAL_PORTAL.to_string(),
    };
    Some(DomainKey(key))
}

/// Same as [`extract_domain`] for a spreadsheet cell; anything but text is absent.
pub fn extract_cell(value: &Value) -> Option<DomainKey> {
    value.as_text().and_then(extract_domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(url: &str) -> Option<String> {
        extract_domain(url).map(|k| k.as_str().to_string())
    }

    #[test]
    fn strips_scheme_and_www() {
        assert_eq!(key("https://www.example.com/page").as_deref(), Some("example.com"));
        assert_eq!(key("http://www2.example.org").as_deref(), Some("example.org"));
        assert_eq!(key("https://blog.example.com/").as_deref(), Some("blog.example.com"));
        assert_eq!(
            key("https://news.example.co.uk/a/b").as_deref(),
            Some("news.example.co.uk")
        );
    }

    #[test]
    fn host_match_stops_at_first_non_alphabetic_suffix() {
        assert_eq!(key("https://cdn.example1.com/x").as_deref(), Some("cdn.example"));
    }

    #[test]
    fn portal_region_sections() {
        assert_eq!(
            key("https://g1.globo.com/sp/noticia").as_deref(),
            Some("g1.globo.com/sp")
        );
        assert_eq!(
            key("https://www.g1.globo.com/rj/sao-paulo/x.ghtml").as_deref(),
            Some("g1.globo.com/rj")
        );
        assert_eq!(key("https://g1.globo.com/").as_deref(), Some("g1.globo.com"));
        assert_eq!(key("https://g1.globo.com").as_deref(), Some("g1.globo.com"));
        assert_eq!(
            key("https://g1.globo.com/economia/noticia").as_deref(),
            Some("g1.globo.com")
        );
        assert_eq!(key("https://g1.globo.com/SP/x").as_deref(), Some("g1.globo.com"));
        assert_eq!(key("https://g1.globo.com/sp").as_deref(), Some("g1.globo.com"));
    }

    #[test]
    fn portal_lookalike_hosts_use_general_rule() {
        assert_eq!(
            key("https://g1.globo.com.evil.net/sp/x").as_deref(),
            Some("g1.globo.com.evil.net")
        );
        assert_eq!(key("https://xg1.globo.com/sp/x").as_deref(), Some("xg1.globo.com"));
        assert_eq!(key("g1.globo.com/sp/x"), None);
    }

    #[test]
    fn malformed_input_is_absent() {
        assert_eq!(key("not a url"), None);
        assert_eq!(key("example.com"), None);
        assert_eq!(key("ftp://example.com"), None);
        assert_eq!(key(""), None);
    }

    #[test]
    fn non_text_cells_are_absent() {
        assert_eq!(extract_cell(&Value::Int(42)), None);
        assert_eq!(extract_cell(&Value::Null), None);
        assert_eq!(
            extract_cell(&Value::Text("https://example.com".into())),
            Some(DomainKey::new("example.com"))
        );
    }

    #[test]
    fn extraction_is_deterministic() {
        let url = "https://www.example.com/page?q=1";
        let first = extract_domain(url);
        for _ in 0..10 {
            assert_eq!(extract_domain(url), first);
        }
    }
}
