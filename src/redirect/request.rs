//! Framework-neutral view of an inbound request, as the engine sees it

use axum::http::{HeaderMap, HeaderValue, Uri};
use regex::Regex;
use std::net::IpAddr;
use std::sync::OnceLock;
use url::Url;

/// Query parameter that lets a visitor opt out of redirection
pub const OVERRIDE_PARAM: &str = "skipredirect";

const BOT_SIGNATURES: &str = "baidu|bingbot|facebookexternalhit|googlebot|-google|ia_archiver|msnbot|naverbot|pingdom|seznambot|slurp|teoma|twitter|yandex|yeti|linkedinbot|pinterest";

fn bot_regex() -> &'static Regex {
    static BOTS: OnceLock<Regex> = OnceLock::new();
    BOTS.get_or_init(|| {
        Regex::new(&format!("(?i){}", BOT_SIGNATURES)).expect("bot signature pattern is valid")
    })
}

/// Case-insensitive crawler detection on a user-agent string
pub fn is_bot_user_agent(user_agent: &str) -> bool {
    !user_agent.is_empty() && bot_regex().is_match(user_agent)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Page,
    Admin,
    Ajax,
    Cron,
    Rest,
}

impl RequestKind {
    pub fn is_internal(self) -> bool {
        !matches!(self, RequestKind::Page)
    }

    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(RequestKind::Admin),
            "ajax" => Some(RequestKind::Ajax),
            "cron" => Some(RequestKind::Cron),
            "rest" => Some(RequestKind::Rest),
            _ => None,
        }
    }
}

/// Maps path prefixes to internal request kinds
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    prefixes: Vec<(String, RequestKind)>,
}

impl Default for RequestClassifier {
    fn default() -> Self {
        Self {
            prefixes: vec![
                ("/api/".to_string(), RequestKind::Rest),
                ("/admin".to_string(), RequestKind::Admin),
                ("/cron".to_string(), RequestKind::Cron),
            ],
        }
    }
}

impl RequestClassifier {
    /// Parse `prefix=kind` pairs separated by commas, e.g.
    /// `/api/=rest,/admin=admin,/cron=cron`
    pub fn parse(spec: &str) -> anyhow::Result<Self> {
        let mut prefixes = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (prefix, kind) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected prefix=kind, got '{}'", entry))?;
            let kind = RequestKind::parse(kind)
                .ok_or_else(|| anyhow::anyhow!("unknown request kind '{}'", kind))?;
            prefixes.push((prefix.trim().to_string(), kind));
        }
        Ok(Self { prefixes })
    }

    pub fn classify(&self, path: &str, headers: &HeaderMap) -> RequestKind {
        if let Some((_, kind)) = self
            .prefixes
            .iter()
            .find(|(prefix, _)| in_section(path, prefix))
        {
            return *kind;
        }

        let is_xhr = headers
            .get("x-requested-with")
            .and_then(|h| h.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
            .unwrap_or(false);

        if is_xhr {
            RequestKind::Ajax
        } else {
            RequestKind::Page
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedirectRequest {
    pub kind: RequestKind,
    pub is_admin: bool,
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub remote_addr: Option<IpAddr>,
}

impl RedirectRequest {
    /// Build from an absolute URL. Used by the CLI dry run and tests.
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let parsed = Url::parse(url)?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => anyhow::bail!("URL '{}' has no host", url),
        };

        Ok(Self {
            kind: RequestKind::Page,
            is_admin: false,
            scheme: parsed.scheme().to_string(),
            host,
            path: parsed.path().to_string(),
            query: parsed.query().map(str::to_string),
            headers: HeaderMap::new(),
            remote_addr: None,
        })
    }

    /// Build from the parts of an HTTP request.
    ///
    /// Scheme comes from `X-Forwarded-Proto`, host from `X-Forwarded-Host`
    /// or `Host`; both fall back to the configured site URL.
    pub fn from_http(
        uri: &Uri,
        headers: &HeaderMap,
        remote_addr: Option<IpAddr>,
        site_url: &Url,
        classifier: &RequestClassifier,
        is_admin: bool,
    ) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let scheme = header("x-forwarded-proto").unwrap_or_else(|| site_url.scheme().to_string());
        let host = header("x-forwarded-host")
            .or_else(|| header("host"))
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| site_authority(site_url));

        Self {
            kind: classifier.classify(uri.path(), headers),
            is_admin,
            scheme,
            host,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers: headers.clone(),
            remote_addr,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> anyhow::Result<Self> {
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(self)
    }

    pub fn with_remote_addr(mut self, ip: IpAddr) -> Self {
        self.remote_addr = Some(ip);
        self
    }

    pub fn with_kind(mut self, kind: RequestKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn query_string(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }

    pub fn user_agent(&self) -> &str {
        self.headers
            .get("user-agent")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("")
    }

    pub fn is_bot(&self) -> bool {
        is_bot_user_agent(self.user_agent())
    }

    pub fn has_query_param(&self, name: &str) -> bool {
        url::form_urlencoded::parse(self.query_string().as_bytes()).any(|(key, _)| key == name)
    }

    /// Absolute URL of the request with a trailing slash on the path,
    /// optionally without its query string
    pub fn current_url(&self, include_query: bool) -> String {
        let base = format!("{}://{}{}", self.scheme, self.host, self.path);
        match self.query.as_deref() {
            Some(query) if include_query && !query.is_empty() => {
                ensure_trailing_slash(&format!("{}?{}", base, query))
            }
            _ => ensure_trailing_slash(&base),
        }
    }
}

/// Whether `path` is `prefix` itself or lies below it. Prefixes match
/// whole path segments, with or without their trailing slash.
fn in_section(path: &str, prefix: &str) -> bool {
    let section = prefix.trim_end_matches('/');
    if section.is_empty() {
        return true;
    }
    match path.strip_prefix(section) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn site_authority(site_url: &Url) -> String {
    match (site_url.host_str(), site_url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

/// Ensure the path component ends in exactly one `/`, keeping any query
pub fn ensure_trailing_slash(url: &str) -> String {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };

    let mut normalized = path.trim_end_matches('/').to_string();
    normalized.push('/');
    if let Some(query) = query {
        normalized.push('?');
        normalized.push_str(query);
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_detection() {
        assert!(is_bot_user_agent(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
        ));
        assert!(is_bot_user_agent("AdsBot-Google (+http://www.google.com/adsbot.html)"));
        assert!(is_bot_user_agent("Mozilla/5.0 (compatible; YandexBot/3.0)"));
        assert!(is_bot_user_agent("Twitterbot/1.0"));
        assert!(!is_bot_user_agent(
            "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"
        ));
        assert!(!is_bot_user_agent(""));
    }

    #[test]
    fn test_trailing_slash() {
        assert_eq!(ensure_trailing_slash("https://a.test"), "https://a.test/");
        assert_eq!(ensure_trailing_slash("https://a.test/x//"), "https://a.test/x/");
        assert_eq!(
            ensure_trailing_slash("https://a.test/shop?ref=1"),
            "https://a.test/shop/?ref=1"
        );
    }

    #[test]
    fn test_current_url() {
        let request = RedirectRequest::new("https://site.test/shop?ref=xyz").unwrap();
        assert_eq!(request.current_url(true), "https://site.test/shop/?ref=xyz");
        assert_eq!(request.current_url(false), "https://site.test/shop/");
        assert_eq!(request.query_string(), "ref=xyz");
    }

    #[test]
    fn test_from_http_prefers_forwarded_host() {
        let site: Url = "http://internal:3000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("internal:3000"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("www.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        let uri: Uri = "/go/abc?x=1".parse().unwrap();

        let request = RedirectRequest::from_http(
            &uri,
            &headers,
            None,
            &site,
            &RequestClassifier::default(),
            false,
        );
        assert_eq!(request.current_url(true), "https://www.example.com/go/abc/?x=1");
        assert_eq!(request.kind, RequestKind::Page);
    }

    #[test]
    fn test_classifier() {
        let classifier = RequestClassifier::default();
        let headers = HeaderMap::new();
        assert_eq!(classifier.classify("/api/settings", &headers), RequestKind::Rest);
        assert_eq!(classifier.classify("/admin/rules", &headers), RequestKind::Admin);
        assert_eq!(classifier.classify("/cron", &headers), RequestKind::Cron);
        assert_eq!(classifier.classify("/api", &headers), RequestKind::Rest);
        assert_eq!(classifier.classify("/apiary/", &headers), RequestKind::Page);

        let mut xhr = HeaderMap::new();
        xhr.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        assert_eq!(classifier.classify("/shop/", &xhr), RequestKind::Ajax);
    }

    #[test]
    fn test_classifier_matches_whole_segments() {
        let classifier = RequestClassifier::default();
        let headers = HeaderMap::new();
        for path in ["/cronuts/", "/administrative-law/", "/admins-guide/", "/cron-jobs"] {
            assert_eq!(classifier.classify(path, &headers), RequestKind::Page, "path {}", path);
        }
        assert_eq!(classifier.classify("/admin", &headers), RequestKind::Admin);
        assert_eq!(classifier.classify("/admin/", &headers), RequestKind::Admin);
        assert_eq!(classifier.classify("/cron/daily", &headers), RequestKind::Cron);
    }

    #[test]
    fn test_classifier_parse() {
        let classifier = RequestClassifier::parse("/wp-admin=admin, /wp-json/=rest").unwrap();
        let headers = HeaderMap::new();
        assert_eq!(classifier.classify("/wp-admin/", &headers), RequestKind::Admin);
        assert_eq!(classifier.classify("/wp-json/v2", &headers), RequestKind::Rest);
        assert_eq!(classifier.classify("/api/x", &headers), RequestKind::Page);

        assert!(RequestClassifier::parse("/x=unknown").is_err());
        assert!(RequestClassifier::parse("/x").is_err());
    }

    #[test]
    fn test_override_param() {
        let request = RedirectRequest::new("https://site.test/?a=1&skipredirect").unwrap();
        assert!(request.has_query_param(OVERRIDE_PARAM));
        let request = RedirectRequest::new("https://site.test/?noskipredirect=1").unwrap();
        assert!(!request.has_query_param(OVERRIDE_PARAM));
    }
}
