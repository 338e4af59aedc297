//! CORS Origin Policy
//!
//! Browser callers (the production site, Framer previews, localhost) are
//! matched against an allowlist. Allowed origins are echoed back; anything
//! else receives the production origin so that the browser blocks it.

/// Origins accepted when `CORS_ALLOWED_ORIGINS` is not set
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://ofinova-madrid.es",
    "https://www.ofinova-madrid.es",
    "https://*.framer.app",
    "https://ofinova.vercel.app",
    "http://localhost:3000",
];

/// Origin sent back to callers that are not allowed
pub const DEFAULT_FALLBACK_ORIGIN: &str = "https://ofinova-madrid.es";

/// Allowlist with a fallback origin
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
    fallback: String,
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_ALLOWED_ORIGINS.iter().map(ToString::to_string),
            DEFAULT_FALLBACK_ORIGIN,
        )
    }
}

impl OriginPolicy {
    pub fn new(allowed: impl IntoIterator<Item = String>, fallback: impl Into<String>) -> Self {
        Self {
            allowed: allowed
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            fallback: fallback.into(),
        }
    }

    /// Parse a comma-separated allowlist (`CORS_ALLOWED_ORIGINS` format)
    pub fn from_list(list: &str, fallback: impl Into<String>) -> Self {
        Self::new(list.split(',').map(str::to_string), fallback)
    }

    /// Build from `CORS_ALLOWED_ORIGINS` / `CORS_DEFAULT_ORIGIN`
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let fallback = get("CORS_DEFAULT_ORIGIN")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FALLBACK_ORIGIN.into());

        match get("CORS_ALLOWED_ORIGINS") {
            Some(list) => Self::from_list(&list, fallback),
            None => Self::new(DEFAULT_ALLOWED_ORIGINS.iter().map(ToString::to_string), fallback),
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        !origin.is_empty()
            && self
                .allowed
                .iter()
                .any(|pattern| matches_pattern(pattern, origin))
    }

    /// Value for `Access-Control-Allow-Origin`
    pub fn resolve(&self, origin: Option<&str>) -> String {
        if self.allowed.is_empty() {
            return "*".into();
        }
        match origin {
            Some(origin) if self.is_allowed(origin) => origin.to_string(),
            _ => self.fallback.clone(),
        }
    }
}

/// Exact match, or `scheme://*.host` wildcard match on the host part
pub fn matches_pattern(pattern: &str, origin: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == origin;
    }

    let (Some((pattern_scheme, host_pattern)), Some((origin_scheme, origin_host))) =
        (pattern.split_once("://"), origin.split_once("://"))
    else {
        return false;
    };

    pattern_scheme.eq_ignore_ascii_case(origin_scheme)
        && !origin_host.is_empty()
        && !origin_host.contains('/')
        && glob_match(host_pattern.as_bytes(), origin_host.as_bytes())
}

/// `*` matches any run of characters (including none)
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|skip| glob_match(rest, &text[skip..])),
        Some((c, rest)) => text
            .split_first()
            .is_some_and(|(t, text_rest)| t.eq_ignore_ascii_case(c) && glob_match(rest, text_rest)),
    }
}
