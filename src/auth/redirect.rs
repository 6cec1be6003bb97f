//! Extraction of OAuth results from the URL a provider redirected back to.
//!
//! Providers disagree on where they put their parameters. Depending on the flow
//! and on the client-side router, the same values can show up as
//!
//! - a regular query string: `https://app/?code=abc#/auth/callback`
//! - a query string inside a hash route: `https://app/#/auth/callback?code=abc`
//! - a second fragment appended after the route: `https://app/#/auth/callback#access_token=…`
//! - a fragment glued to the route without a separator: `https://app/#/auth/callback&access_token=…`
//!
//! [`RedirectParser`] runs an ordered list of [`ExtractionStrategy`] values over an
//! [`ExternalRedirect`]; the first strategy to supply a field wins it.

use percent_encoding::percent_decode_str;
use url::form_urlencoded;

/// Parameters that must not survive in the visible address after a callback.
const SENSITIVE_PARAMS: &[&str] = &[
    "code",
    "state",
    "access_token",
    "refresh_token",
    "provider_token",
    "provider_refresh_token",
    "expires_in",
    "expires_at",
    "token_type",
    "error",
    "error_code",
    "error_description",
];

/// Characters that may precede a parameter name in a raw href.
const RAW_PARAM_BOUNDARIES: &[char] = &['?', '&', '#', '/', ';'];

type Pairs = Vec<(String, String)>;

#[derive(Clone, Debug, PartialEq, Eq)]
enum FragmentSegment {
    /// A client-side route such as `/auth/callback`, optionally with a query.
    Route { path: String, query: Pairs },
    /// A bare `key=value&…` parameter list.
    Params(Pairs),
}

/// The raw components of a provider redirect, consumed once by a callback flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalRedirect {
    href: String,
    base: String,
    query: Pairs,
    fragments: Vec<FragmentSegment>,
}

impl ExternalRedirect {
    /// Splits `href` into query and fragment space. Never fails.
    pub fn parse(href: &str) -> Self {
        let (before_fragment, fragment) = match href.split_once('#') {
            Some((head, tail)) => (head, Some(tail)),
            None => (href, None),
        };
        let (base, query) = match before_fragment.split_once('?') {
            Some((base, query)) => (base, parse_pairs(query)),
            None => (before_fragment, Vec::new()),
        };

        let fragments = fragment
            .map(|fragment| {
                fragment
                    .split('#')
                    .filter(|segment| !segment.is_empty())
                    .map(parse_fragment_segment)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            href: href.to_string(),
            base: base.to_string(),
            query,
            fragments,
        }
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// Looks a parameter up in the query string, then in the hash route's query.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        lookup(&self.query, name).or_else(|| {
            self.fragments.iter().find_map(|segment| match segment {
                FragmentSegment::Route { query, .. } => lookup(query, name),
                FragmentSegment::Params(_) => None,
            })
        })
    }

    /// Looks a parameter up in the bare fragment parameter lists.
    pub fn fragment_param(&self, name: &str) -> Option<&str> {
        self.fragments.iter().find_map(|segment| match segment {
            FragmentSegment::Params(pairs) => lookup(pairs, name),
            FragmentSegment::Route { .. } => None,
        })
    }

    /// Scans the raw href for `name=value`, bounded by URL delimiters.
    pub fn raw_param(&self, name: &str) -> Option<String> {
        raw_scan(&self.href, name)
    }

    /// Whether the address looks like a fresh OAuth return.
    pub fn has_credential_indicators(&self) -> bool {
        ["code", "access_token", "provider_token"]
            .iter()
            .any(|name| self.raw_param(name).is_some())
    }

    /// The href with every credential-bearing parameter removed.
    ///
    /// Routes and unrelated parameters (such as `project`) are preserved so the
    /// page can be reloaded or shared without replaying a code or token.
    pub fn sanitized_href(&self) -> String {
        let mut href = self.base.clone();
        let query = retain_public(&self.query);
        if !query.is_empty() {
            href.push('?');
            href.push_str(&serialize_pairs(&query));
        }

        for segment in &self.fragments {
            match segment {
                FragmentSegment::Route { path, query } => {
                    let query = retain_public(query);
                    // Everything glued onto the route without a `?` is raw provider output.
                    let path = path.split('&').next().unwrap_or_default();
                    href.push('#');
                    href.push_str(path);
                    if !query.is_empty() {
                        href.push('?');
                        href.push_str(&serialize_pairs(&query));
                    }
                }
                FragmentSegment::Params(pairs) => {
                    let pairs = retain_public(pairs);
                    if !pairs.is_empty() {
                        href.push('#');
                        href.push_str(&serialize_pairs(&pairs));
                    }
                }
            }
        }

        href
    }
}

/// Typed fields extracted from a redirect. Derived, never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCredentialFields {
    pub error_code: Option<String>,
    pub error_description: Option<String>,
    pub authorization_code: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub provider_token: Option<String>,
    pub provider_refresh_token: Option<String>,
    /// Strategies that contributed at least one field, in application order.
    pub strategies: Vec<ExtractionStrategy>,
}

impl ParsedCredentialFields {
    pub fn has_error(&self) -> bool {
        self.error_code.is_some() || self.error_description.is_some()
    }

    /// `true` when the redirect carried nothing usable.
    pub fn is_empty(&self) -> bool {
        !self.has_error()
            && self.authorization_code.is_none()
            && self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.provider_token.is_none()
            && self.provider_refresh_token.is_none()
    }

    fn has_credential(&self) -> bool {
        !self.has_error() && !self.is_empty()
    }
}

/// One way of locating credential fields in a redirect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtractionStrategy {
    /// `error` / `error_description` anywhere; suppresses every other field.
    ProviderError,
    /// `code` in the query string (or the hash route's query).
    QueryCode,
    /// `code` in a bare fragment parameter list.
    FragmentCode,
    /// `access_token` in a bare fragment parameter list.
    FragmentAccessToken,
    /// `refresh_token` in a bare fragment parameter list.
    FragmentRefreshToken,
    /// `provider_token` / `provider_refresh_token` in a bare fragment parameter list.
    FragmentProviderToken,
    /// Pattern scan of the raw href, used when nothing structured matched.
    RawScan,
}

/// Order in which [`RedirectParser::default`] applies its strategies.
pub const DEFAULT_STRATEGIES: [ExtractionStrategy; 7] = [
    ExtractionStrategy::ProviderError,
    ExtractionStrategy::QueryCode,
    ExtractionStrategy::FragmentCode,
    ExtractionStrategy::FragmentAccessToken,
    ExtractionStrategy::FragmentRefreshToken,
    ExtractionStrategy::FragmentProviderToken,
    ExtractionStrategy::RawScan,
];

impl ExtractionStrategy {
    /// Fills the fields this strategy knows about. Returns whether it supplied any.
    fn apply(self, redirect: &ExternalRedirect, fields: &mut ParsedCredentialFields) -> bool {
        match self {
            ExtractionStrategy::ProviderError => {
                let code = structured_or_raw(redirect, "error");
                let description = structured_or_raw(redirect, "error_description");
                if code.is_none() && description.is_none() {
                    return false;
                }
                *fields = ParsedCredentialFields {
                    error_code: code,
                    error_description: description,
                    ..Default::default()
                };
                true
            }
            ExtractionStrategy::QueryCode => fill(
                &mut fields.authorization_code,
                redirect.query_param("code"),
            ),
            ExtractionStrategy::FragmentCode => fill(
                &mut fields.authorization_code,
                redirect.fragment_param("code"),
            ),
            ExtractionStrategy::FragmentAccessToken => fill(
                &mut fields.access_token,
                redirect.fragment_param("access_token"),
            ),
            ExtractionStrategy::FragmentRefreshToken => fill(
                &mut fields.refresh_token,
                redirect.fragment_param("refresh_token"),
            ),
            ExtractionStrategy::FragmentProviderToken => {
                let token = fill(
                    &mut fields.provider_token,
                    redirect.fragment_param("provider_token"),
                );
                let refresh = fill(
                    &mut fields.provider_refresh_token,
                    redirect.fragment_param("provider_refresh_token"),
                );
                token || refresh
            }
            ExtractionStrategy::RawScan => {
                if fields.has_credential() {
                    return false;
                }
                let mut found = false;
                for (slot, name) in [
                    (&mut fields.authorization_code, "code"),
                    (&mut fields.access_token, "access_token"),
                    (&mut fields.refresh_token, "refresh_token"),
                    (&mut fields.provider_token, "provider_token"),
                    (&mut fields.provider_refresh_token, "provider_refresh_token"),
                ] {
                    if slot.is_none() {
                        if let Some(value) = redirect.raw_param(name) {
                            *slot = Some(value);
                            found = true;
                        }
                    }
                }
                found
            }
        }
    }
}

/// Ordered list of extraction strategies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectParser {
    strategies: Vec<ExtractionStrategy>,
}

impl Default for RedirectParser {
    fn default() -> Self {
        Self {
            strategies: DEFAULT_STRATEGIES.to_vec(),
        }
    }
}

impl RedirectParser {
    /// Builds a parser with a custom strategy order.
    pub fn with_strategies(strategies: impl IntoIterator<Item = ExtractionStrategy>) -> Self {
        Self {
            strategies: strategies.into_iter().collect(),
        }
    }

    pub fn strategies(&self) -> &[ExtractionStrategy] {
        &self.strategies
    }

    /// Extracts every credential field the configured strategies can find.
    ///
    /// A provider error short-circuits: the result then only carries the error.
    pub fn parse(&self, redirect: &ExternalRedirect) -> ParsedCredentialFields {
        let mut fields = ParsedCredentialFields::default();
        for strategy in &self.strategies {
            if strategy.apply(redirect, &mut fields) {
                fields.strategies.push(*strategy);
                if *strategy == ExtractionStrategy::ProviderError {
                    break;
                }
            }
        }
        fields
    }

    pub fn parse_href(&self, href: &str) -> ParsedCredentialFields {
        self.parse(&ExternalRedirect::parse(href))
    }
}

/// Parses `href` with the default strategy order.
pub fn parse_redirect(href: &str) -> ParsedCredentialFields {
    RedirectParser::default().parse_href(href)
}

fn parse_fragment_segment(segment: &str) -> FragmentSegment {
    let is_route = segment.starts_with('/') || !segment.contains('=');
    if !is_route {
        return FragmentSegment::Params(parse_pairs(segment));
    }
    match segment.split_once('?') {
        Some((path, query)) => FragmentSegment::Route {
            path: path.to_string(),
            query: parse_pairs(query),
        },
        None => FragmentSegment::Route {
            path: segment.to_string(),
            query: Vec::new(),
        },
    }
}

fn parse_pairs(raw: &str) -> Pairs {
    let raw = raw.trim_start_matches(['?', '&']);
    form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn serialize_pairs(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn retain_public(pairs: &[(String, String)]) -> Pairs {
    pairs
        .iter()
        .filter(|(key, _)| !SENSITIVE_PARAMS.contains(&key.as_str()))
        .cloned()
        .collect()
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.as_str())
}

fn fill(slot: &mut Option<String>, value: Option<&str>) -> bool {
    match (slot.is_none(), value) {
        (true, Some(value)) => {
            *slot = Some(value.to_string());
            true
        }
        _ => false,
    }
}

fn structured_or_raw(redirect: &ExternalRedirect, name: &str) -> Option<String> {
    redirect
        .query_param(name)
        .or_else(|| redirect.fragment_param(name))
        .map(str::to_string)
        .or_else(|| redirect.raw_param(name))
}

fn raw_scan(href: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=");
    let mut offset = 0;
    while let Some(position) = href[offset..].find(&needle) {
        let start = offset + position;
        let bounded = start == 0
            || href[..start]
                .chars()
                .next_back()
                .is_some_and(|previous| RAW_PARAM_BOUNDARIES.contains(&previous));
        if bounded {
            let value_start = start + needle.len();
            let value_end = href[value_start..]
                .find(['&', '#'])
                .map(|end| value_start + end)
                .unwrap_or(href.len());
            let raw_value = &href[value_start..value_end];
            if !raw_value.is_empty() {
                return Some(decode_component(raw_value));
            }
        }
        offset = start + needle.len();
    }
    None
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
