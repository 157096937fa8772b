/// Domain extraction, cleaning and ranking for TimeSetu
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use url::Url;

/// Site key recorded for the extension's own dashboard page
pub const DASHBOARD_DOMAIN: &str = "Dashboard";

static SCHEME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://").unwrap());
static WWW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^www\.").unwrap());
static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]").unwrap());

/// Resolve the domain a tracked URL is attributed to.
///
/// Only web pages count: internal pages (`chrome://`, `about:`, other
/// extensions) and unparseable strings yield `None` and are never recorded.
/// The dashboard page is the one internal page that gets its own key.
pub fn domain_from_url(url: &str, dashboard_url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    if url == dashboard_url {
        return Some(DASHBOARD_DOMAIN.to_string());
    }

    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Normalise a domain into the form used as a ledger site key
pub fn clean_website_domain(domain: &str) -> String {
    let lower = domain.to_lowercase();
    let no_scheme = SCHEME.replace(&lower, "");
    let no_www = WWW.replace(&no_scheme, "");
    no_www.strip_suffix('/').unwrap_or(&*no_www).to_string()
}

/// Turn free-form user input ("https://www.Reddit.com/r/rust") into a bare
/// domain ("reddit.com"). Empty input yields `None`.
pub fn normalize_site_input(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let no_scheme = SCHEME.replace(trimmed, "");
    let no_www = WWW.replace(&no_scheme, "");
    let host = no_www.split('/').next()?.to_lowercase();

    if host.is_empty() { None } else { Some(host) }
}

/// Lowercase and drop everything that is not `[a-z0-9]`
pub fn alnum_key(name: &str) -> String {
    NON_ALNUM.replace_all(&name.to_lowercase(), "").into_owned()
}

/// A domain matches a pattern when it is the pattern, a subdomain of it, or
/// merely contains it.
pub fn domain_matches(domain: &str, pattern: &str) -> bool {
    is_same_or_subdomain(domain, pattern) || (!pattern.is_empty() && domain.contains(pattern))
}

/// `domain` is `site` itself or one of its subdomains
pub fn is_same_or_subdomain(domain: &str, site: &str) -> bool {
    !site.is_empty() && (domain == site || domain.ends_with(&format!(".{}", site)))
}

/// Reduce a host (or a URL) to its registrable domain with smart TLD handling
///
/// Algorithm:
/// 1. Extract the hostname
/// 2. Split hostname by "."
/// 3. If TLD is 2 letters AND second-to-last is "co" or "com":
///    → Return last 3 segments (e.g., "example.com.au", "site.co.uk")
/// 4. Else:
///    → Return last 2 segments (e.g., "microsoft.com", "zinfandel.io")
///
/// Localhost and IP addresses are returned unchanged.
pub fn extract_domain(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }

    extract_hostname(url).map(|hostname| {
        if hostname == "localhost" || is_ip_address(&hostname) {
            return hostname;
        }

        let parts: Vec<&str> = hostname.split('.').collect();
        if parts.len() < 2 {
            return hostname;
        }

        let tld = parts[parts.len() - 1];
        let num_parts = if parts.len() >= 3
            && tld.len() == 2
            && matches!(parts[parts.len() - 2], "co" | "com") {
            3
        } else {
            2
        };

        parts[parts.len() - num_parts..].join(".")
    })
}

/// Lenient hostname extraction; also accepts bare site keys like "github.com"
fn extract_hostname(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let without_scheme = SCHEME.replace(trimmed, "");
    let hostname_with_port = without_scheme.split('/').next()?;

    let hostname = hostname_with_port.split(':').next()?.to_lowercase();
    if hostname.is_empty() {
        None
    } else {
        Some(hostname)
    }
}

fn is_ip_address(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Fold per-site time into per-registrable-domain time
/// ("mail.google.com" and "docs.google.com" both count toward "google.com").
pub fn time_by_domain(sites: &BTreeMap<String, u64>) -> HashMap<String, u64> {
    sites
        .iter()
        .filter_map(|(site, ms)| extract_domain(site).map(|domain| (domain, *ms)))
        .fold(HashMap::new(), |mut totals, (domain, ms)| {
            *totals.entry(domain).or_insert(0) += ms;
            totals
        })
}

/// Get the top N domains by time
pub fn top_domains(totals: &HashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut domain_vec: Vec<(String, u64)> = totals
        .iter()
        .map(|(domain, ms)| (domain.clone(), *ms))
        .collect();

    // Most time first, then by domain name ascending
    domain_vec.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    domain_vec.into_iter().take(n).collect()
}
