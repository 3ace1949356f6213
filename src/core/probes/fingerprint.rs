// src/core/probes/fingerprint.rs

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::catalogue::ProbeReply;
use crate::core::error::ProbeError;
use crate::core::models::Address;
use crate::core::probes::http_client;

/// Where in the response a rule looks for its signature.
enum Check {
    Header(&'static str, &'static Lazy<Regex>),
    MetaTag(&'static str, &'static Lazy<Regex>),
    Body(&'static Lazy<Regex>),
    ScriptSrc(&'static Lazy<Regex>),
    LinkHref(&'static Lazy<Regex>),
    Cookie(&'static Lazy<Regex>),
}

struct Rule {
    tech_name: &'static str,
    category: &'static str,
    check: Check,
}

// The first capture group, when present, is the version.
static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"nginx/?([\d\.]+)?").unwrap());
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache/?([\d\.]+)?").unwrap());
static RE_CLOUDFLARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"cloudflare").unwrap());
static RE_LITESPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"LiteSpeed").unwrap());
static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"WordPress ([\d\.]+)").unwrap());
static RE_WP_EMBED: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wp-content/|/wp-includes/").unwrap());
static RE_JOOMLA: Lazy<Regex> = Lazy::new(|| Regex::new(r"Joomla!").unwrap());
static RE_PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHP/([\d\.]+)").unwrap());
static RE_PHPSESSID: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHPSESSID").unwrap());
static RE_JSESSIONID: Lazy<Regex> = Lazy::new(|| Regex::new(r"JSESSIONID").unwrap());
static RE_DJANGO_CSRF: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrftoken").unwrap());
static RE_NEXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Next\.js ?([\d\.]+)?").unwrap());
static RE_NEXTJS_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/_next/static/").unwrap());
static RE_NUXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"__NUXT__").unwrap());
static RE_ANGULAR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"ng-version="([\d\.]+)""#).unwrap());
static RE_ASTRO: Lazy<Regex> = Lazy::new(|| Regex::new(r"Astro v([\d\.]+)").unwrap());
static RE_JQUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"jquery[.-]?([\d\.]+\d)?(\.min)?\.js").unwrap());
static RE_REACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"react-dom|data-reactroot|react\.development").unwrap());
static RE_VUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-v-app|__VUE_").unwrap());
static RE_BOOTSTRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"bootstrap(\.min)?\.css").unwrap());
static RE_GOOGLE_ANALYTICS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"google-analytics\.com/|googletagmanager\.com/").unwrap());

static RULES: &[Rule] = &[
    Rule { tech_name: "Nginx", category: "Web Server", check: Check::Header("server", &RE_NGINX) },
    Rule { tech_name: "Apache", category: "Web Server", check: Check::Header("server", &RE_APACHE) },
    Rule { tech_name: "Cloudflare", category: "CDN / WAF", check: Check::Header("server", &RE_CLOUDFLARE) },
    Rule { tech_name: "LiteSpeed", category: "Web Server", check: Check::Header("server", &RE_LITESPEED) },
    Rule { tech_name: "WordPress", category: "CMS", check: Check::MetaTag("generator", &RE_WORDPRESS) },
    Rule { tech_name: "WordPress", category: "CMS", check: Check::Body(&RE_WP_EMBED) },
    Rule { tech_name: "Joomla", category: "CMS", check: Check::MetaTag("generator", &RE_JOOMLA) },
    Rule { tech_name: "PHP", category: "Language", check: Check::Header("x-powered-by", &RE_PHP) },
    Rule { tech_name: "PHP", category: "Language", check: Check::Cookie(&RE_PHPSESSID) },
    Rule { tech_name: "Java", category: "Language", check: Check::Cookie(&RE_JSESSIONID) },
    Rule { tech_name: "Python/Django", category: "Framework", check: Check::Cookie(&RE_DJANGO_CSRF) },
    Rule { tech_name: "Next.js", category: "JS Framework", check: Check::Header("x-powered-by", &RE_NEXTJS) },
    Rule { tech_name: "Next.js", category: "JS Framework", check: Check::ScriptSrc(&RE_NEXTJS_SCRIPT) },
    Rule { tech_name: "Nuxt.js", category: "JS Framework", check: Check::Body(&RE_NUXTJS) },
    Rule { tech_name: "Angular", category: "JS Framework", check: Check::Body(&RE_ANGULAR) },
    Rule { tech_name: "Astro", category: "JS Framework", check: Check::MetaTag("generator", &RE_ASTRO) },
    Rule { tech_name: "React", category: "JS Library", check: Check::Body(&RE_REACT) },
    Rule { tech_name: "Vue.js", category: "JS Library", check: Check::Body(&RE_VUE) },
    Rule { tech_name: "jQuery", category: "JS Library", check: Check::ScriptSrc(&RE_JQUERY) },
    Rule { tech_name: "Bootstrap", category: "UI Framework", check: Check::LinkHref(&RE_BOOTSTRAP) },
    Rule { tech_name: "Google Analytics", category: "Analytics", check: Check::ScriptSrc(&RE_GOOGLE_ANALYTICS) },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Technology {
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Fetches the landing page and matches its headers, cookies and markup against known signatures.
pub async fn tech_stack(address: &Address) -> Result<ProbeReply, ProbeError> {
    let url = address.url();
    info!(url = %url, "Starting fingerprint scan.");

    let response = http_client()?.get(&url).send().await?;
    let headers = response.headers().clone();
    let body = response.text().await?;
    debug!(bytes = body.len(), "Read response body.");

    let technologies = detect(&headers, &body);
    info!(count = technologies.len(), "Fingerprint scan finished.");
    if technologies.is_empty() {
        return Ok(ProbeReply::Skip("Unable to identify any technologies for this site".into()));
    }
    ProbeReply::data(&serde_json::json!({ "technologies": technologies }))
}

/// Applies every rule and merges matches by technology name, keeping the first version found.
fn detect(headers: &HeaderMap, body: &str) -> Vec<Technology> {
    let cookies = headers
        .get_all("set-cookie")
        .into_iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    let document = Html::parse_document(body);

    let mut found: BTreeMap<&str, Technology> = BTreeMap::new();
    for rule in RULES {
        let matched = match &rule.check {
            Check::Header(name, re) => check_with_regex(headers.get(*name).and_then(|v| v.to_str().ok()), re),
            Check::MetaTag(name, re) => check_meta_tag(&document, name, re),
            Check::Body(re) => check_with_regex(Some(body), re),
            Check::ScriptSrc(re) => check_attr(&document, "script[src]", "src", re),
            Check::LinkHref(re) => check_attr(&document, "link[href]", "href", re),
            Check::Cookie(re) => check_with_regex(Some(&cookies), re),
        };
        let Some(version) = matched else { continue };

        debug!(tech = rule.tech_name, version = ?version, "Rule matched.");
        found
            .entry(rule.tech_name)
            .and_modify(|tech| {
                if tech.version.is_none() {
                    tech.version = version.clone();
                }
            })
            .or_insert_with(|| Technology {
                name: rule.tech_name.to_string(),
                category: rule.category.to_string(),
                version,
            });
    }
    found.into_values().collect()
}

/// `Some(version)` when the pattern matches, where `version` is the first non-empty capture.
fn check_with_regex(text: Option<&str>, re: &Regex) -> Option<Option<String>> {
    let caps = re.captures(text?)?;
    Some(caps.get(1).map(|m| m.as_str().to_string()).filter(|s| !s.is_empty()))
}

fn check_meta_tag(doc: &Html, name: &str, re: &Regex) -> Option<Option<String>> {
    let selector = Selector::parse(&format!("meta[name='{name}']")).ok()?;
    let content = doc.select(&selector).next().and_then(|el| el.value().attr("content"));
    check_with_regex(content, re)
}

fn check_attr(doc: &Html, selector: &str, attr: &str, re: &Regex) -> Option<Option<String>> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .find_map(|value| check_with_regex(Some(value), re))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn headers_cookies_and_markup_are_all_inspected() {
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("nginx/1.25.3"));
        headers.insert("set-cookie", HeaderValue::from_static("PHPSESSID=abc; path=/"));
        let body = r#"<html><head>
            <meta name="generator" content="WordPress 6.4.2">
            <script src="/js/jquery-3.7.1.min.js"></script>
            </head><body><img src="/wp-content/uploads/a.png"></body></html>"#;

        let techs = detect(&headers, body);
        let by_name = |name: &str| techs.iter().find(|t| t.name == name).cloned();

        assert_eq!(by_name("Nginx").and_then(|t| t.version), Some("1.25.3".into()));
        assert_eq!(by_name("WordPress").and_then(|t| t.version), Some("6.4.2".into()));
        assert_eq!(by_name("jQuery").and_then(|t| t.version), Some("3.7.1".into()));
        assert!(by_name("PHP").is_some());
        assert_eq!(techs.iter().filter(|t| t.name == "WordPress").count(), 1);
    }

    #[test]
    fn a_bare_page_matches_nothing() {
        assert!(detect(&HeaderMap::new(), "<html><body>hello</body></html>").is_empty());
    }
}
