//! Client-side rendering heuristic
//!
//! A page "looks dynamic" when its host is on a known allow-list, or when the
//! static HTML is short and script-heavy.

use tracing::debug;

use crate::PageFetcher;

/// Hosts whose quote content is known to require a browser render
pub static LIKELY_JS_DOMAINS: &[&str] = &[
    "ranker.com",
    "buzzfeed.com",
    "thethings.com",
    "screenrant.com",
    "cbr.com",
];

/// Script tag count above which a small page is treated as client-rendered
pub const SCRIPT_TAG_THRESHOLD: usize = 10;

/// Pages at or above this size (bytes) are assumed server-rendered
pub const SMALL_PAGE_BYTES: usize = 80_000;

/// Lowercased host of `url`, if it parses
pub fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// True when `host` is `domain` or one of its subdomains
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// True when the URL's host is on [`LIKELY_JS_DOMAINS`]
pub fn is_known_dynamic_domain(url: &str) -> bool {
    host_of(url)
        .map(|host| LIKELY_JS_DOMAINS.iter().any(|d| host_matches(&host, d)))
        .unwrap_or(false)
}

/// Content-only heuristic: many scripts in a short document
pub fn looks_dynamic_html(html: &str) -> bool {
    let scripts = count_script_tags(html);
    scripts > SCRIPT_TAG_THRESHOLD && html.len() < SMALL_PAGE_BYTES
}

fn count_script_tags(html: &str) -> usize {
    html.to_ascii_lowercase().matches("<script").count()
}

/// Decide whether `url` needs a browser render.
///
/// When `html` is absent it is fetched through `fetcher`; a failed fetch
/// counts as dynamic.
pub async fn looks_dynamic(url: &str, html: Option<&str>, fetcher: &dyn PageFetcher) -> bool {
    if is_known_dynamic_domain(url) {
        debug!("{} is on the JS domain list", url);
        return true;
    }

    match html {
        Some(html) => looks_dynamic_html(html),
        None => match fetcher.fetch(url).await {
            Ok(html) => looks_dynamic_html(&html),
            Err(e) => {
                debug!("Heuristic fetch of {} failed ({}), assuming dynamic", url, e);
                true
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpFetcher;
    use mockito::Server;

    fn page(scripts: usize, total_bytes: usize) -> String {
        let mut html = String::from("<html><head>");
        for i in 0..scripts {
            html.push_str(&format!("<script src=\"/s{}.js\"></script>", i));
        }
        html.push_str("</head><body>");
        while html.len() < total_bytes - "</body></html>".len() {
            html.push('x');
        }
        html.push_str("</body></html>");
        html
    }

    #[test]
    fn test_script_heavy_small_page_is_dynamic() {
        assert!(looks_dynamic_html(&page(15, 40_000)));
    }

    #[test]
    fn test_large_page_with_few_scripts_is_static() {
        assert!(!looks_dynamic_html(&page(2, 500_000)));
        assert!(!looks_dynamic_html(&page(15, 90_000)));
        assert!(!looks_dynamic_html(&page(10, 1_000)));
    }

    #[test]
    fn test_known_domains() {
        assert!(is_known_dynamic_domain("https://www.ranker.com/list/luffy-quotes"));
        assert!(is_known_dynamic_domain("https://cbr.com/one-piece"));
        assert!(!is_known_dynamic_domain("https://notcbr.com/page"));
        assert!(!is_known_dynamic_domain("https://epicquotes.com/luffy"));
        assert!(!is_known_dynamic_domain("garbage"));
    }

    #[tokio::test]
    async fn test_looks_dynamic_uses_supplied_html() {
        let fetcher = HttpFetcher::with_default_config().unwrap();
        let html = page(2, 500_000);
        assert!(!looks_dynamic("https://example.com/a", Some(&html), &fetcher).await);
        assert!(looks_dynamic("https://screenrant.com/a", Some(&html), &fetcher).await);
    }

    #[tokio::test]
    async fn test_looks_dynamic_fetches_when_missing() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/heavy")
            .with_status(200)
            .with_body(page(15, 40_000))
            .create_async()
            .await;
        let _err = server
            .mock("GET", "/broken")
            .with_status(503)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_config().unwrap();
        assert!(looks_dynamic(&format!("{}/heavy", server.url()), None, &fetcher).await);
        assert!(looks_dynamic(&format!("{}/broken", server.url()), None, &fetcher).await);
    }
}
