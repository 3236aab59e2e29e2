//! Website loading from a sitemap.
//!
//! The sitemap (or one level of sitemap index) lists page URLs; each page is
//! fetched at a fixed rate and reduced to its visible text with page chrome
//! such as headers and footers removed.

use crate::config::SiteSettings;
use crate::error::{Result, SporError};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Elements whose text never reaches the index.
const SKIPPED_TAGS: &[&str] = &["header", "footer", "script", "style", "noscript", "template"];

/// Elements that end a run of text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6",
    "section", "article", "main", "aside", "nav", "blockquote", "pre", "table", "dd", "dt",
];

/// Text of one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub text: String,
}

/// Entries of a parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sitemap {
    /// A `<urlset>` of page locations.
    Pages(Vec<String>),
    /// A `<sitemapindex>` pointing at further sitemaps.
    Index(Vec<String>),
}

/// Check that `input` names a sitemap and parse it.
pub fn validate_sitemap_url(input: &str) -> Result<Url> {
    if !input.contains(".xml") {
        return Err(SporError::InvalidInput(format!(
            "Please give a sitemap URL (ending in .xml): {}",
            input
        )));
    }
    Url::parse(input).map_err(|e| SporError::InvalidInput(format!("Invalid URL {}: {}", input, e)))
}

/// Host name used to key a site's embedding cache.
pub fn cache_name(url: &Url) -> String {
    url.host_str().unwrap_or("site").to_string()
}

/// Escape `$` so the text renders literally in markdown.
pub fn escape_dollars(text: &str) -> String {
    text.replace('$', "\\$")
}

/// Parse the `<loc>` entries of a sitemap or sitemap index.
pub fn parse_sitemap(xml: &[u8]) -> Result<Sitemap> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut is_index = false;
    let mut seen_root = false;
    let mut in_loc = false;
    let mut locations = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if !seen_root {
                    seen_root = true;
                    is_index = name.as_ref() == b"sitemapindex";
                }
                if name.as_ref() == b"loc" {
                    in_loc = true;
                }
            }
            Ok(Event::Text(te)) if in_loc => {
                let loc = te
                    .unescape()
                    .map_err(|e| SporError::SiteLoad(format!("Bad sitemap entry: {}", e)))?;
                let loc = loc.trim();
                if !loc.is_empty() {
                    locations.push(loc.to_string());
                }
            }
            Ok(Event::CData(cd)) if in_loc => {
                let loc = String::from_utf8_lossy(&cd).trim().to_string();
                if !loc.is_empty() {
                    locations.push(loc);
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"loc" {
                    in_loc = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SporError::SiteLoad(format!("Invalid sitemap XML: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(SporError::SiteLoad("Sitemap is empty".to_string()));
    }

    Ok(if is_index {
        Sitemap::Index(locations)
    } else {
        Sitemap::Pages(locations)
    })
}

/// Visible text of an HTML page.
///
/// Header, footer and script content is dropped; newlines and non-breaking
/// spaces become plain spaces and whitespace runs collapse.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body = Selector::parse("body").expect("body selector");
    let root = document
        .select(&body)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    collect_text(root, &mut raw);
    collapse_whitespace(&raw.replace(['\n', '\u{a0}'], " "))
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            let tag = el.value().name();
            if SKIPPED_TAGS.contains(&tag) {
                continue;
            }
            collect_text(el, out);
            if BLOCK_TAGS.contains(&tag) {
                out.push(' ');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shortest pause between requests.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1);

/// Pause between requests for a `requests_per_second` rate.
///
/// The rate must be finite and positive. Very high rates are floored at
/// [`MIN_REQUEST_INTERVAL`].
pub fn request_interval(requests_per_second: f64) -> Result<Duration> {
    if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
        return Err(SporError::Config(format!(
            "site.requests_per_second must be a positive number, got {}",
            requests_per_second
        )));
    }
    let interval = Duration::try_from_secs_f64(1.0 / requests_per_second).unwrap_or(Duration::MAX);
    Ok(interval.max(MIN_REQUEST_INTERVAL))
}

/// Fetches every page listed in a sitemap.
pub struct SiteLoader {
    client: reqwest::Client,
    interval: Duration,
    filters: Vec<Regex>,
}

impl SiteLoader {
    pub fn new(settings: &SiteSettings) -> Result<Self> {
        let interval = request_interval(settings.requests_per_second)?;

        let filters = settings
            .filter_urls
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| SporError::Config(format!("Invalid filter_urls pattern {}: {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .user_agent(concat!("spor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SporError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            interval,
            filters,
        })
    }

    /// Whether `url` passes the configured filters.
    pub fn accepts(&self, url: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|re| re.is_match(url))
    }

    /// Load all pages of the sitemap at `sitemap_url`, in sitemap order.
    #[instrument(skip(self), fields(url = %sitemap_url))]
    pub async fn load(&self, sitemap_url: &Url) -> Result<Vec<Page>> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        ticker.tick().await;
        let urls = match parse_sitemap(&self.fetch(sitemap_url.as_str()).await?)? {
            Sitemap::Pages(urls) => urls,
            Sitemap::Index(sitemaps) => {
                info!("Sitemap index lists {} sitemaps", sitemaps.len());
                let mut urls = Vec::new();
                for child in sitemaps {
                    ticker.tick().await;
                    match parse_sitemap(&self.fetch(&child).await?)? {
                        Sitemap::Pages(found) => urls.extend(found),
                        Sitemap::Index(_) => warn!("Skipping nested sitemap index {}", child),
                    }
                }
                urls
            }
        };

        let urls: Vec<String> = urls.into_iter().filter(|u| self.accepts(u)).collect();
        info!("Loading {} pages", urls.len());

        let mut pages = Vec::with_capacity(urls.len());
        for url in urls {
            ticker.tick().await;
            let body = self.fetch(&url).await?;
            let text = page_text(&String::from_utf8_lossy(&body));
            debug!("Loaded {} ({} chars)", url, text.len());
            pages.push(Page { url, text });
        }

        Ok(pages)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SporError::SiteLoad(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SporError::SiteLoad(format!("{} returned {}", url, status)));
        }

        Ok(response
            .bytes()
            .await
            .map_err(|e| SporError::SiteLoad(format!("Reading {} failed: {}", url, e)))?
            .to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sitemap_url_must_be_xml() {
        assert!(validate_sitemap_url("https://example.com/sitemap.xml").is_ok());
        assert!(matches!(
            validate_sitemap_url("https://example.com/blog"),
            Err(SporError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_sitemap_url("not a url.xml"),
            Err(SporError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_urlset() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc> https://example.com/pricing?a=1&amp;b=2 </loc></url>
</urlset>"#;
        assert_eq!(
            parse_sitemap(xml).unwrap(),
            Sitemap::Pages(vec![
                "https://example.com/".to_string(),
                "https://example.com/pricing?a=1&b=2".to_string(),
            ])
        );
    }

    #[test]
    fn test_parse_index() {
        let xml = br#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/posts.xml</loc></sitemap>
</sitemapindex>"#;
        assert_eq!(
            parse_sitemap(xml).unwrap(),
            Sitemap::Index(vec!["https://example.com/posts.xml".to_string()])
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_sitemap(b""), Err(SporError::SiteLoad(_))));
    }

    #[test]
    fn test_page_text_drops_chrome() {
        let html = r#"<html><head><title>t</title><style>p { color: red }</style></head>
<body>
  <header><nav>Home | About</nav></header>
  <h1>Pricing</h1><p>Plans start at&nbsp;$10
  per month.</p>
  <script>var x = 1;</script>
  <footer>Copyright 2024</footer>
</body></html>"#;
        let text = page_text(html);
        assert_eq!(text, "Pricing Plans start at $10 per month.");
        assert_eq!(escape_dollars(&text), "Pricing Plans start at \\$10 per month.");
    }

    #[test]
    fn test_filters() {
        let settings = SiteSettings {
            filter_urls: vec![r"^https://example\.com/blog/".to_string()],
            ..SiteSettings::default()
        };
        let loader = SiteLoader::new(&settings).unwrap();
        assert!(loader.accepts("https://example.com/blog/post-1"));
        assert!(!loader.accepts("https://example.com/about"));

        let open = SiteLoader::new(&SiteSettings::default()).unwrap();
        assert!(open.accepts("https://anything.example/"));
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let settings = SiteSettings {
            filter_urls: vec!["(".to_string()],
            ..SiteSettings::default()
        };
        assert!(matches!(SiteLoader::new(&settings), Err(SporError::Config(_))));
    }

    #[test]
    fn test_request_interval() {
        assert_eq!(request_interval(2.0).unwrap(), Duration::from_millis(500));
        assert_eq!(request_interval(1e12).unwrap(), MIN_REQUEST_INTERVAL);
        for bad in [0.0, -1.0, f64::INFINITY, f64::NAN] {
            assert!(matches!(request_interval(bad), Err(SporError::Config(_))));
        }
    }

    #[test]
    fn test_unbounded_rate_is_rejected() {
        let settings = SiteSettings {
            requests_per_second: f64::INFINITY,
            ..SiteSettings::default()
        };
        assert!(matches!(SiteLoader::new(&settings), Err(SporError::Config(_))));
    }

    #[test]
    fn test_cache_name_is_host() {
        let url = validate_sitemap_url("https://docs.example.com/sitemap.xml").unwrap();
        assert_eq!(cache_name(&url), "docs.example.com");
    }
}
