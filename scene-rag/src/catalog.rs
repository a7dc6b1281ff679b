//! Script catalog discovery and document loading.
//!
//! [`ImsdbCatalog`] scrapes the IMSDb listing page for the available titles and
//! fetches a single script page per selected title. Fetch failures are fatal
//! and surface as [`SceneRagError::SourceUnavailable`]; nothing is retried.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::config::DEFAULT_CATALOG_URL;
use crate::document::{AUTHOR_KEY, Document};
use crate::error::{Result, SceneRagError};

static LISTING_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+href="/Movie Scripts/[^"]*"[^>]*>([^<]+)</a>"#)
        .expect("listing pattern is valid")
});
static PRE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pre[^>]*>(.*)</pre>").expect("pre pattern is valid"));
static BODY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").expect("body pattern is valid"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));
static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("entity pattern is valid"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank-run pattern is valid"));
static WRITER_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"title="Scripts by ([^"]+)""#).expect("writer pattern is valid")
});

/// A source of script titles and script texts.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the ordered list of available titles.
    async fn fetch_titles(&self) -> Result<Vec<String>>;

    /// Fetch and normalize one script.
    async fn fetch_document(&self, title: &str) -> Result<Document>;
}

/// Derive a collection name from a title.
///
/// The readable part is the title's lowercase ASCII alphanumerics joined by
/// `_` (`script` when there are none), followed by the first 12 hex digits of
/// the SHA-256 of the exact title. Titles that differ in any character get
/// different collections.
///
/// ```rust
/// use scene_rag::catalog::collection_name;
///
/// let name = collection_name("Alien: Resurrection");
/// assert!(name.starts_with("alien_resurrection_"));
/// assert_ne!(name, collection_name("Alien - Resurrection"));
/// assert!(collection_name("天国と地獄").starts_with("script_"));
/// ```
pub fn collection_name(title: &str) -> String {
    let slug = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    let slug = if slug.is_empty() { "script".to_string() } else { slug };

    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("{slug}_{}", &hash[..12])
}

/// Build the script URL for a title: whitespace runs become `-`.
///
/// ```rust
/// use scene_rag::catalog::script_url;
///
/// assert_eq!(
///     script_url("https://imsdb.com", "Blade Runner"),
///     "https://imsdb.com/scripts/Blade-Runner.html"
/// );
/// ```
pub fn script_url(base_url: &str, title: &str) -> String {
    let slug = title.split_whitespace().collect::<Vec<_>>().join("-");
    format!("{}/scripts/{slug}.html", base_url.trim_end_matches('/'))
}

/// Pick a title from the catalog: exact match first, then case-insensitive.
///
/// # Errors
///
/// Returns [`SceneRagError::SelectionInvalid`] when nothing matches.
pub fn select_title(titles: &[String], input: &str) -> Result<String> {
    let input = input.trim();
    titles
        .iter()
        .find(|t| t.as_str() == input)
        .or_else(|| titles.iter().find(|t| t.eq_ignore_ascii_case(input)))
        .cloned()
        .ok_or_else(|| SceneRagError::SelectionInvalid(input.to_string()))
}

/// Parse the listing page into an ordered, de-duplicated title list.
pub fn parse_titles(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    LISTING_LINK
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()).trim().to_string())
        .filter(|title| !title.is_empty() && seen.insert(title.clone()))
        .collect()
}

/// Writer names linked from a script page, in page order.
pub fn parse_writers(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    WRITER_LINK
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()).trim().to_string())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

/// Extract and normalize the script body from a script page.
///
/// Takes everything between the first `<pre>` and the last `</pre>` (the body
/// when there is no `<pre>`), strips tags, decodes entities, trims trailing
/// whitespace per line and collapses runs of blank lines.
pub fn extract_script_text(html: &str) -> String {
    let raw = PRE_BLOCK
        .captures(html)
        .or_else(|| BODY_BLOCK.captures(html))
        .and_then(|caps| caps.get(1))
        .map_or(html, |m| m.as_str());

    let text = decode_entities(&TAG.replace_all(raw, ""));
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = text.lines().map(str::trim_end).collect::<Vec<_>>().join("\n");
    BLANK_RUN.replace_all(&text, "\n\n").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    let text = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value.and_then(char::from_u32).map(String::from).unwrap_or_default()
    });
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// A [`CatalogSource`] scraping the Internet Movie Script Database.
///
/// # Example
///
/// ```rust,ignore
/// use scene_rag::catalog::{CatalogSource, ImsdbCatalog};
///
/// let catalog = ImsdbCatalog::new("https://imsdb.com");
/// let titles = catalog.fetch_titles().await?;
/// let script = catalog.fetch_document(&titles[0]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ImsdbCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl Default for ImsdbCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_URL)
    }
}

impl ImsdbCatalog {
    /// Create a catalog rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    /// URL of the listing page.
    pub fn listing_url(&self) -> String {
        format!("{}/all-scripts.html", self.base_url.trim_end_matches('/'))
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        debug!(url, "fetching page");
        let unavailable = |message: String| {
            error!(url, %message, "fetch failed");
            SceneRagError::SourceUnavailable { url: url.to_string(), message }
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("server returned {status}")));
        }
        response.text().await.map_err(|e| unavailable(format!("failed to read body: {e}")))
    }
}

#[async_trait]
impl CatalogSource for ImsdbCatalog {
    async fn fetch_titles(&self) -> Result<Vec<String>> {
        let url = self.listing_url();
        let html = self.get_text(&url).await?;
        let titles = parse_titles(&html);
        if titles.is_empty() {
            return Err(SceneRagError::SourceUnavailable {
                url,
                message: "listing page contained no titles".to_string(),
            });
        }
        info!(title_count = titles.len(), "fetched catalog");
        Ok(titles)
    }

    async fn fetch_document(&self, title: &str) -> Result<Document> {
        let url = script_url(&self.base_url, title);
        let html = self.get_text(&url).await?;
        let text = extract_script_text(&html);
        if text.is_empty() {
            return Err(SceneRagError::SourceUnavailable {
                url,
                message: "script page contained no text".to_string(),
            });
        }

        let writers = parse_writers(&html);
        let mut document = Document::new(title, text).with_source_uri(url);
        if !writers.is_empty() {
            document = document.with_metadata(AUTHOR_KEY, writers.join(", "));
        }
        info!(title, chars = document.text.chars().count(), writers = writers.len(), "fetched script");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <h1>All Movie Scripts on IMSDb (A-Z)</h1>
        <p><a href="/Movie Scripts/10 Things I Hate About You Script.html" title="10 Things I Hate About You Script">10 Things I Hate About You</a> (1999-01)<br><i>Written by Karen McCullah Lutz</i><br></p>
        <p><a href="/Movie Scripts/Alien Script.html" title="Alien Script">Alien</a> (1979-05)<br></p>
        <p><a href="/Movie Scripts/Alien Script.html" title="Alien Script">Alien</a></p>
        <p><a href="/Movie Scripts/Fast &amp; Furious Script.html" title="Fast &amp; Furious Script">Fast &amp; Furious</a></p>
        <p><a href="/genre/Drama" title="Drama scripts">Drama</a></p>
    "#;

    #[test]
    fn listing_titles_are_ordered_and_unique() {
        assert_eq!(parse_titles(LISTING), vec!["10 Things I Hate About You", "Alien", "Fast & Furious"]);
    }

    #[test]
    fn script_text_comes_from_pre_block() {
        let html = "<html><body><table><tr><td class=\"scrtext\"><pre><b>INT. NOSTROMO - BRIDGE</b>\r\n\r\n\r\n\r\n  Lights   \r\n<b>RIPLEY</b>\nWe&#39;re &amp; done.</pre></td></tr></table>\
                    <a href=\"/writer.php?w=Dan O'Bannon\" title=\"Scripts by Dan O'Bannon\">Dan O'Bannon</a></body></html>";
        let text = extract_script_text(html);
        assert_eq!(text, "INT. NOSTROMO - BRIDGE\n\n  Lights\nRIPLEY\nWe're & done.");
        assert_eq!(parse_writers(html), vec!["Dan O'Bannon"]);
    }

    #[test]
    fn selection_prefers_exact_then_case_insensitive() {
        let titles = vec!["Alien".to_string(), "Aliens".to_string()];
        assert_eq!(select_title(&titles, " aliens ").unwrap(), "Aliens");
        assert_eq!(select_title(&titles, "Alien").unwrap(), "Alien");
        assert!(matches!(select_title(&titles, "Alien 3"), Err(SceneRagError::SelectionInvalid(_))));
    }

    #[test]
    fn collection_names_are_distinct_per_title() {
        let colon = collection_name("Alien: Resurrection");
        let dash = collection_name("Alien - Resurrection");
        assert!(colon.starts_with("alien_resurrection_"));
        assert!(dash.starts_with("alien_resurrection_"));
        assert_ne!(colon, dash);
        assert_eq!(colon, collection_name("Alien: Resurrection"));
    }

    #[test]
    fn titles_without_ascii_get_a_fallback_name() {
        let kanji = collection_name("天国と地獄");
        let other = collection_name("羅生門");
        assert!(kanji.starts_with("script_"));
        assert_eq!(kanji.len(), "script_".len() + 12);
        assert_ne!(kanji, other);
    }

    #[test]
    fn url_replaces_whitespace_runs() {
        assert_eq!(script_url("https://imsdb.com/", "Matrix,  The"), "https://imsdb.com/scripts/Matrix,-The.html");
    }
}
