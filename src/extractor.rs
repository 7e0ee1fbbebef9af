use reqwest::{Client, ClientBuilder};
use scraper::{ElementRef, Html, Selector};
use std::time::{Duration, Instant};
use once_cell::sync::Lazy;
use crate::error::{AppError, Result};

/// Upper bound on the characters of article text handed to the model.
pub const MAX_CONTENT_CHARS: usize = 8000;

const USER_AGENT: &str = concat!("blog-quiz/", env!("CARGO_PKG_VERSION"));

// Create static selectors to avoid recompiling them each time
static NOISE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script, style, nav, footer, header, .sidebar, .comments")
        .expect("Failed to parse noise selector")
});

// Tried in order; the first one matching anything wins.
static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article",
        ".post-content",
        ".entry-content",
        ".content",
        "main",
        "[role=\"main\"]",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("Failed to parse content selector"))
    .collect()
});

static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1").expect("Failed to parse h1 selector")
});

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("title").expect("Failed to parse title selector")
});

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to parse body selector")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub content: String,
}

/// Fetches pages and reduces them to a title and normalized article text.
#[derive(Clone)]
pub struct ContentExtractor {
    client: Client,
    timeout: Duration,
}

impl ContentExtractor {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    pub async fn extract(&self, url: &str) -> Result<PageContent> {
        let html = self.fetch_html(url).await?;
        let page = extract_page(&html);
        tracing::debug!(
            url,
            title = %page.title,
            chars = page.content.chars().count(),
            "extracted page content"
        );
        Ok(page)
    }

    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let start = Instant::now();
        let fetch = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(AppError::FetchStatus(status.as_u16()));
            }
            Ok::<_, AppError>(response.text().await?)
        };

        let html = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| AppError::Timeout("Page fetch", self.timeout.as_secs()))??;

        tracing::info!(url, bytes = html.len(), elapsed = ?start.elapsed(), "fetched page");
        Ok(html)
    }
}

/// Reduces an HTML document to its title and article text.
///
/// Noise elements are detached from the tree first so that none of their
/// text can leak into either the title or the content.
pub fn extract_page(html: &str) -> PageContent {
    let mut document = Html::parse_document(html);
    strip_noise(&mut document);

    let root = document.root_element();
    let title = first_text(root, &H1_SELECTOR)
        .or_else(|| joined_text(root, &TITLE_SELECTOR))
        .unwrap_or_default();

    let content = CONTENT_SELECTORS
        .iter()
        .find_map(|selector| {
            let mut matches = root.select(selector).peekable();
            matches.peek()?;
            Some(matches.flat_map(|el| el.text()).collect::<String>())
        })
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| {
            root.select(&BODY_SELECTOR)
                .flat_map(|el| el.text())
                .collect()
        });

    PageContent {
        title: title.trim().to_string(),
        content: normalize_content(&content),
    }
}

fn strip_noise(document: &mut Html) {
    let noise: Vec<_> = document
        .root_element()
        .select(&NOISE_SELECTOR)
        .map(|el| el.id())
        .collect();

    for id in noise {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text: String = root.select(selector).next()?.text().collect();
    non_blank(text)
}

// Every match, so inline SVG `<title>`s are joined onto the document title.
fn joined_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    non_blank(root.select(selector).flat_map(|el| el.text()).collect())
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Collapses every whitespace run to one space, trims, and truncates to
/// [`MAX_CONTENT_CHARS`] characters.
pub fn normalize_content(text: &str) -> String {
    let mut result = String::with_capacity(text.len().min(MAX_CONTENT_CHARS * 4));
    let mut chars = 0;

    for word in text.split_whitespace() {
        if chars > 0 {
            if chars == MAX_CONTENT_CHARS {
                break;
            }
            result.push(' ');
            chars += 1;
        }
        for c in word.chars() {
            if chars == MAX_CONTENT_CHARS {
                break;
            }
            result.push(c);
            chars += 1;
        }
    }

    // A cut right after a separator would leave a trailing space.
    if result.ends_with(' ') {
        result.pop();
    }
    result
}
