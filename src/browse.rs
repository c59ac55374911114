//! Thunderstore listing scrape and mod page URL parsing.

use crate::mod_id::ModIdentity;
use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Serialize;
use std::{sync::LazyLock, time::Duration};
use tracing::debug;
use url::Url;

const LISTING_URL: &str = "https://thunderstore.io/c/lethal-company/";
const USER_AGENT: &str = concat!("lethalkit/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ordering {
    #[default]
    LastUpdated,
    Newest,
    MostDownloaded,
    TopRated,
}

impl Ordering {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "last-updated" | "updated" => Some(Self::LastUpdated),
            "newest" | "new" => Some(Self::Newest),
            "most-downloaded" | "downloads" => Some(Self::MostDownloaded),
            "top-rated" | "rating" => Some(Self::TopRated),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastUpdated => "last-updated",
            Self::Newest => "newest",
            Self::MostDownloaded => "most-downloaded",
            Self::TopRated => "top-rated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    Mods,
    AssetReplacements,
    Libraries,
    Modpacks,
}

impl Section {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "mods" => Some(Self::Mods),
            "asset-replacements" | "assets" => Some(Self::AssetReplacements),
            "libraries" | "libs" => Some(Self::Libraries),
            "modpacks" => Some(Self::Modpacks),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mods => "mods",
            Self::AssetReplacements => "asset-replacements",
            Self::Libraries => "libraries",
            Self::Modpacks => "modpacks",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub query: String,
    pub ordering: Ordering,
    pub section: Section,
    pub page: u32,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            ordering: Ordering::default(),
            section: Section::default(),
            page: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedMod {
    pub author: String,
    pub name: String,
    pub title: String,
    pub picture: String,
}

pub fn listing_url(query: &ListingQuery) -> String {
    format!(
        "{LISTING_URL}?q={}&ordering={}&section={}&page={}",
        urlencoding::encode(&query.query),
        query.ordering.as_str(),
        query.section.as_str(),
        query.page.max(1)
    )
}

pub fn fetch_listing(query: &ListingQuery) -> Result<Vec<ListedMod>> {
    let url = listing_url(query);
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(Duration::from_secs(15))
        .build();
    debug!(%url, "fetching listing");
    let html = agent
        .get(&url)
        .set("User-Agent", USER_AGENT)
        .call()
        .with_context(|| format!("fetch {url}"))?
        .into_string()
        .context("read listing page")?;
    Ok(parse_listing(&html))
}

static PACKAGE_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="[^"]*/c/lethal-company/p/([^/"]+)/([^/"]+)/?""#)
        .expect("valid package href regex")
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<h5[^>]*>(.*?)</h5>").expect("valid title regex"));
static PICTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<img[^>]*\ssrc="([^"]*)""#).expect("valid picture regex"));
static TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").expect("valid entity regex")
});

/// Extracts one entry per result card. Cards without a title or package link
/// are skipped.
pub fn parse_listing(html: &str) -> Vec<ListedMod> {
    let mut mods = Vec::new();
    for card in html.split(r#"<div class="col-md-4"#).skip(1) {
        let Some(title) = TITLE.captures(card).map(|caps| clean_text(&caps[1])) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        let Some(href) = PACKAGE_HREF.captures(card) else {
            continue;
        };
        let picture = PICTURE
            .captures(card)
            .map(|caps| decode_entities(&caps[1]))
            .unwrap_or_default();
        mods.push(ListedMod {
            author: decode_entities(&href[1]),
            name: decode_entities(&href[2]),
            title,
            picture,
        });
    }
    mods
}

fn clean_text(raw: &str) -> String {
    let stripped = TAGS.replace_all(raw, "");
    decode_entities(stripped.trim())
}

/// Decodes numeric references and the named entities Thunderstore emits
/// (`&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`). Other named entities are kept
/// as written.
fn decode_entities(raw: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(raw, |caps: &regex::Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    numeric
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Parses `https://thunderstore.io/c/lethal-company/p/{author}/{name}/`.
pub fn parse_mod_url(raw: &str) -> Result<ModIdentity> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid mod URL: {raw}"))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|segment| !segment.is_empty()).collect())
        .unwrap_or_default();
    if segments.len() < 5 {
        bail!("mod URL has too few path segments: {raw}");
    }
    let author = segments[segments.len() - 2];
    let name = segments[segments.len() - 1];
    let id = ModIdentity::new(author, name)?;
    Ok(id)
}
