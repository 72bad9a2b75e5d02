//! Link relation extraction from `Link` headers and HTML documents.

use axum::http::{header::LINK, HeaderMap};
use regex::Regex;
use url::Url;

/// Ordered `rel -> target` pairs in the order they were found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rels {
    entries: Vec<(String, Url)>,
}

impl Rels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rel: &str, target: Url) {
        self.entries.push((rel.to_ascii_lowercase(), target));
    }

    /// All targets for `rel`, in document order.
    pub fn get<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Url> + 'a {
        self.entries
            .iter()
            .filter(move |(name, _)| name.eq_ignore_ascii_case(rel))
            .map(|(_, target)| target)
    }

    #[must_use]
    pub fn first(&self, rel: &str) -> Option<&Url> {
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(rel))
            .map(|(_, target)| target)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Parse every `Link` header value (RFC 8288), resolving targets against `base`.
#[must_use]
pub fn from_link_headers(headers: &HeaderMap, base: &Url) -> Rels {
    let mut rels = Rels::new();
    for value in headers.get_all(LINK) {
        if let Ok(value) = value.to_str() {
            parse_link_value(value, base, &mut rels);
        }
    }
    rels
}

fn parse_link_value(value: &str, base: &Url, rels: &mut Rels) {
    // A link is `<target>` followed by `;`-separated params up to the next `<`.
    let (Ok(link_re), Ok(rel_re)) = (
        Regex::new(r"<([^>]*)>([^<]*)"),
        Regex::new(r#"(?i)(?:^|;)\s*rel\s*=\s*(?:"([^"]*)"|([^\s;,]+))"#),
    ) else {
        return;
    };

    for link in link_re.captures_iter(value) {
        let Some(target) = link.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        let params = link.get(2).map_or("", |m| m.as_str());
        let Some(rel) = rel_re
            .captures(params)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
        else {
            continue;
        };
        let Ok(target) = base.join(target) else {
            continue;
        };
        for name in rel.as_str().split_whitespace() {
            rels.push(name, target.clone());
        }
    }
}

/// Extract rels from `<link>`, `<a>` and `<area>` elements of an HTML
/// document.
///
/// The first `<base href>` element changes the URL relative targets resolve
/// against; later ones are ignored.
#[must_use]
pub fn from_html(body: &str, base: &Url) -> Rels {
    let mut rels = Rels::new();
    let (Ok(comment_re), Ok(tag_re), Ok(attr_re)) = (
        Regex::new(r"(?s)<!--.*?-->"),
        Regex::new(r"(?is)<(link|a|area|base)\b([^>]*)>"),
        Regex::new(
            r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*(?:=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#,
        ),
    ) else {
        return rels;
    };

    let body = comment_re.replace_all(body, "");
    let mut base = base.clone();
    let mut base_seen = false;

    for tag in tag_re.captures_iter(&body) {
        let name = tag.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
        let attrs = tag.get(2).map_or("", |m| m.as_str());

        let mut rel = None;
        let mut href = None;
        for attr in attr_re.captures_iter(attrs) {
            let Some(key) = attr.get(1) else {
                continue;
            };
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .or_else(|| attr.get(4))
                .map(|m| decode_entities(m.as_str()));
            match key.as_str().to_ascii_lowercase().as_str() {
                "rel" => rel = value,
                "href" => href = value,
                _ => {}
            }
        }

        let Some(href) = href else {
            continue;
        };
        let Ok(target) = base.join(href.trim()) else {
            continue;
        };

        if name == "base" {
            if !base_seen {
                base = target;
                base_seen = true;
            }
            continue;
        }

        if let Some(rel) = rel {
            for name in rel.split_whitespace() {
                rels.push(name, target.clone());
            }
        }
    }

    rels
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
