//! Domain heuristics: well-known sites mapped to a content type word

use std::net::IpAddr;

/// Host (without `www.`) to content type. Every type word is also part of
/// the base vocabulary.
pub const DOMAIN_TYPES: &[(&str, &str)] = &[
    ("youtube.com", "video"),
    ("youtu.be", "video"),
    ("vimeo.com", "video"),
    ("twitch.tv", "video"),
    ("dailymotion.com", "video"),
    ("netflix.com", "video"),
    ("github.com", "code"),
    ("gitlab.com", "code"),
    ("bitbucket.org", "code"),
    ("codeberg.org", "code"),
    ("stackoverflow.com", "programming"),
    ("stackexchange.com", "programming"),
    ("crates.io", "programming"),
    ("docs.rs", "documentation"),
    ("readthedocs.io", "documentation"),
    ("developer.mozilla.org", "documentation"),
    ("wikipedia.org", "reference"),
    ("wiktionary.org", "reference"),
    ("arxiv.org", "research"),
    ("scholar.google.com", "research"),
    ("medium.com", "blog"),
    ("substack.com", "blog"),
    ("dev.to", "blog"),
    ("wordpress.com", "blog"),
    ("reddit.com", "social"),
    ("twitter.com", "social"),
    ("facebook.com", "social"),
    ("instagram.com", "social"),
    ("linkedin.com", "social"),
    ("mastodon.social", "social"),
    ("news.ycombinator.com", "news"),
    ("bbc.co.uk", "news"),
    ("bbc.com", "news"),
    ("nytimes.com", "news"),
    ("theguardian.com", "news"),
    ("reuters.com", "news"),
    ("amazon.com", "shopping"),
    ("ebay.com", "shopping"),
    ("etsy.com", "shopping"),
    ("aliexpress.com", "shopping"),
    ("spotify.com", "music"),
    ("soundcloud.com", "music"),
    ("bandcamp.com", "music"),
    ("coursera.org", "education"),
    ("udemy.com", "education"),
    ("edx.org", "education"),
    ("khanacademy.org", "education"),
    ("figma.com", "design"),
    ("dribbble.com", "design"),
    ("behance.net", "design"),
    ("docs.google.com", "productivity"),
    ("notion.so", "productivity"),
    ("trello.com", "productivity"),
    ("aws.amazon.com", "cloud"),
    ("cloud.google.com", "cloud"),
    ("azure.microsoft.com", "cloud"),
    ("store.steampowered.com", "gaming"),
    ("itch.io", "gaming"),
];

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Content type word for a host
///
/// Exact match on the host without `www.` first (so `aws.amazon.com` wins
/// over `amazon.com`), then the first table entry that occurs inside it.
pub fn domain_type(host: &str) -> Option<&'static str> {
    let host = host.trim().to_lowercase();
    let bare = strip_www(&host);
    if bare.is_empty() {
        return None;
    }

    DOMAIN_TYPES
        .iter()
        .find(|(domain, _)| *domain == bare)
        .or_else(|| DOMAIN_TYPES.iter().find(|(domain, _)| bare.contains(domain)))
        .map(|(_, kind)| *kind)
}

/// Registrable name without the public suffix: `docs.github.com` -> `github`
///
/// Only the last two labels are considered; IP hosts have none.
pub fn second_level_domain(host: &str) -> Option<String> {
    let host = host.trim().trim_matches(|c| c == '[' || c == ']').to_lowercase();
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }

    let labels: Vec<&str> = strip_www(&host).split('.').filter(|l| !l.is_empty()).collect();
    match labels.len() {
        0 => None,
        1 => Some(labels[0].to_string()),
        n => Some(labels[n - 2].to_string()),
    }
}
