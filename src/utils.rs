//! Field normalization and url helpers shared by loaders and filters.

use crate::constants::files::NONE_TOKEN;
use crate::data::VoteRecord;

/// Host prefix of the article urls that carry a category path segment.
const NEWS_URL_PREFIX: &str = "http://www.nytimes.com/";

/// Trim a raw TSV field; empty and `None` placeholders become `None`.
pub fn normalize_field(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == NONE_TOKEN {
        None
    } else {
        Some(trimmed)
    }
}

/// Extract the category segment from an article url.
///
/// Accepts `<host>/YYYY/MM/DD/<category>/...` and
/// `<host>/<section>/YYYY/MM/DD/<category>/...`; at least one path segment must
/// follow the category. Returns `None` for any other shape.
pub fn extract_category(url: &str) -> Option<&str> {
    let rest = url.strip_prefix(NEWS_URL_PREFIX)?;
    let segments: Vec<&str> = rest.split('/').collect();
    let category = if is_date_path(&segments) && segments.len() >= 5 {
        segments[3]
    } else if segments.len() >= 6
        && !segments[0].is_empty()
        && segments[0].chars().all(|ch| ch.is_ascii_alphabetic())
        && is_date_path(&segments[1..])
    {
        segments[4]
    } else {
        return None;
    };
    if category.is_empty() {
        None
    } else {
        Some(category)
    }
}

/// Category of a vote: its tag column, falling back to the item url.
pub fn vote_category(vote: &VoteRecord) -> Option<&str> {
    vote.category
        .as_deref()
        .or_else(|| extract_category(&vote.item_id))
}

fn is_date_path(segments: &[&str]) -> bool {
    segments.len() >= 3
        && is_digits(segments[0], 4)
        && is_digits(segments[1], 2)
        && is_digits(segments[2], 2)
}

fn is_digits(segment: &str, len: usize) -> bool {
    segment.len() == len && segment.chars().all(|ch| ch.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_category_from_dated_urls() {
        assert_eq!(
            extract_category("http://www.nytimes.com/2011/11/02/world/europe/greece.html"),
            Some("world")
        );
        assert_eq!(
            extract_category("http://www.nytimes.com/2011/11/02/business/story.html"),
            Some("business")
        );
    }

    #[test]
    fn extracts_category_from_sectioned_urls() {
        assert_eq!(
            extract_category("http://www.nytimes.com/glogin/2011/10/05/sports/a.html"),
            Some("sports")
        );
    }

    #[test]
    fn rejects_urls_without_category_shape() {
        assert_eq!(extract_category("http://www.nytimes.com/2011/11/02/world"), None);
        assert_eq!(extract_category("http://example.com/2011/11/02/world/a"), None);
        assert_eq!(extract_category("http://www.nytimes.com/pages/world/index.html"), None);
    }

    #[test]
    fn normalize_field_drops_placeholders() {
        assert_eq!(normalize_field("  world\r"), Some("world"));
        assert_eq!(normalize_field(""), None);
        assert_eq!(normalize_field("None"), None);
    }

    #[test]
    fn vote_category_prefers_tag_column() {
        let mut vote = VoteRecord {
            tweet_id: "1".into(),
            author_id: "u".into(),
            delta_seconds: 0,
            item_id: "http://www.nytimes.com/2011/11/02/world/a.html".into(),
            category: Some("opinion".into()),
            source: None,
        };
        assert_eq!(vote_category(&vote), Some("opinion"));
        vote.category = None;
        assert_eq!(vote_category(&vote), Some("world"));
    }
}
