//! Service alerts from a GTFS-realtime alert feed, and the posts of the TTC
//! alerts account on Bluesky.

use serde::Serialize;

use crate::feeds::bluesky::AuthorFeed;
use crate::gtfs_rt::{FeedMessage, TranslatedString};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSummary {
    pub id: String,
    pub header: String,
    pub description: Option<String>,
    /// Route ids named by the alert's informed entities, deduplicated.
    pub routes: Vec<String>,
    pub active_from: Option<u64>,
    pub active_until: Option<u64>,
}

/// The English translation if present, otherwise the first one.
fn text(s: &TranslatedString) -> Option<&str> {
    s.translation
        .iter()
        .find(|t| t.language.as_deref().is_some_and(|l| l.starts_with("en")))
        .or_else(|| s.translation.first())
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
}

/// One summary per alert entity that has header text.
pub fn summaries(feed: &FeedMessage) -> Vec<AlertSummary> {
    feed.entity
        .iter()
        .filter(|e| !e.is_deleted())
        .filter_map(|e| {
            let alert = e.alert.as_ref()?;
            let header = alert.header_text.as_ref().and_then(text)?.to_string();
            let description = alert
                .description_text
                .as_ref()
                .and_then(text)
                .filter(|d| *d != header)
                .map(str::to_string);

            let mut routes: Vec<String> = Vec::new();
            for entity in &alert.informed_entity {
                let route = entity.route_id();
                if !route.is_empty() && !routes.iter().any(|r| r == route) {
                    routes.push(route.to_string());
                }
            }

            let period = alert.active_period.first();
            Some(AlertSummary {
                id: e.id.clone(),
                header,
                description,
                routes,
                active_from: period.and_then(|p| p.start),
                active_until: period.and_then(|p| p.end),
            })
        })
        .collect()
}

/// Alerts that name any of `lines` as an informed route.
pub fn for_lines<'a>(alerts: &'a [AlertSummary], lines: &[&str]) -> Vec<&'a AlertSummary> {
    alerts
        .iter()
        .filter(|a| a.routes.iter().any(|r| lines.contains(&r.as_str())))
        .collect()
}

/// A post from the alerts account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocialAlert {
    pub text: String,
    pub created_at: Option<String>,
    pub uri: String,
}

/// The account's own posts, newest first as served; reposts and empty
/// posts are dropped.
pub fn social_alerts(feed: AuthorFeed) -> Vec<SocialAlert> {
    feed.feed
        .into_iter()
        .filter(|item| item.reason.is_none())
        .filter(|item| !item.post.record.text.trim().is_empty())
        .map(|item| SocialAlert {
            text: item.post.record.text.trim().to_string(),
            created_at: item.post.record.created_at,
            uri: item.post.uri,
        })
        .collect()
}

/// Posts mentioning any of `lines` as a whole word, e.g. `"504 King"`.
pub fn social_for_lines<'a>(alerts: &'a [SocialAlert], lines: &[&str]) -> Vec<&'a SocialAlert> {
    alerts
        .iter()
        .filter(|a| {
            a.text
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|word| lines.contains(&word))
        })
        .collect()
}
