// Archivo: translate.rs
// Propósito: convertir las entradas del snapshot en registros para el
// motor de merge.
use super::source::{Follow, Post, Profile};
use scheduler::round_timestamp;
use serde_json::json;
use std::collections::HashMap;
use sync_domain::{DomainError, Record};

pub const USERS_COLLECTION: &str = "twitter_users";
pub const POSTS_COLLECTION: &str = "tweets";
pub const FOLLOWS_COLLECTION: &str = "twitter_follows";

/// Redondeo usado para las claves de `countLogs` cuando no hay intervalo.
pub const DEFAULT_ROUND_SECS: i64 = 3600;

/// Parámetros de traducción de un tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslateOptions {
    /// Instante del tick (segundos).
    pub now: i64,
    /// Granularidad de las claves de `countLogs`.
    pub round: i64,
    /// Ventana en la que una publicación sigue acumulando impresiones.
    pub period: Option<i64>,
    /// Máximo de publicaciones por autor.
    pub limit: Option<usize>,
    pub last_synced: Option<i64>,
}

pub fn profile_record(profile: &Profile, opts: &TranslateOptions) -> Result<Record, DomainError> {
    let bucket = round_timestamp(opts.now, opts.round).to_string();
    Record::from_json(json!({
        "_id": profile.id,
        "userName": profile.user_name,
        "displayName": profile.display_name,
        "url": profile.url,
        "verified": profile.verified,
        "location": profile.location,
        "rawDescription": profile.raw_description,
        "createdAt": profile.created_at,
        "followersCount": profile.followers_count,
        "friendsCount": profile.friends_count,
        "favouritesCount": profile.favourites_count,
        "listedCount": profile.listed_count,
        "mediaCount": profile.media_count,
        "statusesCount": profile.statuses_count,
        "countLogs": {
            bucket: {
                "followersCount": profile.followers_count,
                "friendsCount": profile.friends_count,
                "favouritesCount": profile.favourites_count,
                "listedCount": profile.listed_count,
                "mediaCount": profile.media_count,
                "statusesCount": profile.statuses_count,
            }
        },
        "lastUpdatedAt": opts.now,
    }))
}

/// Las impresiones sólo se registran mientras la publicación es más joven
/// que `period`.
pub fn post_record(post: &Post, opts: &TranslateOptions) -> Result<Record, DomainError> {
    let mut doc = json!({
        "_id": post.id,
        "author": post.author,
        "authorName": post.author_name,
        "timestamp": post.timestamp,
        "url": post.url,
        "text": post.text,
        "views": post.views,
        "likes": post.likes,
        "replyCounts": post.reply_counts,
        "retweetCounts": post.retweet_counts,
        "hashTags": post.hash_tags,
        "userMentions": post.user_mentions,
        "lastUpdatedAt": opts.now,
    });
    let fresh = opts.period.map_or(true, |period| opts.now - post.timestamp < period);
    if fresh {
        doc["impressionLogs"] = json!({
            opts.now.to_string(): {
                "views": post.views,
                "likes": post.likes,
                "replyCounts": post.reply_counts,
                "retweetCounts": post.retweet_counts,
            }
        });
    }
    Record::from_json(doc)
}

pub fn follow_record(follow: &Follow) -> Result<Record, DomainError> {
    Record::from_json(json!({
        "_id": format!("{}_{}", follow.from, follow.to),
        "from": follow.from,
        "to": follow.to,
    }))
}

/// Publicaciones a procesar en el tick, de la más reciente a la más
/// antigua.
///
/// Se descartan las que ya quedaban fuera de la ventana en la última
/// sincronización (`timestamp < last_synced - period`) y se aplica `limit`
/// por autor.
pub fn select_posts<'a>(posts: &'a [Post], opts: &TranslateOptions) -> Vec<&'a Post> {
    let cutoff = match (opts.last_synced, opts.period) {
        (Some(last), Some(period)) => Some(last - period),
        _ => None,
    };
    let mut selected: Vec<&Post> = posts.iter().filter(|p| cutoff.map_or(true, |c| p.timestamp >= c)).collect();
    selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    if let Some(limit) = opts.limit {
        let mut per_author: HashMap<&str, usize> = HashMap::new();
        selected.retain(|p| {
                    let n = per_author.entry(p.author.as_str()).or_insert(0);
                    *n += 1;
                    *n <= limit
                });
    }
    selected
}
