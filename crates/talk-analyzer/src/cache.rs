/// Redis cache for fetched talk-page sections.
///
/// Misses and Redis failures fall through to a fresh fetch, so the analyzer
/// works without Redis.
///
/// Key schema:
/// - `tpa:v1:section:{sha256(strategy|host|title|anchor)}`: JSON-serialized `Section`
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use wiki_common::redis::RedisCache;

use crate::fetch::{Section, TalkPageUrl};

const KEY_PREFIX: &str = "tpa:v1:";

#[derive(Clone)]
pub struct SectionCache {
    redis: RedisCache,
    ttl_secs: u64,
}

impl SectionCache {
    pub fn new(redis: RedisCache, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    pub async fn get(&self, strategy: &str, page: &TalkPageUrl) -> Option<Section> {
        let key = section_key(strategy, page);
        let json = self.redis.get(&key).await?;
        let section = serde_json::from_str(&json)
            .inspect_err(|e| warn!(error = %e, key, "cache deserialization failed"))
            .ok()?;
        debug!(key, "section cache hit");
        Some(section)
    }

    pub async fn set(&self, strategy: &str, page: &TalkPageUrl, section: &Section) {
        if self.ttl_secs == 0 {
            return;
        }
        let key = section_key(strategy, page);
        if let Ok(json) = serde_json::to_string(section) {
            self.redis.set_with_ttl(&key, &json, self.ttl_secs).await;
        }
    }

    pub async fn invalidate(&self, strategy: &str, page: &TalkPageUrl) {
        self.redis.delete(&section_key(strategy, page)).await;
    }
}

fn section_key(strategy: &str, page: &TalkPageUrl) -> String {
    let mut hasher = Sha256::new();
    hasher.update(strategy.as_bytes());
    hasher.update(b"|");
    hasher.update(page.cache_identity().as_bytes());
    let hash = hasher.finalize();
    format!("{KEY_PREFIX}section:{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(anchor: &str) -> TalkPageUrl {
        TalkPageUrl {
            host: "en.wikipedia.org".to_string(),
            title: "Talk:Example".to_string(),
            anchor: Some(anchor.to_string()),
        }
    }

    #[test]
    fn keys_are_namespaced_and_distinct() {
        let a = section_key("api", &page("One"));
        assert!(a.starts_with("tpa:v1:section:"));
        assert_eq!(a.len(), "tpa:v1:section:".len() + 64);
        assert_eq!(a, section_key("api", &page("One")));
        assert_ne!(a, section_key("html", &page("One")));
        assert_ne!(a, section_key("api", &page("Two")));
    }

    #[tokio::test]
    async fn disabled_redis_always_misses() {
        let cache = SectionCache::new(RedisCache::disabled(), 600);
        let page = page("One");
        let section = Section {
            page_title: "Talk:Example".to_string(),
            anchor: Some("One".to_string()),
            heading: Some("One".to_string()),
            content: "== One ==\nWP:V".to_string(),
            format: crate::fetch::SectionFormat::Wikitext,
            full_page: false,
        };
        cache.set("api", &page, &section).await;
        assert!(cache.get("api", &page).await.is_none());
    }
}
