use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::run_state::DeliveryMode;
use crate::templates::AUTO;
use crate::transform::CANONICAL_URL;

/// Runtime settings for a publish run. Every section is optional in the
/// file form; missing values take the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub content: ContentConfig,
    pub feed: FeedConfig,
    pub store: StoreConfig,
    pub announcement: AnnouncementConfig,
    pub delivery: DeliveryMode,
}

/// Long-form content repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub service_url: String,
    pub collection: String,
    pub theme: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            service_url: "https://bsky.social".to_string(),
            collection: "com.whtwnd.blog.entry".to_string(),
            theme: "github-light".to_string(),
        }
    }
}

/// Short-form social feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub service_url: String,
    pub collection: String,
    pub languages: Vec<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            service_url: "https://bsky.social".to_string(),
            collection: "app.bsky.feed.post".to_string(),
            languages: vec!["en".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
    /// Relative paths resolve against `root`.
    pub state_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            state_file: PathBuf::from(".atproto_last_run"),
        }
    }
}

impl StoreConfig {
    pub fn state_path(&self) -> PathBuf {
        self.root.join(&self.state_file)
    }
}

/// A human-facing link in the announcement. `url` may contain `{handle}`
/// and `{rkey}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTemplate {
    pub label: String,
    pub url: String,
}

impl LinkTemplate {
    pub fn new(label: &str, url: &str) -> Self {
        Self {
            label: label.to_string(),
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncementConfig {
    /// Template name, or `auto`.
    pub template: String,
    /// Attribution URL appended to every normalized document.
    pub canonical_url: String,
    pub links: Vec<LinkTemplate>,
    /// Additional or replacement templates, by name.
    pub templates: BTreeMap<String, String>,
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            template: AUTO.to_string(),
            canonical_url: CANONICAL_URL.to_string(),
            links: vec![
                LinkTemplate::new("Read on WhiteWind", "https://whtwnd.com/{handle}/entries/{rkey}"),
                LinkTemplate::new("View on Bluesky", "https://bsky.app/profile/{handle}/post/{rkey}"),
                LinkTemplate::new("Spin Group", CANONICAL_URL),
            ],
            templates: BTreeMap::new(),
        }
    }
}

impl PublishConfig {
    pub fn trace_loaded(&self) {
        info!(
            content_service = %self.content.service_url,
            feed_service = %self.feed.service_url,
            store_root = %self.store.root.display(),
            template = %self.announcement.template,
            template_overrides = self.announcement.templates.len(),
            delivery = ?self.delivery,
            "Loaded PublishConfig"
        );
        debug!(?self, "PublishConfig loaded (full debug)");
    }
}
