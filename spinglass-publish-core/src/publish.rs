//! Publish orchestration: transform → content record → announcement.
//!
//! Each document goes through two linearly ordered phases:
//!   1. **Content**: the normalized document is written to the content
//!      collection. A failure here ends the document's attempt; no
//!      announcement is made.
//!   2. **Announcement**: entered only after a successful content write. A
//!      rendered announcement linking to the new record is written to the
//!      feed collection. A failure here is logged and does not undo or mask
//!      the content write.
//!
//! Batches process one document at a time and continue past failures. A
//! digest (one synthetic "update" entry plus its announcement) may follow a
//! batch, summarizing the documents whose content phase succeeded.
//!
//! Failures never surface as `Err` from this module's batch operations; they
//! are recorded per document in [`PublishRecord`] and logged. Only run-state
//! persistence errors propagate, from [`Publisher::publish_new_only`].
//!
//! # Navigation
//! - Entrypoints: [`Publisher::publish_document`], [`Publisher::publish_batch`],
//!   [`Publisher::publish_paths`], [`Publisher::publish_new_only`]
//! - Offline: [`preview`]
//! - Helpers: [`classify_tags`], [`announcement_links`], [`digest_source`]

use chrono::{SecondsFormat, Utc};
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::{LinkTemplate, PublishConfig};
use crate::contract::{Actor, ContentEntry, FeedPost, Record, RecordRef, RepositoryClient};
use crate::document::Document;
use crate::extract::{extract, ArticleMetadata, Phase};
use crate::run_state::{now_seconds, DeliveryMode, RunStateError, RunStateTracker};
use crate::templates::{TemplateError, TemplateKey, TemplateRegistry};
use crate::transform::Transformer;

/// Upper bound on tags attached to a content record.
pub const MAX_TAGS: usize = 5;

/// Path-like identifier given to the synthetic digest document.
pub const DIGEST_PATH: &str = "digest";

const KEYWORD_TAGS: &[(&[&str], &str)] = &[
    (&["spin glass", "spinglass"], "spinglass"),
    (&["topology"], "topology"),
    (&["entropy"], "entropy"),
    (&["consensus", "network state"], "network-state"),
    (&["emergence"], "emergence"),
];

/// Outcome of one document's publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    /// Path of the source document.
    pub document: String,
    /// Set only when the content write succeeded.
    pub content_uri: Option<String>,
    /// Set only when the announcement write also succeeded.
    pub feed_uri: Option<String>,
    /// Whether the content phase succeeded; announcement failures do not clear it.
    pub succeeded: bool,
}

impl PublishRecord {
    fn failed(document: &str) -> Self {
        Self {
            document: document.to_string(),
            content_uri: None,
            feed_uri: None,
            succeeded: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub records: Vec<PublishRecord>,
    pub digest: Option<PublishRecord>,
}

impl PublishReport {
    pub fn published(&self) -> usize {
        self.records.iter().filter(|r| r.succeeded).count()
    }

    pub fn announced(&self) -> usize {
        self.records.iter().filter(|r| r.feed_uri.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.published()
    }

    pub fn all_content_succeeded(&self) -> bool {
        self.records.iter().all(|r| r.succeeded)
    }
}

/// Everything a publish of one document would send, computed offline.
#[derive(Debug, Clone)]
pub struct Preview {
    pub metadata: ArticleMetadata,
    pub tags: Vec<String>,
    pub content: String,
    pub template: TemplateKey,
    pub announcement: String,
}

/// Handle and record key substituted into links when previewing.
pub const PREVIEW_HANDLE: &str = "handle.invalid";
pub const PREVIEW_RKEY: &str = "preview";

/// Run extraction, normalization and announcement rendering without
/// touching a repository. `template` overrides the configured one.
pub fn preview(document: &Document, config: &PublishConfig, template: Option<&str>) -> Result<Preview, TemplateError> {
    let templates = TemplateRegistry::with_overrides(&config.announcement.templates)?;
    let metadata = extract(document);
    let content = Transformer::new(config.announcement.canonical_url.clone()).transform(document);
    let reference = RecordRef::new(format!(
        "at://{PREVIEW_HANDLE}/{}/{PREVIEW_RKEY}",
        config.content.collection
    ));
    let links = announcement_links(&config.announcement.links, PREVIEW_HANDLE, &reference);
    let key = templates.select(&metadata, template.unwrap_or(&config.announcement.template));
    let announcement = templates.render(&key, &metadata, &metadata.title, &metadata.excerpt, &links);
    Ok(Preview {
        tags: classify_tags(&metadata, &content),
        metadata,
        content,
        template: key,
        announcement,
    })
}

/// Drives the two-phase publish against a content and a feed repository.
pub struct Publisher<C> {
    content: C,
    feed: C,
    actor: Actor,
    config: PublishConfig,
    template: String,
    templates: TemplateRegistry,
    transformer: Transformer,
}

impl<C> Publisher<C>
where
    C: RepositoryClient,
{
    /// Build a publisher. Fails only when configured template overrides are invalid.
    pub fn new(content: C, feed: C, actor: Actor, config: PublishConfig) -> Result<Self, TemplateError> {
        let templates = TemplateRegistry::with_overrides(&config.announcement.templates)?;
        Ok(Self {
            content,
            feed,
            actor,
            template: config.announcement.template.clone(),
            transformer: Transformer::new(config.announcement.canonical_url.clone()),
            templates,
            config,
        })
    }

    /// Override the configured announcement template (`auto` or a name).
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Publish one document and its announcement.
    pub async fn publish_document(&self, document: &Document) -> PublishRecord {
        self.publish_one(document).await.0
    }

    /// Publish each document in order, continuing past failures.
    pub async fn publish_batch(&self, documents: &[Document]) -> PublishReport {
        let mut report = PublishReport::default();
        for document in documents {
            report.records.push(self.publish_one(document).await.0);
        }
        trace_report(&report);
        report
    }

    /// Publish a batch, then one digest covering the documents that made it
    /// through the content phase.
    pub async fn publish_batch_with_digest(&self, documents: &[Document]) -> PublishReport {
        let mut report = PublishReport::default();
        let mut published = Vec::new();
        for document in documents {
            let (record, metadata) = self.publish_one(document).await;
            if record.succeeded {
                published.push(metadata);
            }
            report.records.push(record);
        }
        report.digest = self.publish_digest(&published).await;
        trace_report(&report);
        report
    }

    /// Publish documents newer than the tracker's cutoff, followed by a
    /// digest, persisting the new cutoff according to the delivery mode.
    ///
    /// The stored cutoff is the time the scan started, so a document saved
    /// while the batch is running is still a candidate next run.
    pub async fn publish_new_only(&self, tracker: &RunStateTracker) -> Result<PublishReport, RunStateError> {
        let delivery = self.config.delivery;
        let cutoff = tracker.load_cutoff();
        let scan_started = now_seconds();
        let candidates = tracker.find_candidates(cutoff);
        if delivery == DeliveryMode::AtMostOnce {
            tracker.advance_cutoff_to(scan_started)?;
        }

        if candidates.is_empty() {
            info!(cutoff, "[PUBLISH] No new documents found");
            if delivery == DeliveryMode::AtLeastOnce {
                tracker.advance_cutoff_to(scan_started)?;
            }
            return Ok(PublishReport::default());
        }

        let report = self.publish_paths(&candidates, true).await;

        if delivery == DeliveryMode::AtLeastOnce {
            if report.all_content_succeeded() {
                tracker.advance_cutoff_to(scan_started)?;
            } else {
                warn!(failed = report.failed(), "[PUBLISH] Cutoff not advanced; failed documents will be retried next run");
            }
        }
        Ok(report)
    }

    /// Load and publish the documents at `paths`, optionally followed by a
    /// digest. A file that cannot be read is reported as a failed record.
    pub async fn publish_paths(&self, paths: &[PathBuf], with_digest: bool) -> PublishReport {
        let mut documents = Vec::with_capacity(paths.len());
        let mut unreadable = Vec::new();
        for path in paths {
            match Document::load(path) {
                Ok(document) => documents.push(document),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "[PUBLISH][ERROR] Skipping unreadable document");
                    unreadable.push(PublishRecord::failed(&path.display().to_string()));
                }
            }
        }

        let mut report = if with_digest {
            self.publish_batch_with_digest(&documents).await
        } else {
            self.publish_batch(&documents).await
        };
        report.records.extend(unreadable);
        report
    }

    /// Publish the digest entry for `sources`. Nothing is published for an
    /// empty slice.
    pub async fn publish_digest(&self, sources: &[ArticleMetadata]) -> Option<PublishRecord> {
        if sources.is_empty() {
            info!("[DIGEST] No published documents, skipping digest");
            return None;
        }
        let (document, metadata) = digest_source(sources);
        info!(title = %metadata.title, sources = sources.len(), "[DIGEST] Publishing digest");
        let content = self.transformer.transform(&document);
        Some(self.publish_entry(&document.path, &metadata, &content).await)
    }

    async fn publish_one(&self, document: &Document) -> (PublishRecord, ArticleMetadata) {
        info!(path = %document.path, "[PUBLISH] Processing document");
        let metadata = extract(document);
        let content = self.transformer.transform(document);
        let record = self.publish_entry(&document.path, &metadata, &content).await;
        (record, metadata)
    }

    async fn publish_entry(&self, path: &str, metadata: &ArticleMetadata, content: &str) -> PublishRecord {
        // Content phase
        let entry = ContentEntry {
            record_type: self.config.content.collection.clone(),
            title: metadata.title.clone(),
            content: content.to_string(),
            created_at: timestamp(),
            theme: self.config.content.theme.clone(),
            tags: classify_tags(metadata, content),
        };
        let content_ref = match self
            .content
            .create_record(&self.config.content.collection, Record::Content(entry))
            .await
        {
            Ok(reference) => {
                info!(path = %path, uri = %reference.uri, "[PUBLISH][CONTENT] Content record created");
                reference
            }
            Err(e) => {
                error!(path = %path, error = %e, "[PUBLISH][CONTENT][ERROR] Content publish failed; skipping announcement");
                return PublishRecord::failed(path);
            }
        };

        // Announcement phase
        let feed_uri = self.announce(path, metadata, &content_ref).await;
        PublishRecord {
            document: path.to_string(),
            content_uri: Some(content_ref.uri),
            feed_uri,
            succeeded: true,
        }
    }

    async fn announce(&self, path: &str, metadata: &ArticleMetadata, content_ref: &RecordRef) -> Option<String> {
        let links = announcement_links(&self.config.announcement.links, &self.actor.handle, content_ref);
        let key = self.templates.select(metadata, &self.template);
        let text = self
            .templates
            .render(&key, metadata, &metadata.title, &metadata.excerpt, &links);
        let post = FeedPost {
            record_type: self.config.feed.collection.clone(),
            text,
            created_at: timestamp(),
            languages: self.config.feed.languages.clone(),
        };
        match self
            .feed
            .create_record(&self.config.feed.collection, Record::Feed(post))
            .await
        {
            Ok(reference) => {
                info!(path = %path, template = %key, uri = %reference.uri, "[PUBLISH][ANNOUNCE] Announcement posted");
                Some(reference.uri)
            }
            Err(e) => {
                error!(path = %path, template = %key, error = %e, "[PUBLISH][ANNOUNCE][ERROR] Announcement failed; content record kept");
                None
            }
        }
    }
}

fn trace_report(report: &PublishReport) {
    info!(
        documents = report.records.len(),
        published = report.published(),
        announced = report.announced(),
        failed = report.failed(),
        digest = report.digest.as_ref().is_some_and(|d| d.succeeded),
        "[PUBLISH] Batch complete"
    );
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Classification tags for a content record, in priority order: phase tag,
/// `glitch`, `math`, then keyword matches in the normalized text.
/// Deduplicated and capped at [`MAX_TAGS`].
pub fn classify_tags(metadata: &ArticleMetadata, normalized: &str) -> Vec<String> {
    let text = normalized.to_lowercase();
    let candidates = metadata
        .phase
        .tag()
        .into_iter()
        .chain(metadata.has_glitch.then_some("glitch"))
        .chain(metadata.has_math.then_some("math"))
        .chain(
            KEYWORD_TAGS
                .iter()
                .filter(|(needles, _)| needles.iter().any(|n| text.contains(n)))
                .map(|(_, tag)| *tag),
        );

    let mut tags: Vec<String> = Vec::with_capacity(MAX_TAGS);
    for tag in candidates {
        if tags.len() == MAX_TAGS {
            break;
        }
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// The `{url}` block of an announcement: one `→ label: url` line per link,
/// with `{handle}` and `{rkey}` filled in from the content reference.
pub fn announcement_links(links: &[LinkTemplate], handle: &str, content: &RecordRef) -> String {
    links
        .iter()
        .map(|link| {
            let url = link.url.replace("{handle}", handle).replace("{rkey}", content.rkey());
            format!("→ {}: {}", link.label, url)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The synthetic digest document and its metadata for `sources`.
///
/// The body lists each source title as a level-2 heading followed by its
/// excerpt, both HTML-escaped since they are already decoded text. Metadata is built directly rather than extracted: the digest
/// is an `update` with both flags false.
pub fn digest_source(sources: &[ArticleMetadata]) -> (Document, ArticleMetadata) {
    let title = format!("⟨⟨SPINGL∆SS UPDATE⟩⟩ {} new nodes", sources.len());
    let mut body = format!("<body>\n<h1>{title}</h1>\n");
    for source in sources {
        body.push_str(&format!(
            "<h2>{}</h2>\n<p>{}</p>\n",
            html_escape::encode_text(&source.title),
            html_escape::encode_text(&source.excerpt)
        ));
    }
    body.push_str("</body>\n");

    let metadata = ArticleMetadata {
        title,
        excerpt: sources
            .iter()
            .map(|s| s.title.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        has_glitch: false,
        has_math: false,
        phase: Phase::Update,
    };
    (Document::new(DIGEST_PATH, body, Utc::now()), metadata)
}
