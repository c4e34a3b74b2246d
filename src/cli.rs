//! This module implements the CLI for spinglass-publish: command parsing,
//! argument validation and the async entrypoint.
//!
//! All pipeline logic (extraction, normalization, templating, the two-phase
//! publish and run tracking) lives in the `spinglass-publish-core` crate.
//! This module only wires configuration, credentials and the XRPC client
//! into it.
//!
//! ## How To Use
//! - From the command line: `spinglass-publish --help`.
//! - Programmatically or from integration tests: call [`run`] with a
//!   constructed [`Cli`].
use crate::client::AtprotoClient;
use crate::load_config::{load_config, load_credentials};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use spinglass_publish_core::document::Document;
use spinglass_publish_core::publish::{preview, PublishRecord, PublishReport, Publisher};
use spinglass_publish_core::run_state::RunStateTracker;
use std::path::{Path, PathBuf};

/// CLI for spinglass-publish: publish articles and their announcements.
#[derive(Parser)]
#[clap(
    name = "spinglass-publish",
    version,
    about = "Publish spinglass HTML articles as long-form AT Protocol entries with feed announcements"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish documents and announce them on the feed
    Publish {
        /// Path to the YAML config file (defaults apply when omitted)
        #[clap(long)]
        config: Option<PathBuf>,
        #[clap(flatten)]
        target: Target,
        /// Announcement template name, or `auto`
        #[clap(long)]
        template: Option<String>,
    },
    /// Show what publishing a document would send, without credentials or network
    Preview {
        /// Document to preview
        #[clap(long)]
        file: PathBuf,
        /// Announcement template name, or `auto`
        #[clap(long)]
        template: Option<String>,
        /// Path to the YAML config file (defaults apply when omitted)
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Which documents to publish. Exactly one must be given.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct Target {
    /// Every document in the store
    #[arg(long)]
    pub all: bool,
    /// A single document
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Documents changed since the last run, followed by a digest post
    #[arg(long)]
    pub new_only: bool,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Publish {
            config,
            target,
            template,
        } => publish(config.as_deref(), target, template).await,
        Commands::Preview {
            file,
            template,
            config,
        } => print_preview(&file, template.as_deref(), config.as_deref()),
    }
}

async fn publish(config_path: Option<&Path>, target: Target, template: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let credentials = load_credentials()?;
    tracing::info!(command = "publish", ?target, "Starting publish run");

    let content = AtprotoClient::login(&config.content.service_url, &credentials.handle, &credentials.password)
        .await
        .context("Failed to authenticate against the content service")?;
    let feed = AtprotoClient::login(&config.feed.service_url, &credentials.handle, &credentials.password)
        .await
        .context("Failed to authenticate against the feed service")?;
    let actor = content.actor();

    let mut publisher = Publisher::new(content, feed, actor, config.clone())?;
    if let Some(template) = template {
        publisher = publisher.with_template(template);
    }
    let tracker = RunStateTracker::new(&config.store.root, config.store.state_path());

    let report = if let Some(file) = target.file {
        let document = Document::load(&file)?;
        PublishReport {
            records: vec![publisher.publish_document(&document).await],
            digest: None,
        }
    } else if target.all {
        publisher.publish_paths(&tracker.all_documents(), false).await
    } else {
        publisher.publish_new_only(&tracker).await?
    };

    print_report(&report);
    tracing::info!(
        command = "publish",
        published = report.published(),
        failed = report.failed(),
        "Publish run complete"
    );
    Ok(())
}

fn print_report(report: &PublishReport) {
    if report.records.is_empty() {
        println!("No new articles found");
        return;
    }
    for record in &report.records {
        print_record(record);
    }
    if let Some(digest) = &report.digest {
        print_record(digest);
    }
    println!(
        "{} published, {} announced, {} failed",
        report.published(),
        report.announced(),
        report.failed()
    );
}

fn print_record(record: &PublishRecord) {
    match (&record.content_uri, &record.feed_uri) {
        (Some(content), Some(feed)) => println!("✓ {} → {} (announced {})", record.document, content, feed),
        (Some(content), None) => println!("✓ {} → {} (announcement failed)", record.document, content),
        _ => println!("✗ {} not published", record.document),
    }
}

fn print_preview(file: &Path, template: Option<&str>, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let document = Document::load(file)?;
    let preview = preview(&document, &config, template)?;
    tracing::info!(command = "preview", path = %file.display(), template = %preview.template, "Rendered preview");

    let metadata = &preview.metadata;
    println!("title:    {}", metadata.title);
    println!("excerpt:  {}", metadata.excerpt);
    println!("phase:    {}", metadata.phase);
    println!("glitch:   {}", metadata.has_glitch);
    println!("math:     {}", metadata.has_math);
    println!("tags:     {}", preview.tags.join(", "));
    println!("template: {}", preview.template);
    println!();
    println!("--- announcement ({} chars) ---", preview.announcement.chars().count());
    println!("{}", preview.announcement);
    println!();
    println!("--- content ---");
    println!("{}", preview.content);
    Ok(())
}
