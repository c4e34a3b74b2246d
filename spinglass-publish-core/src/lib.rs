#![doc = "spinglass-publish-core: core logic library for spinglass-publish."]

//! This crate contains the publishing pipeline for spinglass articles: metadata
//! extraction, markup normalization, announcement templating, the two-phase
//! publish orchestration and incremental run tracking.
//! Network transport and authentication are not included here; they are
//! plugged in through [`contract::RepositoryClient`].
//!
//! # Usage
//! Add this as a dependency for all shared pipeline, templating and run-state code.

pub mod config;
pub mod contract;
pub mod document;
pub mod extract;
pub mod publish;
pub mod run_state;
pub mod templates;
pub mod transform;
