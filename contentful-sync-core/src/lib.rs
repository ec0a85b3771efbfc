#![doc = "contentful-sync-core: core pipelines for contentful-sync."]

//! This crate holds the delta-sync staging run, locale resolution, entry and
//! asset materialization, the webhook dispatcher and the image URL builder.
//! Transport to the remote API lives in the CLI crate; everything here talks
//! to the outside world through the traits in [`contract`].
//!
//! # Usage
//! Wire a [`store::SqliteStore`] (or any implementation of the store traits)
//! into a [`locale::LocaleResolver`] and a [`materializer::Materializer`],
//! then drive [`synchronise::sync_data`], [`synchronise::flatten`] or
//! [`webhook::EntryHandler::handle`].

pub mod cache;
pub mod codegen;
pub mod config;
pub mod contract;
pub mod error;
pub mod field;
pub mod image;
pub mod locale;
pub mod materializer;
pub mod reader;
pub mod store;
pub mod synchronise;
pub mod webhook;
