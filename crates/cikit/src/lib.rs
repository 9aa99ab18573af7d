//! # cikit
//!
//! Declarative engine for the configuration items (CIs) of a remote
//! management platform.
//!
//! This crate provides functionality for:
//! - Parsing the block-structured `.ci` format into a typed object model
//! - Reading the current model back from the live platform
//! - Computing the minimal ordered delta between target and current
//! - Emitting that delta as administrative protocol commands
//! - Writing models back as canonical, round-trip safe text
//!
//! ## Example
//!
//! ```no_run
//! use cikit::transport::process::ProcessTransport;
//! use cikit::{CiFile, Client, Kind, RunCache, Stamp};
//! use std::path::PathBuf;
//!
//! let client = Client::new(Box::new(ProcessTransport::new("mql", vec!["-t".into()])));
//!
//! // Export a live object as declarative text
//! let text = client.export(Kind::Rule, "Confidential").expect("export failed");
//!
//! // Plan and apply the file back
//! let file = CiFile {
//!     kind: Kind::Rule,
//!     name: "Confidential".into(),
//!     path: PathBuf::from("rule/Confidential.ci"),
//!     modified: chrono::Utc::now(),
//!     sub_path: "rule".into(),
//! };
//! let mut cache = RunCache::new();
//! client.preload(&mut cache, &[Kind::Rule]).expect("listing failed");
//! let plan = client.plan(&file, &text, &cache, &Stamp::now("cisync")).expect("plan failed");
//! client.apply(&plan).expect("apply failed");
//! ```
//!
//! ## Retry Logic
//!
//! The engine never retries. Read queries made by the [`Client`] (listings
//! and dumps) can be retried with exponential backoff when the platform is
//! unreachable; configure this with [`RetryConfig`]. Update batches are
//! never re-sent.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod delta;
pub mod emit;
pub mod error;
pub mod kind;
pub mod live;
pub mod model;
pub mod parser;
pub mod retry;
pub mod sync;
pub mod token;
pub mod transport;
pub mod writer;

pub use cache::RunCache;
pub use delta::{Operation, apply_operations, compute_delta};
pub use emit::{CommandBatch, EmitOptions, emit};
pub use error::{Error, ErrorCategory, Result};
pub use kind::Kind;
pub use live::LiveFormat;
pub use model::{CiObject, Origin, PropertyMap, Record, RecordKey, Value};
pub use parser::parse_document;
pub use retry::RetryConfig;
pub use sync::{CiFile, Plan, Stamp, plan_update};
pub use writer::{check_round_trip, write_string};

use log::debug;
use transport::Transport;

/// High-level client for one platform.
///
/// The client wraps a transport and provides the operations a run needs:
/// listing, fetching, exporting, planning and applying.
pub struct Client {
    transport: Box<dyn Transport>,
    retry: RetryConfig,
    format: LiveFormat,
    emit_options: EmitOptions,
}

impl Client {
    /// Create a client with default retry, readback and emit settings.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryConfig::default(),
            format: LiveFormat::default(),
            emit_options: EmitOptions::default(),
        }
    }

    /// Retry transport calls that fail to reach the platform.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Use custom readback sentinels.
    pub fn with_format(mut self, format: LiveFormat) -> Self {
        self.format = format;
        self
    }

    /// Wrap every batch with a prefix and suffix.
    pub fn with_emit_options(mut self, options: EmitOptions) -> Self {
        self.emit_options = options;
        self
    }

    /// Readback sentinels in use.
    pub fn format(&self) -> &LiveFormat {
        &self.format
    }

    /// Send a read-only query, retrying per the configured policy.
    fn call(&self, commands: &str) -> Result<String> {
        retry::with_retry(&self.retry, Some(&retry::LogCallback), || {
            self.transport.execute(commands)
        })
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// List the names of all live objects of a kind.
    pub fn list_names(&self, kind: Kind) -> Result<Vec<String>> {
        let output = self.call(&self.format.list_command(kind))?;
        Ok(live::parse_names(&output, &self.format))
    }

    /// Load name listings for the given kinds into a run cache.
    pub fn preload(&self, cache: &mut RunCache, kinds: &[Kind]) -> Result<()> {
        for &kind in kinds {
            let names = self.list_names(kind)?;
            debug!("{kind}: {} live object(s)", names.len());
            cache.insert(kind, names);
        }
        Ok(())
    }

    /// Read the current model of one object.
    pub fn fetch(&self, kind: Kind, name: &str) -> Result<CiObject> {
        let output = self
            .call(&self.format.print_command(kind, name))
            .map_err(|e| e.in_ci(kind, name))?;
        live::parse_live(kind, name, &output, &self.format).map_err(|e| e.in_ci(kind, name))
    }

    /// Read the current model if the object exists.
    ///
    /// Existence comes from the run cache; kinds not listed in this run are
    /// listed on demand.
    pub fn fetch_existing(
        &self,
        kind: Kind,
        name: &str,
        cache: &RunCache,
    ) -> Result<Option<CiObject>> {
        let exists = match cache.contains(kind, name) {
            Some(exists) => exists,
            None => self.list_names(kind)?.iter().any(|n| n == name),
        };
        if exists {
            self.fetch(kind, name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Export one live object as canonical declarative text.
    pub fn export(&self, kind: Kind, name: &str) -> Result<String> {
        let current = self.fetch(kind, name)?;
        check_round_trip(&current)
    }

    // =========================================================================
    // Updating
    // =========================================================================

    /// Plan the update of one CI file against the live platform.
    pub fn plan(&self, file: &CiFile, text: &str, cache: &RunCache, stamp: &Stamp) -> Result<Plan> {
        let current = self
            .fetch_existing(file.kind, &file.name, cache)
            .map_err(|e| e.in_ci(file.kind, &file.name))?;
        plan_update(file, text, current.as_ref(), stamp, &self.emit_options)
    }

    /// Send a planned batch.
    ///
    /// Sent exactly once, even with a retry policy; only reads are retried.
    /// A rejected batch is returned as [`Error::Transport`] with the
    /// platform's message and the batch, wrapped with the CI it was for.
    pub fn apply(&self, plan: &Plan) -> Result<String> {
        debug!("{} '{}': applying plan", plan.kind, plan.name);
        emit::send(self.transport.as_ref(), &plan.batch).map_err(|e| e.in_ci(plan.kind, &plan.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::mock::MockTransport;

    #[test]
    fn test_fetch_sends_print_command() {
        let mock = MockTransport::new();
        mock.reply("hidden@@|@@true@@;@@");
        let client = Client::new(Box::new(mock.clone()));

        let obj = client.fetch(Kind::Rule, "R").unwrap();
        assert!(obj.flag("hidden"));
        assert_eq!(
            mock.batches(),
            [r#"print rule "R" dump "@@|@@" recordsep "@@;@@";"#]
        );
    }

    #[test]
    fn test_fetch_existing_uses_cache() {
        let mock = MockTransport::new();
        let client = Client::new(Box::new(mock.clone()));
        let mut cache = RunCache::new();
        cache.insert(Kind::Rule, Vec::new());

        assert!(client.fetch_existing(Kind::Rule, "R", &cache).unwrap().is_none());
        assert!(mock.batches().is_empty());
    }

    #[test]
    fn test_retry_only_on_connection_errors() {
        let mock = MockTransport::new();
        mock.disconnect_next("connection refused").reply("R@@;@@");
        let client = Client::new(Box::new(mock.clone())).with_retry(RetryConfig {
            max_attempts: 2,
            base_delay: std::time::Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: std::time::Duration::from_millis(1),
        });

        assert_eq!(client.list_names(Kind::Rule).unwrap(), ["R"]);
        assert_eq!(mock.batches().len(), 2);
    }

    #[test]
    fn test_apply_wraps_transport_error() {
        let mock = MockTransport::new();
        mock.fail_next("Error: rejected");
        let client = Client::new(Box::new(mock));
        let plan = plan_update(
            &CiFile {
                kind: Kind::Rule,
                name: "R".into(),
                path: "R.ci".into(),
                modified: chrono::Utc::now(),
                sub_path: String::new(),
            },
            r#"rule "R" { }"#,
            None,
            &Stamp::now("cisync"),
            &EmitOptions::default(),
        )
        .unwrap();

        let err = client.apply(&plan).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert!(err.to_string().starts_with("rule 'R': transport error: Error: rejected"));
    }

    #[test]
    fn test_apply_never_resends_a_batch() {
        let mock = MockTransport::new();
        mock.disconnect_next("operation timed out");
        let client = Client::new(Box::new(mock.clone())).with_retry(RetryConfig {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: std::time::Duration::from_millis(1),
        });
        let plan = plan_update(
            &CiFile {
                kind: Kind::Rule,
                name: "R".into(),
                path: "R.ci".into(),
                modified: chrono::Utc::now(),
                sub_path: String::new(),
            },
            r#"rule "R" { }"#,
            None,
            &Stamp::now("cisync"),
            &EmitOptions::default(),
        )
        .unwrap();

        let err = client.apply(&plan).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Connection);
        assert_eq!(mock.batches().len(), 1);
    }
}
