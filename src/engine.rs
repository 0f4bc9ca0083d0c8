//! Run loop over a declared catalog.
//!
//! The engine orders the catalog with a [`ResourceGraph`], reconciles each
//! resource at most once, feeds purge deletions back into the graph, and
//! collects one [`ResourceOutcome`] per resource into a [`RunReport`].
//! A key whose stale values cannot be listed gets a second, failed
//! outcome for the purge. Nothing is retried; a failure only affects the resources ordered
//! after the failed one.

use crate::access::RegistryAccess;
use crate::config::Catalog;
use crate::error::{Operation, RegistryError};
use crate::graph::{ResourceGraph, Schedule};
use crate::purge;
use crate::reconcile::{Action, Change, Reconciler};
use crate::resource::{Ensure, Resource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Knobs for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Compute and report actions without writing.
    pub dry_run: bool,

    /// Set from another thread to stop the run between resources.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl RunOptions {
    /// Options for a run that writes nothing.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            cancel: None,
        }
    }

    /// Attaches a cancellation flag.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

/// Result of processing one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Status {
    /// Already in the desired state.
    Noop,

    /// Changed, or would change in a dry run.
    Changed {
        /// Action taken.
        action: Action,
        /// What changed.
        change: Option<Change>,
    },

    /// Reconciliation failed.
    Failed {
        /// Operation that failed.
        operation: Operation,
        /// Error message.
        error: String,
    },

    /// Not attempted.
    Skipped {
        /// Why the resource was not attempted.
        reason: String,
    },
}

impl Status {
    fn failed(error: &RegistryError) -> Self {
        Status::Failed {
            operation: error.operation(),
            error: error.to_string(),
        }
    }

    /// Returns true if the resource ended in its desired state.
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Noop | Status::Changed { .. })
    }
}

/// Outcome of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceOutcome {
    /// Resource label, e.g. `registry_key[HKLM\Software\Vendor]`.
    pub resource: String,

    /// True for values generated by purging.
    pub synthetic: bool,

    /// What happened.
    #[serde(flatten)]
    pub status: Status,
}

/// Counters over a run's outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Keys and values created.
    pub created: usize,
    /// Values overwritten.
    pub updated: usize,
    /// Keys and values deleted.
    pub deleted: usize,
    /// Resources already in the desired state.
    pub noop: usize,
    /// Resources that failed.
    pub failed: usize,
    /// Resources not attempted.
    pub skipped: usize,
    /// Declared entries rejected while loading.
    pub rejected: usize,
}

/// Everything a run did, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run finished.
    pub finished_at: DateTime<Utc>,

    /// Whether writes were suppressed.
    pub dry_run: bool,

    /// One entry per reconciled, failed or skipped resource.
    pub outcomes: Vec<ResourceOutcome>,

    /// Load-time rejections from the catalog.
    pub rejected: Vec<String>,
}

impl RunReport {
    /// Tallies the outcomes.
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            rejected: self.rejected.len(),
            ..Summary::default()
        };
        for outcome in &self.outcomes {
            match &outcome.status {
                Status::Noop => summary.noop += 1,
                Status::Changed { action, .. } => match action {
                    Action::Create => summary.created += 1,
                    Action::Update => summary.updated += 1,
                    Action::Delete => summary.deleted += 1,
                    Action::Noop => summary.noop += 1,
                },
                Status::Failed { .. } => summary.failed += 1,
                Status::Skipped { .. } => summary.skipped += 1,
            }
        }
        summary
    }

    /// Returns true if nothing failed, was skipped or was rejected.
    pub fn is_success(&self) -> bool {
        self.rejected.is_empty() && self.outcomes.iter().all(|o| o.status.is_success())
    }

    /// Returns true if any resource changed.
    pub fn has_changes(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.status, Status::Changed { .. }))
    }

    /// Outcome for the resource with the given label.
    pub fn outcome(&self, resource: &str) -> Option<&ResourceOutcome> {
        self.outcomes.iter().find(|o| o.resource == resource)
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Reconciles catalogs against one registry.
pub struct Engine<'a, R: RegistryAccess + ?Sized> {
    registry: &'a mut R,
}

impl<'a, R: RegistryAccess + ?Sized> Engine<'a, R> {
    /// Creates an engine working on `registry`.
    pub fn new(registry: &'a mut R) -> Self {
        Self { registry }
    }

    /// Runs every resource of the catalog once.
    #[instrument(skip_all, fields(resources = catalog.len(), dry_run = options.dry_run))]
    pub fn run(&mut self, catalog: &Catalog, options: &RunOptions) -> RunReport {
        let started_at = Utc::now();
        let mut graph = ResourceGraph::build(catalog.resources());
        let mut schedule = Schedule::new(&graph);
        let mut succeeded = vec![false; graph.len()];
        let mut outcomes = Vec::with_capacity(graph.len());

        while let Some(index) = schedule.next() {
            let resource = graph.resource(index).clone();
            let blocker = graph
                .dependencies(index)
                .iter()
                .find(|&&dependency| !succeeded[dependency])
                .map(|&dependency| graph.resource(dependency).to_string());

            let status = if options.is_cancelled() {
                Status::Skipped {
                    reason: "run cancelled".to_string(),
                }
            } else if let Some(blocker) = blocker {
                Status::Skipped {
                    reason: format!("dependency {} did not succeed", blocker),
                }
            } else {
                self.reconcile(&resource, options)
            };

            // a purge failure is reported on its own; the key itself stays
            // reconciled and its declared values still run
            let mut purge_failure = None;
            if status.is_success() {
                match self.expand(&mut graph, index, &resource) {
                    Ok(added) => {
                        succeeded.resize(graph.len(), false);
                        for child in added {
                            schedule.track(&graph, child);
                        }
                    }
                    Err(e) => purge_failure = Some(Status::failed(&e)),
                }
            }

            match &status {
                Status::Failed { error, .. } => warn!(resource = %resource, %error, "Failed"),
                Status::Skipped { reason } => warn!(resource = %resource, %reason, "Skipped"),
                _ => {}
            }

            succeeded[index] = status.is_success();
            schedule.complete(&graph, index);
            outcomes.push(ResourceOutcome {
                resource: resource.to_string(),
                synthetic: matches!(&resource, Resource::Value(v) if v.is_synthetic()),
                status,
            });

            if let Some(failure) = purge_failure {
                if let Status::Failed { error, .. } = &failure {
                    warn!(resource = %resource, %error, "Purge failed");
                }
                outcomes.push(ResourceOutcome {
                    resource: resource.to_string(),
                    synthetic: false,
                    status: failure,
                });
            }
        }

        for index in schedule.unfinished() {
            outcomes.push(ResourceOutcome {
                resource: graph.resource(index).to_string(),
                synthetic: false,
                status: Status::Skipped {
                    reason: "dependency never resolved".to_string(),
                },
            });
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: options.dry_run,
            outcomes,
            rejected: catalog.rejected().iter().map(ToString::to_string).collect(),
        };
        let summary = report.summary();
        info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            noop = summary.noop,
            failed = summary.failed,
            skipped = summary.skipped,
            "Run finished"
        );
        report
    }

    fn reconcile(&mut self, resource: &Resource, options: &RunOptions) -> Status {
        let mut reconciler = Reconciler::new(&mut *self.registry);
        let result = if options.dry_run {
            reconciler.plan(resource)
        } else {
            reconciler.reconcile(resource)
        };
        match result {
            Ok(plan) if plan.action == Action::Noop => Status::Noop,
            Ok(plan) => Status::Changed {
                action: plan.action,
                change: plan.change,
            },
            Err(e) => Status::failed(&e),
        }
    }

    /// Appends purge deletions below a present key that reconciled.
    fn expand(
        &self,
        graph: &mut ResourceGraph,
        index: usize,
        resource: &Resource,
    ) -> Result<Vec<usize>, RegistryError> {
        let key = match resource {
            Resource::Key(key) if key.ensure == Ensure::Present && key.purge_values => key,
            _ => return Ok(Vec::new()),
        };
        let stale = purge::expand(key, &graph.values_of(index), &*self.registry)?;
        Ok(stale
            .into_iter()
            .map(|value| graph.add_child(index, value.into()))
            .collect())
    }
}
