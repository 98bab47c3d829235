// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hot reload of configuration-derived subsystems.
//!
//! [`ReloadPlan::diff`] compares two configurations section by section.
//! [`ReloadCoordinator::apply`] rebuilds every changed reloadable subsystem,
//! keeps the previous value for any subsystem that fails to rebuild, and
//! publishes the result with a single snapshot swap.

use std::sync::Arc;

use arc_swap::ArcSwap;
use strum::{Display, EnumIter, IntoEnumIterator};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use parley_config::model::ParleyConfig;
use parley_core::error::ParleyError;
use parley_core::traits::EvidenceStore;
use parley_history::{HistoryCache, HistorySettings};

use crate::canned::CannedResponses;
use crate::services::{DispatchPolicy, ServiceFactory, Services, ToolDirectory, parse_clock};

/// A unit of configuration-derived state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Subsystem {
    Clock,
    HistoryCache,
    Completion,
    Search,
    Actuator,
    Tools,
    DispatchPolicy,
    CannedResponses,
    Store,
    Server,
    Logging,
}

impl Subsystem {
    /// Subsystems that can be swapped while serving.
    pub fn is_reloadable(self) -> bool {
        !matches!(self, Subsystem::Store | Subsystem::Server | Subsystem::Logging)
    }

    fn changed(self, old: &ParleyConfig, new: &ParleyConfig) -> bool {
        match self {
            Subsystem::Clock => old.clock != new.clock,
            Subsystem::HistoryCache => old.cache != new.cache,
            Subsystem::Completion => old.completion != new.completion,
            Subsystem::Search => old.search != new.search,
            Subsystem::Actuator => old.actuator != new.actuator,
            Subsystem::Tools => old.tools != new.tools,
            Subsystem::DispatchPolicy => {
                old.dispatch != new.dispatch
                    || old.retrieval != new.retrieval
                    || old.agent != new.agent
            }
            Subsystem::CannedResponses => old.canned_responses != new.canned_responses,
            Subsystem::Store => old.store != new.store,
            Subsystem::Server => old.server != new.server,
            Subsystem::Logging => old.logging != new.logging,
        }
    }
}

/// Which subsystems a configuration change touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadPlan {
    pub reload: Vec<Subsystem>,
    pub restart_required: Vec<Subsystem>,
}

impl ReloadPlan {
    pub fn diff(old: &ParleyConfig, new: &ParleyConfig) -> Self {
        let mut plan = ReloadPlan::default();
        for subsystem in Subsystem::iter().filter(|s| s.changed(old, new)) {
            if subsystem.is_reloadable() {
                plan.reload.push(subsystem);
            } else {
                plan.restart_required.push(subsystem);
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.reload.is_empty() && self.restart_required.is_empty()
    }

    pub fn contains(&self, subsystem: Subsystem) -> bool {
        self.reload.contains(&subsystem)
    }
}

/// What an [`ReloadCoordinator::apply`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub reloaded: Vec<Subsystem>,
    /// Subsystems that kept their previous value, with the rebuild error.
    pub failed: Vec<(Subsystem, String)>,
    pub restart_required: Vec<Subsystem>,
}

/// Owns the published [`Services`] snapshot and the canned-response table.
pub struct ReloadCoordinator {
    services: Arc<ArcSwap<Services>>,
    canned: Arc<CannedResponses>,
    factory: Arc<dyn ServiceFactory>,
    store: Arc<dyn EvidenceStore>,
    apply_lock: Mutex<()>,
}

impl ReloadCoordinator {
    /// Builds the first snapshot from `config`.
    pub async fn bootstrap(
        config: &ParleyConfig,
        factory: Arc<dyn ServiceFactory>,
        store: Arc<dyn EvidenceStore>,
    ) -> Result<Self, ParleyError> {
        let services = Services::build(config, factory.as_ref(), Arc::clone(&store)).await?;
        Ok(Self {
            services: Arc::new(ArcSwap::from_pointee(services)),
            canned: Arc::new(CannedResponses::from_config(&config.canned_responses)),
            factory,
            store,
            apply_lock: Mutex::new(()),
        })
    }

    /// Shared handle to the published snapshot.
    pub fn services(&self) -> Arc<ArcSwap<Services>> {
        Arc::clone(&self.services)
    }

    pub fn canned(&self) -> Arc<CannedResponses> {
        Arc::clone(&self.canned)
    }

    /// The snapshot currently published.
    pub fn snapshot(&self) -> Arc<Services> {
        self.services.load_full()
    }

    /// Moves the running system from `old` to `new`.
    ///
    /// Calls are serialized. Client rebuilds run concurrently; each failure is
    /// isolated to its own subsystem.
    pub async fn apply(&self, old: &ParleyConfig, new: &ParleyConfig) -> ReloadReport {
        let _serial = self.apply_lock.lock().await;
        let plan = ReloadPlan::diff(old, new);
        let mut report = ReloadReport {
            restart_required: plan.restart_required.clone(),
            ..ReloadReport::default()
        };

        for subsystem in &plan.restart_required {
            warn!(
                subsystem = %subsystem,
                "configuration change requires a restart, keeping the running value"
            );
        }
        if plan.reload.is_empty() {
            info!("no reloadable configuration changes");
            return report;
        }

        let factory = self.factory.as_ref();
        let (completion, search, actuator) = tokio::join!(
            async {
                if plan.contains(Subsystem::Completion) {
                    Some(factory.completion(new).await)
                } else {
                    None
                }
            },
            async {
                if plan.contains(Subsystem::Search) {
                    Some(factory.search(new).await)
                } else {
                    None
                }
            },
            async {
                if plan.contains(Subsystem::Actuator) {
                    Some(factory.actuator(new).await)
                } else {
                    None
                }
            },
        );

        let current = self.services.load_full();
        let mut next = Services::clone(&current);

        if let Some(completion) = record(&mut report, Subsystem::Completion, completion) {
            next.completion = completion;
        }
        if let Some(search) = record(&mut report, Subsystem::Search, search) {
            next.search = search;
        }
        let actuator_rebuilt = match record(&mut report, Subsystem::Actuator, actuator) {
            Some(actuator) => {
                next.actuator = actuator;
                true
            }
            None => false,
        };

        if plan.contains(Subsystem::Clock)
            && let Some(clock) = record(&mut report, Subsystem::Clock, Some(parse_clock(new)))
        {
            next.clock = clock;
        }
        if plan.contains(Subsystem::Tools) {
            next.tools = ToolDirectory::from_config(new);
            report.reloaded.push(Subsystem::Tools);
        }
        if plan.contains(Subsystem::DispatchPolicy) {
            next.policy = DispatchPolicy::from_config(new);
            report.reloaded.push(Subsystem::DispatchPolicy);
        }

        // The cache reads transcripts through the actuator, so it follows it.
        let cache_changed = plan.contains(Subsystem::HistoryCache);
        if cache_changed || actuator_rebuilt {
            let settings = if cache_changed {
                HistorySettings::from_config(&new.cache)
            } else {
                current.history.settings().clone()
            };
            next.history = Arc::new(HistoryCache::new(
                Arc::clone(&self.store),
                Arc::clone(&next.actuator),
                settings,
            ));
            if cache_changed {
                report.reloaded.push(Subsystem::HistoryCache);
            }
        }

        self.services.store(Arc::new(next));

        if plan.contains(Subsystem::CannedResponses) {
            self.canned.replace(&new.canned_responses).await;
            report.reloaded.push(Subsystem::CannedResponses);
        }

        info!(
            reloaded = ?report.reloaded,
            failed = report.failed.len(),
            restart_required = report.restart_required.len(),
            "configuration reloaded"
        );
        report
    }
}

fn record<T>(
    report: &mut ReloadReport,
    subsystem: Subsystem,
    outcome: Option<Result<T, ParleyError>>,
) -> Option<T> {
    match outcome? {
        Ok(value) => {
            report.reloaded.push(subsystem);
            Some(value)
        }
        Err(e) => {
            error!(
                subsystem = %subsystem,
                error = %e,
                "subsystem reload failed, keeping previous value"
            );
            report.failed.push((subsystem, e.to_string()));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_configs_plan_nothing() {
        let config = ParleyConfig::default();
        assert!(ReloadPlan::diff(&config, &config.clone()).is_empty());
    }

    #[test]
    fn plan_splits_reloadable_and_restart_only() {
        let old = ParleyConfig::default();
        let mut new = old.clone();
        new.retrieval.top_k = 5;
        new.clock.utc_offset = "+08:00".into();
        new.server.port = 9090;
        new.logging.level = "debug".into();

        let plan = ReloadPlan::diff(&old, &new);
        assert_eq!(plan.reload, vec![Subsystem::Clock, Subsystem::DispatchPolicy]);
        assert_eq!(
            plan.restart_required,
            vec![Subsystem::Server, Subsystem::Logging]
        );
    }

    #[test]
    fn store_server_and_logging_need_restart() {
        let fixed: Vec<Subsystem> = Subsystem::iter().filter(|s| !s.is_reloadable()).collect();
        assert_eq!(
            fixed,
            vec![Subsystem::Store, Subsystem::Server, Subsystem::Logging]
        );
    }
}
