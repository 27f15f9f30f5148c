//! NotifierRegistry - routes each change to the notifiers handling its kind

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use contracts::{DataItemChange, NotifyConfig, SourceKind};
use retry_timer::panic_message;
use tracing::{debug, error, info, instrument};

use crate::error::DispatcherError;
use crate::metrics::MetricsSnapshot;
use crate::notifier::{DispatcherSettings, NotificationDispatcher, NotifierDeps};

/// Anything that reacts to data changes of selected kinds
pub trait DataChangeNotifier: Send + Sync {
    fn name(&self) -> &str;

    /// Kinds this notifier wants; must not change after registration
    fn suitable_kinds(&self) -> HashSet<SourceKind>;

    /// Start delivery of `change`; must not block on the network
    fn notify(&self, change: &DataItemChange);

    fn metrics(&self) -> Option<MetricsSnapshot> {
        None
    }
}

struct Registration {
    kinds: HashSet<SourceKind>,
    notifier: Arc<dyn DataChangeNotifier>,
}

/// Registered notifiers, in registration order
#[derive(Default)]
pub struct NotifierRegistry {
    registrations: Vec<Registration>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one `NotificationDispatcher` per configured notifier
    #[instrument(
        name = "notifier_registry_from_config",
        skip(config, deps),
        fields(notifier_count = config.notifiers.len())
    )]
    pub fn from_config(config: &NotifyConfig, deps: &NotifierDeps) -> Result<Self, DispatcherError> {
        let mut registry = Self::new();
        for notifier in &config.notifiers {
            let settings = DispatcherSettings::from_config(notifier, config);
            let dispatcher = NotificationDispatcher::new(settings, deps.clone())?;
            registry.register(Arc::new(dispatcher))?;
        }
        Ok(registry)
    }

    /// Add a notifier; names must be unique
    pub fn register(&mut self, notifier: Arc<dyn DataChangeNotifier>) -> Result<(), DispatcherError> {
        if self
            .registrations
            .iter()
            .any(|r| r.notifier.name() == notifier.name())
        {
            return Err(DispatcherError::DuplicateNotifier {
                name: notifier.name().to_string(),
            });
        }

        let kinds = notifier.suitable_kinds();
        info!(
            notifier = notifier.name(),
            kinds = ?kinds,
            "Notifier registered"
        );
        self.registrations.push(Registration { kinds, notifier });
        Ok(())
    }

    /// Hand `change` to every notifier whose kinds contain its kind
    ///
    /// A panicking notifier is logged and skipped. Returns the number of
    /// notifiers invoked.
    pub fn dispatch(&self, change: &DataItemChange) -> usize {
        let mut invoked = 0;

        for registration in self
            .registrations
            .iter()
            .filter(|r| r.kinds.contains(&change.source_kind))
        {
            invoked += 1;
            let notifier = &registration.notifier;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| notifier.notify(change)))
            {
                error!(
                    notifier = notifier.name(),
                    item_id = %change.item_id,
                    partition = %change.partition,
                    version = change.version,
                    panic = %panic_message(payload.as_ref()),
                    "Notifier panicked during fan-out"
                );
            }
        }

        if invoked == 0 {
            debug!(
                kind = %change.source_kind,
                item_id = %change.item_id,
                "No notifier handles change kind"
            );
        }
        observability::record_change_dispatched(change.source_kind.as_str(), invoked);
        invoked
    }

    /// Metrics of every notifier that exposes them
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.registrations
            .iter()
            .filter_map(|r| {
                r.notifier
                    .metrics()
                    .map(|m| (r.notifier.name().to_string(), m))
            })
            .collect()
    }

    /// Attempts not yet terminal, across all notifiers
    pub fn in_flight(&self) -> u64 {
        self.metrics().iter().map(|(_, m)| m.in_flight()).sum()
    }

    pub fn names(&self) -> Vec<&str> {
        self.registrations.iter().map(|r| r.notifier.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
