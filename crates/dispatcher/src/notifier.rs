//! NotificationDispatcher - fan-out with retry and staleness guard
//!
//! One change becomes one shared request and one `DeliveryAttempt` per live
//! connection. Each attempt then runs its own continuation chain:
//! send -> callback -> (retry timer -> version check -> send)*.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    ConnectionDirectory, ContractError, DataItemChange, NotificationRequest, NotifierConfig,
    NotifyConfig, NotifyResponse, ResponseCallback, SourceKind, Transport, TransportError,
    VersionOracle,
};
use retry_timer::{RetryDecision, RetryPolicy, RetryScheduler, RetryTask};
use tracing::{debug, error, info, instrument};

use crate::attempt::{AbortReason, AttemptState, DeliveryAttempt};
use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, NotifierMetrics};
use crate::registry::DataChangeNotifier;

/// Per-notifier settings
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Notifier name (logs and metrics)
    pub name: String,
    /// Change kinds this notifier handles
    pub kinds: HashSet<SourceKind>,
    /// Retry budget and backoff
    pub policy: RetryPolicy,
    /// Handed to every transport send
    pub response_timeout: Duration,
}

impl DispatcherSettings {
    /// Settings for one configured notifier, sharing the global retry and
    /// transport sections
    pub fn from_config(notifier: &NotifierConfig, config: &NotifyConfig) -> Self {
        Self {
            name: notifier.name.clone(),
            kinds: notifier.kind_set(),
            policy: RetryPolicy::from_config(&config.retry),
            response_timeout: config.transport.response_timeout(),
        }
    }
}

/// External collaborators of a dispatcher
#[derive(Clone)]
pub struct NotifierDeps {
    pub directory: Arc<dyn ConnectionDirectory>,
    pub oracle: Arc<dyn VersionOracle>,
    pub transport: Arc<dyn Transport>,
    pub scheduler: Arc<dyn RetryScheduler>,
}

/// Pushes change notifications to every live subscriber connection
///
/// `notify` never blocks on the network and never reports errors; every
/// attempt ends in exactly one terminal state, observable through `metrics`.
#[derive(Clone)]
pub struct NotificationDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    settings: DispatcherSettings,
    deps: NotifierDeps,
    metrics: NotifierMetrics,
}

impl NotificationDispatcher {
    #[instrument(
        name = "notification_dispatcher_new",
        skip(settings, deps),
        fields(notifier = %settings.name, kinds = settings.kinds.len())
    )]
    pub fn new(settings: DispatcherSettings, deps: NotifierDeps) -> Result<Self, DispatcherError> {
        if settings.kinds.is_empty() {
            return Err(DispatcherError::EmptyKinds {
                name: settings.name,
            });
        }

        info!(
            max_retries = settings.policy.max_retries(),
            response_timeout_ms = settings.response_timeout.as_millis() as u64,
            "Notification dispatcher created"
        );

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                settings,
                deps,
                metrics: NotifierMetrics::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.settings.name
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.inner.settings
    }

    pub fn suitable_kinds(&self) -> HashSet<SourceKind> {
        self.inner.settings.kinds.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Fan a change out to the connections live right now
    ///
    /// Connections appearing later are not notified of this change.
    pub fn notify(&self, change: &DataItemChange) {
        let inner = &self.inner;
        let connections = inner.deps.directory.live_connections();
        let request = Arc::new(NotificationRequest::from_change(change));

        inner.metrics.inc_fanout_count();
        observability::record_fanout(&inner.settings.name, connections.len());
        debug!(
            notifier = %inner.settings.name,
            request = %request,
            kind = %change.source_kind,
            previous_version = ?change.previous_version,
            connections = connections.len(),
            "Fanning out change"
        );

        for connection in connections {
            inner.metrics.inc_attempt_count();
            inner.send_attempt(DeliveryAttempt::new(connection, Arc::clone(&request)));
        }
    }
}

impl DataChangeNotifier for NotificationDispatcher {
    fn name(&self) -> &str {
        NotificationDispatcher::name(self)
    }

    fn suitable_kinds(&self) -> HashSet<SourceKind> {
        NotificationDispatcher::suitable_kinds(self)
    }

    fn notify(&self, change: &DataItemChange) {
        NotificationDispatcher::notify(self, change)
    }

    fn metrics(&self) -> Option<MetricsSnapshot> {
        Some(NotificationDispatcher::metrics(self))
    }
}

impl DispatcherInner {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn send_attempt(self: &Arc<Self>, mut attempt: DeliveryAttempt) {
        if !attempt.connection().is_live() {
            info!(
                notifier = %self.name(),
                remote = attempt.remote(),
                request = %attempt.request(),
                retry_count = attempt.retry_count(),
                "Connection not live, notification dropped"
            );
            self.finish(&mut attempt, AttemptState::ConnectionDead);
            return;
        }

        attempt.mark_sending();
        self.metrics.inc_send_count();
        observability::record_send(self.name());

        // The transport drops the callback unrun when it refuses a send
        let checkpoint = attempt.checkpoint();
        let connection = Arc::clone(attempt.connection());
        let request = Arc::clone(attempt.request());
        let inner = Arc::clone(self);
        let on_result: ResponseCallback =
            Box::new(move |result| inner.on_result(attempt, result));

        if let Err(err) = self.deps.transport.send_with_callback(
            &connection,
            request,
            self.settings.response_timeout,
            on_result,
        ) {
            let attempt = checkpoint.restore();
            error!(
                notifier = %self.name(),
                remote = attempt.remote(),
                request = %attempt.request(),
                retry_count = attempt.retry_count(),
                error = %err,
                "Notification send refused"
            );
            observability::record_send_failure(self.name(), "refused");
            self.on_failed(attempt);
        }
    }

    fn on_result(
        self: &Arc<Self>,
        mut attempt: DeliveryAttempt,
        result: Result<NotifyResponse, TransportError>,
    ) {
        match result {
            Ok(response) if response.success => {
                debug!(
                    notifier = %self.name(),
                    remote = attempt.remote(),
                    request = %attempt.request(),
                    retry_count = attempt.retry_count(),
                    "Notification delivered"
                );
                self.finish(&mut attempt, AttemptState::Succeeded);
            }
            Ok(response) => {
                error!(
                    notifier = %self.name(),
                    remote = attempt.remote(),
                    request = %attempt.request(),
                    retry_count = attempt.retry_count(),
                    message = response.message.as_deref().unwrap_or(""),
                    "Notification rejected by subscriber"
                );
                observability::record_send_failure(self.name(), "response");
                self.on_failed(attempt);
            }
            Err(err) => {
                error!(
                    notifier = %self.name(),
                    remote = attempt.remote(),
                    request = %attempt.request(),
                    retry_count = attempt.retry_count(),
                    error = %err,
                    "Notification send failed"
                );
                observability::record_send_failure(self.name(), "transport");
                self.on_failed(attempt);
            }
        }
    }

    fn on_failed(self: &Arc<Self>, mut attempt: DeliveryAttempt) {
        self.metrics.inc_failure_count();

        let delay = match attempt.record_failure(&self.settings.policy) {
            RetryDecision::RetryAfter(delay) => delay,
            RetryDecision::GiveUp => {
                error!(
                    notifier = %self.name(),
                    remote = attempt.remote(),
                    request = %attempt.request(),
                    retry_count = attempt.retry_count(),
                    max_retries = self.settings.policy.max_retries(),
                    "Retry times have exceeded, notification abandoned"
                );
                self.finish(&mut attempt, AttemptState::Exhausted);
                return;
            }
        };

        let retry_count = attempt.retry_count();
        let checkpoint = attempt.checkpoint();
        let inner = Arc::clone(self);
        let task: RetryTask = Box::new(move || inner.on_retry_due(attempt));

        match self.deps.scheduler.after(delay, task) {
            Ok(()) => {
                self.metrics.inc_retry_count();
                observability::record_retry_scheduled(self.name(), delay);
                debug!(
                    notifier = %self.name(),
                    retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Retry scheduled"
                );
            }
            Err(err) => {
                let mut attempt = checkpoint.restore();
                error!(
                    notifier = %self.name(),
                    remote = attempt.remote(),
                    request = %attempt.request(),
                    retry_count,
                    error = %err,
                    "Retry could not be scheduled, notification abandoned"
                );
                self.finish(&mut attempt, AttemptState::SchedulerRejected);
            }
        }
    }

    fn on_retry_due(self: &Arc<Self>, mut attempt: DeliveryAttempt) {
        let request = Arc::clone(attempt.request());
        info!(
            notifier = %self.name(),
            remote = attempt.remote(),
            retry_count = attempt.retry_count(),
            request = %request,
            "Retrying notification"
        );

        let current = self
            .deps
            .oracle
            .current_version(&request.partition, &request.item_id);

        let reason = match current {
            Ok(current) if current == request.version => {
                self.send_attempt(attempt);
                return;
            }
            Ok(current) => {
                info!(
                    notifier = %self.name(),
                    remote = attempt.remote(),
                    request = %request,
                    current_version = current,
                    "Item version changed, stale retry aborted"
                );
                AbortReason::VersionAdvanced { current }
            }
            Err(ContractError::ItemNotFound { .. }) => {
                info!(
                    notifier = %self.name(),
                    remote = attempt.remote(),
                    request = %request,
                    "Item no longer exists, retry aborted"
                );
                AbortReason::ItemNotFound
            }
            Err(err) => {
                info!(
                    notifier = %self.name(),
                    remote = attempt.remote(),
                    request = %request,
                    error = %err,
                    "Item version unavailable, retry aborted"
                );
                AbortReason::VersionUnknown
            }
        };
        self.finish(&mut attempt, AttemptState::Aborted(reason));
    }

    fn finish(&self, attempt: &mut DeliveryAttempt, state: AttemptState) {
        attempt.terminate(state);
        self.metrics.record_terminal(&state);
        observability::record_attempt_outcome(self.name(), state.label());
    }
}
