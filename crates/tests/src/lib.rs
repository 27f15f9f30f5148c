//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置契约快照测试
//! - 确定性时钟下的投递场景（ManualScheduler + ScriptedTransport）
//! - 真实时间轮 + 异步传输的端到端测试

#[cfg(test)]
mod contract_tests {
    use contracts::{NotifyConfig, SourceKind};

    #[test]
    fn test_default_config_snapshot() {
        let json = config_loader::ConfigLoader::to_json(&NotifyConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["retry"]["max_retries"], 10);
        assert_eq!(value["retry"]["first_delay_ms"], 3000);
        assert_eq!(value["retry"]["increment_delay_ms"], 3000);
        assert_eq!(value["transport"]["response_timeout_ms"], 3000);
        assert_eq!(value["timer"]["tick_ms"], 100);
        assert_eq!(value["timer"]["ticks_per_wheel"], 1024);
        assert_eq!(value["notifiers"][0]["name"], "session");
        assert_eq!(
            value["notifiers"][0]["kinds"],
            serde_json::json!(["publish", "synchronize"])
        );
    }

    #[test]
    fn test_kind_labels_round_trip_through_config() {
        for kind in SourceKind::ALL {
            let content = format!(
                "[[notifiers]]\nname = \"n\"\nkinds = [\"{}\"]\n",
                kind.as_str()
            );
            let config = config_loader::ConfigLoader::load_from_str(
                &content,
                config_loader::ConfigFormat::Toml,
            )
            .unwrap();
            assert_eq!(config.notifiers[0].kinds, vec![kind]);
        }
    }
}

#[cfg(test)]
mod scenario_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use adapters::{InMemoryConnectionDirectory, ScriptedReply, ScriptedTransport, VersionTable};
    use contracts::{DataItemChange, NotifierConfig, NotifyConfig, SourceKind};
    use dispatcher::{NotifierDeps, NotifierRegistry};
    use retry_timer::ManualScheduler;

    const PARTITION: &str = "dc1";

    struct World {
        directory: Arc<InMemoryConnectionDirectory>,
        versions: Arc<VersionTable>,
        transport: Arc<ScriptedTransport>,
        scheduler: Arc<ManualScheduler>,
        registry: NotifierRegistry,
    }

    impl World {
        fn new(config: &NotifyConfig) -> Self {
            let directory = Arc::new(InMemoryConnectionDirectory::new());
            let versions = Arc::new(VersionTable::new());
            let transport = Arc::new(ScriptedTransport::new());
            let scheduler = Arc::new(ManualScheduler::new());
            let deps = NotifierDeps {
                directory: directory.clone(),
                oracle: versions.clone(),
                transport: transport.clone(),
                scheduler: scheduler.clone(),
            };
            let registry = NotifierRegistry::from_config(config, &deps).unwrap();
            Self {
                directory,
                versions,
                transport,
                scheduler,
                registry,
            }
        }

        fn change(&self, item: &str, version: u64, kind: SourceKind) -> usize {
            self.versions.put(PARTITION, item, version);
            self.registry
                .dispatch(&DataItemChange::new(item, PARTITION, version, kind))
        }

        fn metrics(&self, notifier: &str) -> dispatcher::MetricsSnapshot {
            self.registry
                .metrics()
                .into_iter()
                .find(|(name, _)| name == notifier)
                .map(|(_, m)| m)
                .unwrap()
        }
    }

    fn config(max_retries: u32, first: u64, increment: i64) -> NotifyConfig {
        let mut config = NotifyConfig::default();
        config.retry.max_retries = max_retries;
        config.retry.first_delay_ms = first;
        config.retry.increment_delay_ms = increment;
        config
    }

    fn rejections(n: usize) -> Vec<ScriptedReply> {
        vec![ScriptedReply::Reject("not ready".into()); n]
    }

    #[test]
    fn test_fanout_creates_one_attempt_per_connection() {
        let world = World::new(&config(3, 100, 50));
        for i in 0..5 {
            world.directory.connect(format!("session-{i}"));
        }

        assert_eq!(world.change("svc", 1, SourceKind::Publish), 1);

        let metrics = world.metrics("session");
        assert_eq!(metrics.attempts, 5);
        assert_eq!(metrics.succeeded, 5);
        assert_eq!(world.transport.call_count(), 5);
        assert!(world.scheduler.requested_delays().is_empty());
    }

    #[test]
    fn test_continuous_failure_sends_four_times() {
        let world = World::new(&config(3, 100, 50));
        world.directory.connect("s1");
        world.transport.script("s1", rejections(100));

        world.change("svc", 1, SourceKind::Publish);
        world.scheduler.run_until_idle(16);

        assert_eq!(
            world.scheduler.requested_delays(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(150),
                Duration::from_millis(200),
            ]
        );
        assert_eq!(world.transport.calls_to("s1"), 4);
        assert_eq!(world.metrics("session").exhausted, 1);
    }

    #[test]
    fn test_recovery_after_k_failures() {
        let world = World::new(&config(5, 100, 50));
        world.directory.connect("s1");
        world.transport.script("s1", rejections(3));

        world.change("svc", 1, SourceKind::Synchronize);
        world.scheduler.run_until_idle(16);

        assert_eq!(world.scheduler.now(), Duration::from_millis(100 + 150 + 200));
        assert_eq!(world.transport.calls_to("s1"), 4);
        let metrics = world.metrics("session");
        assert_eq!(metrics.succeeded, 1);
        assert_eq!(metrics.retries, 3);
    }

    #[test]
    fn test_stale_version_aborts_pending_retry() {
        let world = World::new(&config(3, 100, 50));
        world.directory.connect("s1");
        world.transport.script("s1", rejections(1));

        world.change("X", 5, SourceKind::Publish);
        assert_eq!(world.scheduler.pending(), 1);

        // Newer write lands before the retry fires
        world.versions.put(PARTITION, "X", 6);
        world.scheduler.run_until_idle(16);

        assert_eq!(world.transport.calls_to("s1"), 1);
        let metrics = world.metrics("session");
        assert_eq!(metrics.aborted, 1);
        assert_eq!(metrics.in_flight(), 0);
    }

    #[test]
    fn test_newer_change_delivered_while_older_aborts() {
        let world = World::new(&config(3, 100, 50));
        world.directory.connect("s1");
        world.transport.script("s1", rejections(1));

        world.change("X", 5, SourceKind::Publish);
        world.change("X", 6, SourceKind::Publish);
        world.scheduler.run_until_idle(16);

        let sent: Vec<u64> = world
            .transport
            .calls()
            .iter()
            .map(|c| c.request.version)
            .collect();
        assert_eq!(sent, vec![5, 6]);
        let metrics = world.metrics("session");
        assert_eq!(metrics.succeeded, 1);
        assert_eq!(metrics.aborted, 1);
    }

    #[test]
    fn test_kind_routing_between_notifiers() {
        let mut cfg = config(3, 100, 50);
        cfg.notifiers = vec![
            NotifierConfig {
                name: "n1".into(),
                kinds: vec![SourceKind::Publish],
            },
            NotifierConfig {
                name: "n2".into(),
                kinds: vec![SourceKind::Synchronize],
            },
        ];
        let world = World::new(&cfg);
        world.directory.connect("s1");

        assert_eq!(world.change("svc", 1, SourceKind::Publish), 1);
        assert_eq!(world.metrics("n1").fanouts, 1);
        assert_eq!(world.metrics("n2").fanouts, 0);

        assert_eq!(world.change("svc", 2, SourceKind::Synchronize), 1);
        assert_eq!(world.metrics("n2").fanouts, 1);

        assert_eq!(world.change("svc", 3, SourceKind::Snapshot), 0);
        assert_eq!(world.transport.call_count(), 2);
    }

    #[test]
    fn test_scheduler_saturation_loses_only_that_attempt() {
        let world = World::new(&config(3, 100, 50));
        world.directory.connect("s1");
        world.directory.connect("s2");
        world.transport.script("s1", rejections(1));
        world.transport.script("s2", rejections(1));
        world.scheduler.reject_next(1);

        world.change("svc", 1, SourceKind::Publish);
        world.scheduler.run_until_idle(16);

        let metrics = world.metrics("session");
        assert_eq!(metrics.rejected, 1);
        assert_eq!(metrics.succeeded, 1);
        assert_eq!(metrics.in_flight(), 0);
    }

    #[test]
    fn test_disconnect_during_backoff() {
        let world = World::new(&config(3, 100, 50));
        world.directory.connect("s1");
        world.transport.script("s1", rejections(1));

        world.change("svc", 1, SourceKind::Publish);
        world.directory.disconnect("s1");
        world.scheduler.run_until_idle(16);

        assert_eq!(world.transport.calls_to("s1"), 1);
        assert_eq!(world.metrics("session").connection_dead, 1);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use adapters::{
        InMemoryConnectionDirectory, SimulatedSubscribers, SpawningTransport, SubscriberBehavior,
        VersionTable,
    };
    use contracts::{DataItemChange, NotifyConfig, SourceKind};
    use dispatcher::{NotifierDeps, NotifierRegistry};
    use retry_timer::{HashedWheelTimer, LogFailureHandler};
    use tokio::runtime::Handle;
    use tokio::time::Instant;

    const PARTITION: &str = "dc1";

    struct Stack {
        versions: Arc<VersionTable>,
        subscribers: Arc<SimulatedSubscribers>,
        timer: Arc<HashedWheelTimer>,
        registry: NotifierRegistry,
    }

    fn stack(config: &NotifyConfig, peers: &[(&str, SubscriberBehavior)]) -> Stack {
        let directory = Arc::new(InMemoryConnectionDirectory::new());
        let subscribers = Arc::new(SimulatedSubscribers::new());
        for (peer, behavior) in peers {
            subscribers.add(*peer, behavior.clone());
            directory.connect(*peer);
        }
        let versions = Arc::new(VersionTable::new());
        let timer = Arc::new(
            HashedWheelTimer::new("e2e", &config.timer, Arc::new(LogFailureHandler)).unwrap(),
        );
        let deps = NotifierDeps {
            directory,
            oracle: versions.clone(),
            transport: Arc::new(SpawningTransport::new(
                Arc::clone(&subscribers),
                Handle::current(),
            )),
            scheduler: timer.clone(),
        };
        let registry = NotifierRegistry::from_config(config, &deps).unwrap();
        Stack {
            versions,
            subscribers,
            timer,
            registry,
        }
    }

    async fn settle(registry: &NotifierRegistry) {
        for _ in 0..1_000 {
            if registry.in_flight() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("attempts did not settle");
    }

    fn config() -> NotifyConfig {
        let mut config = NotifyConfig::default();
        config.retry.max_retries = 3;
        config.retry.first_delay_ms = 100;
        config.retry.increment_delay_ms = 50;
        config.transport.response_timeout_ms = 1_000;
        config.timer.tick_ms = 10;
        config
    }

    /// End-to-end: flaky subscriber recovers through wheel-timer retries
    ///
    /// 验证完整的投递路径：
    /// 1. Registry 按类型路由变更
    /// 2. SpawningTransport 异步发送并回调
    /// 3. HashedWheelTimer 按线性退避触发重试
    #[tokio::test(start_paused = true)]
    async fn test_e2e_flaky_subscriber_recovers() {
        let stack = stack(
            &config(),
            &[
                ("steady", SubscriberBehavior::default()),
                (
                    "flaky",
                    SubscriberBehavior {
                        fail_first: 2,
                        ..Default::default()
                    },
                ),
            ],
        );

        let start = Instant::now();
        stack.versions.put(PARTITION, "svc", 1);
        stack
            .registry
            .dispatch(&DataItemChange::new("svc", PARTITION, 1, SourceKind::Publish));
        settle(&stack.registry).await;

        // Two failures: retries after 100 ms and 150 ms
        assert!(start.elapsed() >= Duration::from_millis(250));
        assert_eq!(stack.subscribers.calls("flaky"), 3);
        assert_eq!(stack.subscribers.calls("steady"), 1);
        assert_eq!(
            stack.subscribers.delivered_version("flaky", PARTITION, "svc"),
            Some(1)
        );
        let (_, metrics) = &stack.registry.metrics()[0];
        assert_eq!(metrics.succeeded, 2);
        assert_eq!(stack.timer.pending(), 0);
        stack.timer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_timeout_exhausts_budget() {
        let mut cfg = config();
        cfg.transport.response_timeout_ms = 50;
        let stack = stack(
            &cfg,
            &[(
                "slow",
                SubscriberBehavior {
                    latency: Duration::from_secs(10),
                    ..Default::default()
                },
            )],
        );

        stack.versions.put(PARTITION, "svc", 1);
        stack
            .registry
            .dispatch(&DataItemChange::new("svc", PARTITION, 1, SourceKind::Publish));
        settle(&stack.registry).await;

        let (_, metrics) = &stack.registry.metrics()[0];
        assert_eq!(metrics.sends, 4);
        assert_eq!(metrics.exhausted, 1);
        stack.timer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_superseded_retry_never_resends() {
        let stack = stack(
            &config(),
            &[(
                "flaky",
                SubscriberBehavior {
                    fail_first: 1,
                    ..Default::default()
                },
            )],
        );

        stack.versions.put(PARTITION, "X", 5);
        stack
            .registry
            .dispatch(&DataItemChange::new("X", PARTITION, 5, SourceKind::Publish));
        // Let the first send fail, then advance the item
        tokio::time::sleep(Duration::from_millis(20)).await;
        stack.versions.put(PARTITION, "X", 6);
        settle(&stack.registry).await;

        assert_eq!(stack.subscribers.calls("flaky"), 1);
        assert_eq!(stack.subscribers.delivered_version("flaky", PARTITION, "X"), None);
        let (_, metrics) = &stack.registry.metrics()[0];
        assert_eq!(metrics.aborted, 1);
        stack.timer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_retry_burst_beyond_worker_concurrency() {
        let cfg = config();
        let names: Vec<String> = (0..100).map(|i| format!("sub-{i}")).collect();
        let peers: Vec<(&str, SubscriberBehavior)> = names
            .iter()
            .map(|name| {
                (
                    name.as_str(),
                    SubscriberBehavior {
                        fail_first: 1,
                        ..Default::default()
                    },
                )
            })
            .collect();
        let stack = stack(&cfg, &peers);

        // All 100 retries share the first delay and expire in one tick
        stack.versions.put(PARTITION, "svc", 1);
        stack
            .registry
            .dispatch(&DataItemChange::new("svc", PARTITION, 1, SourceKind::Publish));
        settle(&stack.registry).await;

        let (_, metrics) = &stack.registry.metrics()[0];
        assert!(100 > cfg.timer.worker_concurrency);
        assert_eq!(metrics.attempts, 100);
        assert_eq!(metrics.sends, 200);
        assert_eq!(metrics.succeeded, 100);
        assert_eq!(stack.registry.in_flight(), 0);
        for name in &names {
            assert_eq!(
                stack.subscribers.delivered_version(name, PARTITION, "svc"),
                Some(1)
            );
        }
        stack.timer.stop();
    }
}
