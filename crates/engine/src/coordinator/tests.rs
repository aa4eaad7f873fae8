#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use refresher_core::LogLevel;
    use tempfile::TempDir;

    use crate::coordinator::{CoordinatorError, RefreshCoordinator, RunOutcome, RunState};
    use crate::mock::{count, engine_with, fast_config, Behavior, MockFactory, RecordingSink};
    use crate::observer::NoopObserver;
    use crate::types::{EngineConfig, JobStatus};

    fn slow_config() -> EngineConfig {
        EngineConfig {
            wait_duration: Duration::from_secs(2),
            ..fast_config()
        }
    }

    fn workbooks(dir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, b"rows").unwrap();
                path
            })
            .collect()
    }

    fn coordinator(
        factory: Arc<MockFactory>,
        config: EngineConfig,
        paths: Vec<PathBuf>,
    ) -> (RefreshCoordinator, Arc<RecordingSink>) {
        let (engine, _engine_sink) = engine_with(factory, config, Arc::new(NoopObserver));
        let sink = Arc::new(RecordingSink::default());
        let coord = RefreshCoordinator::new(engine, Arc::new(paths), sink.clone());
        (coord, sink)
    }

    #[test]
    fn manual_run_completes_and_releases_the_slot() {
        let dir = TempDir::new().unwrap();
        let paths = workbooks(&dir, &["a.xlsx", "b.xlsx"]);
        let factory = Arc::new(MockFactory::new());
        let (coord, _sink) = coordinator(factory.clone(), fast_config(), paths);

        let result = coord.trigger_manual().unwrap().join().unwrap();

        assert_eq!(result.succeeded, 2);
        assert!(!coord.is_running());
        assert_eq!(coord.state(), RunState::default());
        assert_eq!(coord.last_outcome(), Some(RunOutcome::Completed));
        assert_eq!(coord.last_result().map(|r| r.run_id), Some(result.run_id));
        assert_eq!(count(&factory.counters.thread_inits), 1);
        assert_eq!(count(&factory.counters.thread_deinits), 1);
    }

    #[test]
    fn second_manual_trigger_is_rejected_while_running() {
        let dir = TempDir::new().unwrap();
        let paths = workbooks(&dir, &["a.xlsx"]);
        let factory = Arc::new(MockFactory::new());
        let (coord, sink) = coordinator(factory.clone(), slow_config(), paths);

        let handle = coord.trigger_manual().unwrap();
        assert!(coord.is_running());
        assert!(matches!(coord.trigger_manual(), Err(CoordinatorError::AlreadyRunning)));
        assert!(sink.contains(LogLevel::Warning, "already in progress"));

        assert!(coord.request_stop());
        handle.join().unwrap();
        assert_eq!(count(&factory.counters.thread_inits), 1);
    }

    #[test]
    fn scheduled_trigger_is_dropped_while_running() {
        let dir = TempDir::new().unwrap();
        let paths = workbooks(&dir, &["a.xlsx"]);
        let (coord, sink) = coordinator(Arc::new(MockFactory::new()), slow_config(), paths);

        let handle = coord.trigger_manual().unwrap();
        assert!(!coord.trigger_scheduled().unwrap());
        assert!(sink.contains(LogLevel::Info, "skipping scheduled refresh"));

        coord.request_stop();
        handle.join().unwrap();
        assert!(!coord.is_running());
    }

    #[test]
    fn scheduled_trigger_runs_in_background() {
        let dir = TempDir::new().unwrap();
        let paths = workbooks(&dir, &["a.xlsx"]);
        let (coord, _sink) = coordinator(Arc::new(MockFactory::new()), fast_config(), paths);

        assert!(coord.trigger_scheduled().unwrap());
        assert!(coord.wait_idle(Duration::from_secs(5)));

        assert_eq!(coord.last_outcome(), Some(RunOutcome::Completed));
        let result = coord.last_result().unwrap();
        assert_eq!(result.jobs[0].status, JobStatus::Success);
    }

    #[test]
    fn stop_truncates_batch_and_resets_both_flags() {
        let dir = TempDir::new().unwrap();
        let paths = workbooks(&dir, &["a.xlsx", "b.xlsx", "c.xlsx"]);
        let factory = Arc::new(MockFactory::new());
        let (coord, _sink) = coordinator(factory.clone(), slow_config(), paths);

        let handle = coord.trigger_manual().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(coord.request_stop());
        assert_eq!(
            coord.state(),
            RunState {
                is_running: true,
                stop_requested: true
            }
        );

        let result = handle.join().unwrap();

        assert!(result.cancelled);
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(count(&factory.counters.saves), 0);
        assert_eq!(coord.last_outcome(), Some(RunOutcome::Stopped));
        assert_eq!(coord.state(), RunState::default());
    }

    #[test]
    fn stop_without_a_run_is_a_no_op() {
        let (coord, _sink) = coordinator(Arc::new(MockFactory::new()), fast_config(), Vec::new());
        assert!(!coord.request_stop());
        assert_eq!(coord.state(), RunState::default());
        assert!(coord.wait_idle(Duration::ZERO));
    }

    #[test]
    fn empty_document_list_completes_with_warning() {
        let (coord, sink) = coordinator(Arc::new(MockFactory::new()), fast_config(), Vec::new());

        let result = coord.trigger_manual().unwrap().join().unwrap();

        assert_eq!(result.total, 0);
        assert_eq!(coord.last_outcome(), Some(RunOutcome::Completed));
        assert!(sink.contains(LogLevel::Warning, "No files configured"));
    }

    #[test]
    fn runtime_init_failure_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let paths = workbooks(&dir, &["a.xlsx"]);
        let factory = Arc::new(MockFactory::with_behavior(Behavior {
            fail_init: true,
            ..Behavior::default()
        }));
        let (coord, sink) = coordinator(factory.clone(), fast_config(), paths);

        let err = coord.trigger_manual().unwrap().join().unwrap_err();

        assert!(matches!(err, CoordinatorError::Failed(ref m) if m.contains("runtime not installed")));
        assert!(matches!(coord.last_outcome(), Some(RunOutcome::Failed(_))));
        assert!(coord.last_result().is_none());
        assert!(!coord.is_running());
        assert_eq!(count(&factory.counters.sessions_created), 0);
        assert_eq!(count(&factory.counters.thread_deinits), 0);
        assert!(sink.contains(LogLevel::Error, "Failed to initialise automation runtime"));
    }

    #[test]
    fn wait_idle_times_out_while_running() {
        let dir = TempDir::new().unwrap();
        let paths = workbooks(&dir, &["a.xlsx"]);
        let (coord, _sink) = coordinator(Arc::new(MockFactory::new()), slow_config(), paths);

        let handle = coord.trigger_manual().unwrap();
        assert!(!coord.wait_idle(Duration::from_millis(20)));

        coord.request_stop();
        assert!(coord.wait_idle(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn slot_is_reusable_after_a_run() {
        let dir = TempDir::new().unwrap();
        let paths = workbooks(&dir, &["a.xlsx"]);
        let factory = Arc::new(MockFactory::new());
        let (coord, _sink) = coordinator(factory.clone(), fast_config(), paths);

        let first = coord.trigger_manual().unwrap().join().unwrap();
        let second = coord.trigger_manual().unwrap().join().unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(count(&factory.counters.saves), 2);
        assert_eq!(count(&factory.counters.thread_deinits), 2);
    }
}
