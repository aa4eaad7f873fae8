use std::sync::Arc;

use anyhow::{bail, Result};
use refresher_core::{Config, DocumentList, JsonDocumentList};
use refresher_engine::EngineConfig;
use refresher_scheduler::SchedulerTiming;
use tracing::debug;

use crate::cli::CliArgs;

/// Effective settings: environment config, then the document file, then
/// command-line overrides.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub base: Config,
    pub documents: Arc<JsonDocumentList>,
    /// Saved state of the document file at startup.
    pub saved: DocumentList,
}

impl CliConfig {
    pub fn resolve(args: &CliArgs) -> Self {
        refresher_core::config::load_dotenv();
        let mut base = Config::from_env();

        if let Some(path) = &args.documents {
            base.documents_file = path.clone();
        }
        if let Some(secs) = args.wait_secs {
            base.refresh.wait_secs = secs;
        }
        if let Some(secs) = args.timeout_secs {
            base.refresh.timeout_secs = secs;
        }

        let documents = Arc::new(JsonDocumentList::new(base.documents_file.clone()));
        let saved = documents.load();
        debug!(
            path = %base.documents_file.display(),
            files = saved.files.len(),
            "document list loaded"
        );

        Self {
            base,
            documents,
            saved,
        }
    }

    /// Schedule slots: explicit flag, then the document file, then
    /// SCHEDULE_TIMES.
    pub fn schedule_times(&self, flag: &[String]) -> Vec<String> {
        if !flag.is_empty() {
            return flag.to_vec();
        }
        let saved = self.saved.schedule_times();
        if !saved.is_empty() {
            return saved;
        }
        self.base.scheduler.times.clone()
    }

    /// Refuse to run the daemon when the document file turned auto
    /// refresh off, unless forced.
    pub fn ensure_auto_refresh(&self, force: bool) -> Result<()> {
        if !self.saved.auto_refresh_enabled && !force {
            bail!(
                "auto refresh is disabled in {}; pass --force to start anyway",
                self.base.documents_file.display()
            );
        }
        Ok(())
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig::from(&self.base.refresh)
    }

    pub fn timing(&self) -> SchedulerTiming {
        SchedulerTiming::from(&self.base.scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refresher_core::DocumentEntry;

    fn config_with(saved: DocumentList) -> CliConfig {
        CliConfig {
            base: Config::for_profile("CLITEST"),
            documents: Arc::new(JsonDocumentList::new("unused.json")),
            saved,
        }
    }

    #[test]
    fn flag_times_win() {
        let saved = DocumentList {
            schedule_times: vec!["08:00".into()],
            ..DocumentList::default()
        };
        let cfg = config_with(saved);
        assert_eq!(cfg.schedule_times(&["07:15".to_string()]), vec!["07:15"]);
        assert_eq!(cfg.schedule_times(&[]), vec!["08:00"]);
    }

    #[test]
    fn legacy_single_time_is_used() {
        let saved = DocumentList {
            files: vec![DocumentEntry::Path("a.xlsx".into())],
            schedule_time: Some("21:30".into()),
            ..DocumentList::default()
        };
        assert_eq!(config_with(saved).schedule_times(&[]), vec!["21:30"]);
    }

    #[test]
    fn disabled_auto_refresh_refuses_unless_forced() {
        let cfg = config_with(DocumentList {
            auto_refresh_enabled: false,
            ..DocumentList::default()
        });
        let err = cfg.ensure_auto_refresh(false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert!(cfg.ensure_auto_refresh(true).is_ok());

        let enabled = config_with(DocumentList {
            auto_refresh_enabled: true,
            ..DocumentList::default()
        });
        assert!(enabled.ensure_auto_refresh(false).is_ok());
    }

    #[test]
    fn falls_back_to_environment_times() {
        let cfg = config_with(DocumentList::default());
        assert_eq!(cfg.schedule_times(&[]), cfg.base.scheduler.times);
    }
}
