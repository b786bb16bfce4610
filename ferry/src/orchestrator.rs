//! Drives one repository at a time through listing, planning and transfer.
//!
//! A failing repository is reported and the run moves on to the next one,
//! unless `fail_fast` is set. Once an interrupt has been observed no further
//! repositories are started.

use std::path::PathBuf;

use ferry_config::{Items, RepositoryConfig};
use ferry_core::error::Result;
use ferry_core::{FerryError, Interrupt};
use ferry_source::timestamp::format_ledger;
use ferry_source::{JsonFetcher, TagSource};
use ferry_sync::{plan, ContainerRuntime, Ledger, TransferExecutor};
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub history_dir: PathBuf,
    /// Repository names to sync; empty means all of them.
    pub only: Vec<String>,
    pub fail_fast: bool,
}

#[derive(Debug)]
pub enum RepositoryOutcome {
    Synced { transferred: usize },
    UpToDate,
    /// Dry run: tags that would have been transferred.
    Planned { transfers: usize },
    Failed(FerryError),
}

impl RepositoryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RepositoryOutcome::Failed(_))
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<(String, RepositoryOutcome)>,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn outcome(&self, name: &str) -> Option<&RepositoryOutcome> {
        self.outcomes
            .iter()
            .find(|(repo, _)| repo == name)
            .map(|(_, outcome)| outcome)
    }

    /// True when every attempted repository synced or was already current.
    pub fn succeeded(&self) -> bool {
        self.failed() == 0 && !self.interrupted
    }

    fn record(&mut self, name: &str, outcome: RepositoryOutcome) {
        self.outcomes.push((name.to_string(), outcome));
    }
}

pub struct Orchestrator<F, R> {
    source: TagSource<F>,
    /// `None` for a dry run.
    executor: Option<TransferExecutor<R>>,
    settings: RunSettings,
    interrupt: Interrupt,
}

impl<F: JsonFetcher, R: ContainerRuntime> Orchestrator<F, R> {
    pub fn new(
        source: TagSource<F>,
        executor: Option<TransferExecutor<R>>,
        settings: RunSettings,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            source,
            executor,
            settings,
            interrupt,
        }
    }

    pub fn run(&mut self, items: &Items) -> RunSummary {
        let mut summary = RunSummary::default();

        // Configuration problems are reported before any network traffic.
        let mut repos = Vec::new();
        for (name, spec) in items {
            if !self.is_selected(name) {
                debug!(repo = %name, "Not selected, skipping");
                continue;
            }
            match RepositoryConfig::resolve(name, spec) {
                Ok(repo) => repos.push(repo),
                Err(e) => {
                    error!(repo = %name, error = %e, "Invalid repository configuration");
                    summary.record(name, RepositoryOutcome::Failed(e));
                }
            }
        }
        for wanted in &self.settings.only {
            if !items.contains_key(wanted) {
                warn!(repo = %wanted, "Requested repository is not in the items file");
            }
        }

        if self.settings.fail_fast && summary.failed() > 0 {
            return summary;
        }

        for repo in &repos {
            if self.interrupt.is_set() {
                warn!("Interrupted, remaining repositories skipped");
                break;
            }

            let span = info_span!("repository", repo = %repo.name);
            let outcome = span.in_scope(|| self.sync_repository(repo));
            let failed = outcome.is_failure();
            summary.record(&repo.name, outcome);

            if failed && self.settings.fail_fast {
                warn!(repo = %repo.name, "Stopping after the first failed repository");
                break;
            }
        }

        summary.interrupted = self.interrupt.is_set();
        info!(
            repositories = summary.outcomes.len(),
            failed = summary.failed(),
            interrupted = summary.interrupted,
            "Run complete"
        );
        summary
    }

    fn is_selected(&self, name: &str) -> bool {
        self.settings.only.is_empty() || self.settings.only.iter().any(|only| only == name)
    }

    fn sync_repository(&mut self, repo: &RepositoryConfig) -> RepositoryOutcome {
        match self.try_sync(repo) {
            Ok(outcome) => {
                match &outcome {
                    RepositoryOutcome::Synced { transferred } => {
                        info!(count = transferred, "Repository synced")
                    }
                    RepositoryOutcome::UpToDate => info!("Nothing to sync"),
                    RepositoryOutcome::Planned { transfers } => {
                        info!(count = transfers, "Dry run, nothing transferred")
                    }
                    RepositoryOutcome::Failed(_) => {}
                }
                outcome
            }
            Err(e) => {
                match &e {
                    FerryError::Interrupted => {
                        warn!("Interrupted, pulled images cleaned up")
                    }
                    FerryError::EmptySource(_) => {
                        error!(source = %repo.source_ref, "{}, check the source path", e)
                    }
                    _ => error!(error = %e, "Repository sync failed"),
                }
                RepositoryOutcome::Failed(e)
            }
        }
    }

    fn try_sync(&mut self, repo: &RepositoryConfig) -> Result<RepositoryOutcome> {
        info!(
            source = %repo.source_ref,
            target = %repo.target_ref,
            limit = repo.tag_limit,
            "Syncing {}", repo.name
        );

        let source = self.source.list_tags(repo)?;
        let mut ledger = Ledger::load(&self.settings.history_dir, &repo.domain, &repo.name)?;
        let plan = plan(repo, &source, ledger.records())?;

        if let Some(latest) = plan.latest() {
            info!(
                tag = %latest.tag,
                updated_at = %format_ledger(&latest.updated_at),
                "Latest version"
            );
        }
        info!(
            source = source.len(),
            history = ledger.len(),
            sync = plan.transfers.len(),
            "Src List / History List / Sync List"
        );

        if plan.is_empty() {
            return Ok(RepositoryOutcome::UpToDate);
        }

        let Some(executor) = self.executor.as_mut() else {
            for record in &plan.transfers {
                info!(
                    tag = %record.tag,
                    digest = %record.digest,
                    image = %repo.target_image(&record.tag),
                    "Would transfer"
                );
            }
            return Ok(RepositoryOutcome::Planned {
                transfers: plan.transfers.len(),
            });
        };

        let transferred = executor.run(repo, &plan.transfers, &mut ledger)?;
        Ok(RepositoryOutcome::Synced { transferred })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use ferry_config::items::parse_items;
    use ferry_config::RegistryAuth;
    use ferry_source::SourceOptions;
    use ferry_sync::test_utils::{Call, FakeRuntime};
    use ferry_sync::RetryPolicy;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CannedFetcher {
        responses: HashMap<String, Value>,
    }

    impl CannedFetcher {
        fn quay(mut self, repo: &str, tags: Value) -> Self {
            self.responses.insert(
                format!(
                    "https://quay.io/api/v1/repository/coreos/{}/tag/?limit=100&page=1&onlyActiveTags=true",
                    repo
                ),
                json!({ "tags": tags, "has_additional": false }),
            );
            self
        }
    }

    impl JsonFetcher for CannedFetcher {
        fn get_json(&self, url: &str) -> Result<Value> {
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| FerryError::Source(format!("GET {} returned 404", url)))
        }
    }

    const ITEMS: &str = r#"
etcd:
  source: quay.io/coreos/
  target: registry.example.com/mirror/
  tag:
    limit: 2
flannel:
  source: quay.io/coreos/
  target: registry.example.com/mirror/
  tag:
    limit: 5
"#;

    fn fetcher() -> CannedFetcher {
        CannedFetcher::default()
            .quay(
                "etcd",
                json!([
                    {"name": "v3", "manifest_digest": "sha256:3", "start_ts": 300},
                    {"name": "v2", "manifest_digest": "sha256:2", "start_ts": 200},
                    {"name": "v1", "manifest_digest": "sha256:1", "start_ts": 100},
                ]),
            )
            .quay(
                "flannel",
                json!([{"name": "v0.1", "manifest_digest": "sha256:f", "start_ts": 50}]),
            )
    }

    fn orchestrator<'a>(
        fetcher: CannedFetcher,
        runtime: Option<&'a FakeRuntime>,
        history: &TempDir,
        settings: RunSettings,
    ) -> Orchestrator<CannedFetcher, &'a FakeRuntime> {
        let options = SourceOptions {
            hub_page_delay: Duration::ZERO,
            ..SourceOptions::default()
        };
        let executor = runtime.map(|runtime| {
            TransferExecutor::new(runtime, RegistryAuth::new("mirror", "secret"))
                .with_retry(RetryPolicy::new(6, Duration::ZERO))
        });
        Orchestrator::new(
            TagSource::new(fetcher, options),
            executor,
            RunSettings {
                history_dir: history.path().to_path_buf(),
                ..settings
            },
            Interrupt::new(),
        )
    }

    #[test]
    fn test_syncs_every_repository_then_is_idempotent() {
        let history = TempDir::new().expect("should create temp dir");
        let runtime = FakeRuntime::new();
        let items = parse_items(ITEMS).expect("should parse items");

        let summary = orchestrator(fetcher(), Some(&runtime), &history, RunSettings::default())
            .run(&items);
        assert!(summary.succeeded());
        assert!(matches!(
            summary.outcome("etcd"),
            Some(RepositoryOutcome::Synced { transferred: 2 })
        ));
        assert!(matches!(
            summary.outcome("flannel"),
            Some(RepositoryOutcome::Synced { transferred: 1 })
        ));

        let second = orchestrator(fetcher(), Some(&runtime), &history, RunSettings::default())
            .run(&items);
        assert!(second.succeeded());
        assert!(matches!(second.outcome("etcd"), Some(RepositoryOutcome::UpToDate)));
        assert_eq!(runtime.count(|c| matches!(c, Call::Push(_))), 3);
    }

    #[test]
    fn test_failed_repository_does_not_stop_the_run() {
        let history = TempDir::new().expect("should create temp dir");
        let runtime = FakeRuntime::new();
        runtime.fail_pull("quay.io/coreos/etcd:v3", 6);
        let items = parse_items(ITEMS).expect("should parse items");

        let summary = orchestrator(fetcher(), Some(&runtime), &history, RunSettings::default())
            .run(&items);

        assert!(!summary.succeeded());
        assert!(matches!(
            summary.outcome("etcd"),
            Some(RepositoryOutcome::Failed(FerryError::Transfer(_)))
        ));
        assert!(matches!(
            summary.outcome("flannel"),
            Some(RepositoryOutcome::Synced { transferred: 1 })
        ));
        assert!(runtime.pulled_images().is_empty());
    }

    #[test]
    fn test_fail_fast_stops_after_first_failure() {
        let history = TempDir::new().expect("should create temp dir");
        let runtime = FakeRuntime::new();
        runtime.fail_tag("quay.io/coreos/etcd:v3");
        let items = parse_items(ITEMS).expect("should parse items");
        let settings = RunSettings {
            fail_fast: true,
            ..RunSettings::default()
        };

        let summary = orchestrator(fetcher(), Some(&runtime), &history, settings).run(&items);

        assert_eq!(summary.outcomes.len(), 1);
        assert!(summary.outcome("flannel").is_none());
    }

    #[test]
    fn test_empty_source_and_unknown_host_fail_only_their_entry() {
        let history = TempDir::new().expect("should create temp dir");
        let runtime = FakeRuntime::new();
        let items = parse_items(
            r#"
etcd:
  source: quay.io/coreos/
  target: registry.example.com/mirror/
  tag:
    limit: 2
internal:
  source: registry.corp.example/team/
  target: registry.example.com/mirror/
  tag:
    limit: 2
flannel:
  source: quay.io/coreos/
  target: registry.example.com/mirror/
  tag:
    limit: 5
"#,
        )
        .expect("should parse items");
        let fetcher = fetcher().quay("etcd", json!([]));

        let summary =
            orchestrator(fetcher, Some(&runtime), &history, RunSettings::default()).run(&items);

        assert!(matches!(
            summary.outcome("internal"),
            Some(RepositoryOutcome::Failed(FerryError::Config(_)))
        ));
        assert!(matches!(
            summary.outcome("etcd"),
            Some(RepositoryOutcome::Failed(FerryError::EmptySource(_)))
        ));
        assert!(matches!(
            summary.outcome("flannel"),
            Some(RepositoryOutcome::Synced { transferred: 1 })
        ));
    }

    #[test]
    fn test_dry_run_touches_neither_runtime_nor_ledger() {
        let history = TempDir::new().expect("should create temp dir");
        let items = parse_items(ITEMS).expect("should parse items");

        let summary = orchestrator(fetcher(), None, &history, RunSettings::default()).run(&items);

        assert!(summary.succeeded());
        assert!(matches!(
            summary.outcome("etcd"),
            Some(RepositoryOutcome::Planned { transfers: 2 })
        ));
        let ledger = Ledger::load(history.path(), "quay.io", "etcd").expect("should load ledger");
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_only_selects_repositories() {
        let history = TempDir::new().expect("should create temp dir");
        let runtime = FakeRuntime::new();
        let items = parse_items(ITEMS).expect("should parse items");
        let settings = RunSettings {
            only: vec!["flannel".to_string()],
            ..RunSettings::default()
        };

        let summary = orchestrator(fetcher(), Some(&runtime), &history, settings).run(&items);

        assert_eq!(summary.outcomes.len(), 1);
        assert!(summary.outcome("etcd").is_none());
    }

    #[test]
    fn test_interrupt_skips_remaining_repositories() {
        let history = TempDir::new().expect("should create temp dir");
        let runtime = FakeRuntime::new();
        let items = parse_items(ITEMS).expect("should parse items");
        let interrupt = Interrupt::new();
        runtime.interrupt_on_pull("quay.io/coreos/etcd:v2", interrupt.clone());

        let executor = TransferExecutor::new(&runtime, RegistryAuth::new("mirror", "secret"))
            .with_retry(RetryPolicy::new(6, Duration::ZERO))
            .with_interrupt(interrupt.clone());
        let mut orchestrator = Orchestrator::new(
            TagSource::new(fetcher(), SourceOptions::default()).with_interrupt(interrupt.clone()),
            Some(executor),
            RunSettings {
                history_dir: history.path().to_path_buf(),
                ..RunSettings::default()
            },
            interrupt,
        );

        let summary = orchestrator.run(&items);

        assert!(summary.interrupted);
        assert!(!summary.succeeded());
        assert!(matches!(
            summary.outcome("etcd"),
            Some(RepositoryOutcome::Failed(FerryError::Interrupted))
        ));
        assert!(summary.outcome("flannel").is_none());
        assert!(runtime.pulled_images().is_empty());

        let ledger = Ledger::load(history.path(), "quay.io", "etcd").expect("should load ledger");
        assert_eq!(ledger.len(), 1);
    }
}
