//! The task loop: one task at a time from claim to pull request.
//!
//! ```text
//!  list ─▶ claim ─▶ branch ─▶ agent ─▶ commit ─▶ review loop ─▶ tests
//!                                                                 │
//!   base ◀─ notify ◀─ close? ◀─ in_review ◀─ label ◀─ PR ◀─ push ◀┘
//! ```
//!
//! A failing task is counted and the loop moves on. Gate failures are not
//! task failures; they shape the PR title and labels instead.

use crate::agent::{task_prompt, Agent};
use crate::config::Config;
use crate::error::{ForemanError, Result};
use crate::forge::{Forge, NewPullRequest};
use crate::labels::{compute_labels, label_color};
use crate::lock::RunLock;
use crate::metrics::{Counter, MetricsStore};
use crate::notify::{Notification, Notify, NotifyStatus};
use crate::paths;
use crate::pr::compose_pr;
use crate::progress::ProgressLog;
use crate::review::review_loop;
use crate::scan::{findings_markdown, split_advice};
use crate::task::{self, TaskRecord};
use crate::test_gate::TestGate;
use crate::tracker::TaskSource;
use crate::vcs::{branch_name, Repo};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub max_tasks: Option<usize>,
    /// Only process the task with this id or key.
    pub task_id: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TaskResult {
    /// Dry run: would have been processed.
    Planned,
    Published {
        pr_url: String,
        review: String,
        tests: String,
        closed: bool,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub key: String,
    pub title: String,
    #[serde(flatten)]
    pub result: TaskResult,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<TaskOutcome>,
}

/// Everything the loop talks to.
pub struct Driver<'a> {
    pub config: &'a Config,
    pub tracker: &'a dyn TaskSource,
    pub coder: &'a dyn Agent,
    pub reviewer: &'a dyn Agent,
    pub repo: &'a dyn Repo,
    pub forge: &'a dyn Forge,
    pub notifier: &'a dyn Notify,
}

impl Driver<'_> {
    pub fn run(&self, opts: &RunOptions) -> Result<RunSummary> {
        let span = tracing::info_span!("run", id = %uuid::Uuid::new_v4());
        let _enter = span.enter();
        let root = self.repo.root();
        let _lock = if opts.dry_run {
            None
        } else {
            Some(RunLock::try_acquire(&paths::run_lock_path(root))?)
        };

        let pending = self.tracker.list_pending()?;
        let tasks = task::select(pending, opts.task_id.as_deref(), opts.max_tasks)?;
        tracing::info!(
            tracker = self.tracker.name(),
            count = tasks.len(),
            dry_run = opts.dry_run,
            "tasks selected"
        );

        let mut summary = RunSummary::default();
        for task in tasks {
            summary.processed += 1;
            if opts.dry_run {
                tracing::info!(task = %task.key, title = %task.title, "would process");
                summary.outcomes.push(TaskOutcome {
                    key: task.key,
                    title: task.title,
                    result: TaskResult::Planned,
                });
                continue;
            }

            let result = match self.process(&task) {
                Ok(r) => {
                    summary.succeeded += 1;
                    r
                }
                Err(e) => {
                    summary.failed += 1;
                    self.on_failure(&task, &e);
                    TaskResult::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            self.log_progress(&task, &result);
            summary.outcomes.push(TaskOutcome {
                key: task.key,
                title: task.title,
                result,
            });
        }

        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "run finished"
        );
        Ok(summary)
    }

    fn process(&self, task: &TaskRecord) -> Result<TaskResult> {
        let cfg = self.config;
        let base = cfg.base_branch.as_str();
        let root = self.repo.root();
        let metrics = MetricsStore::new(root);

        self.tracker.mark_in_progress(task)?;
        metrics.record(Counter::TasksStarted, 1);

        let branch = branch_name(&cfg.branch_prefix, task);
        tracing::info!(task = %task.key, branch = %branch, "starting task");
        self.repo.create_branch(&branch, base)?;

        let reply = self.coder.invoke(&task_prompt(task), root)?;
        if reply.is_error {
            return Err(ForemanError::Agent(format!(
                "{} reported an error: {}",
                self.coder.name(),
                reply.text.trim()
            )));
        }
        self.repo
            .commit_all(&format!("{}: {}", task.key, task.title))?;
        if self.repo.changes(base)?.is_empty() {
            return Err(ForemanError::Agent(format!(
                "{} made no changes",
                self.coder.name()
            )));
        }

        let review = review_loop(
            self.coder,
            self.reviewer,
            self.repo,
            task,
            base,
            &cfg.review,
        )?;
        let tests = TestGate::from_config(&cfg.tests).run(root);
        let plan = compose_pr(&cfg.pr.title_prefix, task, &review.verdict, review.attempts, &tests);

        self.repo.push(&branch)?;
        let changes = self.repo.changes(base)?;
        let mut body = plan.body.clone();
        let notes = [findings_markdown(&review.findings), split_advice(&changes).to_markdown()];
        for section in notes.into_iter().flatten() {
            body.push_str("\n\n");
            body.push_str(section.trim_end());
        }
        let gates_passed = review.verdict.passed() && tests.passed();
        let labels = compute_labels(&cfg.pr.labels, &task.title, &changes, gates_passed);
        for label in &labels {
            if let Err(e) = self.forge.ensure_label(label, label_color(label)) {
                tracing::warn!(label = %label, error = %e, "could not ensure label");
            }
        }

        let pr = self.forge.open_pr(&NewPullRequest {
            title: plan.title.clone(),
            body,
            head: branch.clone(),
            base: base.to_string(),
            draft: cfg.pr.draft,
        })?;
        if let Err(e) = self.forge.add_labels(&pr, &labels) {
            tracing::warn!(pr = %pr.url, error = %e, "could not add labels");
        }
        metrics.record(Counter::TasksCompleted, 1);

        if let Err(e) = self.tracker.mark_in_review(task, &pr.url) {
            tracing::warn!(task = %task.key, error = %e, "could not move task to review");
        }
        let mut closed = false;
        if plan.close_task {
            match self
                .tracker
                .close(task, &format!("Completed by foreman in {}", pr.url))
            {
                Ok(()) => closed = true,
                Err(e) => tracing::warn!(task = %task.key, error = %e, "could not close task"),
            }
        }

        let status = if gates_passed {
            NotifyStatus::Success
        } else {
            NotifyStatus::Warning
        };
        self.notifier.notify(
            &Notification::new(plan.title.clone(), format!("Pull request opened: {}", pr.url), status)
                .field("Task", task.key.clone())
                .field("Review", review.verdict.label())
                .field("Tests", tests.reason.clone()),
        );

        self.return_to_base(task);
        Ok(TaskResult::Published {
            pr_url: pr.url,
            review: review.verdict.label().to_string(),
            tests: tests.reason,
            closed,
        })
    }

    fn on_failure(&self, task: &TaskRecord, err: &ForemanError) {
        tracing::error!(task = %task.key, error = %err, "task failed");
        MetricsStore::new(self.repo.root()).record(Counter::TasksFailed, 1);
        self.notifier.notify(
            &Notification::new(
                format!("Task {} failed", task.key),
                err.to_string(),
                NotifyStatus::Failure,
            )
            .field("Title", task.title.clone()),
        );
        self.return_to_base(task);
    }

    /// Switch back to base. Uncommitted edits left on the task branch are
    /// dropped first; nothing is discarded on any other branch.
    fn return_to_base(&self, task: &TaskRecord) {
        let branch = branch_name(&self.config.branch_prefix, task);
        match self.repo.current_branch() {
            Ok(current) if current == branch => {
                if let Err(e) = self.repo.discard_changes() {
                    tracing::warn!(branch = %branch, error = %e, "could not discard leftover changes");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "could not read current branch"),
        }
        if let Err(e) = self.repo.checkout(&self.config.base_branch) {
            tracing::warn!(base = %self.config.base_branch, error = %e, "could not return to base branch");
        }
    }

    fn log_progress(&self, task: &TaskRecord, result: &TaskResult) {
        let body = match result {
            TaskResult::Published {
                pr_url,
                review,
                tests,
                closed,
            } => format!(
                "- PR: {pr_url}\n- Review: {review}\n- Tests: {tests}\n- Closed: {closed}"
            ),
            TaskResult::Failed { reason } => format!("- Failed: {reason}"),
            TaskResult::Planned => String::new(),
        };
        let heading = format!("{} {}", task.key, task.title);
        if let Err(e) = ProgressLog::new(self.repo.root()).append(Utc::now(), &heading, &body) {
            tracing::warn!(error = %e, "could not append progress entry");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
