//! Instruction execution: plan (or reuse a stored plan), then step through.
//!
//! The runner is the only consumer of the planner and executor providers.
//! A step that fails to locate its element stops the remaining steps, since
//! every later step assumes the element was found; other failures are
//! recorded per step and execution continues.

use crate::action::{Action, PlannedStep};
use crate::config::RunnerConfig;
use crate::errors::ResolutionError;
use crate::knowledge::KnowledgeStore;
use crate::providers::{ActionExecutor, StepPlanner};
use crate::resolver::{ElementResolver, Resolution};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// What happened to one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    /// The locate step could not resolve its element; subsequent steps are
    /// not attempted.
    ElementNotFound,
    Failed(String),
    /// The planner emitted an action this pipeline cannot perform.
    Skipped,
}

/// Per-step execution record.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: u32,
    pub action: Action,
    pub status: StepStatus,
}

/// Drives a whole instruction through planning and execution.
pub struct TaskRunner {
    resolver: ElementResolver,
    store: Arc<KnowledgeStore>,
    planner: Arc<dyn StepPlanner>,
    executor: Arc<dyn ActionExecutor>,
    config: RunnerConfig,
}

impl TaskRunner {
    pub fn new(
        resolver: ElementResolver,
        store: Arc<KnowledgeStore>,
        planner: Arc<dyn StepPlanner>,
        executor: Arc<dyn ActionExecutor>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            resolver,
            store,
            planner,
            executor,
            config,
        }
    }

    /// Obtain the step list for `instruction`: a sufficiently similar
    /// stored task flow is reused verbatim, otherwise the planner runs and
    /// its output is stored for next time (best effort).
    #[instrument(skip(self))]
    pub async fn load_or_plan(&self, instruction: &str) -> Result<Vec<PlannedStep>, ResolutionError> {
        let flows = self
            .store
            .search_task_flows(instruction, 1, self.config.task_flow_threshold)
            .await;
        if let Some(flow) = flows.into_iter().next() {
            info!(
                id = %flow.record.id,
                score = flow.score,
                "reusing stored task flow"
            );
            return Ok(flow.record.steps);
        }

        debug!("no stored task flow, planning");
        let steps = self
            .planner
            .plan(instruction)
            .await
            .map_err(|e| ResolutionError::Provider(format!("planning failed: {e}")))?;

        if self
            .store
            .insert_task_flow(instruction, steps.clone())
            .await
            .is_none()
        {
            warn!("planned steps could not be stored for reuse");
        }
        Ok(steps)
    }

    /// Plan and execute `instruction` end to end.
    #[instrument(skip(self))]
    pub async fn run_instruction(
        &self,
        instruction: &str,
    ) -> Result<Vec<StepOutcome>, ResolutionError> {
        let steps = self.load_or_plan(instruction).await?;
        self.run_steps(&steps).await
    }

    /// Execute an already-materialized step list.
    pub async fn run_steps(&self, steps: &[PlannedStep]) -> Result<Vec<StepOutcome>, ResolutionError> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for planned in steps {
            let action = Action::parse(&planned.action);
            debug!(step = planned.step, ?action, "executing step");

            let status = self.run_action(&action).await?;
            let stop = status == StepStatus::ElementNotFound;
            outcomes.push(StepOutcome {
                step: planned.step,
                action,
                status,
            });
            if stop {
                warn!(step = planned.step, "element not found, aborting remaining steps");
                break;
            }
        }
        info!(executed = outcomes.len(), total = steps.len(), "instruction finished");
        Ok(outcomes)
    }

    async fn run_action(&self, action: &Action) -> Result<StepStatus, ResolutionError> {
        match action {
            Action::Locate {
                element_type,
                description,
            } => {
                let resolution = self
                    .resolver
                    .resolve(description, Some(element_type))
                    .await?;
                match resolution {
                    Resolution::Resolved { from_cache, .. } => {
                        debug!(from_cache, "element resolved");
                        Ok(StepStatus::Completed)
                    }
                    Resolution::NotFound { reason } => {
                        warn!(?reason, %description, "element not found on screen");
                        Ok(StepStatus::ElementNotFound)
                    }
                }
            }
            Action::Wait(seconds) => {
                tokio::time::sleep(Duration::from_secs(*seconds)).await;
                Ok(StepStatus::Completed)
            }
            Action::Unrecognized(text) => {
                warn!(%text, "unrecognized step action, skipping");
                Ok(StepStatus::Skipped)
            }
            other => match self.executor.execute(other).await {
                Ok(()) => Ok(StepStatus::Completed),
                Err(e) => {
                    warn!(error = %e, "action execution failed");
                    Ok(StepStatus::Failed(e.to_string()))
                }
            },
        }
    }
}
