//! Main execution engine - runs triggered jobs until the build network is idle

use crate::{
    core::{
        error::BuildError,
        pipeline::{PipelineResult, StepObserver},
        property::WORKERNAME,
        state::{JobState, StepRecord},
        step::Action,
    },
    execution::{
        registry::{BuilderEntry, BuilderRegistry},
        scheduler::{FireDecision, JobScheduler},
        trigger::TriggerEvent,
        worker::WorkerPool,
    },
    runner::{RunnerError, StepRequest, StepRunner},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events that can occur while jobs run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    JobQueued {
        job: String,
        trigger: String,
    },
    TriggerIgnored {
        job: String,
        trigger: String,
        state: JobState,
    },
    JobStarted {
        execution_id: Uuid,
        job: String,
        worker: String,
    },
    StepFinished {
        job: String,
        record: StepRecord,
    },
    JobFinished {
        execution_id: Uuid,
        job: String,
        status: JobState,
        failed_step: Option<String>,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// One finished run of a job
#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    pub execution_id: Uuid,
    pub job_id: String,
    pub worker: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub result: PipelineResult,
}

impl JobRun {
    pub fn status(&self) -> JobState {
        if self.result.completed {
            JobState::Completed
        } else {
            JobState::Failed
        }
    }
}

/// Inputs of the dispatcher loop
#[derive(Debug)]
enum Message {
    Fire(TriggerEvent),
    Started { job: String },
    Finished(JobRun),
}

/// Fan events out to every handler
#[derive(Clone, Default)]
struct Emitter {
    handlers: Arc<Vec<EventHandler>>,
}

impl Emitter {
    fn emit(&self, event: ExecutionEvent) {
        for handler in self.handlers.iter() {
            handler(event.clone());
        }
    }
}

impl StepObserver for Emitter {
    fn on_step(&self, job: &str, record: &StepRecord) {
        self.emit(ExecutionEvent::StepFinished {
            job: job.to_string(),
            record: record.clone(),
        });
    }
}

/// Runner decorator that turns trigger steps into engine messages
struct TriggeringRunner {
    inner: Arc<dyn StepRunner>,
    queue: UnboundedSender<Message>,
}

#[async_trait]
impl StepRunner for TriggeringRunner {
    async fn run(&self, request: &StepRequest<'_>) -> Result<String, RunnerError> {
        let Action::Trigger { targets } = request.action else {
            return self.inner.run(request).await;
        };

        for trigger in targets {
            debug!("{} fires {}", request.job, trigger);
            self.queue
                .send(Message::Fire(TriggerEvent::from_job(trigger.as_str(), request.job)))
                .map_err(|_| RunnerError::Internal("engine queue closed".to_string()))?;
        }
        Ok(format!("triggered {}", targets.join(", ")))
    }

    fn worker_properties(&self, job: &str, worker: &str) -> BTreeMap<String, String> {
        self.inner.worker_properties(job, worker)
    }
}

/// Runs registered jobs in response to triggers.
///
/// A single dispatcher loop owns every job state. Each queued job runs on
/// its own task once it has leased a worker, so different jobs proceed
/// concurrently while the steps of one job stay strictly sequential.
pub struct ExecutionEngine {
    registry: Arc<BuilderRegistry>,
    runner: Arc<dyn StepRunner>,
    workers: WorkerPool,
    event_handlers: Vec<EventHandler>,
}

impl ExecutionEngine {
    pub fn new(registry: Arc<BuilderRegistry>, runner: Arc<dyn StepRunner>) -> Self {
        let workers = WorkerPool::new(registry.builders().flat_map(|b| b.workers.iter().cloned()));
        Self {
            registry,
            runner,
            workers,
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    pub fn registry(&self) -> &BuilderRegistry {
        &self.registry
    }

    /// Fire the triggers that start the given jobs and run until idle
    pub async fn run_jobs(&self, jobs: &[String]) -> Result<Vec<JobRun>, BuildError> {
        let mut triggers = Vec::new();
        for job in jobs {
            let fired = self.registry.graph().triggers_for(job);
            if fired.is_empty() {
                return Err(BuildError::DanglingTrigger {
                    source_name: "run request".to_string(),
                    what: "builder",
                    target: job.clone(),
                });
            }
            triggers.extend(fired.into_iter().map(String::from));
        }
        self.run_until_idle(&triggers).await
    }

    /// Fire `initial_triggers` and run until no job is queued or running
    /// and no message is pending. Returns every finished run in completion
    /// order.
    pub async fn run_until_idle(&self, initial_triggers: &[String]) -> Result<Vec<JobRun>, BuildError> {
        if let Some(unknown) = initial_triggers
            .iter()
            .find(|t| self.registry.trigger_targets(t).is_none())
        {
            return Err(BuildError::DanglingTrigger {
                source_name: "run request".to_string(),
                what: "trigger",
                target: unknown.clone(),
            });
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        for trigger in initial_triggers {
            // The receiver is alive, so sending cannot fail
            let _ = tx.send(Message::Fire(TriggerEvent::external(trigger.as_str())));
        }

        let emitter = Emitter {
            handlers: Arc::new(self.event_handlers.clone()),
        };
        let runner: Arc<dyn StepRunner> = Arc::new(TriggeringRunner {
            inner: self.runner.clone(),
            queue: tx.clone(),
        });
        let mut scheduler = JobScheduler::new(&self.registry);
        let mut in_flight = 0usize;
        let mut runs = Vec::new();

        loop {
            let message = match rx.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) if in_flight == 0 => break,
                Err(TryRecvError::Empty) => match rx.recv().await {
                    Some(message) => message,
                    None => break,
                },
                Err(TryRecvError::Disconnected) => break,
            };

            match message {
                Message::Fire(event) => {
                    let targets = self.registry.trigger_targets(&event.trigger).unwrap_or(&[]);
                    for decision in scheduler.fire(targets) {
                        match decision {
                            FireDecision::Queue(job) => {
                                info!("Queued {} (trigger {})", job, event.trigger);
                                emitter.emit(ExecutionEvent::JobQueued {
                                    job: job.clone(),
                                    trigger: event.trigger.clone(),
                                });

                                let Some(entry) = self.registry.builder(&job).cloned() else {
                                    continue;
                                };
                                in_flight += 1;
                                tokio::spawn(run_job(
                                    entry,
                                    self.workers.clone(),
                                    runner.clone(),
                                    emitter.clone(),
                                    tx.clone(),
                                ));
                            }
                            FireDecision::Ignore { job, state } => {
                                warn!("Ignoring trigger {} for {}: job is {}", event.trigger, job, state.as_str());
                                emitter.emit(ExecutionEvent::TriggerIgnored {
                                    job,
                                    trigger: event.trigger.clone(),
                                    state,
                                });
                            }
                        }
                    }
                }
                Message::Started { job } => scheduler.start(&job),
                Message::Finished(run) => {
                    in_flight -= 1;
                    scheduler.finish(&run.job_id, run.result.completed);
                    emitter.emit(ExecutionEvent::JobFinished {
                        execution_id: run.execution_id,
                        job: run.job_id.clone(),
                        status: run.status(),
                        failed_step: run.result.failed_step.clone(),
                    });
                    runs.push(run);
                }
            }
        }

        info!("Build network idle after {} job runs", runs.len());
        Ok(runs)
    }
}

async fn run_job(
    entry: BuilderEntry,
    workers: WorkerPool,
    runner: Arc<dyn StepRunner>,
    emitter: Emitter,
    queue: UnboundedSender<Message>,
) {
    let execution_id = Uuid::new_v4();
    let started_at = Utc::now();

    let (worker, result) = match workers.lease(&entry.workers).await {
        Some(lease) => {
            let _ = queue.send(Message::Started {
                job: entry.job_id.clone(),
            });
            info!("Starting {} on {} ({})", entry.job_id, lease.name(), execution_id);
            emitter.emit(ExecutionEvent::JobStarted {
                execution_id,
                job: entry.job_id.clone(),
                worker: lease.name().to_string(),
            });

            let mut initial = entry.pipeline.initial_properties().clone();
            initial.extend(runner.worker_properties(&entry.job_id, lease.name()));
            initial.insert(WORKERNAME.as_str().to_string(), lease.name().to_string());

            let result = entry.pipeline.run_with_observer(&initial, runner.as_ref(), &emitter).await;
            (lease.name().to_string(), result)
        }
        None => {
            // Registration guarantees a non-empty pool drawn from the same names
            warn!("No worker available for {}", entry.job_id);
            let result = PipelineResult {
                job_name: entry.job_id.clone(),
                completed: false,
                failed_step: None,
                properties: BTreeMap::new(),
                records: Vec::new(),
            };
            (String::new(), result)
        }
    };

    let _ = queue.send(Message::Finished(JobRun {
        execution_id,
        job_id: entry.job_id,
        worker,
        started_at,
        completed_at: Utc::now(),
        result,
    }));
}
