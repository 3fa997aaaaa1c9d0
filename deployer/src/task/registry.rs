//! Task registration, ordering and sequential execution

use tracing::{info_span, Instrument};

use crate::errors::DeployError;
use crate::logs::Logger;
use crate::task::context::{Collaborators, RunState, TaskContext};
use crate::task::fsm::{RegistryEvent, RegistryFsm, RegistryState};
use crate::task::types::{Task, TaskPosition};

/// Task after which the `AfterReleaseUpload` group is spliced
pub const RELEASE_UPLOAD_ANCHOR: &str = "releases:upload";

/// Holds registered tasks by position and flattens them into one sequence
pub struct TaskRegistry {
    first: Option<Task>,
    order: Vec<Task>,
    after_release_upload: Vec<Task>,
    direct: Vec<Task>,
    assembled: Vec<Task>,
    fsm: RegistryFsm,
    logger: Logger,
}

impl TaskRegistry {
    pub fn new(logger: Logger) -> Self {
        Self {
            first: None,
            order: Vec::new(),
            after_release_upload: Vec::new(),
            direct: Vec::new(),
            assembled: Vec::new(),
            fsm: RegistryFsm::new(),
            logger,
        }
    }

    pub fn state(&self) -> &RegistryState {
        self.fsm.state()
    }

    /// Whether any group or the direct list holds a task with this name
    pub fn contains(&self, name: &str) -> bool {
        self.first.iter().any(|task| task.name == name)
            || [&self.order, &self.after_release_upload, &self.direct]
                .iter()
                .any(|group| group.iter().any(|task| task.name == name))
    }

    /// Register a task.
    ///
    /// Returns `Ok(false)` when a task with the same name is already
    /// registered; the existing task is kept. A new `First` task demotes the
    /// previous holder of the slot to the front of the `Order` group.
    pub fn add_task(&mut self, task: Task, position: TaskPosition) -> Result<bool, DeployError> {
        if !self.fsm.accepts_registrations() {
            return Err(DeployError::InvalidTransition(format!(
                "cannot register task \"{}\" in state {:?}",
                task.name,
                self.fsm.state()
            )));
        }

        if self.contains(&task.name) {
            self.logger
                .warn(format!("Duplicate task name \"{}\", new one is skipped", task.name));
            return Ok(false);
        }

        match position {
            TaskPosition::First => {
                if let Some(previous) = self.first.replace(task) {
                    if !self.order.iter().any(|t| t.name == previous.name) {
                        self.order.insert(0, previous);
                    }
                }
            }
            TaskPosition::Order => self.order.push(task),
            TaskPosition::AfterReleaseUpload => self.after_release_upload.push(task),
            TaskPosition::Direct => self.direct.push(task),
        }

        self.fsm.process(RegistryEvent::Register)?;
        Ok(true)
    }

    /// Flatten every group into the execution sequence:
    /// `first`, then `order`, then the direct list, with the
    /// `AfterReleaseUpload` group right after the anchor task.
    pub fn assemble(&mut self) -> Result<&[Task], DeployError> {
        let mut tasks: Vec<Task> = self.first.iter().cloned().collect();
        tasks.extend(self.order.iter().cloned());
        tasks.extend(self.direct.iter().cloned());

        if !self.after_release_upload.is_empty() {
            let anchor = tasks
                .iter()
                .position(|task| task.name == RELEASE_UPLOAD_ANCHOR)
                .ok_or_else(|| DeployError::AnchorMissing(RELEASE_UPLOAD_ANCHOR.to_string()))?;
            let tail = tasks.split_off(anchor + 1);
            tasks.extend(self.after_release_upload.iter().cloned());
            tasks.extend(tail);
        }

        self.fsm.process(RegistryEvent::Assemble)?;
        self.assembled = tasks;
        Ok(&self.assembled)
    }

    /// Close registrations and run only the direct list; grouped tasks are left out
    pub fn assemble_direct_only(&mut self) -> Result<&[Task], DeployError> {
        self.fsm.process(RegistryEvent::Assemble)?;
        self.assembled = self.direct.clone();
        Ok(&self.assembled)
    }

    /// The assembled sequence; empty before assembly
    pub fn assembled_tasks(&self) -> &[Task] {
        &self.assembled
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.assembled.iter().map(|task| task.name.as_str()).collect()
    }

    pub fn get_task(&self, name: &str) -> Option<&Task> {
        self.assembled.iter().find(|task| task.name == name)
    }

    /// Run one assembled task by name; its release changes are kept in `run`
    pub async fn run_task(
        &self,
        name: &str,
        run: &mut RunState,
        collaborators: &Collaborators,
    ) -> Result<(), DeployError> {
        let task = self
            .get_task(name)
            .ok_or_else(|| DeployError::TaskError(format!("Task {name} not found")))?;

        self.logger.info(format!("executing task \"{}\"", task.name));
        let mut ctx = TaskContext::new(run, collaborators);
        task.executor
            .execute(&mut ctx)
            .instrument(info_span!("task", name = %task.name))
            .await?;
        run.release = ctx.release;
        Ok(())
    }

    /// Run the assembled sequence in order, stopping at the first failure
    pub async fn run_all_tasks(
        &mut self,
        run: &mut RunState,
        collaborators: &Collaborators,
    ) -> Result<(), DeployError> {
        self.fsm.process(RegistryEvent::Execute)?;

        let tasks = self.assembled.clone();
        for task in &tasks {
            if let Err(e) = self.run_task(&task.name, run, collaborators).await {
                self.logger.error(format!("task \"{}\" failed", task.name));
                self.logger.error(&e);
                self.fsm.process(RegistryEvent::Fail(e.to_string()))?;
                return Err(DeployError::TaskFailed {
                    task: task.name.clone(),
                    source: Box::new(e),
                });
            }
        }

        self.fsm.process(RegistryEvent::Complete)?;
        self.logger.info("All tasks finished");
        Ok(())
    }

    /// Drop every registration and the assembled sequence
    pub fn clear(&mut self) -> Result<(), DeployError> {
        self.first = None;
        self.order.clear();
        self.after_release_upload.clear();
        self.direct.clear();
        self.assembled.clear();
        self.fsm.process(RegistryEvent::Reset)
    }
}
