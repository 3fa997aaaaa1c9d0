//! Task registry tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use happy_deployer::errors::DeployError;
use happy_deployer::logs::Logger;
use happy_deployer::task::fsm::RegistryState;
use happy_deployer::task::{
    DeployerAction, RunState, Task, TaskContext, TaskExecutor, TaskPosition, TaskRegistry,
};

use crate::fakes::{base_params, prod_params, FakeRemote, Fakes};

type Journal = Arc<Mutex<Vec<String>>>;

fn recording(name: &str, journal: &Journal) -> Task {
    let journal = journal.clone();
    let entry = name.to_string();
    Task::from_fn(name, move |_ctx| {
        let journal = journal.clone();
        let entry = entry.clone();
        async move {
            journal.lock().unwrap().push(entry);
            Ok(())
        }
    })
}

fn run_state() -> RunState {
    let config = base_params().merge(prod_params()).resolve().unwrap();
    RunState::new(DeployerAction::Deploy, config)
}

#[test]
fn test_group_order_is_preserved() {
    let journal = Journal::default();
    let mut registry = TaskRegistry::new(Logger::new());
    let registrations = [
        ("o1", TaskPosition::Order),
        ("d1", TaskPosition::Direct),
        ("a1", TaskPosition::AfterReleaseUpload),
        ("releases:upload", TaskPosition::Direct),
        ("o2", TaskPosition::Order),
        ("f1", TaskPosition::First),
        ("a2", TaskPosition::AfterReleaseUpload),
        ("d2", TaskPosition::Direct),
        ("o3", TaskPosition::Order),
    ];
    for (name, position) in registrations {
        assert!(registry.add_task(recording(name, &journal), position).unwrap());
    }

    let assembled = registry.assemble().unwrap();
    assert_eq!(assembled.len(), registrations.len());
    assert_eq!(
        registry.task_names(),
        vec!["f1", "o1", "o2", "o3", "d1", "releases:upload", "a1", "a2", "d2"]
    );
}

#[test]
fn test_first_slot_keeps_latest_and_demotes_to_order_front() {
    let journal = Journal::default();
    let mut registry = TaskRegistry::new(Logger::new());
    registry.add_task(recording("o1", &journal), TaskPosition::Order).unwrap();
    registry.add_task(recording("first-a", &journal), TaskPosition::First).unwrap();
    registry.add_task(recording("first-b", &journal), TaskPosition::First).unwrap();
    registry.add_task(recording("first-c", &journal), TaskPosition::First).unwrap();

    registry.assemble().unwrap();
    assert_eq!(registry.task_names(), vec!["first-c", "first-b", "first-a", "o1"]);
}

#[tokio::test]
async fn test_duplicate_keeps_original_executor() {
    let journal = Journal::default();
    let fakes = Fakes::new(FakeRemote::default());
    let mut registry = TaskRegistry::new(Logger::new());

    registry.add_task(recording("build", &journal), TaskPosition::Order).unwrap();
    let duplicate = Task::from_fn("build", |_ctx| async {
        Err(DeployError::TaskError("duplicate ran".to_string()))
    });
    assert!(!registry.add_task(duplicate, TaskPosition::Direct).unwrap());

    registry.assemble().unwrap();
    assert_eq!(registry.assembled_tasks().len(), 1);

    let mut run = run_state();
    registry.run_all_tasks(&mut run, &fakes.collaborators()).await.unwrap();
    assert_eq!(*journal.lock().unwrap(), vec!["build".to_string()]);
    assert_eq!(registry.state(), &RegistryState::Finished);
}

struct RenameRelease;

#[async_trait]
impl TaskExecutor for RenameRelease {
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), DeployError> {
        ctx.release.name = "renamed".to_string();
        Ok(())
    }
}

#[tokio::test]
async fn test_context_reflects_earlier_tasks() {
    let seen = Journal::default();
    let fakes = Fakes::new(FakeRemote::default());
    let mut registry = TaskRegistry::new(Logger::new());

    let observer = {
        let seen = seen.clone();
        Task::from_fn("observe", move |ctx: TaskContext| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(format!("{}:{}", ctx.action, ctx.release_name()));
                Ok(())
            }
        })
    };
    registry.add_task(observer.clone(), TaskPosition::Direct).unwrap();
    registry.add_task(Task::new("rename", RenameRelease), TaskPosition::Direct).unwrap();
    registry
        .add_task(Task { name: "observe-again".to_string(), ..observer }, TaskPosition::Direct)
        .unwrap();
    registry.assemble().unwrap();

    let mut run = run_state();
    registry.run_all_tasks(&mut run, &fakes.collaborators()).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["deploy:20220522150000".to_string(), "deploy:renamed".to_string()]
    );
    assert_eq!(run.release.name, "renamed");
}

#[tokio::test]
async fn test_failure_stops_remaining_tasks() {
    let journal = Journal::default();
    let fakes = Fakes::new(FakeRemote::default());
    let mut registry = TaskRegistry::new(Logger::new());

    registry.add_task(recording("one", &journal), TaskPosition::Direct).unwrap();
    registry
        .add_task(
            Task::from_fn("explode", |_ctx| async {
                Err::<(), DeployError>(anyhow::anyhow!("boom").into())
            }),
            TaskPosition::Direct,
        )
        .unwrap();
    registry.add_task(recording("three", &journal), TaskPosition::Direct).unwrap();
    registry.assemble().unwrap();

    let mut run = run_state();
    let err = registry
        .run_all_tasks(&mut run, &fakes.collaborators())
        .await
        .unwrap_err();

    match err {
        DeployError::TaskFailed { task, source } => {
            assert_eq!(task, "explode");
            assert!(matches!(*source, DeployError::TaskError(ref msg) if msg == "boom"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*journal.lock().unwrap(), vec!["one".to_string()]);
    assert_eq!(registry.state(), &RegistryState::Aborted);
}

#[tokio::test]
async fn test_run_single_task_by_name() {
    let journal = Journal::default();
    let fakes = Fakes::new(FakeRemote::default());
    let mut registry = TaskRegistry::new(Logger::new());
    registry.add_task(recording("one", &journal), TaskPosition::Direct).unwrap();
    registry.add_task(recording("two", &journal), TaskPosition::Direct).unwrap();
    registry.assemble().unwrap();

    let mut run = run_state();
    registry.run_task("two", &mut run, &fakes.collaborators()).await.unwrap();
    assert_eq!(*journal.lock().unwrap(), vec!["two".to_string()]);

    assert!(registry
        .run_task("missing", &mut run, &fakes.collaborators())
        .await
        .is_err());
}

#[test]
fn test_running_before_assembly_is_rejected() {
    let fakes = Fakes::new(FakeRemote::default());
    let mut registry = TaskRegistry::new(Logger::new());
    let mut run = run_state();

    let result = tokio_test::block_on(registry.run_all_tasks(&mut run, &fakes.collaborators()));
    assert!(matches!(result, Err(DeployError::InvalidTransition(_))));
}
