// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock task runtime for testing.
//!
//! Simulates the orchestrator without any network: launches hand out
//! sequential handles, and tests script stop codes onto tasks to drive
//! reconciliation one way or the other.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::{Result, RuntimeError, TaskDescription, TaskRuntime};

#[derive(Debug, Clone)]
struct MockTask {
    last_status: String,
    stop_code: Option<String>,
    stopped_reason: Option<String>,
    task_definition: String,
    container_name: String,
    command: Vec<String>,
}

/// Mock task runtime for testing.
#[derive(Default)]
pub struct MockRuntime {
    tasks: Arc<Mutex<HashMap<String, MockTask>>>,
    next_handle: AtomicU64,
    /// If true, launches are accepted but start nothing.
    pub fail_launches: AtomicBool,
    /// If true, describe calls fail with a transport error.
    pub fail_describes: AtomicBool,
}

impl MockRuntime {
    /// Create a new mock runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent launches start nothing.
    pub fn refuse_launches(&self) {
        self.fail_launches.store(true, Ordering::SeqCst);
    }

    /// Make subsequent describe calls fail at the transport level.
    pub fn break_describes(&self) {
        self.fail_describes.store(true, Ordering::SeqCst);
    }

    /// Stop a task with the given stop code, as if the platform killed it.
    pub async fn stop_with_code(&self, handle: &str, code: &str) {
        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.get_mut(handle) {
            task.last_status = "STOPPED".to_string();
            task.stop_code = Some(code.to_string());
            task.stopped_reason = Some(format!("mock stop: {code}"));
        }
    }

    /// Stop a task cleanly with no stop code, as if the worker exited on
    /// its own after the meeting ended.
    pub async fn complete(&self, handle: &str) {
        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.get_mut(handle) {
            task.last_status = "STOPPED".to_string();
            task.stop_code = None;
            task.stopped_reason = None;
        }
    }

    /// Commands of every task launched so far, in launch order.
    pub async fn launched_commands(&self) -> Vec<Vec<String>> {
        let tasks = self.tasks.lock().await;
        let mut handles: Vec<&String> = tasks.keys().collect();
        handles.sort();
        handles
            .into_iter()
            .map(|h| tasks[h].command.clone())
            .collect()
    }

    /// Number of launches performed.
    pub async fn launch_count(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

#[async_trait]
impl TaskRuntime for MockRuntime {
    async fn run_task(
        &self,
        task_definition: &str,
        container_name: &str,
        command: &[String],
        count: u32,
    ) -> Result<Vec<String>> {
        if self.fail_launches.load(Ordering::SeqCst) {
            return Err(RuntimeError::NoTasksStarted);
        }

        let mut handles = Vec::with_capacity(count as usize);
        let mut tasks = self.tasks.lock().await;
        for _ in 0..count {
            let n = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
            let handle = format!("task-{n:04}");
            tasks.insert(
                handle.clone(),
                MockTask {
                    last_status: "RUNNING".to_string(),
                    stop_code: None,
                    stopped_reason: None,
                    task_definition: task_definition.to_string(),
                    container_name: container_name.to_string(),
                    command: command.to_vec(),
                },
            );
            handles.push(handle);
        }
        Ok(handles)
    }

    async fn stop_task(&self, handle: &str) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(handle)
            .ok_or_else(|| RuntimeError::TaskNotFound(handle.to_string()))?;
        task.last_status = "STOPPED".to_string();
        task.stop_code = Some("UserInitiated".to_string());
        task.stopped_reason = Some("Task stopped by user".to_string());
        Ok(())
    }

    async fn describe_task(&self, handle: &str) -> Result<TaskDescription> {
        if self.fail_describes.load(Ordering::SeqCst) {
            return Err(RuntimeError::Transport("mock describe outage".to_string()));
        }

        let tasks = self.tasks.lock().await;
        let task = tasks
            .get(handle)
            .ok_or_else(|| RuntimeError::TaskNotFound(handle.to_string()))?;
        Ok(TaskDescription {
            handle: handle.to_string(),
            last_status: task.last_status.clone(),
            stop_code: task.stop_code.clone(),
            stopped_reason: task.stopped_reason.clone(),
            task_definition: task.task_definition.clone(),
            container_name: Some(task.container_name.clone()),
            command: Some(task.command.clone()),
        })
    }

    async fn list_tasks(&self) -> Result<Vec<String>> {
        let tasks = self.tasks.lock().await;
        let mut handles: Vec<String> = tasks.keys().cloned().collect();
        handles.sort();
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Vec<String> {
        vec!["/bin/bash".to_string(), "-c".to_string(), "true".to_string()]
    }

    #[tokio::test]
    async fn test_launch_and_describe() {
        let runtime = MockRuntime::new();
        let handles = runtime
            .run_task("meet-bot:3", "meet-bot", &command(), 1)
            .await
            .unwrap();
        assert_eq!(handles.len(), 1);

        let desc = runtime.describe_task(&handles[0]).await.unwrap();
        assert_eq!(desc.last_status, "RUNNING");
        assert!(!desc.is_stopped());
        assert_eq!(desc.task_definition, "meet-bot:3");
        assert_eq!(desc.command, Some(command()));
    }

    #[tokio::test]
    async fn test_scripted_infra_stop() {
        let runtime = MockRuntime::new();
        let handles = runtime
            .run_task("meet-bot:3", "meet-bot", &command(), 1)
            .await
            .unwrap();

        runtime.stop_with_code(&handles[0], "OutOfMemoryError").await;
        let desc = runtime.describe_task(&handles[0]).await.unwrap();
        assert!(desc.is_stopped());
        assert_eq!(desc.stop_code.as_deref(), Some("OutOfMemoryError"));
    }

    #[tokio::test]
    async fn test_refused_launch() {
        let runtime = MockRuntime::new();
        runtime.refuse_launches();
        let err = runtime
            .run_task("meet-bot:3", "meet-bot", &command(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NoTasksStarted));
    }

    #[tokio::test]
    async fn test_list_tasks() {
        let runtime = MockRuntime::new();
        assert!(runtime.list_tasks().await.unwrap().is_empty());

        let mut handles = runtime
            .run_task("meet-bot:3", "meet-bot", &command(), 2)
            .await
            .unwrap();
        handles.sort();
        assert_eq!(runtime.list_tasks().await.unwrap(), handles);
    }

    #[tokio::test]
    async fn test_stop_unknown_task() {
        let runtime = MockRuntime::new();
        let err = runtime.stop_task("task-9999").await.unwrap_err();
        assert!(matches!(err, RuntimeError::TaskNotFound(_)));
    }
}
