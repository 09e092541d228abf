// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ECS-backed task runtime client.
//!
//! Talks to the ECS JSON API directly: one signed POST per operation with
//! an `X-Amz-Target` header naming the action. Task handles exposed to the
//! rest of the fleet are the bare task id, the last segment of the ARN.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::traits::{Result, RuntimeError, TaskDescription, TaskRuntime};
use crate::config::Config;
use crate::sigv4::SigningKey;

const API_VERSION: &str = "AmazonEC2ContainerServiceV20141113";

/// ECS task runtime client.
pub struct EcsRuntime {
    http: reqwest::Client,
    signer: SigningKey,
    host: String,
    cluster: String,
    subnet: String,
    security_group: String,
}

impl EcsRuntime {
    /// Build a client from fleet configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            signer: SigningKey {
                access_key: config.access_key.clone(),
                secret_key: config.secret_key.clone(),
                region: config.region.clone(),
            },
            host: format!("ecs.{}.amazonaws.com", config.region),
            cluster: config.cluster.clone(),
            subnet: config.subnet.clone(),
            security_group: config.security_group.clone(),
        }
    }

    async fn call(&self, action: &str, payload: serde_json::Value) -> Result<serde_json::Value> {
        let target = format!("{API_VERSION}.{action}");
        let body = payload.to_string();
        let signed = self
            .signer
            .sign_json_post("ecs", &self.host, &target, &body, chrono::Utc::now());

        let response = self
            .http
            .post(format!("https://{}/", self.host))
            .header("Content-Type", "application/x-amz-json-1.1")
            .header("X-Amz-Target", &target)
            .header("X-Amz-Date", &signed.amz_date)
            .header("Authorization", &signed.authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;

        if !status.is_success() {
            let api: ApiError = serde_json::from_str(&text).unwrap_or_default();
            return Err(RuntimeError::Api {
                code: api.kind.unwrap_or_else(|| status.to_string()),
                message: api.message.unwrap_or(text),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl TaskRuntime for EcsRuntime {
    async fn run_task(
        &self,
        task_definition: &str,
        container_name: &str,
        command: &[String],
        count: u32,
    ) -> Result<Vec<String>> {
        let payload = json!({
            "cluster": self.cluster,
            "taskDefinition": task_definition,
            "count": count,
            "launchType": "FARGATE",
            "networkConfiguration": {
                "awsvpcConfiguration": {
                    "subnets": [self.subnet],
                    "securityGroups": [self.security_group],
                    "assignPublicIp": "ENABLED",
                }
            },
            "overrides": {
                "containerOverrides": [{
                    "name": container_name,
                    "command": command,
                }]
            },
        });

        let raw = self.call("RunTask", payload).await?;
        let response: RunTaskResponse = serde_json::from_value(raw)?;

        for failure in &response.failures {
            warn!(
                reason = %failure.reason.as_deref().unwrap_or("unknown"),
                detail = ?failure.detail,
                "Runtime reported a launch failure"
            );
        }

        if response.tasks.is_empty() {
            return Err(RuntimeError::NoTasksStarted);
        }

        Ok(response
            .tasks
            .iter()
            .map(|task| task_id(&task.task_arn).to_string())
            .collect())
    }

    async fn stop_task(&self, handle: &str) -> Result<()> {
        debug!(task = handle, "Stopping task");
        self.call(
            "StopTask",
            json!({ "cluster": self.cluster, "task": handle }),
        )
        .await?;
        Ok(())
    }

    async fn describe_task(&self, handle: &str) -> Result<TaskDescription> {
        let raw = self
            .call(
                "DescribeTasks",
                json!({ "cluster": self.cluster, "tasks": [handle] }),
            )
            .await?;
        let response: DescribeTasksResponse = serde_json::from_value(raw)?;

        let task = response
            .tasks
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::TaskNotFound(handle.to_string()))?;

        let container_override = task
            .overrides
            .and_then(|o| o.container_overrides.into_iter().next());

        Ok(TaskDescription {
            handle: task_id(&task.task_arn).to_string(),
            last_status: task.last_status,
            stop_code: task.stop_code,
            stopped_reason: task.stopped_reason,
            task_definition: task.task_definition_arn,
            container_name: container_override.as_ref().and_then(|c| c.name.clone()),
            command: container_override.and_then(|c| c.command),
        })
    }

    async fn list_tasks(&self) -> Result<Vec<String>> {
        let raw = self
            .call("ListTasks", json!({ "cluster": self.cluster }))
            .await?;
        let response: ListTasksResponse = serde_json::from_value(raw)?;
        Ok(response
            .task_arns
            .iter()
            .map(|arn| task_id(arn).to_string())
            .collect())
    }
}

/// Bare task id from a task ARN.
fn task_id(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(rename = "__type")]
    kind: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunTaskResponse {
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    failures: Vec<Failure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeTasksResponse {
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksResponse {
    #[serde(default)]
    task_arns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Task {
    task_arn: String,
    #[serde(default)]
    last_status: String,
    stop_code: Option<String>,
    stopped_reason: Option<String>,
    #[serde(default)]
    task_definition_arn: String,
    overrides: Option<TaskOverrides>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskOverrides {
    #[serde(default)]
    container_overrides: Vec<ContainerOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerOverride {
    name: Option<String>,
    command: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Failure {
    reason: Option<String>,
    detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_from_arn() {
        assert_eq!(
            task_id("arn:aws:ecs:us-east-1:123456789012:task/steno/abc123def456"),
            "abc123def456"
        );
        assert_eq!(task_id("bare-id"), "bare-id");
    }

    #[test]
    fn test_run_task_response_decodes() {
        let raw = serde_json::json!({
            "tasks": [{
                "taskArn": "arn:aws:ecs:us-east-1:1:task/c/t1",
                "lastStatus": "PROVISIONING",
                "taskDefinitionArn": "arn:aws:ecs:us-east-1:1:task-definition/meet:3",
            }],
            "failures": [],
        });
        let response: RunTaskResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.tasks.len(), 1);
        assert_eq!(task_id(&response.tasks[0].task_arn), "t1");
    }

    #[test]
    fn test_describe_response_carries_overrides() {
        let raw = serde_json::json!({
            "tasks": [{
                "taskArn": "arn:aws:ecs:us-east-1:1:task/c/t1",
                "lastStatus": "STOPPED",
                "stopCode": "OutOfMemoryError",
                "stoppedReason": "oom",
                "taskDefinitionArn": "arn:aws:ecs:us-east-1:1:task-definition/meet:3",
                "overrides": {
                    "containerOverrides": [{
                        "name": "meet-bot",
                        "command": ["/bin/bash", "-c", "echo"],
                    }]
                },
            }],
        });
        let response: DescribeTasksResponse = serde_json::from_value(raw).unwrap();
        let task = &response.tasks[0];
        assert_eq!(task.stop_code.as_deref(), Some("OutOfMemoryError"));
        assert_eq!(
            task.overrides.as_ref().unwrap().container_overrides[0]
                .name
                .as_deref(),
            Some("meet-bot")
        );
    }
}
