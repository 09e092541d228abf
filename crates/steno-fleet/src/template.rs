// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Launch plan construction.
//!
//! Every platform resolves through the same dispatch table to a task
//! template and the same worker command line. Platforms differ only in
//! which task definition and container they map to.

use steno_core::platform::MeetingPlatform;

use crate::config::Config;

/// Everything the runtime needs to start one worker task.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    /// Task definition to launch from.
    pub task_definition: String,
    /// Container receiving the command override.
    pub container_name: String,
    /// Full command override.
    pub command: Vec<String>,
}

/// Resolve the launch plan for a bot joining `meeting_url` on `platform`.
///
/// The worker command starts the audio daemon and then the recorder with
/// the staged upload URLs. `--max-waiting-time` caps how long the worker
/// sits in the meeting lobby before giving up on its own.
pub fn build_launch_plan(
    config: &Config,
    platform: MeetingPlatform,
    meeting_url: &str,
    bot_name: &str,
    archive_url: &str,
    audio_url: &str,
) -> LaunchPlan {
    let template = config.template_for(platform);
    let script = format!(
        "pulseaudio --start && python app.py '{meeting_url}' \
         --bot-name \"{bot_name}\" \
         --presigned-url-combined \"{archive_url}\" \
         --presigned-url-audio \"{audio_url}\" \
         --max-waiting-time {}",
        config.worker_max_wait_secs
    );

    LaunchPlan {
        task_definition: template.task_definition.clone(),
        container_name: template.container_name.clone(),
        command: vec!["/bin/bash".to_string(), "-c".to_string(), script],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskTemplate;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            region: "us-east-1".to_string(),
            cluster: "steno".to_string(),
            subnet: "subnet-1".to_string(),
            security_group: "sg-1".to_string(),
            artifact_bucket: "steno-artifacts".to_string(),
            google_template: TaskTemplate {
                task_definition: "meet-bot:3".to_string(),
                container_name: "meet-bot".to_string(),
            },
            zoom_template: TaskTemplate {
                task_definition: "zoom-bot:5".to_string(),
                container_name: "zoom-bot".to_string(),
            },
            teams_template: TaskTemplate {
                task_definition: "teams-bot:2".to_string(),
                container_name: "teams-bot".to_string(),
            },
            max_retries: 2,
            launch_lookahead: Duration::from_secs(600),
            sync_window: Duration::from_secs(86_400),
            worker_max_wait_secs: 8_100,
            upload_ttl: Duration::from_secs(8_000),
            sync_interval: Duration::from_secs(300),
            launch_interval: Duration::from_secs(600),
            record_interval: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_dispatch_by_platform() {
        let config = test_config();
        for (platform, task_definition) in [
            (MeetingPlatform::GoogleMeet, "meet-bot:3"),
            (MeetingPlatform::Zoom, "zoom-bot:5"),
            (MeetingPlatform::Teams, "teams-bot:2"),
        ] {
            let plan = build_launch_plan(&config, platform, "https://x", "b", "https://a", "https://u");
            assert_eq!(plan.task_definition, task_definition);
        }
    }

    #[test]
    fn test_command_shape() {
        let config = test_config();
        let plan = build_launch_plan(
            &config,
            MeetingPlatform::GoogleMeet,
            "https://meet.google.com/abc-defg-hij",
            "Steno Notetaker",
            "https://bucket/archive.tar?sig",
            "https://bucket/audio.opus?sig",
        );

        assert_eq!(plan.command.len(), 3);
        assert_eq!(plan.command[0], "/bin/bash");
        assert_eq!(plan.command[1], "-c");

        let script = &plan.command[2];
        assert!(script.starts_with("pulseaudio --start && python app.py"));
        assert!(script.contains("'https://meet.google.com/abc-defg-hij'"));
        assert!(script.contains("--bot-name \"Steno Notetaker\""));
        assert!(script.contains("--presigned-url-combined \"https://bucket/archive.tar?sig\""));
        assert!(script.contains("--presigned-url-audio \"https://bucket/audio.opus?sig\""));
        // The wait cap is part of the script, inside the shell string.
        assert!(script.ends_with("--max-waiting-time 8100"));
    }
}
