//! Verification choreography on top of the raw control-plane calls:
//! restart-on-changed, the oslo debug-toggle variant, and pause/resume.

use crate::client::HarnessClient;
use crate::error::HarnessError;
use imgcheck::{ConfigDelta, ConfigSections, ServiceState, debug, info};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;
use tokio::time::sleep;

/// Restart counters per service, captured before a config change.
pub type RestartMarks = BTreeMap<String, u64>;

fn timeout_config() -> (u32, u64) {
    // Returns (max_attempts, sleep_ms)
    if env::var("CI").is_ok() {
        (60, 500) // 30 seconds total in CI
    } else {
        (30, 200) // 6 seconds locally
    }
}

impl HarnessClient {
    /// Capture the restart counters of the named services.
    pub async fn restart_marks(&self, services: &[&str]) -> Result<RestartMarks, HarnessError> {
        let statuses = self.service_statuses().await?;
        let mut marks = RestartMarks::new();
        for name in services {
            let status = statuses
                .iter()
                .find(|status| status.name == *name)
                .ok_or_else(|| HarnessError::ServiceNotFound {
                    name: name.to_string(),
                })?;
            marks.insert(status.name.clone(), status.restart_count);
        }
        Ok(marks)
    }

    /// Poll until every marked service has restarted past its mark.
    pub async fn wait_for_restart(&self, marks: &RestartMarks) -> Result<(), HarnessError> {
        let (max_attempts, sleep_ms) = timeout_config();
        for _ in 0..max_attempts {
            let statuses = self.service_statuses().await?;
            let restarted = marks.iter().all(|(name, mark)| {
                statuses
                    .iter()
                    .any(|status| status.name == *name && status.restart_count > *mark)
            });
            if restarted {
                return Ok(());
            }
            sleep(Duration::from_millis(sleep_ms)).await;
        }
        Err(HarnessError::Timeout {
            what: format!("services to restart: {:?}", marks.keys().collect::<Vec<_>>()),
        })
    }

    /// Poll until a service reaches the expected state.
    pub async fn wait_for_state(
        &self,
        service: &str,
        state: ServiceState,
    ) -> Result<(), HarnessError> {
        let (max_attempts, sleep_ms) = timeout_config();
        for _ in 0..max_attempts {
            if self.service_status(service).await?.state == state {
                return Ok(());
            }
            sleep(Duration::from_millis(sleep_ms)).await;
        }
        Err(HarnessError::Timeout {
            what: format!("service '{service}' to reach state '{state}'"),
        })
    }

    /// Pause a service and verify it stops.
    pub async fn pause(&self, service: &str) -> Result<(), HarnessError> {
        info!("pausing service '{service}'");
        self.service_action(service, "pause").await?;
        self.wait_for_state(service, ServiceState::Stopped).await
    }

    /// Resume a service and verify it starts.
    pub async fn resume(&self, service: &str) -> Result<(), HarnessError> {
        info!("resuming service '{service}'");
        self.service_action(service, "resume").await?;
        self.wait_for_state(service, ServiceState::Running).await
    }

    /// Pause the named services, verify they stop, then resume them and
    /// verify they start again.
    pub async fn pause_resume(&self, services: &[&str]) -> Result<(), HarnessError> {
        for service in services {
            self.pause(service).await?;
        }
        for service in services {
            self.resume(service).await?;
        }
        Ok(())
    }

    /// Apply the alternate configuration, assert the rendered file reflects
    /// it and the named services restarted; then revert to the default and
    /// assert the same symmetrically.
    #[allow(clippy::too_many_arguments)]
    pub async fn restart_on_changed(
        &self,
        path: &str,
        default_delta: &ConfigDelta,
        alternate_delta: &ConfigDelta,
        expected_default: &ConfigSections,
        expected_alternate: &ConfigSections,
        services: &[&str],
    ) -> Result<(), HarnessError> {
        let marks = self.restart_marks(services).await?;
        self.set_config(alternate_delta).await?;
        self.wait_for_restart(&marks).await?;
        self.verify_rendered(path, expected_alternate).await?;

        let marks = self.restart_marks(services).await?;
        self.set_config(default_delta).await?;
        self.wait_for_restart(&marks).await?;
        self.verify_rendered(path, expected_default).await
    }

    /// Toggle the generic oslo-style `debug` flag and verify that exactly
    /// the services mapped to each config file restart, both on the way in
    /// and on the way back out.
    pub async fn restart_on_changed_debug(
        &self,
        services_by_file: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), HarnessError> {
        let services: Vec<&str> = services_by_file
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        let set_on = ConfigDelta::new().with("debug", "true");
        let set_off = ConfigDelta::new().with("debug", "false");
        let expected_on = ConfigSections::new().with_option("DEFAULT", "debug", "true");
        let expected_off = ConfigSections::new().with_option("DEFAULT", "debug", "false");

        let marks = self.restart_marks(&services).await?;
        self.set_config(&set_on).await?;
        self.wait_for_restart(&marks).await?;
        for path in services_by_file.keys() {
            self.verify_rendered(path, &expected_on).await?;
        }

        let marks = self.restart_marks(&services).await?;
        self.set_config(&set_off).await?;
        self.wait_for_restart(&marks).await?;
        for path in services_by_file.keys() {
            self.verify_rendered(path, &expected_off).await?;
        }
        Ok(())
    }

    /// Fetch and parse a rendered config file and check the expected
    /// sections appear in it.
    pub async fn verify_rendered(
        &self,
        path: &str,
        expected: &ConfigSections,
    ) -> Result<(), HarnessError> {
        let content = self.rendered_file(path).await?;
        let sections = ConfigSections::parse(&content).map_err(|e| HarnessError::Decode {
            operation: format!("parse rendered file '{path}'"),
            message: e.to_string(),
        })?;
        debug!("verifying rendered '{path}' against expected sections");
        if !sections.contains(expected) {
            return Err(HarnessError::ConfigMismatch {
                path: path.to_string(),
                expected: expected.render(),
                found: content,
            });
        }
        Ok(())
    }
}
