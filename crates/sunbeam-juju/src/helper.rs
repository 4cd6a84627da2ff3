//! High level juju operations used by steps
//!
//! Waits are built on the core wait bridge: an [`ApplicationStatusObserver`]
//! feeds the progress line while the terminal condition is polled.

use crate::api::{ActionOutput, ApplicationStatus, DeployOptions, JujuApi};
use crate::error::{JujuError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use sunbeam_core::{
    ProgressSink, StatusObserver, StatusWatch, WaitError, WaitOptions, wait_until,
};

#[derive(Clone)]
pub struct JujuHelper {
    api: Arc<dyn JujuApi>,
    poll_interval: Duration,
    refresh_interval: Duration,
}

impl JujuHelper {
    pub fn new(api: Arc<dyn JujuApi>) -> Self {
        let defaults = WaitOptions::default();
        Self {
            api,
            poll_interval: defaults.poll_interval,
            refresh_interval: defaults.refresh_interval,
        }
    }

    /// Override how often waits poll and refresh their status line
    pub fn with_intervals(mut self, poll: Duration, refresh: Duration) -> Self {
        self.poll_interval = poll;
        self.refresh_interval = refresh;
        self
    }

    pub fn api(&self) -> &Arc<dyn JujuApi> {
        &self.api
    }

    fn wait_options(&self, timeout: Duration) -> WaitOptions {
        WaitOptions {
            timeout,
            poll_interval: self.poll_interval,
            refresh_interval: self.refresh_interval,
        }
    }

    pub async fn model_exists(&self, model: &str) -> Result<bool> {
        self.api.model_exists(model).await
    }

    pub async fn get_application_names(&self, model: &str) -> Result<Vec<String>> {
        Ok(self
            .api
            .application_statuses(model)
            .await?
            .into_iter()
            .map(|app| app.name)
            .collect())
    }

    pub async fn get_application(&self, name: &str, model: &str) -> Result<ApplicationStatus> {
        self.api
            .application_statuses(model)
            .await?
            .into_iter()
            .find(|app| app.name == name)
            .ok_or_else(|| JujuError::ApplicationNotFound {
                app: name.to_string(),
                model: model.to_string(),
            })
    }

    /// Name of the leader unit of `name`
    pub async fn get_leader_unit(&self, name: &str, model: &str) -> Result<String> {
        let app = self.get_application(name, model).await?;
        app.leader()
            .map(|unit| unit.name.clone())
            .ok_or_else(|| JujuError::LeaderNotFound {
                app: name.to_string(),
                model: model.to_string(),
            })
    }

    pub async fn run_action(
        &self,
        unit: &str,
        model: &str,
        action: &str,
        params: Map<String, Value>,
    ) -> Result<ActionOutput> {
        tracing::debug!("Running action {} on {}", action, unit);
        self.api.run_action(model, unit, action, &params).await
    }

    pub async fn deploy(&self, options: &DeployOptions) -> Result<()> {
        tracing::debug!("Deploying {} ({}) in {}", options.name, options.charm, options.model);
        self.api.deploy(options).await
    }

    pub async fn remove_application(&self, name: &str, model: &str) -> Result<()> {
        self.api.remove_application(model, name).await
    }

    pub async fn get_saas_names(&self, model: &str) -> Result<Vec<String>> {
        self.api.saas_names(model).await
    }

    pub async fn remove_saas(&self, model: &str, names: &[String]) -> Result<()> {
        for name in names {
            tracing::debug!("Removing SAAS {} from {}", name, model);
            self.api.remove_saas(model, name).await?;
        }
        Ok(())
    }

    pub async fn get_machines(&self, model: &str) -> Result<Vec<String>> {
        self.api.machines(model).await
    }

    /// Wait until every unit of `apps` reports one of `desired` workload
    /// statuses.
    ///
    /// A unit in `error` (when `error` is not desired) ends the wait with
    /// [`JujuError::Wait`]; running out of time gives [`JujuError::Timeout`].
    pub async fn wait_until_desired_status(
        &self,
        model: &str,
        apps: &[String],
        desired: &[&str],
        timeout: Duration,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let options = self.wait_options(timeout);
        let desired: Vec<String> = desired.iter().map(|s| s.to_string()).collect();
        let observer = Arc::new(ApplicationStatusObserver::new(
            self.api.clone(),
            model,
            apps.to_vec(),
            desired.clone(),
        ));
        let watch = StatusWatch::spawn(observer, apps.len(), options.refresh_interval);
        let what = format!("{} to be {}", apps.join(", "), desired.join("/"));

        let api = self.api.clone();
        let model = model.to_string();
        let apps = apps.to_vec();
        wait_until(watch, progress, &options, &what, move || {
            let api = api.clone();
            let model = model.clone();
            let apps = apps.clone();
            let desired = desired.clone();
            async move {
                match api.application_statuses(&model).await {
                    Ok(statuses) => {
                        evaluate(&statuses, &apps, &desired).map_err(WaitError::Failed)
                    }
                    Err(e) => {
                        tracing::debug!("Status of {} unavailable: {}", model, e);
                        Ok(None)
                    }
                }
            }
        })
        .await?;
        Ok(())
    }

    pub async fn wait_until_active(
        &self,
        model: &str,
        apps: &[String],
        timeout: Duration,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        self.wait_until_desired_status(model, apps, &["active"], timeout, progress)
            .await
    }

    pub async fn wait_application_ready(
        &self,
        name: &str,
        model: &str,
        accepted: &[&str],
        timeout: Duration,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        self.wait_until_desired_status(model, &[name.to_string()], accepted, timeout, progress)
            .await
    }

    /// Wait until none of `apps` exists in `model` anymore.
    pub async fn wait_application_gone(
        &self,
        apps: &[String],
        model: &str,
        timeout: Duration,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let options = self.wait_options(timeout);
        let observer = Arc::new(RemovalObserver::applications(
            self.api.clone(),
            model,
            apps.to_vec(),
        ));
        let watch = StatusWatch::spawn(observer, apps.len(), options.refresh_interval);
        let what = format!("{} to be removed", apps.join(", "));

        let api = self.api.clone();
        let model = model.to_string();
        let apps = apps.to_vec();
        wait_until(watch, progress, &options, &what, move || {
            let api = api.clone();
            let model = model.clone();
            let apps = apps.clone();
            async move {
                match api.application_statuses(&model).await {
                    Ok(statuses) => {
                        let remaining = statuses.iter().any(|s| apps.contains(&s.name));
                        Ok((!remaining).then_some(()))
                    }
                    Err(JujuError::ModelNotFound(_)) => Ok(Some(())),
                    Err(e) => {
                        tracing::debug!("Status of {} unavailable: {}", model, e);
                        Ok(None)
                    }
                }
            }
        })
        .await?;
        Ok(())
    }

    /// Wait until `model` no longer exists.
    pub async fn wait_model_gone(
        &self,
        model: &str,
        timeout: Duration,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let options = self.wait_options(timeout);
        let observer = Arc::new(RemovalObserver::model(self.api.clone(), model));
        let watch = StatusWatch::spawn(observer, 1, options.refresh_interval);
        let what = format!("model {} to be removed", model);

        let api = self.api.clone();
        let model = model.to_string();
        wait_until(watch, progress, &options, &what, move || {
            let api = api.clone();
            let model = model.clone();
            async move {
                match api.model_exists(&model).await {
                    Ok(exists) => Ok((!exists).then_some(())),
                    Err(e) => {
                        tracing::debug!("Could not check model {}: {}", model, e);
                        Ok(None)
                    }
                }
            }
        })
        .await?;
        Ok(())
    }
}

/// Decide whether `apps` reached one of `desired`.
///
/// `Ok(Some(()))` when every app exists with at least one unit and all units
/// are in a desired state, `Ok(None)` to keep waiting, `Err` when a unit is in
/// `error` and `error` is not desired.
fn evaluate(
    statuses: &[ApplicationStatus],
    apps: &[String],
    desired: &[String],
) -> std::result::Result<Option<()>, String> {
    let mut ready = true;
    for name in apps {
        let Some(app) = statuses.iter().find(|s| &s.name == name) else {
            ready = false;
            continue;
        };
        if app.units.is_empty() {
            ready = false;
        }
        for unit in &app.units {
            if unit.workload == "error" && !desired.iter().any(|d| d == "error") {
                return Err(format!("Unit {} is in error state", unit.name));
            }
            if !desired.contains(&unit.workload) {
                ready = false;
            }
        }
    }
    Ok(ready.then_some(()))
}

/// Summarises the applications that are not yet in a desired state
pub struct ApplicationStatusObserver {
    api: Arc<dyn JujuApi>,
    model: String,
    apps: Vec<String>,
    desired: Vec<String>,
}

impl ApplicationStatusObserver {
    pub fn new(
        api: Arc<dyn JujuApi>,
        model: &str,
        apps: Vec<String>,
        desired: Vec<String>,
    ) -> Self {
        Self {
            api,
            model: model.to_string(),
            apps,
            desired,
        }
    }
}

#[async_trait]
impl StatusObserver for ApplicationStatusObserver {
    async fn observe(&self) -> Option<String> {
        let statuses = self.api.application_statuses(&self.model).await.ok()?;
        let pending: Vec<String> = self
            .apps
            .iter()
            .filter_map(|name| match statuses.iter().find(|s| &s.name == name) {
                None => Some(format!("{} (not deployed)", name)),
                Some(app) if self.desired.contains(&app.status) => None,
                Some(app) => Some(format!("{} ({})", name, app.status)),
            })
            .collect();
        if pending.is_empty() {
            return None;
        }
        Some(format!("waiting for {}", pending.join(", ")))
    }
}

/// Reports what is still left while applications or a model are removed
pub struct RemovalObserver {
    api: Arc<dyn JujuApi>,
    model: String,
    apps: Option<Vec<String>>,
}

impl RemovalObserver {
    pub fn applications(api: Arc<dyn JujuApi>, model: &str, apps: Vec<String>) -> Self {
        Self {
            api,
            model: model.to_string(),
            apps: Some(apps),
        }
    }

    pub fn model(api: Arc<dyn JujuApi>, model: &str) -> Self {
        Self {
            api,
            model: model.to_string(),
            apps: None,
        }
    }
}

#[async_trait]
impl StatusObserver for RemovalObserver {
    async fn observe(&self) -> Option<String> {
        let Some(apps) = &self.apps else {
            let exists = self.api.model_exists(&self.model).await.ok()?;
            return exists.then(|| format!("waiting for model {} to be removed", self.model));
        };
        let statuses = self.api.application_statuses(&self.model).await.ok()?;
        let remaining: Vec<String> = statuses
            .iter()
            .filter(|s| apps.contains(&s.name))
            .map(|s| format!("{} ({})", s.name, s.status))
            .collect();
        if remaining.is_empty() {
            return None;
        }
        Some(format!("removing {}", remaining.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::UnitStatus;

    fn app(name: &str, workloads: &[&str]) -> ApplicationStatus {
        ApplicationStatus {
            name: name.to_string(),
            status: workloads.first().copied().unwrap_or("unknown").to_string(),
            units: workloads
                .iter()
                .enumerate()
                .map(|(i, w)| UnitStatus {
                    name: format!("{}/{}", name, i),
                    workload: w.to_string(),
                    agent: "idle".to_string(),
                    leader: i == 0,
                    machine: None,
                })
                .collect(),
        }
    }

    fn names(apps: &[&str]) -> Vec<String> {
        apps.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_evaluate_ready() {
        let statuses = vec![app("masakari", &["active", "active"]), app("other", &["blocked"])];
        assert_eq!(
            evaluate(&statuses, &names(&["masakari"]), &names(&["active"])),
            Ok(Some(()))
        );
    }

    #[test]
    fn test_evaluate_waiting() {
        let statuses = vec![app("masakari", &["active", "waiting"])];
        assert_eq!(
            evaluate(&statuses, &names(&["masakari"]), &names(&["active"])),
            Ok(None)
        );
        assert_eq!(
            evaluate(&statuses, &names(&["masakari", "consul-management"]), &names(&["active", "waiting"])),
            Ok(None)
        );
        assert_eq!(
            evaluate(&[app("masakari", &[])], &names(&["masakari"]), &names(&["active"])),
            Ok(None)
        );
    }

    #[test]
    fn test_evaluate_error() {
        let statuses = vec![app("masakari", &["active", "error"])];
        let err = evaluate(&statuses, &names(&["masakari"]), &names(&["active"])).unwrap_err();
        assert_eq!(err, "Unit masakari/1 is in error state");

        assert_eq!(
            evaluate(&statuses, &names(&["masakari"]), &names(&["active", "error"])),
            Ok(Some(()))
        );
    }
}
