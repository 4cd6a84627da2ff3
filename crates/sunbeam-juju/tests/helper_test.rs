use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sunbeam_core::RecordingProgress;
use sunbeam_juju::{
    ActionOutput, ApplicationStatus, DeployOptions, JujuApi, JujuError, JujuHelper, Result,
    UnitStatus,
};

/// In-memory juju whose status answers follow a script
#[derive(Default)]
struct FakeJuju {
    statuses: Mutex<VecDeque<Vec<ApplicationStatus>>>,
    models: Mutex<VecDeque<bool>>,
    removed_saas: Mutex<Vec<String>>,
}

impl FakeJuju {
    fn scripted(script: Vec<Vec<ApplicationStatus>>) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(script.into()),
            ..Default::default()
        })
    }
}

/// Pop the next scripted answer, repeating the last one forever
fn next<T: Clone>(queue: &Mutex<VecDeque<T>>, default: T) -> T {
    let mut queue = queue.lock().unwrap();
    if queue.len() > 1 {
        queue.pop_front().unwrap()
    } else {
        queue.front().cloned().unwrap_or(default)
    }
}

#[async_trait]
impl JujuApi for FakeJuju {
    async fn model_exists(&self, _model: &str) -> Result<bool> {
        Ok(next(&self.models, false))
    }

    async fn application_statuses(&self, _model: &str) -> Result<Vec<ApplicationStatus>> {
        Ok(next(&self.statuses, Vec::new()))
    }

    async fn saas_names(&self, _model: &str) -> Result<Vec<String>> {
        Ok(vec!["masakari".to_string()])
    }

    async fn machines(&self, _model: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn deploy(&self, _options: &DeployOptions) -> Result<()> {
        Ok(())
    }

    async fn remove_application(&self, _model: &str, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn remove_saas(&self, _model: &str, name: &str) -> Result<()> {
        self.removed_saas.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn run_action(
        &self,
        _model: &str,
        _unit: &str,
        _action: &str,
        _params: &Map<String, Value>,
    ) -> Result<ActionOutput> {
        Ok(serde_json::from_value(json!({"url": "http://grafana"})).unwrap())
    }
}

fn app(name: &str, workloads: &[&str]) -> ApplicationStatus {
    ApplicationStatus {
        name: name.to_string(),
        status: workloads.first().copied().unwrap_or("waiting").to_string(),
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

fn helper(fake: &Arc<FakeJuju>) -> JujuHelper {
    JujuHelper::new(fake.clone()).with_intervals(Duration::from_secs(1), Duration::from_millis(200))
}

fn apps(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_active() {
    let fake = FakeJuju::scripted(vec![
        vec![],
        vec![app("masakari", &["waiting"])],
        vec![app("masakari", &["active"]), app("masakari-mysql-router", &["active"])],
    ]);
    let progress = RecordingProgress::new();
    let jhelper = helper(&fake);

    jhelper
        .wait_until_active(
            "openstack",
            &apps(&["masakari", "masakari-mysql-router"]),
            Duration::from_secs(60),
            &progress,
        )
        .await
        .unwrap();

    drop(jhelper);
    // Observer and poll closure released their handles.
    assert_eq!(Arc::strong_count(&fake), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unit_in_error_fails_wait() {
    let fake = FakeJuju::scripted(vec![vec![app("consul-client-management", &["error"])]]);
    let progress = RecordingProgress::new();

    let err = helper(&fake)
        .wait_until_active(
            "controller",
            &apps(&["consul-client-management"]),
            Duration::from_secs(60),
            &progress,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, JujuError::Wait(_)));
    assert_eq!(err.to_string(), "Unit consul-client-management/0 is in error state");
}

#[tokio::test(start_paused = true)]
async fn test_wait_timeout() {
    let fake = FakeJuju::scripted(vec![vec![app("grafana-agent", &["blocked"])]]);
    let progress = RecordingProgress::new();

    let err = helper(&fake)
        .wait_until_active(
            "controller",
            &apps(&["grafana-agent"]),
            Duration::from_secs(30),
            &progress,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, JujuError::Timeout(_)));
    assert!(err.to_string().starts_with("Timed out after 30.0s"));
    assert!(progress
        .updates()
        .iter()
        .any(|u| u == "waiting for grafana-agent (blocked)"));
}

#[tokio::test(start_paused = true)]
async fn test_wait_application_gone() {
    let fake = FakeJuju::scripted(vec![
        vec![app("tls-operator", &["active"])],
        vec![app("tls-operator", &["active"])],
        vec![app("tls-operator", &["active"])],
        vec![app("keystone", &["active"])],
    ]);
    let progress = RecordingProgress::new();

    helper(&fake)
        .wait_application_gone(
            &apps(&["tls-operator"]),
            "controller",
            Duration::from_secs(10),
            &progress,
        )
        .await
        .unwrap();

    assert!(progress
        .updates()
        .iter()
        .any(|u| u == "removing tls-operator (active)"));
}

#[tokio::test(start_paused = true)]
async fn test_wait_model_gone() {
    let fake = Arc::new(FakeJuju {
        models: Mutex::new(vec![true, true, false].into()),
        ..Default::default()
    });

    let progress = RecordingProgress::new();
    helper(&fake)
        .wait_model_gone("observability", Duration::from_secs(10), &progress)
        .await
        .unwrap();
    assert!(progress
        .updates()
        .iter()
        .any(|u| u == "waiting for model observability to be removed"));

    let still_there = Arc::new(FakeJuju {
        models: Mutex::new(vec![true].into()),
        ..Default::default()
    });
    let err = helper(&still_there)
        .wait_model_gone("observability", Duration::from_secs(10), &progress)
        .await
        .unwrap_err();
    assert!(matches!(err, JujuError::Timeout(_)));
}

#[tokio::test]
async fn test_leader_lookup() {
    let fake = FakeJuju::scripted(vec![vec![app("keystone", &["active", "active"])]]);
    let jhelper = helper(&fake);

    assert_eq!(
        jhelper.get_leader_unit("keystone", "openstack").await.unwrap(),
        "keystone/0"
    );
    assert!(matches!(
        jhelper.get_leader_unit("grafana", "observability").await,
        Err(JujuError::ApplicationNotFound { .. })
    ));

    let leaderless = FakeJuju::scripted(vec![vec![ApplicationStatus {
        name: "keystone".to_string(),
        status: "active".to_string(),
        units: Vec::new(),
    }]]);
    assert!(matches!(
        helper(&leaderless).get_leader_unit("keystone", "openstack").await,
        Err(JujuError::LeaderNotFound { .. })
    ));
}

#[tokio::test]
async fn test_remove_saas() {
    let fake = FakeJuju::scripted(Vec::new());
    helper(&fake)
        .remove_saas("controller", &apps(&["masakari", "cert-distributor"]))
        .await
        .unwrap();
    assert_eq!(
        *fake.removed_saas.lock().unwrap(),
        vec!["masakari".to_string(), "cert-distributor".to_string()]
    );
}
