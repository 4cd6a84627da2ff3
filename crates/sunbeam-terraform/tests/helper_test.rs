use serde_json::{Map, Value, json};
use serial_test::serial;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sunbeam_config::ConfigStore;
use sunbeam_core::{RecordingProgress, Step};
use sunbeam_terraform::{Backend, Provisioner, TerraformError, TerraformHelper, TerraformInitStep};
use tempfile::TempDir;

const FAKE_TERRAFORM: &str = r#"#!/bin/sh
echo "$@" >> "$PWD/calls.log"
echo "$TF_LOG_PATH" >> "$PWD/logpaths.log"
if [ -n "$FAKE_TF_FAIL" ]; then
  echo "Error: state locked" >&2
  exit 1
fi
if [ "$1" = "output" ]; then
  echo '{"masakari-offer-url": {"sensitive": false, "type": "string", "value": "admin/openstack.masakari"}}'
fi
exit 0
"#;

struct Fixture {
    _dir: TempDir,
    plan_dir: PathBuf,
    terraform: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let plan_dir = dir.path().join("openstack-plan");
    std::fs::create_dir(&plan_dir).unwrap();
    let terraform = dir.path().join("terraform");
    std::fs::write(&terraform, FAKE_TERRAFORM).unwrap();
    std::fs::set_permissions(&terraform, std::fs::Permissions::from_mode(0o755)).unwrap();
    Fixture {
        _dir: dir,
        plan_dir,
        terraform,
    }
}

fn helper(f: &Fixture) -> TerraformHelper {
    TerraformHelper::new(&f.plan_dir, "openstack-plan").with_terraform(&f.terraform)
}

fn calls(plan_dir: &Path) -> Vec<String> {
    std::fs::read_to_string(plan_dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
#[serial]
async fn test_apply_arguments() {
    let f = fixture();
    let tf = helper(&f).with_parallelism(Some(2));

    tf.apply(&["-target=module.masakari".to_string()]).await.unwrap();
    tf.destroy().await.unwrap();
    tf.sync().await.unwrap();

    assert_eq!(
        calls(&f.plan_dir),
        vec![
            "apply -target=module.masakari -auto-approve -no-color -parallelism=2",
            "destroy -auto-approve -no-color -parallelism=2",
            "apply -refresh-only -auto-approve",
        ]
    );

    let logpaths = std::fs::read_to_string(f.plan_dir.join("logpaths.log")).unwrap();
    let first = logpaths.lines().next().unwrap();
    assert!(first.contains("/openstack-plan/terraform-apply-"));
    assert!(first.ends_with(".log"));
}

#[tokio::test]
#[serial]
async fn test_init_reconfigures_after_backend_change() {
    let f = fixture();
    let tf = helper(&f).with_backend(Backend::Http {
        clusterd_address: "https://10.0.0.2:7000".to_string(),
    });

    tf.init().await.unwrap();
    tf.init().await.unwrap();

    assert_eq!(
        calls(&f.plan_dir),
        vec!["init -upgrade -no-color -reconfigure", "init -upgrade -no-color"]
    );
    assert!(f.plan_dir.join("backend.tf").exists());
}

#[tokio::test]
#[serial]
async fn test_output_is_flattened() {
    let f = fixture();
    let output = helper(&f).output().await.unwrap();
    assert_eq!(output["masakari-offer-url"], "admin/openstack.masakari");
}

#[tokio::test]
#[serial]
async fn test_failure_carries_stderr() {
    let f = fixture();
    let env = HashMap::from([("FAKE_TF_FAIL".to_string(), "1".to_string())]);
    let tf = helper(&f).with_env(env);

    let err = tf.apply(&[]).await.unwrap_err();
    assert!(matches!(err, TerraformError::CommandFailed(_)));
    assert!(err.to_string().contains("state locked"));
}

#[tokio::test]
#[serial]
async fn test_update_tfvars_and_apply_merges_stored_vars() {
    let f = fixture();
    let store = ConfigStore::new(f.plan_dir.join("store"));
    store
        .update_config(
            "TerraformVarsOpenstack",
            &json!({"enable-masakari": false, "openstack-channel": "2024.1/edge"}),
        )
        .await
        .unwrap();

    let mut overrides = Map::new();
    overrides.insert("enable-masakari".into(), Value::Bool(true));
    helper(&f)
        .update_tfvars_and_apply(&store, "TerraformVarsOpenstack", overrides, &[])
        .await
        .unwrap();

    let stored = store.read_config("TerraformVarsOpenstack").await.unwrap();
    assert_eq!(stored["enable-masakari"], true);
    assert_eq!(stored["openstack-channel"], "2024.1/edge");

    let written: Value = serde_json::from_str(
        &std::fs::read_to_string(f.plan_dir.join("terraform.tfvars.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written, stored);
    assert_eq!(calls(&f.plan_dir), vec!["apply -auto-approve -no-color"]);
}

#[tokio::test]
#[serial]
async fn test_init_step() {
    let f = fixture();
    let progress = RecordingProgress::new();

    let mut ok = TerraformInitStep::new(Arc::new(helper(&f)));
    assert!(ok.run(&progress).await.is_completed());

    let env = HashMap::from([("FAKE_TF_FAIL".to_string(), "1".to_string())]);
    let mut failing = TerraformInitStep::new(Arc::new(helper(&f).with_env(env)));
    let result = failing.run(&progress).await;
    assert!(result.is_failed());
    assert!(result.message.unwrap().contains("state locked"));
}
