//! Steps acting on the keystone leader through charm actions

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use sunbeam_config::OPENSTACK_MODEL;
use sunbeam_core::{ProgressSink, SkipDecision, Step, StepError, StepResult};
use sunbeam_juju::{ActionOutput, JujuHelper};

const KEYSTONE_APP: &str = "keystone";

/// Run `action` on the keystone leader, failing on a return code above 1.
async fn run_keystone_action(
    jhelper: &JujuHelper,
    action: &str,
    params: Map<String, Value>,
) -> Result<ActionOutput, String> {
    let unit = jhelper
        .get_leader_unit(KEYSTONE_APP, OPENSTACK_MODEL)
        .await
        .map_err(|e| {
            tracing::debug!("Unable to get {} leader", KEYSTONE_APP);
            e.to_string()
        })?;
    tracing::debug!("Running action {} on {}", action, unit);
    let output = jhelper
        .run_action(&unit, OPENSTACK_MODEL, action, params)
        .await
        .map_err(|e| {
            tracing::debug!("Running action {} on {} failed", action, unit);
            e.to_string()
        })?;
    tracing::debug!("Result from action {}: {:?}", action, output);
    if output.return_code() > 1 {
        return Err(format!("Action {} on {} returned error", action, unit));
    }
    Ok(output)
}

/// Whether keystone already trusts a CA bundle named `name`
async fn ca_registered(jhelper: &JujuHelper, name: &str) -> Result<bool, StepError> {
    let mut output = run_keystone_action(jhelper, "list-ca-certs", Map::new())
        .await
        .map_err(StepError::new)?;
    output.0.remove("return-code");
    Ok(output.0.contains_key(name))
}

/// Transfer CA certificates to keystone.
pub struct AddCACertsToKeystoneStep {
    jhelper: JujuHelper,
    name: String,
    ca: String,
    chain: String,
}

impl AddCACertsToKeystoneStep {
    pub fn new(jhelper: JujuHelper, name: &str, ca: &str, chain: &str) -> Self {
        Self {
            jhelper,
            name: name.to_lowercase(),
            ca: ca.to_string(),
            chain: chain.to_string(),
        }
    }
}

#[async_trait]
impl Step for AddCACertsToKeystoneStep {
    fn name(&self) -> &str {
        "Transfer CA certs to keystone"
    }

    fn description(&self) -> &str {
        "Transferring CA certificates to keystone"
    }

    async fn is_skip(&mut self, _progress: &dyn ProgressSink) -> Result<SkipDecision, StepError> {
        if ca_registered(&self.jhelper, &self.name).await? {
            return Ok(SkipDecision::AlreadySatisfied);
        }
        Ok(SkipDecision::Proceed)
    }

    async fn run(&mut self, _progress: &dyn ProgressSink) -> StepResult {
        let mut params = Map::new();
        params.insert("name".into(), json!(self.name));
        params.insert("ca".into(), json!(self.ca));
        params.insert("chain".into(), json!(self.chain));
        match run_keystone_action(&self.jhelper, "add-ca-certs", params).await {
            Ok(_) => StepResult::completed(),
            Err(message) => StepResult::failed(message),
        }
    }
}

/// Remove CA certificates from keystone.
pub struct RemoveCACertsFromKeystoneStep {
    jhelper: JujuHelper,
    name: String,
}

impl RemoveCACertsFromKeystoneStep {
    pub fn new(jhelper: JujuHelper, name: &str) -> Self {
        Self {
            jhelper,
            name: name.to_lowercase(),
        }
    }
}

#[async_trait]
impl Step for RemoveCACertsFromKeystoneStep {
    fn name(&self) -> &str {
        "Remove CA certs from keystone"
    }

    fn description(&self) -> &str {
        "Removing CA certificates from keystone"
    }

    async fn is_skip(&mut self, _progress: &dyn ProgressSink) -> Result<SkipDecision, StepError> {
        if ca_registered(&self.jhelper, &self.name).await? {
            return Ok(SkipDecision::Proceed);
        }
        Ok(SkipDecision::AlreadySatisfied)
    }

    async fn run(&mut self, _progress: &dyn ProgressSink) -> StepResult {
        let mut params = Map::new();
        params.insert("name".into(), json!(self.name));
        match run_keystone_action(&self.jhelper, "remove-ca-certs", params).await {
            Ok(_) => StepResult::completed(),
            Err(message) => StepResult::failed(message),
        }
    }
}

/// Admin account fields reported by keystone, keyed by openrc variable
const OPENRC_FIELDS: &[(&str, &str)] = &[
    ("OS_USERNAME", "username"),
    ("OS_PASSWORD", "password"),
    ("OS_AUTH_URL", "public-endpoint"),
    ("OS_USER_DOMAIN_NAME", "user-domain-name"),
    ("OS_PROJECT_DOMAIN_NAME", "project-domain-name"),
    ("OS_PROJECT_NAME", "project-name"),
];

/// Retrieve the cloud admin credentials; the payload maps openrc variables to values.
pub struct RetrieveAdminCredentialsStep {
    jhelper: JujuHelper,
}

impl RetrieveAdminCredentialsStep {
    pub fn new(jhelper: JujuHelper) -> Self {
        Self { jhelper }
    }
}

#[async_trait]
impl Step for RetrieveAdminCredentialsStep {
    fn name(&self) -> &str {
        "Retrieve admin credentials"
    }

    fn description(&self) -> &str {
        "Retrieving openrc from Keystone service"
    }

    async fn run(&mut self, _progress: &dyn ProgressSink) -> StepResult {
        let output = match run_keystone_action(&self.jhelper, "get-admin-account", Map::new()).await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("{}", e);
                return StepResult::failed("Unable to retrieve openrc from Keystone service");
            }
        };

        let mut creds = Map::new();
        for (variable, field) in OPENRC_FIELDS {
            let value = output.get_str(field).unwrap_or_default();
            creds.insert(variable.to_string(), json!(value));
        }
        creds.insert("OS_AUTH_VERSION".into(), json!("3"));
        creds.insert("OS_IDENTITY_API_VERSION".into(), json!("3"));
        StepResult::completed().with_payload(Value::Object(creds))
    }
}
