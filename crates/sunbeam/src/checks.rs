//! Preflight checks run before commands

use std::path::PathBuf;
use sunbeam_config::Deployment;
use sunbeam_core::PreflightCheck;

const DAEMON_GROUP: &str = "snap_daemon";

/// The current user can talk to the local daemons.
#[derive(Default)]
pub struct DaemonGroupCheck {
    message: Option<String>,
}

impl DaemonGroupCheck {
    pub fn new() -> Self {
        Self { message: None }
    }

    fn user_in_group() -> Result<(bool, String), nix::Error> {
        let uid = nix::unistd::getuid();
        let user = nix::unistd::User::from_uid(uid)?
            .map(|u| u.name)
            .unwrap_or_else(|| uid.to_string());
        let Some(group) = nix::unistd::Group::from_name(DAEMON_GROUP)? else {
            return Ok((false, user));
        };
        let member = group.mem.contains(&user) || nix::unistd::getgroups()?.contains(&group.gid);
        Ok((member, user))
    }
}

impl PreflightCheck for DaemonGroupCheck {
    fn name(&self) -> &str {
        "Check for snap_daemon group membership"
    }

    fn description(&self) -> &str {
        "Checking for snap_daemon group membership"
    }

    fn check(&mut self) -> bool {
        match Self::user_in_group() {
            Ok((true, _)) => true,
            Ok((false, user)) => {
                self.message = Some(format!(
                    "Insufficient permissions to run sunbeam commands\n\
                     Add the user {user} to the '{DAEMON_GROUP}' group:\n\n    \
                     sudo usermod -a -G {DAEMON_GROUP} {user}\n\n\
                     After this, reload the user groups either via a reboot or by \
                     running 'newgrp {DAEMON_GROUP}'."
                ));
                false
            }
            Err(e) => {
                self.message = Some(format!("Unable to read group membership: {}", e));
                false
            }
        }
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// The deployment has a juju controller and account recorded.
pub struct VerifyBootstrappedCheck {
    bootstrapped: bool,
    message: Option<String>,
}

impl VerifyBootstrappedCheck {
    pub fn new(deployment: &Deployment) -> Self {
        Self {
            bootstrapped: deployment.juju_controller.is_some() && deployment.juju_account.is_some(),
            message: None,
        }
    }
}

impl PreflightCheck for VerifyBootstrappedCheck {
    fn name(&self) -> &str {
        "Check bootstrapped"
    }

    fn description(&self) -> &str {
        "Checking if deployment is bootstrapped"
    }

    fn check(&mut self) -> bool {
        if !self.bootstrapped {
            self.message = Some(
                "Deployment not bootstrapped or bootstrap process has not completed \
                 successfully. Please run `sunbeam cluster bootstrap`"
                    .to_string(),
            );
        }
        self.bootstrapped
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// The local share directory exists.
pub struct LocalShareCheck {
    path: PathBuf,
    message: Option<String>,
}

impl LocalShareCheck {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            message: None,
        }
    }
}

impl PreflightCheck for LocalShareCheck {
    fn name(&self) -> &str {
        "Check for .local/share/openstack"
    }

    fn description(&self) -> &str {
        "Checking for local share directory"
    }

    fn check(&mut self) -> bool {
        if self.path.is_dir() {
            return true;
        }
        self.message = Some(format!(
            "{} directory not detected. Please create it or import a deployment \
             with `sunbeam deployment import`.",
            self.path.display()
        ));
        false
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
