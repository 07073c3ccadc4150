//! Sync Orchestrator
//!
//! Two operations, both gated on this node being the HA master:
//!
//! - `init` creates the trust key pair and installs its public half on the
//!   standby. Both steps are best-effort; their exit codes are logged, not
//!   checked.
//! - `sync` mirrors the path set to the standby with a single rsync run.
//!   Deletion of stale destination entries happens only after the transfer
//!   (`--delete-after`), so a failed run never deletes files it did not get
//!   the chance to copy.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::paths::build_path_set;
use crate::role::HaRole;
use crate::runner::CommandRunner;

/// Successful result of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The transfer completed
    Synced,
    /// HA is configured but trust has not been bootstrapped yet
    NotBootstrapped,
    /// Key generation and distribution were attempted
    TrustBootstrapped,
}

impl Outcome {
    /// Short operator-facing description
    pub fn describe(&self) -> &'static str {
        match self {
            Outcome::Synced => "replication completed",
            Outcome::NotBootstrapped => "no trust credential yet, nothing to replicate",
            Outcome::TrustBootstrapped => "trust bootstrap finished",
        }
    }
}

/// Drives trust bootstrap and replication for one run
pub struct SyncOrchestrator<R: CommandRunner> {
    config: SyncConfig,
    runner: R,
}

impl<R: CommandRunner> SyncOrchestrator<R> {
    pub fn new(config: SyncConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Bootstrap SSH trust with the standby
    pub fn init(&self, role: &HaRole) -> Result<Outcome> {
        let remote = require_master(role)?;

        let identity = &self.config.remote.identity_file;
        if identity.exists() {
            return Err(Error::CredentialExists(identity.clone()));
        }

        if let Some(parent) = identity.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Could not create key directory {:?}: {}", parent, e);
            }
        }

        info!("Generating trust key pair at {:?}", identity);
        self.run_best_effort(&self.config.tools.ssh_keygen, &self.keygen_args());

        info!("Installing public key on {}", self.config.login(remote));
        self.run_best_effort(&self.config.tools.ssh_copy_id, &self.copy_id_args(remote));

        Ok(Outcome::TrustBootstrapped)
    }

    /// Mirror the path set to the standby
    pub fn sync(&self, role: &HaRole) -> Result<Outcome> {
        let remote = require_master(role)?;

        let identity = &self.config.remote.identity_file;
        if !identity.exists() {
            info!(
                "No trust credential at {:?}; HA pair not bootstrapped yet, skipping replication",
                identity
            );
            return Ok(Outcome::NotBootstrapped);
        }

        let paths = build_path_set(&self.config)?;
        let args = self.transfer_args(remote, &paths);

        info!(
            "Replicating {} paths to {}",
            paths.len(),
            self.config.destination(remote)
        );
        let result = self.runner.run_captured(&self.config.tools.rsync, &args)?;

        if !result.success() {
            return Err(Error::TransferFailed {
                code: result.code,
                output: result.output,
            });
        }

        info!("Replication to {} completed", remote);
        Ok(Outcome::Synced)
    }

    /// Full rsync argument list for a transfer of `paths` to `remote`
    pub fn transfer_args(&self, remote: &str, paths: &[PathBuf]) -> Vec<String> {
        let mut args = vec![
            "-az".to_string(),
            "--relative".to_string(),
            "--delete-after".to_string(),
            "-e".to_string(),
            self.remote_shell(),
        ];
        args.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
        args.push(self.config.destination(remote));
        args
    }

    /// Non-interactive, key-only ssh command used by rsync
    fn remote_shell(&self) -> String {
        format!(
            "{} -i {} -o BatchMode=yes -o PasswordAuthentication=no \
             -o PubkeyAuthentication=yes -o StrictHostKeyChecking=accept-new",
            self.config.tools.ssh,
            self.config.remote.identity_file.display()
        )
    }

    fn keygen_args(&self) -> Vec<String> {
        vec![
            "-q".to_string(),
            "-t".to_string(),
            "ed25519".to_string(),
            "-N".to_string(),
            String::new(),
            "-f".to_string(),
            self.config.remote.identity_file.to_string_lossy().into_owned(),
        ]
    }

    fn copy_id_args(&self, remote: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.config.public_key_file().to_string_lossy().into_owned(),
            self.config.login(remote),
        ]
    }

    fn run_best_effort(&self, program: &str, args: &[String]) {
        match self.runner.run_attached(program, args) {
            Ok(Some(code)) => info!("{} exited with code {}", program, code),
            Ok(None) => info!("{} was terminated by a signal", program),
            Err(Error::Spawn { program, source }) => warn!("Failed to run {}: {}", program, source),
            Err(e) => warn!("{}", e),
        }
    }
}

fn require_master(role: &HaRole) -> Result<&str> {
    role.remote_address().ok_or(Error::NotMaster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    /// Records every invocation and answers with a scripted result
    #[derive(Default)]
    struct RecordingRunner {
        calls: RefCell<Vec<(String, Vec<String>)>>,
        code: Option<i32>,
        output: String,
        fail_spawn: bool,
    }

    impl RecordingRunner {
        fn exiting(code: i32, output: &str) -> Self {
            Self {
                code: Some(code),
                output: output.to_string(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.borrow().clone()
        }

        fn record(&self, program: &str, args: &[String]) -> Result<()> {
            self.calls
                .borrow_mut()
                .push((program.to_string(), args.to_vec()));
            if self.fail_spawn {
                return Err(Error::Spawn {
                    program: program.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                });
            }
            Ok(())
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run_attached(&self, program: &str, args: &[String]) -> Result<Option<i32>> {
            self.record(program, args)?;
            Ok(self.code)
        }

        fn run_captured(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            self.record(program, args)?;
            Ok(CommandOutput {
                code: self.code,
                output: self.output.clone(),
            })
        }
    }

    fn master() -> HaRole {
        HaRole::Master {
            remote_address: "10.0.0.2".to_string(),
        }
    }

    fn fixture(dir: &TempDir) -> SyncConfig {
        let mut config = SyncConfig::default();
        config.remote.identity_file = dir.path().join("ssh/ha_key");
        config.replication.base_paths = vec![
            PathBuf::from("/etc/asterisk/scripts"),
            PathBuf::from("/var/lib/asterisk/agi-bin"),
        ];
        config.replication.tenant_sounds_root = dir.path().join("tenants");
        config
    }

    fn create_credential(config: &SyncConfig) {
        let identity = &config.remote.identity_file;
        std::fs::create_dir_all(identity.parent().unwrap()).unwrap();
        std::fs::write(identity, "PRIVATE KEY").unwrap();
    }

    fn mkdirs(root: &Path, subs: &[&str]) {
        for sub in subs {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }
    }

    #[test]
    fn test_sync_requires_master() {
        let dir = tempdir().unwrap();
        let config = fixture(&dir);
        create_credential(&config);

        for role in [HaRole::Unconfigured, HaRole::Standby] {
            let orchestrator = SyncOrchestrator::new(config.clone(), RecordingRunner::exiting(0, ""));
            let err = orchestrator.sync(&role).unwrap_err();
            assert!(matches!(err, Error::NotMaster));
            assert_eq!(err.exit_code(), 1);
            assert!(orchestrator.runner().calls().is_empty());
        }
    }

    #[test]
    fn test_sync_checks_master_before_credential() {
        let dir = tempdir().unwrap();
        let orchestrator = SyncOrchestrator::new(fixture(&dir), RecordingRunner::exiting(0, ""));
        assert!(matches!(orchestrator.sync(&HaRole::Standby), Err(Error::NotMaster)));
    }

    #[test]
    fn test_sync_without_credential_is_noop() {
        let dir = tempdir().unwrap();
        let orchestrator = SyncOrchestrator::new(fixture(&dir), RecordingRunner::exiting(0, ""));

        let outcome = orchestrator.sync(&master()).unwrap();
        assert_eq!(outcome, Outcome::NotBootstrapped);
        assert!(orchestrator.runner().calls().is_empty());
    }

    #[test]
    fn test_sync_invokes_rsync_once_with_exact_arguments() {
        let dir = tempdir().unwrap();
        let config = fixture(&dir);
        create_credential(&config);
        let tenants = config.replication.tenant_sounds_root.clone();
        mkdirs(&tenants, &["acme/monitor", "acme/recording", "acme/voicemail", "Bravo/ivr"]);

        let identity = config.remote.identity_file.display().to_string();
        let orchestrator = SyncOrchestrator::new(config, RecordingRunner::exiting(0, "sent 10 bytes"));

        assert_eq!(orchestrator.sync(&master()).unwrap(), Outcome::Synced);

        let calls = orchestrator.runner().calls();
        assert_eq!(calls.len(), 1);
        let (program, args) = &calls[0];
        assert_eq!(program, "rsync");
        let expected = vec![
            "-az".to_string(),
            "--relative".to_string(),
            "--delete-after".to_string(),
            "-e".to_string(),
            format!(
                "ssh -i {} -o BatchMode=yes -o PasswordAuthentication=no \
                 -o PubkeyAuthentication=yes -o StrictHostKeyChecking=accept-new",
                identity
            ),
            "/etc/asterisk/scripts".to_string(),
            "/var/lib/asterisk/agi-bin".to_string(),
            tenants.join("acme/voicemail").display().to_string(),
            "root@10.0.0.2:/".to_string(),
        ];
        assert_eq!(args, &expected);
    }

    #[test]
    fn test_sync_transfer_failure_keeps_code_and_output() {
        let dir = tempdir().unwrap();
        let config = fixture(&dir);
        create_credential(&config);
        let output = "rsync: change_dir \"/root/.aws\" failed: No such file or directory (2)\n\
                      rsync error: some files/attrs were not transferred (code 23)\n";
        let orchestrator = SyncOrchestrator::new(config, RecordingRunner::exiting(23, output));

        let err = orchestrator.sync(&master()).unwrap_err();
        match &err {
            Error::TransferFailed { code, output: captured } => {
                assert_eq!(*code, Some(23));
                assert_eq!(captured, output);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("23"));
        assert!(err.to_string().contains(output));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(orchestrator.runner().calls().len(), 1);
    }

    #[test]
    fn test_sync_spawn_failure_is_error() {
        let dir = tempdir().unwrap();
        let config = fixture(&dir);
        create_credential(&config);
        let runner = RecordingRunner {
            fail_spawn: true,
            ..Default::default()
        };
        let orchestrator = SyncOrchestrator::new(config, runner);

        assert!(matches!(orchestrator.sync(&master()), Err(Error::Spawn { .. })));
        assert_eq!(orchestrator.runner().calls().len(), 1);
    }

    #[test]
    fn test_init_requires_master() {
        let dir = tempdir().unwrap();
        for role in [HaRole::Unconfigured, HaRole::Standby] {
            let orchestrator = SyncOrchestrator::new(fixture(&dir), RecordingRunner::exiting(0, ""));
            assert!(matches!(orchestrator.init(&role), Err(Error::NotMaster)));
            assert!(orchestrator.runner().calls().is_empty());
        }
    }

    #[test]
    fn test_init_refuses_existing_credential() {
        let dir = tempdir().unwrap();
        let config = fixture(&dir);
        create_credential(&config);
        let orchestrator = SyncOrchestrator::new(config, RecordingRunner::exiting(0, ""));

        let err = orchestrator.init(&master()).unwrap_err();
        assert!(matches!(err, Error::CredentialExists(_)));
        assert!(err.is_precondition());
        assert!(orchestrator.runner().calls().is_empty());
    }

    #[test]
    fn test_init_generates_then_distributes_key() {
        let dir = tempdir().unwrap();
        let config = fixture(&dir);
        let identity = config.remote.identity_file.display().to_string();
        let orchestrator = SyncOrchestrator::new(config, RecordingRunner::exiting(0, ""));

        assert_eq!(orchestrator.init(&master()).unwrap(), Outcome::TrustBootstrapped);

        let calls = orchestrator.runner().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "ssh-keygen");
        assert_eq!(
            calls[0].1,
            vec!["-q", "-t", "ed25519", "-N", "", "-f", identity.as_str()]
        );
        assert_eq!(calls[1].0, "ssh-copy-id");
        assert_eq!(
            calls[1].1,
            vec!["-i".to_string(), format!("{identity}.pub"), "root@10.0.0.2".to_string()]
        );
    }

    #[test]
    fn test_init_ignores_step_failures() {
        let dir = tempdir().unwrap();

        let failing = SyncOrchestrator::new(fixture(&dir), RecordingRunner::exiting(1, ""));
        assert_eq!(failing.init(&master()).unwrap(), Outcome::TrustBootstrapped);
        assert_eq!(failing.runner().calls().len(), 2);

        let unspawnable = SyncOrchestrator::new(
            fixture(&dir),
            RecordingRunner {
                fail_spawn: true,
                ..Default::default()
            },
        );
        assert_eq!(unspawnable.init(&master()).unwrap(), Outcome::TrustBootstrapped);
        let calls = unspawnable.runner().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "ssh-keygen");
        assert_eq!(calls[1].0, "ssh-copy-id");
    }
}
