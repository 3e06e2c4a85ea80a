//! Authentication bootstrap: basic-auth file, static tokens and the
//! service-account signing key.

use std::io::Write;
use std::path::Path;

use rand::distr::{Alphanumeric, SampleString};
use tracing::info;

use crate::convergence::{Context, Outcome, Rule};
use crate::error::ConvergeError;
use crate::types::{Gate, StatusLevel};

use super::{API_SERVER, CONTROLLER_MANAGER};

/// Roles that get a static token.
pub const TOKEN_ROLES: [&str; 3] = ["admin", "kubelet", "kube_proxy"];

const TOKEN_LENGTH: usize = 32;

pub const SETUP_AUTHENTICATION: Rule = Rule {
    name: "setup_authentication",
    when: &[],
    when_not: &[Gate::AuthenticationSetup],
    inputs: &[],
    body: setup_authentication,
};

fn random_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), TOKEN_LENGTH)
}

/// One `token,user,uid` line per role.
pub fn token_file_contents(roles: &[&str]) -> String {
    roles
        .iter()
        .map(|role| format!("{},{},{}\n", random_token(), role, role))
        .collect()
}

/// Create `path` with `contents` unless it already exists. Returns whether
/// the file was written.
fn write_if_absent(path: &Path, contents: &str) -> Result<bool, ConvergeError> {
    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(ConvergeError::io(path, e)),
    };
    file.write_all(contents.as_bytes())
        .map_err(|e| ConvergeError::io(path, e))?;
    Ok(true)
}

fn setup_authentication(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    let settings = ctx.settings;
    let layout = &settings.layout;
    let basic_auth = layout.basic_auth_file();
    let known_tokens = layout.known_tokens_file();
    let sa_key = layout.service_account_key();
    let cidr = ctx.service_cidr();

    {
        let mut api = ctx.state.flags(API_SERVER)?;
        api.add_strict("--basic-auth-file", &basic_auth.display().to_string())?;
        api.add_strict("--token-auth-file", &known_tokens.display().to_string())?;
        api.add_strict("--service-cluster-ip-range", &cidr)?;
    }

    ctx.set_status(StatusLevel::Maintenance, "Rendering authentication templates.")?;
    std::fs::create_dir_all(&layout.cdk_dir).map_err(|e| ConvergeError::io(&layout.cdk_dir, e))?;

    if write_if_absent(&basic_auth, "admin,admin,admin\n")? {
        info!(path = %basic_auth.display(), "wrote basic auth file");
    }
    if write_if_absent(&known_tokens, &token_file_contents(&TOKEN_ROLES))? {
        info!(path = %known_tokens.display(), "wrote known tokens");
    }

    let key_path = sa_key.display().to_string();
    ctx.runner
        .run("openssl", &["genrsa", "-out", key_path.as_str(), "2048"])?;

    ctx.state
        .flags(API_SERVER)?
        .add_strict("--service-account-key-file", &key_path)?;
    ctx.state
        .flags(CONTROLLER_MANAGER)?
        .add_strict("--service-account-private-key-file", &key_path)?;

    ctx.set_gate(Gate::AuthenticationSetup)?;
    Ok(Outcome::Converged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    #[test]
    fn writes_files_and_flags() {
        let mut h = Harness::new();
        assert_eq!(h.fire(setup_authentication).unwrap(), Outcome::Converged);

        let layout = &h.settings.layout;
        assert_eq!(
            std::fs::read_to_string(layout.basic_auth_file()).unwrap(),
            "admin,admin,admin\n"
        );
        let tokens = std::fs::read_to_string(layout.known_tokens_file()).unwrap();
        let users: Vec<&str> = tokens
            .lines()
            .map(|l| l.split(',').nth(1).unwrap())
            .collect();
        assert_eq!(users, TOKEN_ROLES);
        assert!(tokens.lines().all(|l| l.split(',').next().unwrap().len() == TOKEN_LENGTH));

        let key = layout.service_account_key().display().to_string();
        assert_eq!(
            h.runner.matching("openssl"),
            vec![format!("openssl genrsa -out {} 2048", key)]
        );
        let api = h.state.flag_set(API_SERVER).unwrap();
        assert_eq!(api.values("--service-cluster-ip-range"), vec!["10.152.183.0/24"]);
        assert_eq!(api.values("--service-account-key-file"), vec![key.as_str()]);
        let cm = h.state.flag_set(CONTROLLER_MANAGER).unwrap();
        assert_eq!(cm.values("--service-account-private-key-file"), vec![key.as_str()]);
        assert!(h.state.is_set(Gate::AuthenticationSetup));
    }

    #[test]
    fn replay_keeps_existing_files_and_gate() {
        let mut h = Harness::new();
        h.fire(setup_authentication).unwrap();
        let layout = h.settings.layout.clone();
        let tokens_before = std::fs::read_to_string(layout.known_tokens_file()).unwrap();
        let flags_before = h.state.flag_set(API_SERVER).unwrap().serialize();

        h.fire(setup_authentication).unwrap();
        assert_eq!(
            std::fs::read_to_string(layout.known_tokens_file()).unwrap(),
            tokens_before
        );
        assert_eq!(h.state.flag_set(API_SERVER).unwrap().serialize(), flags_before);
        assert!(h.state.is_set(Gate::AuthenticationSetup));
    }

    #[test]
    fn genrsa_failure_leaves_gate_unset() {
        let mut h = Harness::new();
        h.runner.fail("openssl genrsa", "unable to write key");
        let err = h.fire(setup_authentication).unwrap_err();
        assert!(err.is_command_failure());
        assert!(!h.state.is_set(Gate::AuthenticationSetup));
    }

    #[test]
    fn tokens_differ_per_role() {
        let contents = token_file_contents(&TOKEN_ROLES);
        let tokens: Vec<&str> = contents
            .lines()
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_ne!(tokens[0], tokens[1]);
        assert_ne!(tokens[1], tokens[2]);
    }
}
