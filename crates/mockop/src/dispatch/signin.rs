//! Simulated `signin`.
//!
//! The outcome is driven entirely by environment variables. The session token
//! is a random alphanumeric string, not a credential.

use crate::config::{
    SIGNIN_MISSING_ACCOUNT_VAR, SIGNIN_SHORTHAND_VAR, SIGNIN_SUCCEED_VAR, SIGNIN_USES_BIO_VAR,
};
use crate::dispatch::DispatchOutcome;
use crate::env::Environment;
use crate::error::{MockError, MockResult};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of a generated session token.
pub const TOKEN_LEN: usize = 43;

/// What to do when signin has no account identifier and biometrics are off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingAccountPolicy {
    /// Refuse with `No account identifier provided`.
    #[default]
    Error,
    /// Behave as a biometric signin: succeed with empty output.
    Succeed,
}

impl MissingAccountPolicy {
    pub fn parse(value: &str) -> MockResult<Self> {
        match value {
            "error" => Ok(Self::Error),
            "succeed" => Ok(Self::Succeed),
            other => Err(MockError::signin(format!(
                "{SIGNIN_MISSING_ACCOUNT_VAR} should be 'error' or 'succeed', got '{other}'"
            ))),
        }
    }

    /// Read the policy from the environment; unset means [`Self::Error`].
    pub fn from_env(env: &dyn Environment) -> MockResult<Self> {
        env.get(SIGNIN_MISSING_ACCOUNT_VAR)
            .filter(|value| !value.is_empty())
            .map_or(Ok(Self::default()), |value| Self::parse(&value))
    }
}

/// Flags the signin simulation understands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SigninArgs {
    pub account: Option<String>,
    pub raw: bool,
}

impl SigninArgs {
    /// Pick `--account` and `-r`/`--raw` out of argv, ignoring everything else.
    pub fn parse<S: AsRef<str>>(argv: &[S]) -> Self {
        let mut args = Self::default();
        let mut iter = argv.iter().map(AsRef::as_ref);
        while let Some(arg) = iter.next() {
            match arg {
                "-r" | "--raw" => args.raw = true,
                "--account" => args.account = iter.next().map(ToString::to_string),
                other => {
                    if let Some(value) = other.strip_prefix("--account=") {
                        args.account = Some(value.to_string());
                    }
                }
            }
        }
        args
    }
}

/// Answer a signin command.
pub fn respond_signin<S: AsRef<str>>(
    argv: &[S],
    env: &dyn Environment,
    policy: MissingAccountPolicy,
) -> MockResult<DispatchOutcome> {
    respond_signin_with(argv, env, policy, &mut rand::thread_rng())
}

pub(crate) fn respond_signin_with<S: AsRef<str>, R: Rng>(
    argv: &[S],
    env: &dyn Environment,
    policy: MissingAccountPolicy,
    rng: &mut R,
) -> MockResult<DispatchOutcome> {
    let args = SigninArgs::parse(argv);
    let account = args
        .account
        .or_else(|| env.get(SIGNIN_SHORTHAND_VAR).filter(|value| !value.is_empty()));
    let succeed = read_flag(env, SIGNIN_SUCCEED_VAR)?;
    if account.is_none() && !read_flag(env, SIGNIN_USES_BIO_VAR)? && policy == MissingAccountPolicy::Error {
        return Err(MockError::signin("No account identifier provided"));
    }
    if !succeed {
        let timestamp = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
        return Ok(DispatchOutcome {
            stdout: Vec::new(),
            stderr: format!("[ERROR] {timestamp} Authentication: DB: 401: Unauthorized\n")
                .into_bytes(),
            exit_status: 1,
        });
    }
    let stdout = match account {
        Some(account) => {
            let token = generate_token(rng);
            if args.raw {
                token
            } else {
                session_export(&account, &token)
            }
        }
        None => String::new(),
    };
    Ok(DispatchOutcome {
        stdout: stdout.into_bytes(),
        stderr: Vec::new(),
        exit_status: 0,
    })
}

fn read_flag(env: &dyn Environment, key: &str) -> MockResult<bool> {
    match env.get(key).as_deref() {
        Some("0") => Ok(false),
        Some("1") => Ok(true),
        Some(_) => Err(MockError::signin(format!(
            "{key} environment variable should be 0 or 1"
        ))),
        None => Err(MockError::signin(format!(
            "{key} environment variable not found"
        ))),
    }
}

fn generate_token<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn session_export(account: &str, token: &str) -> String {
    format!(
        "export OP_SESSION_{account}=\"{token}\"\n\
         # This command is meant to be used with your shell's eval function.\n\
         # Run 'eval $(op signin {account})' to sign in to your 1Password account.\n\
         # Use the --raw flag to only output the session token.\n"
    )
}
