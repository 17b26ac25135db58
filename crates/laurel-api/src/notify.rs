//! Injected collaborators for the sign-up flow: confirmation-code generation
//! and out-of-band delivery. Both are trait objects on the app state so tests
//! can pin codes and capture mail without real infrastructure.

use tracing::info;

const CODE_LEN: usize = 24;

pub trait CodeIssuer: Send + Sync {
    fn issue(&self) -> String;
}

/// Alphanumeric codes from the thread-local RNG.
pub struct RandomCodes;

impl CodeIssuer for RandomCodes {
    fn issue(&self) -> String {
        use rand::Rng;
        rand::rng()
            .sample_iter(rand::distr::Alphanumeric)
            .take(CODE_LEN)
            .map(char::from)
            .collect()
    }
}

/// Delivery seam for confirmation codes. A failure here is logged by the
/// caller and never rolls back the sign-up that triggered it.
pub trait Mailer: Send + Sync {
    fn send_confirmation(&self, to: &str, username: &str, code: &str) -> anyhow::Result<()>;
}

/// Development transport: writes the code to the log instead of sending it.
pub struct LogMailer {
    pub from: String,
}

impl Mailer for LogMailer {
    fn send_confirmation(&self, to: &str, username: &str, code: &str) -> anyhow::Result<()> {
        info!(
            "confirmation code for {username} <{to}> (from {}): {code}",
            self.from
        );
        Ok(())
    }
}
