use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};
use url::Url;

/// Account credentials for the Zinguo cloud.
///
/// The password never leaves this type in clear text: the login call only
/// ever sees [`password_digest`](Self::password_digest).
#[derive(Debug, Clone)]
pub struct Credentials {
    account: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(account: impl Into<String>, password: SecretString) -> Self {
        Self {
            account: account.into(),
            password,
        }
    }

    /// The account (phone number or user name) used to log in.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Lowercase hex SHA-1 of the UTF-8 password, as the login endpoint expects.
    pub fn password_digest(&self) -> String {
        let digest = Sha1::digest(self.password.expose_secret().as_bytes());
        format!("{digest:x}")
    }
}

/// A pinned endpoint plus a live token, handed out by the session manager
/// for a single authenticated call.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub endpoint: Url,
    pub token: SecretString,
}
