use std::{fmt::Display, str::FromStr};

use anyhow::{bail, Error};

pub mod external;
pub mod internal;
pub mod local;

/// Remote login identity. Without `user@`, the current OS user is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAtHost {
    user: String,
    host: String,
}

impl UserAtHost {
    pub fn new(user: String, host: String) -> Self {
        Self { user, host }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl FromStr for UserAtHost {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (user, host) = match value.split_once('@') {
            Some((user, host)) => (user.to_string(), host.to_string()),
            None => (whoami::username(), value.to_string()),
        };
        if user.is_empty() || host.is_empty() {
            bail!("Invalid user@host value '{}'", value)
        }
        Ok(Self { user, host })
    }
}

impl Display for UserAtHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}
