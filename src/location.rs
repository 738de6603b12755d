//! Parsing of tree-root operands.
//!
//! An operand is local unless it looks like `[user@]host:[port:]path`.
//! Anything starting with `/`, `./` or `../`, or containing no colon, is a
//! local path.

use std::fmt;

/// A parsed tree-root argument.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Location {
    /// Remote user; empty means the ssh default.
    pub user: String,
    /// Remote host; empty for local paths.
    pub host: String,
    /// Remote port; zero means the ssh default.
    pub port: u16,
    /// The directory path on whichever machine owns it.
    pub path: String,
}

/// Reason an operand could not be parsed.
#[derive(Debug, Eq, PartialEq)]
pub enum LocationError {
    /// The operand was empty.
    Empty,
    /// A remote operand had no host before the colon.
    EmptyHost(String),
    /// A remote operand had no path after the host (and port).
    EmptyPath(String),
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty path argument"),
            Self::EmptyHost(arg) => write!(f, "empty host in remote path \"{arg}\""),
            Self::EmptyPath(arg) => write!(f, "empty path in remote spec \"{arg}\""),
        }
    }
}

impl std::error::Error for LocationError {}

impl Location {
    /// Parses a command-line operand.
    pub fn parse(arg: &str) -> Result<Self, LocationError> {
        if arg.is_empty() {
            return Err(LocationError::Empty);
        }

        if arg.starts_with('/') || arg.starts_with("./") || arg.starts_with("../") {
            return Ok(Self {
                path: arg.to_string(),
                ..Self::default()
            });
        }

        let Some(colon) = arg.find(':') else {
            return Ok(Self {
                path: arg.to_string(),
                ..Self::default()
            });
        };

        let host_part = &arg[..colon];
        let mut rest = &arg[colon + 1..];
        if host_part.is_empty() {
            return Err(LocationError::EmptyHost(arg.to_string()));
        }

        let mut location = Self::default();
        match host_part.split_once('@') {
            Some((user, host)) => {
                location.user = user.to_string();
                location.host = host.to_string();
            }
            None => location.host = host_part.to_string(),
        }
        if location.host.is_empty() {
            return Err(LocationError::EmptyHost(arg.to_string()));
        }

        // An all-digit leading segment in range is a port, not a path part.
        if let Some((maybe_port, after)) = rest.split_once(':') {
            if let Ok(port) = maybe_port.parse::<u16>() {
                if port > 0 {
                    location.port = port;
                    rest = after;
                }
            }
        }

        if rest.is_empty() {
            return Err(LocationError::EmptyPath(arg.to_string()));
        }
        location.path = rest.to_string();
        Ok(location)
    }

    /// The `user@host` (or bare `host`) ssh operand for remote locations,
    /// `None` for local paths.
    pub fn ssh_target(&self) -> Option<String> {
        if self.host.is_empty() {
            None
        } else if self.user.is_empty() {
            Some(self.host.clone())
        } else {
            Some(format!("{}@{}", self.user, self.host))
        }
    }
}
