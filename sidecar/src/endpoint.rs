//! Endpoint addresses shared by the server and the client side.
//!
//! Accepted forms are `unix://<path>`, `tcp://<host:port>` (scheme is case
//! insensitive) and a bare absolute path, which is shorthand for
//! `unix://<path>`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::EndpointError;

const SEPARATOR: &str = "://";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Filesystem addressed local socket.
    Unix,
    Tcp,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Unix => "unix",
            Scheme::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated `(scheme, address)` pair.
///
/// Only [`Endpoint::parse`] builds one, so the address is never empty and the
/// scheme is always supported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: Scheme,
    address: String,
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        if raw.starts_with('/') {
            return Ok(Self {
                scheme: Scheme::Unix,
                address: raw.to_string(),
            });
        }

        let invalid = || EndpointError::InvalidEndpoint(raw.to_string());
        let (scheme, address) = raw.split_once(SEPARATOR).ok_or_else(invalid)?;
        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "unix" => Scheme::Unix,
            "tcp" => Scheme::Tcp,
            _ => return Err(invalid()),
        };
        if address.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            scheme,
            address: address.to_string(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_local_socket(&self) -> bool {
        self.scheme == Scheme::Unix
    }

    /// Filesystem path of a local socket endpoint.
    pub fn socket_path(&self) -> Option<&Path> {
        match self.scheme {
            Scheme::Unix => Some(Path::new(&self.address)),
            Scheme::Tcp => None,
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scheme, SEPARATOR, self.address)
    }
}
