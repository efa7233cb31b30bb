use std::{fmt, str::FromStr};

/// Controller endpoint of the streaming service, e.g. `tcp://127.0.0.1:9090`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerEndpoint {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl ControllerEndpoint {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl fmt::Display for ControllerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

impl FromStr for ControllerEndpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EndpointParseError::Empty);
        }
        if let Some(c) = s.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(EndpointParseError::InvalidCharacter(c));
        }

        let (scheme, rest) = s
            .split_once("://")
            .ok_or(EndpointParseError::MissingScheme)?;
        if !is_valid_scheme(scheme) {
            return Err(EndpointParseError::InvalidScheme(scheme.to_owned()));
        }

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let (host, port) = split_host_port(authority)?;
        if host.is_empty() {
            return Err(EndpointParseError::MissingHost);
        }

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_owned(),
            port,
        })
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

fn split_host_port(authority: &str) -> Result<(&str, Option<u16>), EndpointParseError> {
    // [v6]:port
    if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, tail) = bracketed
            .split_once(']')
            .ok_or(EndpointParseError::MissingHost)?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, Some(parse_port(port)?))),
            None if tail.is_empty() => Ok((host, None)),
            None => Err(EndpointParseError::InvalidPort(tail.to_owned())),
        };
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Ok((host, Some(parse_port(port)?))),
        None => Ok((authority, None)),
    }
}

fn parse_port(port: &str) -> Result<u16, EndpointParseError> {
    port.parse()
        .map_err(|_| EndpointParseError::InvalidPort(port.to_owned()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointParseError {
    Empty,
    MissingScheme,
    InvalidScheme(String),
    MissingHost,
    InvalidPort(String),
    InvalidCharacter(char),
}

impl fmt::Display for EndpointParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointParseError::Empty => write!(f, "EndpointParseError: empty endpoint"),
            EndpointParseError::MissingScheme => {
                write!(f, "EndpointParseError: missing '<scheme>://' prefix")
            }
            EndpointParseError::InvalidScheme(scheme) => {
                write!(f, "EndpointParseError: invalid scheme '{scheme}'")
            }
            EndpointParseError::MissingHost => write!(f, "EndpointParseError: missing host"),
            EndpointParseError::InvalidPort(port) => {
                write!(f, "EndpointParseError: invalid port '{port}'")
            }
            EndpointParseError::InvalidCharacter(c) => {
                write!(f, "EndpointParseError: invalid character {c:?}")
            }
        }
    }
}

impl std::error::Error for EndpointParseError {}
