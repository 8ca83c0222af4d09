use std::{io, net::SocketAddr};

use thiserror::Error;

/// Startup failures outside the request path. Cache store trouble never ends
/// up here: the store degrades to pass-through instead of stopping the server.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("could not listen on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("could not install the log subscriber: {0}")]
    Telemetry(String),
    #[error("settings rejected: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn bind(addr: SocketAddr, source: io::Error) -> Self {
        Self::Bind { addr, source }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn bind_failure_names_the_address() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().expect("addr");
        let err = InfraError::bind(addr, io::Error::from(io::ErrorKind::AddrInUse));
        assert_eq!(err.to_string(), "could not listen on 127.0.0.1:5000");
        let source = err.source().expect("io source");
        assert_eq!(
            source.downcast_ref::<io::Error>().map(io::Error::kind),
            Some(io::ErrorKind::AddrInUse)
        );
    }
}
