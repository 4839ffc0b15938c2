use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use crate::auth::AuthConfig;
use crate::error::Error;
use crate::server::Timeouts;

/// Everything needed to run the server, fixed at startup
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub directory: PathBuf,
    pub port: u16,
    pub auth: AuthConfig,
    pub timeouts: Timeouts,
}

impl ServerConfig {
    pub fn new(directory: PathBuf, port: u16, auth: AuthConfig) -> Result<Self, Error> {
        if !directory.is_dir() {
            return Err(Error::DirectoryNotFound(directory));
        }
        Ok(Self {
            directory,
            port,
            auth,
            timeouts: Timeouts::default(),
        })
    }

    /// All interfaces on the configured port
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}
