use std::fmt;
use std::net::SocketAddr;

use uuid::Uuid;

use crate::error::LifecycleError;

/// Who this process is. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    name: String,
    instance_id: String,
    listen_addr: SocketAddr,
}

impl ServiceIdentity {
    pub fn new(
        name: impl Into<String>,
        instance_id: impl Into<String>,
        listen_addr: SocketAddr,
    ) -> Result<Self, LifecycleError> {
        let name = name.into();
        let instance_id = instance_id.into();

        if name.trim().is_empty() {
            return Err(LifecycleError::InvalidIdentity(
                "service name must not be empty".to_owned(),
            ));
        }
        if instance_id.trim().is_empty() {
            return Err(LifecycleError::InvalidIdentity(
                "instance id must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            name,
            instance_id,
            listen_addr,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.name, self.instance_id, self.listen_addr)
    }
}

/// UUIDv7 ids sort by creation time, which keeps restarts of a pod easy to follow in logs.
pub fn generate_instance_id() -> String {
    Uuid::now_v7().to_string()
}
