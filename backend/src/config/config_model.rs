use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub admin: AdminSecret,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// Seconds
    pub timeout: u64,
}

impl Server {
    pub fn body_limit_bytes(&self) -> Result<usize> {
        self.body_limit
            .checked_mul(1024 * 1024)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .with_context(|| format!("SERVER_BODY_LIMIT is too large ({} MiB)", self.body_limit))
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

/// Shared secret expected in the `secret-key` header of admin routes.
#[derive(Clone)]
pub struct AdminSecret {
    pub secret: String,
}

impl std::fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSecret").field("secret", &"***").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(body_limit: u64) -> Server {
        Server {
            port: 8080,
            body_limit,
            timeout: 30,
        }
    }

    #[test]
    fn body_limit_is_converted_from_mib() {
        assert_eq!(server(2).body_limit_bytes().unwrap(), 2 * 1024 * 1024);
    }

    #[test]
    fn overflowing_body_limit_is_rejected() {
        let err = server(u64::MAX).body_limit_bytes().unwrap_err();
        assert!(err.to_string().contains("SERVER_BODY_LIMIT"));
    }
}
