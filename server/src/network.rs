//! Server network layer handling the TCP accept loop

use crate::error::ServerError;
use crate::registry::{SessionRegistry, SharedRegistry};
use crate::session::Session;
use log::{error, info};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the loop
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Server context owning the listening socket and the session registry
pub struct ChatServer {
    listener: TcpListener,
    registry: SharedRegistry,
}

impl ChatServer {
    /// Binds the listening socket. Failure here is fatal to startup.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
        info!("Server running on {}", local_addr);

        Ok(ChatServer {
            listener,
            registry: SessionRegistry::shared(),
        })
    }

    /// Address actually bound, useful when binding to port 0
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Accepts connections forever
    pub async fn run(&self) {
        loop {
            self.accept_next().await;
        }
    }

    /// Accepts connections until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                info!("Shutdown signal received");
            }
            _ = self.run() => {}
        }
    }

    /// Accepts one connection and starts its session.
    ///
    /// The session is registered before this returns, so it is visible to
    /// fan-out before the next connection is accepted.
    async fn accept_next(&self) {
        match self.listener.accept().await {
            Ok((socket, peer)) => {
                info!("New connection from {}", peer);
                let session = Session::register(socket, peer, Arc::clone(&self.registry)).await;
                tokio::spawn(session.run());
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = ChatServer::bind(loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();

        assert_ne!(addr.port(), 0);
        assert!(server.registry().read().await.is_empty());
    }

    #[tokio::test]
    async fn test_bind_port_in_use() {
        let first = ChatServer::bind(loopback()).await.unwrap();
        let taken = first.local_addr().unwrap();

        match ChatServer::bind(taken).await {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, taken),
            Err(e) => panic!("Unexpected error: {}", e),
            Ok(_) => panic!("Second bind on {} should fail", taken),
        }
    }

    #[tokio::test]
    async fn test_accept_registers_before_returning() {
        let server = ChatServer::bind(loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        server.accept_next().await;

        assert_eq!(server.registry().read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_connection_is_unregistered() {
        let server = ChatServer::bind(loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        server.accept_next().await;
        assert_eq!(server.registry().read().await.len(), 1);

        client.shutdown().await.unwrap();
        drop(client);

        let registry = Arc::clone(server.registry());
        let emptied = tokio::time::timeout(Duration::from_secs(2), async move {
            while !registry.read().await.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(emptied.is_ok());
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let server = ChatServer::bind(loopback()).await.unwrap();

        let result =
            tokio::time::timeout(Duration::from_secs(1), server.run_until(async {})).await;
        assert!(result.is_ok());
    }
}
