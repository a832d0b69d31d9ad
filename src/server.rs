//! Server composition.
//!
//! [`Server`] wires the listener, session context, worker pool, and reactor
//! together. Nothing is global: every piece is constructed here and owned by
//! the reactor, so tests can build as many independent servers as they like.
//!
//! ## Example
//!
//! ```no_run
//! use rexecd::{Server, ServerConfig, ShellExecutor};
//! use std::sync::Arc;
//!
//! let config = ServerConfig {
//!     host: "127.0.0.1".to_string(),
//!     port: 0,
//!     ..Default::default()
//! };
//! let server = Server::bind(config, Arc::new(ShellExecutor::new())).unwrap();
//! let handle = server.spawn().unwrap();
//! println!("listening on {}", handle.local_addr());
//! handle.shutdown().unwrap();
//! ```

use crate::auth::{Authenticator, StaticCredentials};
use crate::commands::CommandExecutor;
use crate::config::ServerConfig;
use crate::connection::{ConnectionStats, SessionContext};
use crate::error::{Result, ServerError};
use crate::reactor::{bind_listener, Reactor, ReactorHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// A bound, not yet running server.
pub struct Server {
    reactor: Reactor,
    handle: ReactorHandle,
    local_addr: SocketAddr,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Binds a server whose handshake (if any) checks the credentials in
    /// `config`.
    pub fn bind(config: ServerConfig, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        let authenticator = config.credentials.clone().map(|credentials| {
            Arc::new(StaticCredentials::new(credentials)) as Arc<dyn Authenticator>
        });
        Self::bind_with(config, executor, authenticator)
    }

    /// Binds a server with an explicit authenticator. `None` disables the
    /// handshake regardless of `config.credentials`.
    pub fn bind_with(
        config: ServerConfig,
        executor: Arc<dyn CommandExecutor>,
        authenticator: Option<Arc<dyn Authenticator>>,
    ) -> Result<Self> {
        if config.read_buffer_size == 0 {
            return Err(ServerError::Config(
                "read buffer size must be at least 1".to_string(),
            ));
        }

        let (listener, local_addr) = bind_listener(&config.bind_address())?;

        let stats = Arc::new(ConnectionStats::new());
        let ctx = Arc::new(SessionContext {
            executor,
            authenticator,
            framing: config.framing,
            sentinel: config.sentinel.clone(),
            read_buffer_size: config.read_buffer_size,
            stats: Arc::clone(&stats),
        });

        let (reactor, handle) = Reactor::new(listener, ctx, config.workers, config.max_events)?;
        info!(addr = %local_addr, workers = config.workers, "Server bound");

        Ok(Self {
            reactor,
            handle,
            local_addr,
            stats,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// A handle that can stop the server from another thread.
    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// Runs the reactor on the current thread until shut down.
    pub fn run(self) -> Result<()> {
        self.reactor.run()
    }

    /// Runs the reactor on a dedicated thread.
    pub fn spawn(self) -> Result<ServerHandle> {
        let Server {
            reactor,
            handle,
            local_addr,
            stats,
        } = self;

        let name = "rexecd-reactor".to_string();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || reactor.run())
            .map_err(|source| ServerError::Spawn { name, source })?;

        Ok(ServerHandle {
            reactor: handle,
            thread: Some(thread),
            local_addr,
            stats,
        })
    }
}

/// A running server. Dropping it shuts the server down.
pub struct ServerHandle {
    reactor: ReactorHandle,
    thread: Option<JoinHandle<Result<()>>>,
    local_addr: SocketAddr,
    stats: Arc<ConnectionStats>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Stops the reactor and the worker pool and waits for them to exit.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        self.reactor.shutdown();
        match thread.join() {
            Ok(result) => result,
            Err(_) => {
                warn!("Reactor thread panicked");
                Ok(())
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ShellExecutor;
    use crate::config::{Credentials, Profile};
    use std::io::{Read, Write};
    use std::net::{Shutdown, TcpStream};
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    fn start(profile: Profile, workers: usize) -> ServerHandle {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            workers,
            ..ServerConfig::for_profile(profile)
        };
        Server::bind(config, Arc::new(ShellExecutor::new()))
            .unwrap()
            .spawn()
            .unwrap()
    }

    fn connect(handle: &ServerHandle) -> TcpStream {
        let stream = TcpStream::connect(handle.local_addr()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    /// Reads until `needle` shows up or the peer closes.
    fn read_until(stream: &mut TcpStream, needle: &str) -> String {
        let mut collected = Vec::new();
        let mut buf = [0u8; 1024];
        while !String::from_utf8_lossy(&collected).contains(needle) {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => collected.extend_from_slice(&buf[..n]),
            }
        }
        String::from_utf8_lossy(&collected).into_owned()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_zero_workers_fails_to_bind() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(
            Server::bind(config, Arc::new(ShellExecutor::new())),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn test_zero_read_buffer_rejected() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            read_buffer_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            Server::bind(config, Arc::new(ShellExecutor::new())),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn test_open_profile_round_trip() {
        let handle = start(Profile::Open, 2);
        let mut client = connect(&handle);

        client.write_all(b"echo boba\n").unwrap();
        assert!(read_until(&mut client, "boba").contains("boba"));

        client.write_all(b"quit\n").unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(client.read(&mut buf).unwrap(), 0);

        let stats = handle.stats();
        assert!(wait_for(|| stats.active_connections.load(Ordering::Relaxed) == 0));
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.commands_executed.load(Ordering::Relaxed), 1);

        handle.shutdown().unwrap();
    }

    #[test]
    fn test_peer_close_releases_connection() {
        let handle = start(Profile::Open, 1);
        let stats = handle.stats();

        let client = connect(&handle);
        assert!(wait_for(|| stats.active_connections.load(Ordering::Relaxed) == 1));

        client.shutdown(Shutdown::Both).unwrap();
        drop(client);
        assert!(wait_for(|| stats.active_connections.load(Ordering::Relaxed) == 0));
    }

    #[test]
    fn test_custom_authenticator_is_used() {
        struct OnlyRoot;
        impl Authenticator for OnlyRoot {
            fn verify(&self, username: &str, _password: &str) -> bool {
                username == "root"
            }
        }

        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            credentials: Some(Credentials::default()),
            ..ServerConfig::for_profile(Profile::Auth)
        };
        let handle = Server::bind_with(
            config,
            Arc::new(ShellExecutor::new()),
            Some(Arc::new(OnlyRoot)),
        )
        .unwrap()
        .spawn()
        .unwrap();

        let mut client = connect(&handle);
        client.write_all(b"root\n").unwrap();
        thread::sleep(Duration::from_millis(100));
        client.write_all(b"anything\n").unwrap();
        assert!(read_until(&mut client, "\n").contains("Authentication successful"));
    }

    #[test]
    fn test_many_clients_never_share_a_worker() {
        let handle = start(Profile::Open, 4);

        let clients: Vec<_> = (0..8)
            .map(|i| {
                let addr = handle.local_addr();
                thread::spawn(move || {
                    let mut client = TcpStream::connect(addr).unwrap();
                    client
                        .set_read_timeout(Some(Duration::from_secs(5)))
                        .unwrap();
                    for round in 0..5 {
                        let marker = format!("c{}r{}", i, round);
                        client
                            .write_all(format!("echo {}\n", marker).as_bytes())
                            .unwrap();
                        assert!(read_until(&mut client, &marker).contains(&marker));
                    }
                })
            })
            .collect();

        for client in clients {
            client.join().unwrap();
        }

        let stats = handle.stats();
        assert_eq!(stats.commands_executed.load(Ordering::Relaxed), 40);
        assert_eq!(stats.peak_tasks_per_connection(), 1);
    }

    #[test]
    fn test_shutdown_with_open_connections() {
        let handle = start(Profile::Open, 2);
        let _idle = connect(&handle);
        let stats = handle.stats();
        assert!(wait_for(|| stats.active_connections.load(Ordering::Relaxed) == 1));

        handle.shutdown().unwrap();
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    mod scenarios {
        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::time::{sleep, timeout};

        const STEP: Duration = Duration::from_millis(100);

        async fn client(handle: &ServerHandle) -> tokio::net::TcpStream {
            tokio::net::TcpStream::connect(handle.local_addr()).await.unwrap()
        }

        /// Sends one message and gives the server time to consume it as its
        /// own recv.
        async fn send(stream: &mut tokio::net::TcpStream, message: &str) {
            stream.write_all(message.as_bytes()).await.unwrap();
            sleep(STEP).await;
        }

        /// Reads until `needle` appears, the peer closes, or 5s pass.
        async fn recv_until(stream: &mut tokio::net::TcpStream, needle: &str) -> String {
            let mut collected = Vec::new();
            let mut buf = [0u8; 1024];
            let read_all = async {
                while !String::from_utf8_lossy(&collected).contains(needle) {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => collected.extend_from_slice(&buf[..n]),
                    }
                }
            };
            let _ = timeout(Duration::from_secs(5), read_all).await;
            String::from_utf8_lossy(&collected).into_owned()
        }

        async fn expect_closed(stream: &mut tokio::net::TcpStream) {
            let mut buf = [0u8; 64];
            let n = timeout(Duration::from_secs(5), stream.read(&mut buf))
                .await
                .expect("server did not close the connection")
                .unwrap_or(0);
            assert_eq!(n, 0, "unexpected output: {:?}", &buf[..n]);
        }

        #[tokio::test]
        async fn test_auth_success_scenario() {
            let handle = start(Profile::Auth, 2);
            let mut stream = client(&handle).await;

            send(&mut stream, "admin").await;
            send(&mut stream, "password").await;
            assert!(recv_until(&mut stream, "\n")
                .await
                .contains("Authentication successful"));

            send(&mut stream, "echo ok").await;
            assert!(recv_until(&mut stream, "ok").await.contains("ok"));

            send(&mut stream, "DISCONNECT").await;
            expect_closed(&mut stream).await;
        }

        #[tokio::test]
        async fn test_credentials_on_open_profile_end_on_disconnect() {
            let config = ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                workers: 2,
                ..ServerConfig::for_profile(Profile::Open)
            }
            .with_credentials(Some("admin".to_string()), Some("password".to_string()));
            let handle = Server::bind(config, Arc::new(ShellExecutor::new()))
                .unwrap()
                .spawn()
                .unwrap();
            let mut stream = client(&handle).await;

            send(&mut stream, "admin").await;
            send(&mut stream, "password").await;
            assert!(recv_until(&mut stream, "\n")
                .await
                .contains("Authentication successful"));

            send(&mut stream, "DISCONNECT").await;
            expect_closed(&mut stream).await;
            assert_eq!(handle.stats().commands_executed.load(Ordering::Relaxed), 0);
        }

        #[tokio::test]
        async fn test_auth_failure_scenario() {
            let handle = start(Profile::Auth, 2);
            let mut stream = client(&handle).await;

            send(&mut stream, "admin").await;
            send(&mut stream, "wrongpass").await;
            assert!(recv_until(&mut stream, "\n")
                .await
                .contains("Authentication failed"));
            expect_closed(&mut stream).await;

            let stats = handle.stats();
            assert_eq!(stats.auth_failures.load(Ordering::Relaxed), 1);
            assert_eq!(stats.commands_executed.load(Ordering::Relaxed), 0);
        }

        #[tokio::test]
        async fn test_no_auth_scenario() {
            let handle = start(Profile::Open, 2);
            let mut stream = client(&handle).await;

            send(&mut stream, "echo boba").await;
            assert!(recv_until(&mut stream, "boba").await.contains("boba"));

            send(&mut stream, "quit").await;
            expect_closed(&mut stream).await;
        }

        #[tokio::test]
        async fn test_http_scenario() {
            let handle = start(Profile::Http, 2);
            let mut stream = client(&handle).await;

            stream.write_all(b"echo boba").await.unwrap();
            let response = recv_until(&mut stream, "boba\n").await;

            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(response.contains("Content-Length: 5\r\n"));
            assert!(response.contains("Connection: close\r\n"));
            assert!(response.ends_with("\r\n\r\nboba\n"));
            expect_closed(&mut stream).await;
        }

        #[tokio::test]
        async fn test_slow_command_does_not_block_other_clients() {
            let handle = start(Profile::Open, 2);

            let mut slow = client(&handle).await;
            slow.write_all(b"sleep 1; echo slow-done").await.unwrap();

            let mut fast = client(&handle).await;
            let started = tokio::time::Instant::now();
            fast.write_all(b"echo fast").await.unwrap();
            assert!(recv_until(&mut fast, "fast").await.contains("fast"));
            assert!(started.elapsed() < Duration::from_millis(900));

            assert!(recv_until(&mut slow, "slow-done").await.contains("slow-done"));
        }
    }
}
