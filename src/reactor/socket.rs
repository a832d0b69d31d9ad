//! Listening socket setup.

use crate::config::LISTEN_BACKLOG;
use crate::error::{Result, ServerError};
use mio::net::TcpListener;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::os::fd::AsRawFd;

/// Resolves `address`, binds it, applies the listen backlog, and returns a
/// non-blocking listener ready for registration together with the address it
/// actually bound (useful when the port was 0).
pub(crate) fn bind_listener(address: &str) -> Result<(TcpListener, SocketAddr)> {
    let addr = resolve(address)?;

    let listener =
        std::net::TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
    set_backlog(&listener, LISTEN_BACKLOG)?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::Bind { addr, source })?;

    Ok((TcpListener::from_std(listener), local_addr))
}

fn resolve(address: &str) -> Result<SocketAddr> {
    let invalid = |source: io::Error| ServerError::InvalidAddress {
        addr: address.to_string(),
        source,
    };

    address.to_socket_addrs().map_err(invalid)?.next().ok_or_else(|| {
        invalid(io::Error::new(
            io::ErrorKind::InvalidInput,
            "address resolved to nothing",
        ))
    })
}

/// Calling listen(2) again on a listening socket replaces its backlog.
fn set_backlog(listener: &std::net::TcpListener, backlog: i32) -> Result<()> {
    let rc = unsafe { libc::listen(listener.as_raw_fd(), backlog) };
    if rc == -1 {
        return Err(ServerError::Listen {
            backlog,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}
