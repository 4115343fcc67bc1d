use crate::error::port::PortError;

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};

use log::{debug, trace};
use netstat2::{
    AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, SocketInfo, TcpState, get_sockets_info,
};

fn query_tcp_sockets() -> Result<Vec<SocketInfo>, String> {
    get_sockets_info(
        AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6,
        ProtocolFlags::TCP,
    )
    .map_err(|e| format!("Failed to query network sockets: {e}"))
}

/// True when something on this host is listening on `port`.
///
/// Reads the TCP socket table; if that is unavailable, tries to bind the port
/// on the loopback interface instead.
#[track_caller]
pub fn is_port_listening(port: u16) -> Result<bool, PortError> {
    match query_tcp_sockets() {
        Ok(sockets) => {
            let listening = sockets.iter().any(|s| {
                matches!(
                    &s.protocol_socket_info,
                    ProtocolSocketInfo::Tcp(tcp)
                        if tcp.state == TcpState::Listen && tcp.local_port == port
                )
            });
            trace!("Socket table: port {port} listening={listening}");
            Ok(listening)
        }
        Err(message) => {
            debug!("{message}; falling back to bind probe for port {port}");
            bind_probe(port)
        }
    }
}

#[track_caller]
pub(crate) fn bind_probe(port: u16) -> Result<bool, PortError> {
    match TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)) {
        Ok(listener) => {
            drop(listener);
            Ok(false)
        }
        Err(e) if e.kind() == ErrorKind::AddrInUse => Ok(true),
        Err(e) => Err(PortError::probe(port, e.to_string())),
    }
}

/// First port in `range` with nothing listening on it.
#[track_caller]
pub fn find_free_port(
    range: impl IntoIterator<Item = u16>,
) -> Result<Option<u16>, PortError> {
    for port in range {
        if !is_port_listening(port)? {
            return Ok(Some(port));
        }
    }
    Ok(None)
}
