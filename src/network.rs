// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Framing of messages and the client side of the connection.
use std::collections::HashMap;
use std::fmt::Debug;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream as StdTcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::exception::{network_exception, ManipulationResult};
use crate::service_types::{Command, CommandHeader, Reply, COMMAND_HEADER_SIZE, MAX_PAYLOAD_SIZE};

const CLIENT: Token = Token(1);

/// Serializes `payload` and prepends a header with the matching size.
pub fn encode_message<T: Serialize>(
    header: CommandHeader,
    payload: &T,
) -> ManipulationResult<Vec<u8>> {
    let payload = serialize(payload)?;
    encode_raw_message(header, payload)
}

/// Prepends a header with the size of the already serialized `payload`.
pub fn encode_raw_message(
    mut header: CommandHeader,
    mut payload: Vec<u8>,
) -> ManipulationResult<Vec<u8>> {
    header.size = payload.len() as u32;
    let mut message = serialize(&header)?;
    message.append(&mut payload);
    Ok(message)
}

/// Blocks until a complete message has been read from `reader`.
///
/// Returns `None` if the connection was closed between two messages.
pub fn read_message<R: Read>(reader: &mut R) -> ManipulationResult<Option<(CommandHeader, Vec<u8>)>> {
    let mut header_bytes = [0_u8; COMMAND_HEADER_SIZE];
    let mut read = 0;
    while read < COMMAND_HEADER_SIZE {
        match reader.read(&mut header_bytes[read..]) {
            Ok(0) if read == 0 => return Ok(None),
            Ok(0) => return Err(network_exception("Connection closed in the middle of a header")),
            Ok(n) => read += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(network_exception(e.to_string())),
        }
    }
    let header: CommandHeader = deserialize(&header_bytes)?;
    check_payload_size(&header)?;
    let mut payload = vec![0_u8; header.size as usize];
    reader
        .read_exact(&mut payload)
        .map_err(|e| network_exception(e.to_string()))?;
    Ok(Some((header, payload)))
}

fn check_payload_size(header: &CommandHeader) -> ManipulationResult<()> {
    if header.size as usize > MAX_PAYLOAD_SIZE {
        return Err(network_exception(format!(
            "Message of {} bytes exceeds the limit of {} bytes",
            header.size, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

/// Client side of a connection to a [`Server`](`crate::Server`).
///
/// Requests are numbered. Responses are collected until the response to the awaited request
/// arrives, which allows several requests to be in flight.
pub struct Network {
    tcp_socket: TcpStream,
    timeout: Duration,
    command_id: u32,
    pending: Vec<u8>,
    received_responses: HashMap<u32, Vec<u8>>,
    poll_read: Poll,
    events: Events,
}

impl Network {
    /// Connects to `address:port`.
    ///
    /// # Arguments
    /// * `address` - IP/hostname of the server.
    /// * `port` - Port of the server.
    /// * `timeout` - Maximum time to wait for a response.
    /// # Errors
    /// * [`NetworkException`](`crate::exception::ManipulationException::NetworkException`) if
    /// the address cannot be resolved or the connection cannot be established.
    pub fn new(address: &str, port: u16, timeout: Duration) -> ManipulationResult<Network> {
        let socket_address = format!("{}:{}", address, port)
            .to_socket_addrs()
            .map_err(|e| network_exception(e.to_string()))?
            .next()
            .ok_or_else(|| network_exception(format!("Could not resolve {}", address)))?;
        let std_socket = StdTcpStream::connect_timeout(&socket_address, timeout)
            .map_err(|e| network_exception(format!("Could not connect to {}: {}", socket_address, e)))?;
        std_socket
            .set_nodelay(true)
            .and_then(|_| std_socket.set_nonblocking(true))
            .map_err(|e| network_exception(e.to_string()))?;
        let mut tcp_socket = TcpStream::from_std(std_socket);
        let poll_read = Poll::new().map_err(|e| network_exception(e.to_string()))?;
        poll_read
            .registry()
            .register(&mut tcp_socket, CLIENT, Interest::READABLE)
            .map_err(|e| network_exception(e.to_string()))?;
        debug!(%socket_address, "connected");
        Ok(Network {
            tcp_socket,
            timeout,
            command_id: 0,
            pending: Vec::new(),
            received_responses: HashMap::new(),
            poll_read,
            events: Events::with_capacity(128),
        })
    }

    pub fn create_header(&mut self, command: Command, object_id: u32) -> CommandHeader {
        let header = CommandHeader::new(command, self.command_id, object_id, 0);
        self.command_id = self.command_id.wrapping_add(1);
        header
    }

    /// Sends a request and returns its command id.
    pub fn tcp_send_request<T: Serialize + Debug>(
        &mut self,
        command: Command,
        object_id: u32,
        request: &T,
    ) -> ManipulationResult<u32> {
        let header = self.create_header(command, object_id);
        trace!(?command, command_id = header.command_id, ?request, "sending request");
        let message = encode_message(header, request)?;
        self.write_all(&message)?;
        Ok(header.command_id)
    }

    /// Blocks until the response with the given command id has been received.
    ///
    /// # Errors
    /// * [`NetworkException`](`crate::exception::ManipulationException::NetworkException`) on
    /// timeout, if the connection is lost or if the response cannot be decoded.
    pub fn tcp_blocking_receive_response<T: DeserializeOwned>(
        &mut self,
        command_id: u32,
    ) -> ManipulationResult<T> {
        let response_bytes = self.wait_for_response_to_arrive(command_id)?;
        deserialize(&response_bytes)
    }

    /// Sends a request to object `object_id` and waits for the reply.
    ///
    /// # Errors
    /// * [`ServerError`](`crate::exception::ManipulationException::ServerError`) if the server
    /// reports an error.
    /// * [`NetworkException`](`crate::exception::ManipulationException::NetworkException`) if
    /// the request could not be transmitted.
    pub fn call<Req, Res>(
        &mut self,
        object_id: u32,
        command: Command,
        request: &Req,
    ) -> ManipulationResult<Res>
    where
        Req: Serialize + Debug,
        Res: DeserializeOwned,
    {
        let command_id = self.tcp_send_request(command, object_id, request)?;
        let reply: Reply<Res> = self.tcp_blocking_receive_response(command_id)?;
        reply.into_result()
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> ManipulationResult<()> {
        let deadline = Instant::now() + self.timeout;
        while !bytes.is_empty() {
            match self.tcp_socket.write(bytes) {
                Ok(0) => return Err(network_exception("Connection closed")),
                Ok(n) => bytes = &bytes[n..],
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() > deadline {
                        return Err(network_exception("Timeout while sending request"));
                    }
                    std::thread::yield_now();
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(network_exception(e.to_string())),
            }
        }
        Ok(())
    }

    fn wait_for_response_to_arrive(&mut self, command_id: u32) -> ManipulationResult<Vec<u8>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(response) = self.received_responses.remove(&command_id) {
                return Ok(response);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(network_exception(format!(
                    "Timeout while waiting for response {}",
                    command_id
                )));
            }
            self.tcp_read_from_buffer(deadline - now)?;
        }
    }

    fn tcp_read_from_buffer(&mut self, timeout: Duration) -> ManipulationResult<()> {
        self.poll_read
            .poll(&mut self.events, Some(timeout))
            .map_err(|e| network_exception(e.to_string()))?;
        if !self.events.iter().any(|event| event.token() == CLIENT && event.is_readable()) {
            return Ok(());
        }
        let mut buffer = [0_u8; 4096];
        loop {
            match self.tcp_socket.read(&mut buffer) {
                Ok(0) => return Err(network_exception("Connection closed by server")),
                Ok(n) => self.pending.extend_from_slice(&buffer[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(network_exception(e.to_string())),
            }
        }
        while self.pending.len() >= COMMAND_HEADER_SIZE {
            let header: CommandHeader = deserialize(&self.pending[..COMMAND_HEADER_SIZE])?;
            check_payload_size(&header)?;
            let end = COMMAND_HEADER_SIZE + header.size as usize;
            if self.pending.len() < end {
                break;
            }
            let payload = self.pending[COMMAND_HEADER_SIZE..end].to_vec();
            self.pending.drain(..end);
            self.received_responses.insert(header.command_id, payload);
        }
        Ok(())
    }
}

pub fn serialize<T: Serialize>(s: &T) -> ManipulationResult<Vec<u8>> {
    bincode::serialize(s).map_err(|e| network_exception(format!("Could not encode message: {}", e)))
}

pub fn deserialize<T: DeserializeOwned>(encoded: &[u8]) -> ManipulationResult<T> {
    bincode::deserialize(encoded)
        .map_err(|e| network_exception(format!("Could not decode message: {}", e)))
}
