//! TCP line listener feeding remote commands into the event queue.
//!
//! One client at a time. Each newline-terminated, nonempty line becomes
//! an [`Event::Command`]; the main loop dispatches it exactly as if it
//! had been read from a script. The worker thread polls a nonblocking
//! listener and stops when the handle is dropped.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;

use crate::events::{Event, EventProducer};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct RemoteListener {
    stop: Arc<AtomicBool>,
    local_addr: SocketAddr,
}

impl RemoteListener {
    pub fn bind<A: ToSocketAddrs>(addr: A, producer: EventProducer) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).context("binding remote command socket")?;
        listener
            .set_nonblocking(true)
            .context("setting remote listener non-blocking")?;
        let local_addr = listener
            .local_addr()
            .context("reading remote listener address")?;
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("sky_remote".to_string())
            .spawn(move || worker_loop(listener, producer, worker_stop))
            .context("spawning remote listener thread")?;
        Ok(Self { stop, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for RemoteListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn worker_loop(listener: TcpListener, producer: EventProducer, stop: Arc<AtomicBool>) {
    let mut client: Option<Client> = None;
    while !stop.load(Ordering::Relaxed) {
        if let Some(conn) = client.as_mut() {
            match conn.pump(&producer) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    log::warn!("remote client read failed: {err}; waiting for reconnect");
                    client = None;
                }
            }
        }

        if client.is_none() {
            match listener.accept() {
                Ok((stream, addr)) => match Client::new(stream) {
                    Ok(conn) => {
                        log::info!("remote client connected from {addr}");
                        client = Some(conn);
                        continue;
                    }
                    Err(err) => {
                        log::warn!("failed to configure remote client from {addr}: {err}");
                    }
                },
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    log::warn!("remote accept error: {err}");
                }
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

struct Client {
    stream: TcpStream,
    pending: Vec<u8>,
}

impl Client {
    fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            pending: Vec::new(),
        })
    }

    /// Read whatever is available and forward complete lines. Returns
    /// Ok(true) when bytes arrived, Ok(false) when the read would
    /// block, Err on disconnect or I/O failure.
    fn pump(&mut self, producer: &EventProducer) -> io::Result<bool> {
        let mut buffer = [0u8; 1024];
        match self.stream.read(&mut buffer) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "remote client closed connection",
            )),
            Ok(read) => {
                self.pending.extend_from_slice(&buffer[..read]);
                self.flush_lines(producer);
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn flush_lines(&mut self, producer: &EventProducer) {
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw[..newline]);
            let line = line.trim_end_matches('\r').trim();
            if !line.is_empty() {
                producer.send(Event::Command {
                    line: line.to_string(),
                });
            }
        }
    }
}
