use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::shared::{ChannelError, Envelope, PeerChannel};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Accepts peer connections on `addr`. Every connection gets a reader thread
/// that forwards one envelope per JSON line, in arrival order.
pub fn spawn_peer_listener(addr: &str, tx: Sender<Envelope>) -> Result<SocketAddr, ChannelError> {
    let listener = TcpListener::bind(addr)?;
    let local = listener.local_addr()?;
    info!("peer listener on {local}");
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let tx = tx.clone();
                    thread::spawn(move || read_envelopes(stream, tx));
                }
                Err(err) => warn!("peer accept failed: {err}"),
            }
        }
    });
    Ok(local)
}

fn read_envelopes(stream: TcpStream, tx: Sender<Envelope>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!("peer {peer} connected");
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("peer {peer} read error: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Envelope>(&line) {
            Ok(envelope) => {
                if tx.send(envelope).is_err() {
                    debug!("receiver dropped, closing peer {peer}");
                    return;
                }
            }
            Err(err) => warn!("peer {peer} sent a bad envelope: {err}"),
        }
    }
    info!("peer {peer} disconnected");
}

#[derive(Debug)]
struct PeerLink {
    addr: String,
    stream: Option<TcpStream>,
    failures: u32,
    retry_at: Option<Instant>,
}

impl PeerLink {
    fn new(addr: String) -> Self {
        Self {
            addr,
            stream: None,
            failures: 0,
            retry_at: None,
        }
    }

    /// At-most-once: a line is dropped for a peer that is down or backing off.
    fn write(&mut self, line: &[u8], now: Instant) {
        if self.stream.is_none() {
            if self.retry_at.is_some_and(|at| at > now) {
                return;
            }
            match dial(&self.addr) {
                Ok(stream) => {
                    info!("connected to peer {}", self.addr);
                    self.stream = Some(stream);
                    self.failures = 0;
                    self.retry_at = None;
                }
                Err(err) => {
                    self.failed(now);
                    warn!("peer {} unreachable: {err}", self.addr);
                    return;
                }
            }
        }
        if let Some(stream) = self.stream.as_mut() {
            if let Err(err) = stream.write_all(line) {
                warn!("peer {} write failed: {err}", self.addr);
                self.stream = None;
                self.failed(now);
            }
        }
    }

    fn failed(&mut self, now: Instant) {
        self.failures = self.failures.saturating_add(1);
        self.retry_at = Some(now + redial_backoff(self.failures));
    }
}

/// 1 s doubling per consecutive failure, capped at 30 s.
fn redial_backoff(failures: u32) -> Duration {
    let secs = 1u64 << failures.saturating_sub(1).min(5);
    Duration::from_secs(secs.min(30))
}

fn dial(addr: &str) -> Result<TcpStream, ChannelError> {
    let target = addr.to_socket_addrs()?.next().ok_or(ChannelError::Closed)?;
    let stream = TcpStream::connect_timeout(&target, CONNECT_TIMEOUT)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    Ok(stream)
}

/// Fans envelopes out to every configured peer as JSON lines. Sending only
/// queues the line; a writer thread owns the connections, dials lazily and
/// backs off re-dials after a failure.
#[derive(Debug)]
pub struct TcpPeerChannel {
    tx: Sender<Vec<u8>>,
}

impl TcpPeerChannel {
    pub fn new<I, S>(peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let links: Vec<PeerLink> = peers
            .into_iter()
            .map(Into::into)
            .map(|addr: String| addr.trim().to_string())
            .filter(|addr| !addr.is_empty())
            .map(PeerLink::new)
            .collect();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || write_lines(links, rx));
        Self { tx }
    }
}

fn write_lines(mut links: Vec<PeerLink>, rx: Receiver<Vec<u8>>) {
    info!("peer writer started for {} peers", links.len());
    while let Ok(line) = rx.recv() {
        let now = Instant::now();
        for link in &mut links {
            link.write(&line, now);
        }
    }
    debug!("peer channel dropped, exiting writer");
}

impl PeerChannel for TcpPeerChannel {
    fn send(&mut self, envelope: &Envelope) -> Result<(), ChannelError> {
        let mut line = serde_json::to_vec(envelope)?;
        line.push(b'\n');
        self.tx.send(line).map_err(|_| ChannelError::Closed)
    }
}
