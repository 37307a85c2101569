// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::FetchError;
use crate::locking::CancellationToken;
use crate::user_agent;
use attohttpc::Session;
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::{Duration, Instant};

pub trait HttpClient: Send + Sync {
    /// Issue a GET and wait for the response head, giving up when `cancel`
    /// trips or no response arrives within the configured timeout.
    fn get(&self, url: &str, cancel: &CancellationToken)
    -> Result<Box<dyn HttpResponse>, FetchError>;

    /// Longest the connection may stay silent before the transfer fails.
    fn set_timeout(&mut self, timeout: Duration);
}

pub trait HttpResponse: Read + Send {
    fn status(&self) -> u16;

    fn header(&self, name: &str) -> Option<&str>;
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest a single wait on the connection blocks the caller, so that
/// cancellation is observed even while the server is stalled. A read that
/// returns after this interval without data fails with `TimedOut` and may be
/// retried.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(250);

const BODY_CHUNK_SIZE: usize = 64 * 1024;
const BODY_QUEUE_DEPTH: usize = 16;

/// Blocking attohttpc client.
///
/// The request runs on a worker thread with socket timeouts slightly above
/// the stall timeout; the caller only ever waits on a channel in short slices.
/// A cancelled or timed-out transfer abandons the worker, which exits once its
/// own socket timeout fires or its next send finds the receiver gone.
pub struct AttohttpcClient {
    timeout: Duration,
    user_agent: String,
}

impl AttohttpcClient {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: user_agent::download_client(),
        }
    }
}

impl Default for AttohttpcClient {
    fn default() -> Self {
        Self::new()
    }
}

struct ResponseHead {
    status: u16,
    headers: Vec<(String, String)>,
}

impl HttpClient for AttohttpcClient {
    fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn HttpResponse>, FetchError> {
        let (head_tx, head_rx) = mpsc::sync_channel(1);
        let (body_tx, body_rx) = mpsc::sync_channel(BODY_QUEUE_DEPTH);

        let request_url = url.to_string();
        let user_agent = self.user_agent.clone();
        // The caller enforces `timeout`; the socket limits only bound how long
        // an abandoned worker lingers.
        let socket_timeout = self.timeout + READ_POLL_INTERVAL;
        thread::Builder::new()
            .name("provision-http".to_string())
            .spawn(move || {
                transfer(&request_url, &user_agent, socket_timeout, head_tx, body_tx)
            })
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                details: format!("failed to start transfer: {e}"),
            })?;

        let started = Instant::now();
        let head = loop {
            if cancel.is_cancelled() {
                log::debug!("Request to {url} cancelled while waiting for a response");
                return Err(FetchError::Cancelled);
            }
            match head_rx.recv_timeout(READ_POLL_INTERVAL) {
                Ok(head) => break head?,
                Err(RecvTimeoutError::Timeout) => {
                    if started.elapsed() >= self.timeout {
                        return Err(FetchError::TimedOut {
                            secs: self.timeout.as_secs(),
                        });
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FetchError::Network {
                        url: url.to_string(),
                        details: "transfer ended before a response arrived".to_string(),
                    });
                }
            }
        };

        Ok(Box::new(ChannelResponse {
            head,
            body: body_rx,
            pending: Vec::new(),
            offset: 0,
            finished: false,
        }))
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

/// Worker side: send the request, publish the head, then stream the body.
fn transfer(
    url: &str,
    user_agent: &str,
    socket_timeout: Duration,
    head_tx: SyncSender<Result<ResponseHead, FetchError>>,
    body_tx: SyncSender<io::Result<Vec<u8>>>,
) {
    let mut session = Session::new();
    session.proxy_settings(attohttpc::ProxySettings::from_env());

    let sent = session
        .get(url)
        .connect_timeout(socket_timeout)
        .read_timeout(socket_timeout)
        .header("User-Agent", user_agent)
        .follow_redirects(true)
        .send();

    let mut response = match sent {
        Ok(response) => response,
        Err(e) => {
            let _ = head_tx.send(Err(FetchError::Network {
                url: url.to_string(),
                details: e.to_string(),
            }));
            return;
        }
    };

    let head = ResponseHead {
        status: response.status().as_u16(),
        headers: response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
    };
    if head_tx.send(Ok(head)).is_err() {
        return;
    }

    loop {
        let mut chunk = vec![0; BODY_CHUNK_SIZE];
        match response.read(&mut chunk) {
            Ok(0) => {
                let _ = body_tx.send(Ok(Vec::new()));
                return;
            }
            Ok(n) => {
                chunk.truncate(n);
                if body_tx.send(Ok(chunk)).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = body_tx.send(Err(e));
                return;
            }
        }
    }
}

/// Caller side of a transfer. An empty chunk marks the end of the body.
struct ChannelResponse {
    head: ResponseHead,
    body: Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    offset: usize,
    finished: bool,
}

impl Read for ChannelResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.offset >= self.pending.len() {
            if self.finished {
                return Ok(0);
            }
            match self.body.recv_timeout(READ_POLL_INTERVAL) {
                Ok(Ok(chunk)) if chunk.is_empty() => {
                    self.finished = true;
                    return Ok(0);
                }
                Ok(Ok(chunk)) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                Ok(Err(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "no data received yet",
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "transfer ended before the body was complete",
                    ));
                }
            }
        }

        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

impl HttpResponse for ChannelResponse {
    fn status(&self) -> u16 {
        self.head.status
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.head
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_host_is_a_network_error() {
        let mut client = AttohttpcClient::new();
        client.set_timeout(Duration::from_secs(1));

        match client.get("http://127.0.0.1:1/artifact.zip", &CancellationToken::new()) {
            Err(FetchError::Network { url, .. }) => assert!(url.ends_with("artifact.zip")),
            Err(other) => panic!("expected network error, got {other:?}"),
            Ok(_) => panic!("expected connection failure"),
        }
    }
}
