//! Client builder and reception supervisor.
//!
//! The [`ClientBuilder`] provides a fluent API over [`ClientConfig`]. The
//! [`Client`] manages the lifecycle:
//! 1. Connect and run the handshake (on the caller's task)
//! 2. Spawn the supervisor: demultiplex, decode, push into the packet queue
//! 3. Reconnect with backoff when the connection drops
//! 4. TEARDOWN on shutdown
//!
//! # Example
//!
//! ```ignore
//! use rtsp_interleaved_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::builder("rtsp://192.168.1.20:8554/live")
//!         .queue_capacity(1024)
//!         .keepalive(std::time::Duration::from_secs(30))
//!         .start()
//!         .await?;
//!
//!     while let Some(packet) = client.recv().await {
//!         println!("#{} seq={} len={}", packet.index, packet.sequence_number(), packet.size());
//!     }
//!
//!     client.wait_for_shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::{ClientConfig, VersionPolicy};
use crate::control::SessionController;
use crate::demux::Demuxer;
use crate::error::{Result, RtspError};
use crate::protocol::{decode_frame, Packet};
use crate::queue::{packet_queue, PacketReceiver, PacketSender, QueueStats};
use crate::reconnect::{Backoff, ReconnectPolicy};
use crate::shutdown::{Shutdown, ShutdownSignal};

type TcpController = SessionController<OwnedReadHalf, OwnedWriteHalf>;
type TcpDemuxer = Demuxer<OwnedReadHalf>;

/// Builder for configuring and starting a client.
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a builder for `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(url),
        }
    }

    /// Create a builder from a full configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the track path used for SETUP.
    ///
    /// Default: `trackID=0`
    pub fn track(mut self, track: impl Into<String>) -> Self {
        self.config.track = track.into();
        self
    }

    /// Request a specific interleaved channel pair on SETUP.
    pub fn interleaved(mut self, rtp: u8, rtcp: u8) -> Self {
        self.config.interleaved = Some((rtp, rtcp));
        self
    }

    /// Set the TCP connect timeout.
    ///
    /// Default: 1 second
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-request response timeout during the handshake.
    ///
    /// Default: 10 seconds
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Set how long TEARDOWN waits for a response.
    pub fn teardown_timeout(mut self, timeout: Duration) -> Self {
        self.config.teardown_timeout = timeout;
        self
    }

    /// Set the packet queue capacity.
    ///
    /// When the queue is full the reader stops reading from the socket
    /// until the consumer catches up.
    /// Default: 4096
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set how many consecutive garbage bytes resynchronization tolerates.
    pub fn scan_window(mut self, bytes: usize) -> Self {
        self.config.scan_window = bytes;
        self
    }

    /// Set the socket read size.
    pub fn read_buffer_size(mut self, bytes: usize) -> Self {
        self.config.read_buffer_size = bytes;
        self
    }

    /// Send a keep-alive request every `interval` while playing.
    pub fn keepalive(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = Some(interval);
        self
    }

    /// Set the keep-alive method.
    ///
    /// Default: `GET_PARAMETER`
    pub fn keepalive_method(mut self, method: impl Into<String>) -> Self {
        self.config.keepalive_method = method.into();
        self
    }

    /// Set what happens to packets with an RTP version other than 2.
    pub fn version_policy(mut self, policy: VersionPolicy) -> Self {
        self.config.version_policy = policy;
        self
    }

    /// Set the reconnection policy.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Configuration built so far.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect, run the handshake and start the reception pipeline.
    ///
    /// Connection and transport failures during the handshake are retried
    /// with the reconnection policy's backoff. Protocol errors, and the last
    /// recoverable error once the policy gives up, are returned here; later
    /// failures are handled by the supervisor and reported by
    /// [`Client::wait_for_shutdown`].
    pub async fn start(self) -> Result<Client> {
        Client::start(self.config).await
    }
}

/// Counters shared by the supervisor and the client handle.
#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    packets: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
    resyncs: AtomicU64,
    discarded_bytes: AtomicU64,
    keepalives: AtomicU64,
    reconnects: AtomicU64,
}

/// Snapshot of reception statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    /// Interleaved frames extracted from the stream.
    pub frames: u64,
    /// Packets delivered to the queue.
    pub packets: u64,
    /// Frames that failed to decode (receive index gaps).
    pub dropped: u64,
    /// Frames on channels other than the negotiated RTP channel.
    pub skipped: u64,
    /// Resynchronization runs.
    pub resyncs: u64,
    /// Bytes discarded while resynchronizing.
    pub discarded_bytes: u64,
    /// Keep-alive requests sent.
    pub keepalives: u64,
    /// Successful reconnections.
    pub reconnects: u64,
    /// Packet queue counters.
    pub queue: QueueStats,
}

/// A running client.
///
/// Use `recv()` to take packets in receive order.
/// Use `wait_for_shutdown()` to wait for the supervisor to finish.
pub struct Client {
    /// Consumer end of the packet queue.
    packets: PacketReceiver,
    /// Shutdown trigger shared with the supervisor.
    shutdown: Shutdown,
    /// Reception counters.
    counters: Arc<Counters>,
    /// Supervisor task handle.
    task: JoinHandle<Result<()>>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    async fn start(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let (controller, demux) = connect_with_retry(&config).await?;
        tracing::info!(
            url = %config.url,
            session = controller.session().session_id().unwrap_or_default(),
            "playing"
        );

        let shutdown = Shutdown::new();
        let (tx, rx) = packet_queue(config.queue_capacity);
        let counters = Arc::new(Counters::default());

        let supervisor = Supervisor {
            backoff: config.reconnect.backoff(),
            config,
            shutdown: shutdown.signal(),
            packets: tx.with_shutdown(shutdown.signal()),
            counters: counters.clone(),
            next_index: 0,
        };
        let task = tokio::spawn(supervisor.run(controller, demux));

        Ok(Client {
            packets: rx,
            shutdown,
            counters,
            task,
        })
    }

    /// Take the next packet, waiting until one is available.
    ///
    /// Returns `None` once the supervisor has stopped and the queue is drained.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.packets.pop().await
    }

    /// Take the next packet if one is queued.
    pub fn try_recv(&mut self) -> Option<Packet> {
        self.packets.try_pop()
    }

    /// Ask the supervisor to tear the session down and stop.
    ///
    /// Packets already queued can still be received. Calling it more than
    /// once is harmless.
    pub fn shutdown(&self) {
        if self.shutdown.trigger() {
            tracing::debug!("shutdown requested");
        }
    }

    /// Whether shutdown was requested.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Reception statistics.
    pub fn stats(&self) -> ClientStats {
        let c = &self.counters;
        ClientStats {
            frames: c.frames.load(Ordering::Relaxed),
            packets: c.packets.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            resyncs: c.resyncs.load(Ordering::Relaxed),
            discarded_bytes: c.discarded_bytes.load(Ordering::Relaxed),
            keepalives: c.keepalives.load(Ordering::Relaxed),
            reconnects: c.reconnects.load(Ordering::Relaxed),
            queue: self.packets.stats(),
        }
    }

    /// Wait for the supervisor to finish.
    ///
    /// This consumes the client. Packets still queued are discarded, which
    /// also stops a supervisor that is waiting for queue space. Returns the
    /// error that ended the session, if any.
    pub async fn wait_for_shutdown(self) -> Result<()> {
        let Client { packets, task, .. } = self;
        drop(packets);
        task.await
            .map_err(|e| RtspError::Io(std::io::Error::other(e)))?
    }
}

/// Why one connection's pipeline stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpExit {
    /// Shutdown requested or the consumer went away.
    Stopped,
    /// The server closed the stream at a frame boundary.
    EndOfStream,
}

/// Owns the pipeline for the lifetime of the client.
struct Supervisor {
    config: ClientConfig,
    backoff: Backoff,
    shutdown: ShutdownSignal,
    packets: PacketSender,
    counters: Arc<Counters>,
    next_index: u64,
}

impl Supervisor {
    async fn run(mut self, mut controller: TcpController, mut demux: TcpDemuxer) -> Result<()> {
        loop {
            let outcome = self.pump(&mut controller, &mut demux).await;
            controller.teardown().await;

            let cause = match outcome {
                Ok(PumpExit::Stopped) => {
                    tracing::debug!(next_index = self.next_index, "supervisor stopped");
                    return Ok(());
                }
                Ok(PumpExit::EndOfStream) if !self.config.reconnect.enabled => {
                    tracing::info!("stream ended by server");
                    return Ok(());
                }
                Ok(PumpExit::EndOfStream) => {
                    RtspError::Transport("stream ended by server".to_string())
                }
                Err(e) if e.is_recoverable() => e,
                Err(e) => {
                    tracing::error!("session failed: {}", e);
                    return Err(e);
                }
            };

            match self.reconnect(cause).await? {
                Some((c, d)) => {
                    controller = c;
                    demux = d;
                }
                None => return Ok(()),
            }
        }
    }

    /// Read, decode and queue packets until the connection ends.
    async fn pump(
        &mut self,
        controller: &mut TcpController,
        demux: &mut TcpDemuxer,
    ) -> Result<PumpExit> {
        let rtp_channel = controller.session().interleaved().map(|(rtp, _)| rtp);
        let mut keepalive = self.config.keepalive_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let mut last_resyncs = 0;
        let mut last_discarded = 0;

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.shutdown.wait() => return Ok(PumpExit::Stopped),
                _ = self.packets.closed() => return Ok(PumpExit::Stopped),
                _ = tick(&mut keepalive) => {
                    controller.keepalive().await?;
                    self.counters.keepalives.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                frame = demux.next_frame() => frame?,
            };

            let resyncs = demux.buffer().resync_count();
            let discarded = demux.buffer().discarded_bytes();
            if resyncs > last_resyncs {
                tracing::warn!(
                    discarded = discarded - last_discarded,
                    "interleaved stream resynchronized"
                );
                self.counters
                    .resyncs
                    .fetch_add(resyncs - last_resyncs, Ordering::Relaxed);
                self.counters
                    .discarded_bytes
                    .fetch_add(discarded - last_discarded, Ordering::Relaxed);
                last_resyncs = resyncs;
                last_discarded = discarded;
            }

            let frame = match frame {
                Some(frame) => frame,
                None => return Ok(PumpExit::EndOfStream),
            };
            self.counters.frames.fetch_add(1, Ordering::Relaxed);

            if let Some(rtp) = rtp_channel {
                if frame.channel != rtp {
                    tracing::trace!(
                        channel = frame.channel,
                        len = frame.len(),
                        "skipping non-media frame"
                    );
                    self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            }

            let index = self.next_index;
            self.next_index += 1;
            let channel = frame.channel;

            let packet = match decode_frame(frame, index) {
                Ok(packet) => packet,
                Err(e) => {
                    tracing::warn!(index, channel, "dropping frame: {}", e);
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            if !packet.header.is_valid_version() {
                match self.config.version_policy {
                    VersionPolicy::Drop => {
                        tracing::warn!(
                            index,
                            version = packet.header.version,
                            "dropping packet with unsupported RTP version"
                        );
                        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    VersionPolicy::Accept => tracing::warn!(
                        index,
                        version = packet.header.version,
                        "delivering packet with unsupported RTP version"
                    ),
                }
            }

            tracing::trace!(
                index,
                seq = packet.sequence_number(),
                len = packet.size(),
                "packet"
            );

            if self.packets.push(packet).await.is_err() {
                return Ok(PumpExit::Stopped);
            }
            self.counters.packets.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Sleep and retry the full handshake until it succeeds, the policy
    /// gives up (`Err`), or shutdown is requested (`Ok(None)`).
    async fn reconnect(
        &mut self,
        mut cause: RtspError,
    ) -> Result<Option<(TcpController, TcpDemuxer)>> {
        loop {
            let delay = match self.backoff.next_delay() {
                Some(delay) => delay,
                None => {
                    tracing::error!(
                        attempts = self.backoff.attempts(),
                        "giving up reconnecting: {}",
                        cause
                    );
                    return Err(cause);
                }
            };

            tracing::warn!(
                attempt = self.backoff.attempts(),
                ?delay,
                "connection lost ({}), reconnecting",
                cause
            );

            let config = &self.config;
            let attempt = tokio::select! {
                biased;
                _ = self.shutdown.wait() => return Ok(None),
                attempt = async {
                    tokio::time::sleep(delay).await;
                    connect_and_play(config).await
                } => attempt,
            };

            match attempt {
                Ok(pair) => {
                    self.backoff.reset();
                    self.counters.reconnects.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        session = pair.0.session().session_id().unwrap_or_default(),
                        next_index = self.next_index,
                        "reconnected"
                    );
                    return Ok(Some(pair));
                }
                Err(e) if e.is_recoverable() => cause = e,
                Err(e) => {
                    tracing::error!("reconnect failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

async fn connect_and_play(config: &ClientConfig) -> Result<(TcpController, TcpDemuxer)> {
    let mut controller = SessionController::connect(config).await?;
    let demux = controller.handshake().await?;
    Ok((controller, demux))
}

/// Connect and play, retrying recoverable failures with backoff.
async fn connect_with_retry(config: &ClientConfig) -> Result<(TcpController, TcpDemuxer)> {
    let mut backoff = config.reconnect.backoff();
    loop {
        let cause = match connect_and_play(config).await {
            Ok(pair) => return Ok(pair),
            Err(e) if e.is_recoverable() => e,
            Err(e) => return Err(e),
        };

        let delay = match backoff.next_delay() {
            Some(delay) => delay,
            None => return Err(cause),
        };
        tracing::warn!(
            attempt = backoff.attempts(),
            ?delay,
            "handshake failed ({}), retrying",
            cause
        );
        tokio::time::sleep(delay).await;
    }
}

/// Wait for the next keep-alive tick, or forever when keep-alives are off.
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
