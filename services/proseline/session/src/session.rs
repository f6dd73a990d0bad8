//! Protocol engine shared by both profiles.
//!
//! A [`Session`] owns one byte stream. The write half stays with the caller,
//! who sends the handshake and typed messages; a spawned task owns the read
//! half, decodes frames in receipt order and reports each outcome as an
//! [`Event`] on one bounded channel.
//!
//! ```text
//!  INIT ──handshake()/peer handshake──▶ HANDSHAKING ──both──▶ READY
//!    │                                        │                 │
//!    └────────────── fatal error / destroy() ─┴─────────────────┴──▶ CLOSED
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use proseline_schema::{Handshake, Schema};
use proseline_wire::{
    encode_frame, FrameDecoder, TaggedMessage, DEFAULT_MAX_FRAME_SIZE, HANDSHAKE_TAG,
};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{Rejection, SessionError};
use crate::profile::{tagged, Profile};
use crate::transport::{IoStream, SessionStream};

/// Configuration for a session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Largest frame accepted or produced
    pub max_frame_size: usize,
    /// Capacity of the event channel
    pub event_buffer: usize,
    /// Initial capacity of the read buffer
    pub read_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            event_buffer: 64,
            read_buffer: 64 * 1024, // 64 KiB
        }
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No handshake in either direction yet
    Init,
    /// One direction has completed its handshake
    Handshaking,
    /// Handshake sent and received
    Ready,
    /// Destroyed by a fatal error or by the caller
    Closed,
}

/// Inbound occurrences, delivered in receipt order
#[derive(Debug)]
pub enum Event<M> {
    /// Peer handshake with a matching version
    Handshake(Handshake),
    /// Validated and verified message
    Message(M),
    /// Message rejected by validation or verification; the session stays open
    Invalid {
        /// Tag the message arrived under
        tag: u64,
        /// Why it was rejected
        rejection: Rejection,
    },
    /// Inbound processing stopped. `error` is `None` on a clean end of stream.
    Closed {
        /// Fatal error that ended the session
        error: Option<SessionError>,
    },
}

/// Flags shared between the caller and the read task
#[derive(Debug, Default)]
struct Shared {
    sent_handshake: AtomicBool,
    received_handshake: AtomicBool,
    destroyed: AtomicBool,
}

/// One protocol session over one byte stream
pub struct Session<P: Profile, S: SessionStream = IoStream> {
    profile: Arc<P>,
    writer: WriteHalf<S>,
    events: mpsc::Receiver<Event<P::Message>>,
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
    max_frame_size: usize,
}

impl<P: Profile, S: SessionStream> Session<P, S> {
    /// Start a session over `stream`. Must be called within a tokio runtime.
    pub fn new(stream: S, profile: P, config: SessionConfig) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        let (event_tx, events) = mpsc::channel(config.event_buffer.max(1));
        let profile = Arc::new(profile);
        let shared = Arc::new(Shared::default());

        let inbound = Inbound {
            profile: profile.clone(),
            shared: shared.clone(),
            decoder: FrameDecoder::with_max_frame_size(config.max_frame_size),
        };
        let reader = tokio::spawn(inbound.run(read_half, event_tx, config.read_buffer));
        debug!(profile = P::NAME, version = P::VERSION, "session started");

        Self {
            profile,
            writer,
            events,
            shared,
            reader,
            max_frame_size: config.max_frame_size,
        }
    }

    /// The profile this session speaks
    pub fn profile(&self) -> &P {
        &self.profile
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        let sent = self.shared.sent_handshake.load(Ordering::Acquire);
        let received = self.shared.received_handshake.load(Ordering::Acquire);
        if self.shared.destroyed.load(Ordering::Acquire) {
            SessionState::Closed
        } else if sent && received {
            SessionState::Ready
        } else if sent || received {
            SessionState::Handshaking
        } else {
            SessionState::Init
        }
    }

    /// Send the local handshake. Calling again once sent is a no-op.
    pub async fn handshake(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.shared.sent_handshake.load(Ordering::Acquire) {
            debug!(profile = P::NAME, "handshake already sent");
            return Ok(());
        }
        let message = tagged(HANDSHAKE_TAG, &Handshake::new(P::VERSION))
            .map_err(|e| SessionError::InvalidOutbound(e.into()))?;
        self.write(&message).await?;
        self.shared.sent_handshake.store(true, Ordering::Release);
        debug!(profile = P::NAME, version = P::VERSION, "sent handshake");
        Ok(())
    }

    /// Validate, tag, and send a typed message.
    ///
    /// # Errors
    ///
    /// Fails without writing anything when the session is destroyed, the
    /// local handshake has not been sent, or `message` fails validation.
    pub async fn send(&mut self, message: P::Message) -> Result<(), SessionError> {
        self.ensure_open()?;
        if !self.shared.sent_handshake.load(Ordering::Acquire) {
            return Err(SessionError::HandshakeNotSent);
        }
        let tagged = self
            .profile
            .encode(&message)
            .map_err(SessionError::InvalidOutbound)?;
        self.write(&tagged).await?;
        debug!(profile = P::NAME, tag = tagged.tag, "sent message");
        Ok(())
    }

    /// Next inbound event. `None` once the read task has finished and every
    /// event has been taken.
    pub async fn next_event(&mut self) -> Option<Event<P::Message>> {
        self.events.recv().await
    }

    /// Run `work`, then flush and shut down the outbound direction. Inbound
    /// processing continues until the peer ends its side.
    ///
    /// A failure in `work` or in the flush destroys the session.
    pub async fn finalize<F, Fut, E>(&mut self, work: F) -> Result<(), SessionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        self.ensure_open()?;
        if let Err(e) = work().await {
            error!(profile = P::NAME, error = %e, "finalize work failed");
            self.destroy();
            return Err(SessionError::Finalize(e.to_string()));
        }
        if let Err(e) = self.writer.shutdown().await {
            error!(profile = P::NAME, error = %e, "failed to end outbound stream");
            self.destroy();
            return Err(e.into());
        }
        debug!(profile = P::NAME, "outbound stream finalized");
        Ok(())
    }

    /// Half-close with no pending work
    pub async fn close(&mut self) -> Result<(), SessionError> {
        self.finalize(|| async { Ok::<(), std::convert::Infallible>(()) })
            .await
    }

    /// Stop immediately: inbound processing halts and later sends fail.
    pub fn destroy(&mut self) {
        if !self.shared.destroyed.swap(true, Ordering::AcqRel) {
            debug!(profile = P::NAME, "session destroyed");
        }
        self.reader.abort();
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.shared.destroyed.load(Ordering::Acquire) {
            Err(SessionError::Destroyed)
        } else {
            Ok(())
        }
    }

    async fn write(&mut self, message: &TaggedMessage) -> Result<(), SessionError> {
        self.ensure_open()?;
        // A frame that cannot be built leaves the stream untouched.
        let frame = self.seal(message)?;
        if let Err(e) = self.writer.write_all(&frame).await {
            error!(profile = P::NAME, error = %e, "write failed");
            self.destroy();
            return Err(e.into());
        }
        Ok(())
    }

    fn seal(&self, message: &TaggedMessage) -> Result<Bytes, SessionError> {
        let payload = message.encode().map_err(SessionError::Unframeable)?;
        let payload = match self.profile.cipher() {
            Some(cipher) => cipher.encrypt(&payload).map_err(SessionError::Encryption)?,
            None => payload,
        };
        encode_frame(&payload, self.max_frame_size).map_err(SessionError::Unframeable)
    }
}

impl<P: Profile, S: SessionStream> Drop for Session<P, S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl<P: Profile, S: SessionStream> fmt::Debug for Session<P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("profile", &P::NAME)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Read side of a session
struct Inbound<P: Profile> {
    profile: Arc<P>,
    shared: Arc<Shared>,
    decoder: FrameDecoder,
}

impl<P: Profile> Inbound<P> {
    async fn run<S: SessionStream>(
        mut self,
        mut reader: ReadHalf<S>,
        events: mpsc::Sender<Event<P::Message>>,
        read_buffer: usize,
    ) {
        let mut buf = BytesMut::with_capacity(read_buffer);
        let error = self.pump(&mut reader, &mut buf, &events).await.err();
        if let Some(e) = &error {
            error!(profile = P::NAME, error = %e, "session failed");
            self.shared.destroyed.store(true, Ordering::Release);
        } else {
            debug!(profile = P::NAME, "peer ended stream");
        }
        let _ = events.send(Event::Closed { error }).await;
    }

    async fn pump<S: SessionStream>(
        &mut self,
        reader: &mut ReadHalf<S>,
        buf: &mut BytesMut,
        events: &mpsc::Sender<Event<P::Message>>,
    ) -> Result<(), SessionError> {
        loop {
            while let Some(frame) = self.decoder.decode(buf)? {
                if self.shared.destroyed.load(Ordering::Acquire) {
                    return Err(SessionError::Destroyed);
                }
                if let Some(event) = self.dispatch(&frame)? {
                    if events.send(event).await.is_err() {
                        // Nobody is listening any more.
                        return Ok(());
                    }
                }
            }
            if reader.read_buf(buf).await? == 0 {
                self.decoder.finish(buf)?;
                return Ok(());
            }
        }
    }

    /// Handle one frame. `Err` is fatal, `Ok(None)` means nothing to report.
    fn dispatch(&self, frame: &[u8]) -> Result<Option<Event<P::Message>>, SessionError> {
        let opened;
        let payload = match self.profile.cipher() {
            Some(cipher) => {
                opened = cipher.decrypt(frame).map_err(|_| SessionError::Decryption)?;
                &opened[..]
            }
            None => frame,
        };
        let TaggedMessage { tag, body } = TaggedMessage::decode(payload)?;
        if tag != HANDSHAKE_TAG && !P::is_known(tag) {
            return Err(SessionError::UnknownTag(tag));
        }
        let body = Value::Object(body);

        if tag == HANDSHAKE_TAG {
            return self.handshake(&body);
        }
        if !self.shared.received_handshake.load(Ordering::Acquire) {
            return Err(SessionError::MessageBeforeHandshake(tag));
        }
        match self.profile.accept(tag, &body) {
            Ok(message) => {
                debug!(profile = P::NAME, tag, "received message");
                Ok(Some(Event::Message(message)))
            }
            Err(rejection) => {
                warn!(profile = P::NAME, tag, %rejection, "rejected message");
                Ok(Some(Event::Invalid { tag, rejection }))
            }
        }
    }

    fn handshake(&self, body: &Value) -> Result<Option<Event<P::Message>>, SessionError> {
        if self.shared.received_handshake.load(Ordering::Acquire) {
            debug!(profile = P::NAME, "ignoring repeated handshake");
            return Ok(None);
        }
        let handshake = match Handshake::parse(body) {
            Ok(handshake) => handshake,
            Err(e) => {
                warn!(profile = P::NAME, error = %e, "invalid handshake");
                return Ok(Some(Event::Invalid {
                    tag: HANDSHAKE_TAG,
                    rejection: e.into(),
                }));
            }
        };
        if handshake.version != P::VERSION {
            return Err(SessionError::IncompatibleVersion {
                expected: P::VERSION,
                received: handshake.version,
            });
        }
        self.shared.received_handshake.store(true, Ordering::Release);
        debug!(profile = P::NAME, version = handshake.version, "received handshake");
        Ok(Some(Event::Handshake(handshake)))
    }
}
