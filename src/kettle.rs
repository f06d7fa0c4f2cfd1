use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use crate::error::{InteractionError, ProtocolError};
use crate::handlers::{CommandSequence, FrameCodec};
use crate::hw::{DeviceLink, FoundDevice};
use crate::notification::{FirmwareVersion, KettleStatus, NotificationHandler, NotifyEvent};
use crate::protocol::{Method, Mode};

/// Shared secret most kettles ship with before an owner pairs a phone app.
pub const DEFAULT_ACCESS_KEY: [u8; 8] = [0xFF; 8];

/// Default bound on how long one command waits for its reply notification.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

const ACCESS_KEY_LEN: usize = 8;

/// The 8-byte shared secret sent in the AUTH payload.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AccessKey([u8; ACCESS_KEY_LEN]);

impl AccessKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub fn new(bytes: [u8; ACCESS_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Key bytes as sent on the wire.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ACCESS_KEY_LEN] {
        &self.0
    }
}

impl Default for AccessKey {
    fn default() -> Self {
        Self(DEFAULT_ACCESS_KEY)
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Errors returned when parsing an access key from hex text.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AccessKeyError {
    /// The text does not encode exactly 8 bytes.
    #[error("access key must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    /// The text is not valid hexadecimal.
    #[error("access key is not valid hex")]
    InvalidHex(#[from] hex::FromHexError),
}

impl FromStr for AccessKey {
    type Err = AccessKeyError;

    /// Parses 16 hex characters into a key.
    ///
    /// ```
    /// use g200s::AccessKey;
    ///
    /// let key: AccessKey = "ffffffffffffffff".parse()?;
    /// assert_eq!(AccessKey::default(), key);
    /// # Ok::<(), g200s::AccessKeyError>(())
    /// ```
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.len() != ACCESS_KEY_LEN * 2 {
            return Err(AccessKeyError::InvalidLength {
                expected: ACCESS_KEY_LEN * 2,
                actual: value.len(),
            });
        }
        let mut bytes = [0x00; ACCESS_KEY_LEN];
        hex::decode_to_slice(value, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// Session configuration fixed at construction.
///
/// ```
/// use g200s::KettleConfig;
///
/// let config = KettleConfig::builder()
///     .address("E7:6C:1D:02:0A:F0")
///     .build();
/// assert_eq!("E7:6C:1D:02:0A:F0", config.address());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct KettleConfig {
    #[builder(into)]
    address: String,
    #[builder(default)]
    key: AccessKey,
    #[builder(default = DEFAULT_NOTIFY_TIMEOUT)]
    notify_timeout: Duration,
}

impl KettleConfig {
    /// Link-layer address of the kettle.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Shared secret key for the AUTH exchange.
    #[must_use]
    pub fn key(&self) -> AccessKey {
        self.key
    }

    /// Bound on how long one command waits for its reply.
    #[must_use]
    pub fn notify_timeout(&self) -> Duration {
        self.notify_timeout
    }
}

/// Errors returned by kettle control operations.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum CommandError {
    /// A gated command was attempted before the AUTH exchange succeeded.
    #[error("authentication required before `{method}` can be sent")]
    AuthenticationRequired { method: Method },
    /// The device refused the mode change, usually because a programme is
    /// still running.
    #[error("device rejected the mode change; stop the running programme first")]
    SetModeRejected { frame: Vec<u8> },
    /// The device refused to start the configured programme.
    #[error("device refused to start the configured programme")]
    RunRejected { frame: Vec<u8> },
    /// The device refused to stop.
    #[error("device refused to stop; no programme may be running")]
    StopRejected { frame: Vec<u8> },
    /// No reply notification arrived inside the session's wait window.
    #[error("no `{method}` reply within {waited:?}")]
    NotifyTimeout { method: Method, waited: Duration },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// One authenticated conversation with one kettle.
///
/// Commands are strictly one-in-flight: replies carry no usable correlation
/// identifier, so call order is the correlator. Every operation takes
/// `&mut self`, which lets the borrow checker enforce that serialisation.
/// State observed from the device is handed out as copies; refreshing it
/// requires an explicit [`Kettle::refresh_status`] call.
#[derive(Debug)]
pub struct Kettle {
    link: Box<dyn DeviceLink>,
    key: AccessKey,
    notify_timeout: Duration,
    sequence: CommandSequence,
    auth_state: AuthState,
    version: Option<FirmwareVersion>,
    status: Option<KettleStatus>,
}

impl Kettle {
    /// Establishes a session over a freshly connected link.
    ///
    /// Runs the construction handshake in order: AUTH, VERSION, GET_MODE.
    /// A key the device does not accept leaves the session gate closed, so
    /// the version query fails with
    /// [`CommandError::AuthenticationRequired`].
    ///
    /// # Errors
    ///
    /// Returns an error when any handshake step fails: transport write
    /// failures, reply timeouts, undecodable replies, or a rejected key.
    #[instrument(skip(link, config), level = "info", fields(address = %config.address()))]
    pub async fn establish(
        link: Box<dyn DeviceLink>,
        config: &KettleConfig,
    ) -> Result<Self, ProtocolError> {
        let mut kettle = Self {
            link,
            key: config.key(),
            notify_timeout: config.notify_timeout(),
            sequence: CommandSequence::new(),
            auth_state: AuthState::Unauthenticated,
            version: None,
            status: None,
        };

        let accepted = kettle.authenticate().await?;
        debug!(accepted, "authentication exchange finished");
        kettle.query_version().await?;
        kettle.refresh_status().await?;

        Ok(kettle)
    }

    /// Sends AUTH with the session key and reports whether the device
    /// accepted it.
    ///
    /// A refused key is an expected outcome, not an error: the session stays
    /// unauthenticated and every gated command keeps failing until a later
    /// attempt succeeds. Does not retry.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport write fails, the reply times out,
    /// or the reply cannot be decoded.
    #[instrument(skip(self), level = "info")]
    pub async fn authenticate(&mut self) -> Result<bool, ProtocolError> {
        self.auth_state = AuthState::Authenticating;
        let key = self.key;
        let outcome = self
            .exchange(Method::Auth, key.as_bytes(), |event| match event {
                NotifyEvent::Auth { accepted } => Some(*accepted),
                _ => None,
            })
            .await;

        match outcome {
            // The reply itself moved the state to Authenticated or back to
            // Unauthenticated when it was applied.
            Ok(accepted) => Ok(accepted),
            Err(error) => {
                self.auth_state = AuthState::Unauthenticated;
                Err(error)
            }
        }
    }

    /// Queries the firmware version and stores it on the session.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is unauthenticated or the exchange
    /// fails.
    #[instrument(skip(self), level = "info")]
    pub async fn query_version(&mut self) -> Result<FirmwareVersion, ProtocolError> {
        self.exchange(Method::Version, &[], |event| match event {
            NotifyEvent::Version(version) => Some(*version),
            _ => None,
        })
        .await
    }

    /// Queries the device status and returns a fresh snapshot copy.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is unauthenticated or the exchange
    /// fails.
    #[instrument(skip(self), level = "info")]
    pub async fn refresh_status(&mut self) -> Result<KettleStatus, ProtocolError> {
        self.exchange(Method::GetMode, &[], |event| match event {
            NotifyEvent::Status(status) => Some(*status),
            _ => None,
        })
        .await
    }

    /// Starts the currently configured programme, then refreshes status.
    ///
    /// # Errors
    ///
    /// Returns an error when the device refuses to start
    /// ([`CommandError::RunRejected`]) or either exchange fails.
    #[instrument(skip(self), level = "info")]
    pub async fn run(&mut self) -> Result<KettleStatus, ProtocolError> {
        self.send_run().await?;
        self.refresh_status().await
    }

    /// Stops the running programme, then refreshes status.
    ///
    /// # Errors
    ///
    /// Returns an error when the device refuses to stop
    /// ([`CommandError::StopRejected`]) or either exchange fails.
    #[instrument(skip(self), level = "info")]
    pub async fn stop(&mut self) -> Result<KettleStatus, ProtocolError> {
        self.send_stop().await?;
        self.refresh_status().await
    }

    /// Switches the kettle to the boiling programme.
    ///
    /// # Errors
    ///
    /// Returns an error when any step of the stop, configure, run sequence
    /// fails.
    #[instrument(skip(self), level = "info")]
    pub async fn set_boiling(&mut self) -> Result<KettleStatus, ProtocolError> {
        self.apply_mode(Mode::Boiling, 0).await
    }

    /// Switches the kettle to heating towards `target_temperature`.
    ///
    /// # Errors
    ///
    /// Returns an error when any step of the stop, configure, run sequence
    /// fails.
    #[instrument(skip(self), level = "info")]
    pub async fn set_heating(&mut self, target_temperature: u8) -> Result<KettleStatus, ProtocolError> {
        self.apply_mode(Mode::Heat, target_temperature).await
    }

    /// Switches the kettle to the backlight lamp programme.
    ///
    /// # Errors
    ///
    /// Returns an error when any step of the stop, configure, run sequence
    /// fails.
    #[instrument(skip(self), level = "info")]
    pub async fn set_lamp(&mut self) -> Result<KettleStatus, ProtocolError> {
        self.apply_mode(Mode::Lamp, 0).await
    }

    /// Whether the AUTH exchange has succeeded on this session.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth_state == AuthState::Authenticated
    }

    /// Firmware version reported during the session handshake.
    #[must_use]
    pub fn version(&self) -> Option<FirmwareVersion> {
        self.version
    }

    /// Copy of the last-observed device status, if any reply arrived yet.
    ///
    /// Snapshots go stale silently; call [`Kettle::refresh_status`] for
    /// current data.
    #[must_use]
    pub fn status(&self) -> Option<KettleStatus> {
        self.status
    }

    /// Identity of the connected peripheral.
    #[must_use]
    pub fn device(&self) -> &FoundDevice {
        self.link.device()
    }

    /// Tears down the underlying link.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport fails to disconnect cleanly.
    pub async fn close(self) -> Result<(), InteractionError> {
        self.link.close().await
    }

    /// The stop → configure → run sequence every mode change follows, with
    /// one trailing refresh confirming the final state. The intermediate
    /// steps deliberately skip refreshing: the device must simply be stopped
    /// before SET_MODE and restarted after.
    async fn apply_mode(
        &mut self,
        mode: Mode,
        target_temperature: u8,
    ) -> Result<KettleStatus, ProtocolError> {
        self.send_stop().await?;
        let payload = FrameCodec::set_mode_payload(mode, target_temperature);
        self.exchange(Method::SetMode, &payload, |event| match event {
            NotifyEvent::SetModeAck(_) => Some(()),
            _ => None,
        })
        .await?;
        self.send_run().await?;
        self.refresh_status().await
    }

    async fn send_run(&mut self) -> Result<(), ProtocolError> {
        self.exchange(Method::Run, &[], |event| match event {
            NotifyEvent::RunAck(_) => Some(()),
            _ => None,
        })
        .await
    }

    async fn send_stop(&mut self) -> Result<(), ProtocolError> {
        self.exchange(Method::Stop, &[], |event| match event {
            NotifyEvent::StopAck(_) => Some(()),
            _ => None,
        })
        .await
    }

    /// One full command exchange: gate, encode, write, await the reply that
    /// answers `method`, apply it, and extract the picked value.
    ///
    /// Replies answering other methods (late arrivals from an earlier
    /// window) are applied to session state and skipped; the deadline keeps
    /// running.
    #[instrument(
        skip(self, payload, pick),
        level = "debug",
        fields(method = %method, payload_len = payload.len())
    )]
    async fn exchange<T>(
        &mut self,
        method: Method,
        payload: &[u8],
        pick: impl Fn(&NotifyEvent) -> Option<T>,
    ) -> Result<T, ProtocolError> {
        if method != Method::Auth && !self.is_authenticated() {
            return Err(CommandError::AuthenticationRequired { method }.into());
        }

        let sequence = self.sequence.next();
        let frame = FrameCodec::encode(sequence, method, payload);
        trace!(sequence, frame = %hex::encode(&frame), "writing command frame");
        self.link.write_command(&frame).await?;

        let deadline = Instant::now() + self.notify_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CommandError::NotifyTimeout {
                    method,
                    waited: self.notify_timeout,
                }
                .into());
            }

            let Some(bytes) = self.link.await_notification(remaining).await? else {
                return Err(CommandError::NotifyTimeout {
                    method,
                    waited: self.notify_timeout,
                }
                .into());
            };

            let event = NotificationHandler::decode(&bytes)?;
            let event = self.apply(event)?;
            if let Some(value) = pick(&event) {
                return Ok(value);
            }
            debug!(reply = %event.method(), "skipping reply for a different method");
        }
    }

    /// Applies one decoded event to session state, converting rejected
    /// acknowledgements into their command errors.
    fn apply(&mut self, event: NotifyEvent) -> Result<NotifyEvent, CommandError> {
        match event {
            NotifyEvent::Auth { accepted } => {
                self.auth_state = if accepted {
                    AuthState::Authenticated
                } else {
                    AuthState::Unauthenticated
                };
                Ok(NotifyEvent::Auth { accepted })
            }
            NotifyEvent::Version(version) => {
                self.version = Some(version);
                Ok(NotifyEvent::Version(version))
            }
            NotifyEvent::Status(status) => {
                self.status = Some(status);
                Ok(NotifyEvent::Status(status))
            }
            NotifyEvent::SetModeAck(ack) => {
                if ack.accepted() {
                    Ok(NotifyEvent::SetModeAck(ack))
                } else {
                    Err(CommandError::SetModeRejected {
                        frame: ack.into_frame(),
                    })
                }
            }
            NotifyEvent::RunAck(ack) => {
                if ack.accepted() {
                    Ok(NotifyEvent::RunAck(ack))
                } else {
                    Err(CommandError::RunRejected {
                        frame: ack.into_frame(),
                    })
                }
            }
            NotifyEvent::StopAck(ack) => {
                if ack.accepted() {
                    Ok(NotifyEvent::StopAck(ack))
                } else {
                    Err(CommandError::StopRejected {
                        frame: ack.into_frame(),
                    })
                }
            }
        }
    }
}
