//! Connection manager driving the lifecycle machine over a real socket.
//!
//! A single driver task owns the socket, the pending dial and the pending
//! timer, so lifecycle transitions are serialized without locks. The
//! public handle talks to it through a command channel and reads the
//! current state from a watch channel.

use std::future::{Future, pending};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::SplitStream;
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use hisho_protocol::OutboundMessage;
use hisho_protocol::constants::MAX_FRAME_SIZE;

use crate::ConnectionError;
use crate::endpoint::Endpoint;
use crate::machine::{Action, Input, Machine, Timer};
use crate::pumps::read::{ReadOutcome, classify};
use crate::pumps::write::write_pump;
use crate::types::{ConnectionConfig, ConnectionEvent, ConnectionState};

const EVENT_BUFFER: usize = 256;
const SHUTDOWN_WAIT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Dial = Pin<Box<dyn Future<Output = Result<WsStream, ConnectionError>> + Send>>;
type Writer = Arc<std::sync::Mutex<Option<mpsc::Sender<tungstenite::Message>>>>;

enum Command {
    Start,
    Connect,
    Shutdown,
}

/// Handle to the backend connection.
///
/// Must be created inside a Tokio runtime. Dropping the handle stops the
/// driver and closes the socket.
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    events_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
    state_rx: watch::Receiver<ConnectionState>,
    writer: Writer,
    driver: JoinHandle<()>,
}

impl ConnectionManager {
    pub fn new(endpoint: Endpoint, config: ConnectionConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let writer: Writer = Arc::new(std::sync::Mutex::new(None));

        let driver = Driver {
            send_buffer: config.send_buffer,
            machine: Machine::new(endpoint, config, Instant::now()),
            commands: commands_rx,
            events_tx,
            state_tx,
            writer: writer.clone(),
            timer: None,
            dialing: None,
            socket: None,
        };

        Self {
            commands: commands_tx,
            events_rx: Mutex::new(Some(events_rx)),
            state_rx,
            writer,
            driver: tokio::spawn(driver.run()),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Schedules the first connection attempt after the startup delay.
    pub fn start(&self) {
        self.command(Command::Start);
    }

    /// Starts a connection attempt now, replacing any pending attempt.
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Queues a message on the open socket.
    ///
    /// Returns `false` when no socket is open or the queue is full.
    pub fn send(&self, msg: &OutboundMessage) -> bool {
        match send_frame(&self.writer, msg) {
            Ok(()) => true,
            Err(e) => {
                debug!(kind = msg.label(), "message not sent: {e}");
                false
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Cancels pending timers and closes the socket. No reconnect follows.
    pub async fn shutdown(&self) {
        self.command(Command::Shutdown);
        let mut state = self.state_rx.clone();
        match tokio::time::timeout(
            SHUTDOWN_WAIT,
            state.wait_for(|s| *s == ConnectionState::Closed),
        )
        .await
        {
            Ok(_) => debug!("connection closed"),
            Err(_) => warn!("timed out waiting for connection to close"),
        }
    }

    fn command(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            warn!("connection driver is not running");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

fn send_frame(writer: &Writer, msg: &OutboundMessage) -> Result<(), ConnectionError> {
    let json = serde_json::to_string(msg)?;
    let guard = writer.lock().map_err(|_| ConnectionError::NotOpen)?;
    let tx = guard.as_ref().ok_or(ConnectionError::NotOpen)?;
    tx.try_send(tungstenite::Message::Text(json.into()))
        .map_err(|e| match e {
            TrySendError::Full(_) => ConnectionError::Backpressure,
            TrySendError::Closed(_) => ConnectionError::NotOpen,
        })
}

/// Transport read limit. A message over it is a socket error, so it sits well
/// above `MAX_FRAME_SIZE`, which `classify` enforces one frame at a time.
const TRANSPORT_LIMIT: usize = 16 * MAX_FRAME_SIZE;

async fn open_socket(url: String) -> Result<WsStream, ConnectionError> {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(TRANSPORT_LIMIT);
    ws_config.max_frame_size = Some(TRANSPORT_LIMIT);
    let (stream, _) =
        tokio_tungstenite::connect_async_with_config(url.as_str(), Some(ws_config), false).await?;
    Ok(stream)
}

struct Socket {
    read: SplitStream<WsStream>,
    /// Stops the write pump, which then sends a close frame.
    cancel: CancellationToken,
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Wake {
    Command(Option<Command>),
    Timer(Timer),
    Dialed(Result<WsStream, ConnectionError>),
    Frame(Option<Result<tungstenite::Message, tungstenite::Error>>),
}

struct Driver {
    machine: Machine,
    send_buffer: usize,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::Sender<ConnectionEvent>,
    state_tx: watch::Sender<ConnectionState>,
    writer: Writer,
    timer: Option<(Timer, Pin<Box<Sleep>>)>,
    dialing: Option<Dial>,
    socket: Option<Socket>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                cmd = self.commands.recv() => Wake::Command(cmd),
                timer = fire(&mut self.timer) => Wake::Timer(timer),
                dialed = dial(&mut self.dialing) => Wake::Dialed(dialed),
                frame = next_frame(&mut self.socket) => Wake::Frame(frame),
            };

            let input = match wake {
                Wake::Command(None) => break,
                Wake::Command(Some(Command::Start)) => Input::Start,
                Wake::Command(Some(Command::Connect)) => Input::Connect,
                Wake::Command(Some(Command::Shutdown)) => Input::Shutdown,
                Wake::Timer(timer) => {
                    if timer == Timer::ConnectTimeout {
                        warn!(url = self.machine.endpoint().current(), "backend connection timed out");
                    }
                    Input::TimerFired(timer)
                }
                Wake::Dialed(Ok(stream)) => {
                    self.install(stream);
                    Input::Opened
                }
                Wake::Dialed(Err(e)) => {
                    warn!(url = self.machine.endpoint().current(), "backend connection failed: {e}");
                    Input::Errored(e.to_string())
                }
                Wake::Frame(frame) => match classify(frame) {
                    ReadOutcome::Text(text) => {
                        trace!(len = text.len(), "frame received");
                        self.emit(ConnectionEvent::Message(text));
                        continue;
                    }
                    ReadOutcome::Ping(data) => {
                        self.write_raw(tungstenite::Message::Pong(data));
                        continue;
                    }
                    ReadOutcome::Ignore => continue,
                    ReadOutcome::Closed(reason) => Input::Closed(reason),
                    ReadOutcome::Failed(e) => Input::Errored(e),
                },
            };

            self.step(input);
        }

        self.close_socket();
        debug!("connection driver stopped");
    }

    fn step(&mut self, input: Input) {
        let actions = self.machine.handle(input, Instant::now());
        self.state_tx.send_replace(self.machine.state());
        for action in actions {
            self.apply(action);
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Open(url) => {
                info!(url = %url, "connecting to backend");
                self.dialing = Some(Box::pin(open_socket(url)));
            }
            Action::Close => self.close_socket(),
            Action::Arm(timer, after) => {
                trace!(?timer, ?after, "timer armed");
                self.timer = Some((timer, Box::pin(tokio::time::sleep(after))));
            }
            Action::Disarm => self.timer = None,
            Action::Send(msg) => match send_frame(&self.writer, &msg) {
                Ok(()) => debug!(kind = msg.label(), "sent to backend"),
                Err(e) => warn!(kind = msg.label(), "failed to send: {e}"),
            },
            Action::Emit(event) => {
                if let ConnectionEvent::StatusChanged {
                    state,
                    attempt,
                    max_attempts,
                } = &event
                {
                    info!(%state, attempt, max_attempts, "connection status");
                }
                self.emit(event);
            }
        }
    }

    fn install(&mut self, stream: WsStream) {
        let (sink, read) = stream.split();
        let (tx, rx) = mpsc::channel(self.send_buffer);
        let cancel = CancellationToken::new();
        tokio::spawn(write_pump(sink, rx, cancel.clone()));
        if let Ok(mut writer) = self.writer.lock() {
            *writer = Some(tx);
        }
        self.socket = Some(Socket { read, cancel });
    }

    fn close_socket(&mut self) {
        self.dialing = None;
        if let Ok(mut writer) = self.writer.lock() {
            *writer = None;
        }
        self.socket = None;
    }

    fn write_raw(&self, frame: tungstenite::Message) {
        if let Ok(writer) = self.writer.lock()
            && let Some(tx) = writer.as_ref()
        {
            let _ = tx.try_send(frame);
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("event buffer full, dropping connection event"),
            Err(TrySendError::Closed(_)) => trace!("no event subscriber"),
        }
    }
}

async fn fire(timer: &mut Option<(Timer, Pin<Box<Sleep>>)>) -> Timer {
    let Some((kind, sleep)) = timer.as_mut() else {
        return pending().await;
    };
    sleep.as_mut().await;
    let kind = *kind;
    *timer = None;
    kind
}

async fn dial(dialing: &mut Option<Dial>) -> Result<WsStream, ConnectionError> {
    let Some(fut) = dialing.as_mut() else {
        return pending().await;
    };
    let result = fut.as_mut().await;
    *dialing = None;
    result
}

async fn next_frame(
    socket: &mut Option<Socket>,
) -> Option<Result<tungstenite::Message, tungstenite::Error>> {
    match socket.as_mut() {
        Some(socket) => socket.read.next().await,
        None => pending().await,
    }
}
