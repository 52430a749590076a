//! Discord Rich Presence over the local IPC socket.
//!
//! Wire format: every frame is a little-endian `u32` opcode, a
//! little-endian `u32` body length, then a JSON body. The client sends a
//! handshake (opcode 0) and then `SET_ACTIVITY` commands (opcode 1), each
//! answered by one response frame carrying the same nonce.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};
use uuid::Uuid;

use super::channel::{ChannelError, PresenceChannel};
use super::payload::PresencePayload;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Bodies larger than this are treated as a corrupt stream.
const MAX_FRAME_LEN: u32 = 64 * 1024;

/// Any bidirectional byte stream: a Unix socket, a named pipe, or a test duplex.
pub trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IpcStream for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Handshake,
    Frame,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    fn code(self) -> u32 {
        match self {
            Self::Handshake => 0,
            Self::Frame => 1,
            Self::Close => 2,
            Self::Ping => 3,
            Self::Pong => 4,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Handshake),
            1 => Some(Self::Frame),
            2 => Some(Self::Close),
            3 => Some(Self::Ping),
            4 => Some(Self::Pong),
            _ => None,
        }
    }
}

// =============================================================================
// Framing
// =============================================================================

fn io_error(e: std::io::Error) -> ChannelError {
    use std::io::ErrorKind::*;
    match e.kind() {
        BrokenPipe | ConnectionReset | ConnectionAborted | NotConnected | UnexpectedEof => {
            ChannelError::Closed(e.to_string())
        }
        _ => ChannelError::Io(e),
    }
}

pub async fn write_frame<S: AsyncWrite + Unpin + ?Sized>(
    stream: &mut S,
    opcode: Opcode,
    body: &Value,
) -> Result<(), ChannelError> {
    let body = serde_json::to_vec(body).map_err(|e| ChannelError::Protocol(e.to_string()))?;
    let len = u32::try_from(body.len())
        .map_err(|_| ChannelError::Protocol("frame too large".to_string()))?;

    let mut frame = Vec::with_capacity(8 + body.len());
    frame.extend_from_slice(&opcode.code().to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&body);

    stream.write_all(&frame).await.map_err(io_error)?;
    stream.flush().await.map_err(io_error)
}

pub async fn read_frame<S: AsyncRead + Unpin + ?Sized>(
    stream: &mut S,
) -> Result<(Opcode, Value), ChannelError> {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).await.map_err(io_error)?;

    let code = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let opcode = Opcode::from_code(code)
        .ok_or_else(|| ChannelError::Protocol(format!("unknown opcode {code}")))?;
    if len > MAX_FRAME_LEN {
        return Err(ChannelError::Protocol(format!("frame length {len} too large")));
    }

    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await.map_err(io_error)?;

    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| ChannelError::Protocol(e.to_string()))?
    };
    Ok((opcode, value))
}

/// Activity object for `SET_ACTIVITY`.
pub fn activity_json(payload: &PresencePayload) -> Value {
    let mut activity = json!({
        "details": payload.details,
        "state": payload.state,
    });

    let mut assets = serde_json::Map::new();
    if let Some(large) = &payload.large {
        assets.insert("large_image".into(), json!(large.image));
        assets.insert("large_text".into(), json!(large.text));
    }
    if let Some(small) = &payload.small {
        assets.insert("small_image".into(), json!(small.image));
        assets.insert("small_text".into(), json!(small.text));
    }
    if !assets.is_empty() {
        activity["assets"] = Value::Object(assets);
    }

    activity
}

fn close_reason(body: &Value) -> String {
    body.get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("closed by peer")
        .to_string()
}

async fn handshake<S: IpcStream + ?Sized>(stream: &mut S, client_id: &str) -> Result<(), ChannelError> {
    write_frame(stream, Opcode::Handshake, &json!({"v": 1, "client_id": client_id})).await?;

    let (opcode, body) = tokio::time::timeout(RESPONSE_TIMEOUT, read_frame(stream))
        .await
        .map_err(|_| ChannelError::Protocol("handshake timed out".to_string()))??;

    match opcode {
        Opcode::Close => Err(ChannelError::Closed(close_reason(&body))),
        Opcode::Frame if body.get("evt").and_then(|e| e.as_str()) == Some("READY") => Ok(()),
        _ => Err(ChannelError::Protocol(format!("unexpected handshake reply: {body}"))),
    }
}

/// Read frames until the response carrying `nonce` arrives, answering pings.
async fn await_reply(stream: &mut dyn IpcStream, nonce: &str) -> Result<Value, ChannelError> {
    loop {
        let (opcode, body) = read_frame(stream).await?;
        match opcode {
            Opcode::Close => return Err(ChannelError::Closed(close_reason(&body))),
            Opcode::Ping => write_frame(stream, Opcode::Pong, &body).await?,
            Opcode::Frame if body.get("nonce").and_then(|n| n.as_str()) == Some(nonce) => {
                return Ok(body);
            }
            _ => debug!(?opcode, "Skipping unrelated IPC frame"),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Discord IPC presence client.
pub struct DiscordIpc {
    client_id: String,
    stream: Option<Box<dyn IpcStream>>,
}

impl DiscordIpc {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            stream: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Handshake over an already-open stream and keep it.
    pub async fn attach(&mut self, mut stream: Box<dyn IpcStream>) -> Result<(), ChannelError> {
        self.stream = None;
        handshake(stream.as_mut(), &self.client_id).await?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Send one activity update. Any failure other than a rejected command
    /// leaves the stream out of frame, so it is dropped and reported closed.
    async fn set_activity(&mut self, activity: Value) -> Result<(), ChannelError> {
        match self.send_command(activity).await {
            Ok(()) => Ok(()),
            Err(e @ ChannelError::Rejected(_)) => Err(e),
            Err(e) => {
                self.stream = None;
                if e.is_closed() {
                    Err(e)
                } else {
                    debug!(error = %e, "Dropping desynchronized IPC stream");
                    Err(ChannelError::Closed(e.to_string()))
                }
            }
        }
    }

    async fn send_command(&mut self, activity: Value) -> Result<(), ChannelError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ChannelError::Closed("not connected".to_string()))?;

        let nonce = Uuid::new_v4().to_string();
        let command = json!({
            "cmd": "SET_ACTIVITY",
            "args": {"pid": std::process::id(), "activity": activity},
            "nonce": nonce,
        });
        write_frame(stream.as_mut(), Opcode::Frame, &command).await?;

        let body = tokio::time::timeout(RESPONSE_TIMEOUT, await_reply(stream.as_mut(), &nonce))
            .await
            .map_err(|_| ChannelError::Closed("response timed out".to_string()))??;

        if body.get("evt").and_then(|e| e.as_str()) == Some("ERROR") {
            let message = body
                .pointer("/data/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(ChannelError::Rejected(message));
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceChannel for DiscordIpc {
    async fn connect(&mut self) -> Result<(), ChannelError> {
        let stream = open_socket().await?;
        self.attach(stream).await?;
        info!("Connected to Discord RPC");
        Ok(())
    }

    async fn push(&mut self, payload: &PresencePayload) -> Result<(), ChannelError> {
        self.set_activity(activity_json(payload)).await
    }

    async fn clear(&mut self) -> Result<(), ChannelError> {
        self.set_activity(Value::Null).await
    }
}

// =============================================================================
// Socket discovery
// =============================================================================

#[cfg(unix)]
fn candidate_dirs() -> Vec<std::path::PathBuf> {
    use std::path::PathBuf;

    let base = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .find_map(|key| std::env::var_os(key))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));

    vec![
        base.clone(),
        base.join("app/com.discordapp.Discord"),
        base.join("snap.discord"),
    ]
}

#[cfg(unix)]
async fn open_socket() -> Result<Box<dyn IpcStream>, ChannelError> {
    use tokio::net::UnixStream;

    for dir in candidate_dirs() {
        for i in 0..10 {
            let path = dir.join(format!("discord-ipc-{i}"));
            match UnixStream::connect(&path).await {
                Ok(stream) => {
                    debug!(path = %path.display(), "Opened Discord IPC socket");
                    return Ok(Box::new(stream));
                }
                Err(_) => continue,
            }
        }
    }
    Err(ChannelError::NotFound)
}

#[cfg(windows)]
async fn open_socket() -> Result<Box<dyn IpcStream>, ChannelError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    for i in 0..10 {
        let path = format!(r"\\?\pipe\discord-ipc-{i}");
        match ClientOptions::new().open(&path) {
            Ok(pipe) => {
                debug!(path = %path, "Opened Discord IPC pipe");
                return Ok(Box::new(pipe));
            }
            Err(_) => continue,
        }
    }
    Err(ChannelError::NotFound)
}

#[cfg(not(any(unix, windows)))]
async fn open_socket() -> Result<Box<dyn IpcStream>, ChannelError> {
    tracing::warn!("Discord IPC is not supported on this platform");
    Err(ChannelError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    /// Minimal Discord stand-in: answers the handshake, then tracks the
    /// currently displayed activity.
    async fn fake_discord(mut server: DuplexStream, commands: usize) -> Vec<Value> {
        let (opcode, body) = read_frame(&mut server).await.unwrap();
        assert_eq!(opcode, Opcode::Handshake);
        assert_eq!(body["client_id"], "1234");
        write_frame(&mut server, Opcode::Frame, &json!({"evt": "READY", "cmd": "DISPATCH"}))
            .await
            .unwrap();

        let mut shown = Vec::new();
        for _ in 0..commands {
            let (opcode, body) = read_frame(&mut server).await.unwrap();
            assert_eq!(opcode, Opcode::Frame);
            assert_eq!(body["cmd"], "SET_ACTIVITY");
            shown.push(body["args"]["activity"].clone());
            write_frame(
                &mut server,
                Opcode::Frame,
                &json!({"cmd": "SET_ACTIVITY", "evt": null, "nonce": body["nonce"]}),
            )
            .await
            .unwrap();
        }
        shown
    }

    fn payload() -> PresencePayload {
        PresencePayload::new("NYY 2 vs BOS 3", "Bottom 7th").with_large(
            "https://example.com/nyy.png".into(),
            "New York Yankees".into(),
        )
    }

    #[tokio::test]
    async fn test_frame_roundtrip_layout() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, Opcode::Ping, &json!({"x": 1})).await.unwrap();

        let mut header = [0u8; 8];
        b.read_exact(&mut header).await.unwrap();
        assert_eq!(&header[..4], &3u32.to_le_bytes());
        assert_eq!(&header[4..], &7u32.to_le_bytes());
    }

    #[tokio::test]
    async fn test_push_then_clear_leaves_nothing_shown() {
        let (client, server) = tokio::io::duplex(4096);
        let server = tokio::spawn(fake_discord(server, 2));

        let mut ipc = DiscordIpc::new("1234");
        ipc.attach(Box::new(client)).await.unwrap();
        ipc.push(&payload()).await.unwrap();
        ipc.clear().await.unwrap();

        let shown = server.await.unwrap();
        assert_eq!(shown[0]["details"], "NYY 2 vs BOS 3");
        assert_eq!(shown[0]["assets"]["large_text"], "New York Yankees");
        assert!(shown[0]["assets"].get("small_image").is_none());
        assert!(shown[1].is_null());
    }

    #[tokio::test]
    async fn test_peer_hangup_is_closed() {
        let (client, server) = tokio::io::duplex(4096);
        let server = tokio::spawn(fake_discord(server, 0));

        let mut ipc = DiscordIpc::new("1234");
        ipc.attach(Box::new(client)).await.unwrap();
        server.await.unwrap();

        let err = ipc.push(&payload()).await.unwrap_err();
        assert!(err.is_closed());
        assert!(!ipc.is_connected());
    }

    #[tokio::test]
    async fn test_handshake_close_is_reported() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = read_frame(&mut server).await;
            let _ = write_frame(
                &mut server,
                Opcode::Close,
                &json!({"code": 4000, "message": "Invalid Client ID"}),
            )
            .await;
        });

        let mut ipc = DiscordIpc::new("1234");
        let err = ipc.attach(Box::new(client)).await.unwrap_err();
        assert!(matches!(err, ChannelError::Closed(ref m) if m == "Invalid Client ID"));
    }

    #[tokio::test]
    async fn test_error_event_is_rejected() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = read_frame(&mut server).await;
            let _ = write_frame(&mut server, Opcode::Frame, &json!({"evt": "READY"})).await;
            let (_, body) = read_frame(&mut server).await.unwrap();
            let _ = write_frame(
                &mut server,
                Opcode::Frame,
                &json!({"evt": "ERROR", "nonce": body["nonce"], "data": {"message": "bad asset"}}),
            )
            .await;
            // Keep the pipe open until the client is done.
            let _ = read_frame(&mut server).await;
        });

        let mut ipc = DiscordIpc::new("1234");
        ipc.attach(Box::new(client)).await.unwrap();
        let err = ipc.push(&payload()).await.unwrap_err();
        assert!(matches!(err, ChannelError::Rejected(ref m) if m == "bad asset"));
        assert!(ipc.is_connected());
    }

    #[tokio::test]
    async fn test_oversized_reply_drops_stream() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = read_frame(&mut server).await;
            let _ = write_frame(&mut server, Opcode::Frame, &json!({"evt": "READY"})).await;
            let _ = read_frame(&mut server).await;

            let mut header = Vec::new();
            header.extend_from_slice(&1u32.to_le_bytes());
            header.extend_from_slice(&(MAX_FRAME_LEN + 1).to_le_bytes());
            let _ = server.write_all(&header).await;
            // Hold the pipe open so only the framing is broken.
            let _ = read_frame(&mut server).await;
        });

        let mut ipc = DiscordIpc::new("1234");
        ipc.attach(Box::new(client)).await.unwrap();

        let err = ipc.push(&payload()).await.unwrap_err();
        assert!(err.is_closed());
        assert!(!ipc.is_connected());

        let err = ipc.push(&payload()).await.unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_clear_while_disconnected_is_closed() {
        let mut ipc = DiscordIpc::new("1234");
        let err = ipc.clear().await.unwrap_err();
        assert!(err.is_closed());
    }
}
