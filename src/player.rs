use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader},
  net::UnixStream,
  process::{Child as TokioChild, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, VideoRecord};

/// What the player needs to load one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
  pub id: u64,
  pub title: String,
  pub description: String,
  pub video_url: String,
  pub poster_url: String,
}

impl MediaSource {
  pub fn from_record(api: &ApiClient, record: &VideoRecord) -> Self {
    Self {
      id: record.id,
      title: record.city.clone(),
      description: record.description.clone(),
      video_url: api.absolute_url(&record.video.url),
      poster_url: api.absolute_url(&record.poster.url),
    }
  }
}

/// Outcome of waiting for the media to become playable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
  Ready,
  TimedOut,
  Failed(String),
}

#[derive(Default)]
pub struct VideoPlayer {
  pub(crate) current_process: Option<TokioChild>,
  pub current: Option<MediaSource>,
  /// Poster of the current video, keyed by record id.
  pub poster: Option<(u64, DynamicImage)>,
  mpv_monitor_handle: Option<JoinHandle<()>>,
  mpv_status_rx: Option<mpsc::Receiver<String>>,
  last_mpv_status: Option<String>,
  ipc_socket_path: Option<String>,
  pub paused: bool,
}

impl VideoPlayer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_playing(&self) -> bool {
    self.current_process.is_some()
  }

  pub fn check_mpv_status(&mut self) {
    if let Some(rx) = &mut self.mpv_status_rx {
      while let Ok(status) = rx.try_recv() {
        self.last_mpv_status = Some(status);
      }
    }
  }

  pub fn last_mpv_status(&self) -> Option<&str> {
    self.last_mpv_status.as_deref()
  }

  /// Replace whatever is playing with `source`.
  pub async fn play(&mut self, source: MediaSource) -> Result<()> {
    self.stop().await.context("Failed to stop previous playback")?;
    self.paused = false;

    let socket_path = std::env::temp_dir().join(format!("vista-mpv-{}.sock", std::process::id()));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let mut cmd = Command::new("mpv");
    cmd.args([
      "--force-window=immediate",
      "--keep-open=yes",
      &format!("--title={}", source.title),
      "--term-status-msg=Time: ${time-pos/full} / ${duration/full} | ${pause} ${percent-pos}%",
      &format!("--input-ipc-server={}", socket_path_str),
      "--",
      &source.video_url,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    // stderr is never drained, so it must not be piped.
    cmd.stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    let stdout = child.stdout.take().context("Failed to get mpv stdout")?;
    let (tx, rx) = mpsc::channel::<String>(10);
    self.mpv_status_rx = Some(rx);

    let monitor_handle = tokio::spawn(async move {
      let reader = TokioBufReader::new(stdout);
      let mut lines = reader.lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
          break;
        }
      }
    });

    info!(id = source.id, url = %source.video_url, "player set up");
    self.current = Some(source);
    self.current_process = Some(child);
    self.mpv_monitor_handle = Some(monitor_handle);
    self.ipc_socket_path = Some(socket_path_str);
    Ok(())
  }

  /// An owned future that resolves once mpv has buffered enough to play,
  /// or when `limit` elapses.
  pub fn ready_waiter(&self, limit: Duration) -> impl Future<Output = Readiness> + Send + 'static {
    let socket_path = self.ipc_socket_path.clone();
    async move {
      let Some(path) = socket_path else {
        return Readiness::Failed("nothing is playing".to_string());
      };
      wait_until_ready(&path, limit).await
    }
  }

  pub async fn toggle_pause(&mut self) -> Result<()> {
    let Some(ref socket_path) = self.ipc_socket_path else {
      return Ok(());
    };
    let mut stream = UnixStream::connect(socket_path).await.context("Failed to connect to mpv IPC socket")?;
    stream.write_all(b"{\"command\":[\"cycle\",\"pause\"]}\n").await.context("Failed to send pause command to mpv")?;
    self.paused = !self.paused;
    Ok(())
  }

  pub async fn stop(&mut self) -> Result<()> {
    if let Some(handle) = self.mpv_monitor_handle.take() {
      handle.abort();
      let _ = handle.await;
    }
    self.mpv_status_rx = None;
    self.last_mpv_status = None;

    if let Some(mut child) = self.current_process.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
    }

    self.current = None;
    self.paused = false;

    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
    Ok(())
  }
}

// --- Readiness over mpv IPC ---

/// Interpret one line of mpv IPC output.
///
/// `playback-restart` means the demuxer has enough data to play; a successful
/// reply to our `playback-time` probe means that already happened before we
/// connected. `end-file` with `reason: error` means loading failed.
pub fn classify_ipc_line(line: &str) -> Option<Readiness> {
  let val: serde_json::Value = serde_json::from_str(line).ok()?;
  match val.get("event").and_then(|v| v.as_str()) {
    Some("playback-restart") => return Some(Readiness::Ready),
    Some("end-file") if val.get("reason").and_then(|v| v.as_str()) == Some("error") => {
      let msg = val.get("file_error").and_then(|v| v.as_str()).unwrap_or("playback error");
      return Some(Readiness::Failed(msg.to_string()));
    }
    _ => {}
  }
  if val.get("request_id").and_then(|v| v.as_i64()) == Some(1)
    && val.get("error").and_then(|v| v.as_str()) == Some("success")
    && val.get("data").is_some_and(|d| d.is_number())
  {
    return Some(Readiness::Ready);
  }
  None
}

async fn wait_until_ready(socket_path: &str, limit: Duration) -> Readiness {
  match tokio::time::timeout(limit, watch_socket(socket_path)).await {
    Ok(readiness) => readiness,
    Err(_) => {
      warn!(timeout_ms = limit.as_millis() as u64, "media ready wait timed out");
      Readiness::TimedOut
    }
  }
}

async fn watch_socket(socket_path: &str) -> Readiness {
  // mpv creates the socket shortly after spawning; poll until it appears.
  let mut stream = loop {
    match UnixStream::connect(socket_path).await {
      Ok(stream) => break stream,
      Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
    }
  };

  let probe = b"{\"command\":[\"get_property\",\"playback-time\"],\"request_id\":1}\n";
  if let Err(e) = stream.write_all(probe).await {
    return Readiness::Failed(format!("mpv IPC write failed: {}", e));
  }

  let mut lines = TokioBufReader::new(stream).lines();
  loop {
    match lines.next_line().await {
      Ok(Some(line)) => {
        if let Some(readiness) = classify_ipc_line(&line) {
          debug!(?readiness, "mpv readiness");
          return readiness;
        }
      }
      Ok(None) => return Readiness::Failed("mpv closed the IPC socket".to_string()),
      Err(e) => return Readiness::Failed(format!("mpv IPC read failed: {}", e)),
    }
  }
}
