//! Screen recording, coverage capture and screen streaming shutdown, plus the
//! host-side reader for an external MJPEG screenshot stream.
//!
//! Each session owns its own capture instance, so the stream reader and the
//! newest frame never leak between sessions.

mod mjpeg;

pub use mjpeg::FrameBuffer;

use crate::bridge::DeviceBridge;
use crate::error::bridge::BridgeError;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use tokio::spawn as TokioSpawn;
use tokio::task::JoinHandle;
use url::Url;

type LatestFrame = Arc<Mutex<Option<Vec<u8>>>>;

#[async_trait]
pub trait MediaCapture: Send + Sync {
    async fn stop_screen_recording(&self, bridge: &dyn DeviceBridge) -> Result<(), BridgeError>;

    /// Stop coverage instrumentation, broadcasting `end_intent` first when set.
    async fn stop_coverage(
        &self,
        bridge: &dyn DeviceBridge,
        end_intent: Option<&str>,
    ) -> Result<(), BridgeError>;

    async fn stop_screen_streaming(&self, bridge: &dyn DeviceBridge) -> Result<(), BridgeError>;

    /// Start reading the MJPEG stream at `url` on the host, keeping only the
    /// newest frame. Replaces a reader that is already running.
    async fn start_stream_reader(&self, url: &str) -> Result<(), BridgeError>;

    /// The newest complete frame read from the stream, as JPEG bytes.
    fn latest_frame(&self) -> Option<Vec<u8>>;

    /// Abort the host task reading the media stream, if any.
    async fn stop_stream_reader(&self) -> Result<(), BridgeError>;
}

/// Stops on-device media processes through the device bridge and reads the
/// external stream over HTTP.
pub struct AdbMediaCapture {
    client: Client,
    stream_reader: Mutex<Option<JoinHandle<()>>>,
    latest_frame: LatestFrame,
}

impl AdbMediaCapture {
    /// `client` is shared across sessions; reader state is not.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            stream_reader: Mutex::new(None),
            latest_frame: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_reading(&self) -> bool {
        self.stream_reader
            .lock()
            .map(|reader| reader.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl MediaCapture for AdbMediaCapture {
    async fn stop_screen_recording(&self, bridge: &dyn DeviceBridge) -> Result<(), BridgeError> {
        bridge
            .shell(&["pkill", "-INT", "screenrecord", "||", "true"])
            .await?;
        Ok(())
    }

    async fn stop_coverage(
        &self,
        bridge: &dyn DeviceBridge,
        end_intent: Option<&str>,
    ) -> Result<(), BridgeError> {
        if let Some(intent) = end_intent {
            debug!("Broadcasting coverage end intent {intent}");
            bridge.broadcast(intent).await?;
        }
        bridge
            .shell(&["pkill", "-f", "'am instrument'", "||", "true"])
            .await?;
        Ok(())
    }

    async fn stop_screen_streaming(&self, bridge: &dyn DeviceBridge) -> Result<(), BridgeError> {
        bridge
            .shell(&["pkill", "-f", "'screenrecord --output-format=h264'", "||", "true"])
            .await?;
        Ok(())
    }

    async fn start_stream_reader(&self, url: &str) -> Result<(), BridgeError> {
        let url = Url::parse(url)
            .map_err(|e| BridgeError::parse(format!("Invalid media stream URL '{url}': {e}")))?;

        info!("Reading screenshots from media stream {url}");
        let reader = TokioSpawn(read_stream(
            self.client.clone(),
            url,
            Arc::clone(&self.latest_frame),
        ));

        match self.stream_reader.lock() {
            Ok(mut current) => {
                if let Some(previous) = current.replace(reader) {
                    previous.abort();
                }
            }
            Err(_) => reader.abort(),
        }
        Ok(())
    }

    fn latest_frame(&self) -> Option<Vec<u8>> {
        self.latest_frame.lock().ok().and_then(|frame| frame.clone())
    }

    async fn stop_stream_reader(&self) -> Result<(), BridgeError> {
        let reader = self
            .stream_reader
            .lock()
            .ok()
            .and_then(|mut reader| reader.take());

        if let Some(reader) = reader {
            reader.abort();
            debug!("Stopped media stream reader");
        }
        if let Ok(mut frame) = self.latest_frame.lock() {
            frame.take();
        }
        Ok(())
    }
}

async fn read_stream(client: Client, url: Url, latest_frame: LatestFrame) {
    let mut response = match client
        .get(url.clone())
        .send()
        .await
        .and_then(|response| response.error_for_status())
    {
        Ok(response) => response,
        Err(e) => {
            warn!("Media stream {url} is unavailable: {e}");
            return;
        }
    };

    let mut frames = FrameBuffer::default();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if let Some(frame) = frames.push(&chunk)
                    && let Ok(mut latest) = latest_frame.lock()
                {
                    *latest = Some(frame);
                }
            }
            Ok(None) => {
                debug!("Media stream {url} ended");
                return;
            }
            Err(e) => {
                warn!("Media stream {url} failed: {e}");
                return;
            }
        }
    }
}
