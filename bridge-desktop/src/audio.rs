//! Audio output using `rodio`
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so each context owns a
//! dedicated OS thread that keeps the stream alive. Only the `Send + Sync`
//! [`OutputStreamHandle`] crosses back to the caller. Every started source
//! gets its own [`Sink`] and a watcher thread that blocks on
//! `sleep_until_end` and reports a natural end through the attached callback.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playback::{
        AudioBackend, AudioContext, AudioSourceHandle, ContextState, EndedCallback, PcmBuffer,
    },
};
use parking_lot::Mutex;
use rodio::{buffer::SamplesBuffer, OutputStream, OutputStreamHandle, Sink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use tracing::{debug, info, warn};

/// Opens the default output device.
#[derive(Debug, Default, Clone)]
pub struct RodioAudioBackend;

impl RodioAudioBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioBackend for RodioAudioBackend {
    async fn create_context(&self) -> Result<Arc<dyn AudioContext>> {
        let context = tokio::task::spawn_blocking(RodioAudioContext::open)
            .await
            .map_err(|e| BridgeError::Audio(format!("audio thread join failed: {}", e)))??;
        Ok(Arc::new(context))
    }
}

pub struct RodioAudioContext {
    handle: OutputStreamHandle,
    state: Mutex<ContextState>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl RodioAudioContext {
    fn open() -> Result<Self> {
        let (init_tx, init_rx) = mpsc::channel::<Result<OutputStreamHandle>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("narration-audio".into())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = init_tx.send(Err(BridgeError::Audio(e.to_string())));
                        return;
                    }
                };
                if init_tx.send(Ok(handle)).is_err() {
                    return;
                }
                // Hold the stream until close() or until the context is dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Audio output thread exiting");
            })
            .map_err(|e| BridgeError::Audio(format!("failed to spawn audio thread: {}", e)))?;

        let handle = init_rx
            .recv()
            .map_err(|_| BridgeError::Audio("audio thread exited during init".to_string()))??;

        info!("Audio output initialized on default device");
        Ok(Self {
            handle,
            state: Mutex::new(ContextState::Running),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
        })
    }
}

#[async_trait]
impl AudioContext for RodioAudioContext {
    fn state(&self) -> ContextState {
        *self.state.lock()
    }

    async fn resume(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            ContextState::Closed => Err(BridgeError::Audio("context is closed".to_string())),
            _ => {
                *state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn start(
        &self,
        buffer: PcmBuffer,
        on_ended: EndedCallback,
    ) -> Result<Box<dyn AudioSourceHandle>> {
        if self.state() == ContextState::Closed {
            return Err(BridgeError::Audio("context is closed".to_string()));
        }

        let channels = u16::try_from(buffer.channel_count())
            .map_err(|_| BridgeError::Audio("too many channels".to_string()))?;
        let sink = Sink::try_new(&self.handle).map_err(|e| BridgeError::Audio(e.to_string()))?;
        sink.append(SamplesBuffer::new(
            channels,
            buffer.sample_rate(),
            buffer.interleaved(),
        ));

        let sink = Arc::new(sink);
        let callback = Arc::new(Mutex::new(Some(on_ended)));
        let stopped = Arc::new(AtomicBool::new(false));

        {
            let sink = Arc::clone(&sink);
            let callback = Arc::clone(&callback);
            let stopped = Arc::clone(&stopped);
            thread::Builder::new()
                .name("narration-playback-watch".into())
                .spawn(move || {
                    sink.sleep_until_end();
                    if stopped.load(Ordering::SeqCst) {
                        return;
                    }
                    let cb = callback.lock().take();
                    if let Some(cb) = cb {
                        debug!("Playback finished naturally");
                        cb();
                    }
                })
                .map_err(|e| BridgeError::Audio(format!("failed to spawn watcher: {}", e)))?;
        }

        debug!(
            frames = buffer.frames(),
            sample_rate = buffer.sample_rate(),
            "Audio source started"
        );
        Ok(Box::new(RodioSource {
            sink,
            callback,
            stopped,
        }))
    }

    async fn close(&self) -> Result<()> {
        *self.state.lock() = ContextState::Closed;
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        Ok(())
    }
}

impl Drop for RodioAudioContext {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.get_mut().take() {
            if tx.send(()).is_err() {
                warn!("Audio output thread already gone");
            }
        }
    }
}

struct RodioSource {
    sink: Arc<Sink>,
    callback: Arc<Mutex<Option<EndedCallback>>>,
    stopped: Arc<AtomicBool>,
}

impl AudioSourceHandle for RodioSource {
    fn clear_on_ended(&mut self) {
        self.callback.lock().take();
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.stop();
    }
}
