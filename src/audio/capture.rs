//! Microphone capture using PipeWire
//!
//! Samples are mixed to mono and buffered until the capture is stopped.

use pipewire as pw;
use pw::spa;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::pw_stream::{self, Connection, LoopCommand};
use super::{AudioSource, CapturedAudio};

/// Capture buffer shared with the PipeWire thread
#[derive(Clone, Default)]
struct SharedCapture {
    inner: Arc<Mutex<CaptureInner>>,
}

#[derive(Default)]
struct CaptureInner {
    samples: Vec<f32>,
    sample_rate: u32,
    /// Smoothed RMS of recent buffers (0.0 - 1.0)
    level: f32,
    error: Option<String>,
}

impl SharedCapture {
    fn lock(&self) -> std::sync::MutexGuard<'_, CaptureInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reset(&self) {
        *self.lock() = CaptureInner::default();
    }

    fn push(&self, samples: &[f32], sample_rate: u32) {
        if samples.is_empty() {
            return;
        }
        let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
        let rms = (sum_squares / samples.len() as f32).sqrt();

        let mut inner = self.lock();
        inner.sample_rate = sample_rate;
        inner.level = inner.level * 0.7 + rms * 0.3;
        inner.samples.extend_from_slice(samples);
    }

    fn set_error(&self, error: String) {
        self.lock().error = Some(error);
    }

    fn take(&self) -> Result<CapturedAudio, String> {
        let mut inner = self.lock();
        if let Some(error) = inner.error.take() {
            return Err(error);
        }
        Ok(CapturedAudio {
            samples: std::mem::take(&mut inner.samples),
            sample_rate: inner.sample_rate,
        })
    }
}

/// Microphone capture on a dedicated PipeWire thread
pub struct AudioCapture {
    shared: SharedCapture,
    is_running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    sender: Option<pw::channel::Sender<LoopCommand>>,
}

impl AudioCapture {
    pub fn new() -> Self {
        Self {
            shared: SharedCapture::default(),
            is_running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            sender: None,
        }
    }

    /// Current input level for metering
    pub fn level(&self) -> f32 {
        self.shared.lock().level
    }

    /// Seconds captured so far
    pub fn duration(&self) -> f64 {
        let inner = self.shared.lock();
        if inner.sample_rate == 0 {
            return 0.0;
        }
        inner.samples.len() as f64 / inner.sample_rate as f64
    }
}

impl Default for AudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for AudioCapture {
    fn start(&mut self) -> Result<(), String> {
        if self.is_running.load(Ordering::SeqCst) {
            return Err("Capture already running".to_string());
        }

        self.shared.reset();
        self.is_running.store(true, Ordering::SeqCst);

        let shared = self.shared.clone();
        let is_running = self.is_running.clone();
        let (sender, receiver) = pw::channel::channel::<LoopCommand>();
        self.sender = Some(sender);

        self.thread_handle = Some(thread::spawn(move || {
            if let Err(e) = run_capture_loop(shared.clone(), receiver) {
                log::error!("Capture stream failed: {}", e);
                shared.set_error(e);
            }
            is_running.store(false, Ordering::SeqCst);
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<CapturedAudio, String> {
        let Some(handle) = self.thread_handle.take() else {
            return Err("Capture not running".to_string());
        };

        if let Some(sender) = self.sender.take() {
            let _ = sender.send(LoopCommand::Stop);
        }
        let _ = handle.join();
        self.is_running.store(false, Ordering::SeqCst);

        self.shared.take()
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            let _ = self.stop();
        }
    }
}

fn run_capture_loop(
    shared: SharedCapture,
    receiver: pw::channel::Receiver<LoopCommand>,
) -> Result<(), String> {
    let connection = Connection::open()?;

    let mainloop_weak = connection.mainloop.downgrade();
    let _receiver = receiver.attach(connection.mainloop.loop_(), move |cmd| match cmd {
        LoopCommand::Stop => {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    struct UserData {
        format: spa::param::audio::AudioInfoRaw,
        shared: SharedCapture,
    }

    let props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => "Capture",
        *pw::keys::MEDIA_ROLE => "Communication",
        *pw::keys::APP_NAME => pw_stream::APP_NAME,
    };

    let stream = pw::stream::StreamBox::new(&connection.core, "mediabox-capture", props)
        .map_err(|e| format!("Failed to create PipeWire stream: {}", e))?;

    let _listener = stream
        .add_local_listener_with_user_data(UserData {
            format: Default::default(),
            shared,
        })
        .param_changed(|_, user_data, id, param| {
            pw_stream::negotiate_format(&mut user_data.format, id, param);
        })
        .process(|stream, user_data| {
            let Some(mut buffer) = stream.dequeue_buffer() else {
                return;
            };
            let datas = buffer.datas_mut();
            if datas.is_empty() {
                return;
            }

            let data = &mut datas[0];
            let n_channels = user_data.format.channels().max(1) as usize;
            let sample_rate = user_data.format.rate();
            let n_bytes = data.chunk().size() as usize;

            let Some(raw) = data.data() else {
                return;
            };
            let raw = &raw[..n_bytes.min(raw.len())];

            // First channel of each frame
            let frame_bytes = std::mem::size_of::<f32>() * n_channels;
            let mono: Vec<f32> = raw
                .chunks_exact(frame_bytes)
                .map(|frame| f32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]))
                .collect();

            user_data.shared.push(&mono, sample_rate);
        })
        .register()
        .map_err(|e| format!("Failed to register stream listener: {}", e))?;

    let format = pw_stream::f32_format_pod(None)?;
    let mut params = [pw_stream::as_pod(&format)?];

    stream
        .connect(
            spa::utils::Direction::Input,
            None,
            pw::stream::StreamFlags::AUTOCONNECT
                | pw::stream::StreamFlags::MAP_BUFFERS
                | pw::stream::StreamFlags::RT_PROCESS,
            &mut params,
        )
        .map_err(|e| format!("Failed to connect stream: {}", e))?;

    connection.mainloop.run();

    Ok(())
}
