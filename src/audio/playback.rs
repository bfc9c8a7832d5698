//! Audio output using PipeWire
//!
//! Plays a decoded WAV reference through a PipeWire output stream at the
//! file's own sample rate. Pausing tears the stream down and keeps the
//! position; playing reconnects.

use log::{debug, error};
use pipewire as pw;
use pw::spa;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use super::pw_stream::{self, Connection, LoopCommand};
use super::WavRecorder;
use crate::error::EngineError;
use crate::models::{MediaReference, VolumeLevel};
use crate::playback::PlaybackEngine;

/// Decoded audio and play position, shared with the output thread
#[derive(Clone, Default)]
struct SharedPlayback {
    inner: Arc<Mutex<PlaybackInner>>,
}

#[derive(Default)]
struct PlaybackInner {
    samples: Vec<f32>,
    sample_rate: u32,
    position: usize,
    gain: f32,
    finished: bool,
    fault: Option<String>,
}

impl SharedPlayback {
    fn lock(&self) -> MutexGuard<'_, PlaybackInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self, samples: Vec<f32>, sample_rate: u32) {
        let mut inner = self.lock();
        inner.samples = samples;
        inner.sample_rate = sample_rate;
        inner.position = 0;
        inner.finished = false;
        inner.fault = None;
    }

    fn clear(&self) {
        let mut inner = self.lock();
        inner.samples = Vec::new();
        inner.position = 0;
    }

    fn set_fault(&self, fault: String) {
        self.lock().fault = Some(fault);
    }

    /// Next `count` samples with gain applied, advancing the position
    fn next_samples(&self, count: usize) -> Option<Vec<f32>> {
        let mut inner = self.lock();
        if inner.position >= inner.samples.len() {
            inner.finished = true;
            return None;
        }

        let end = (inner.position + count).min(inner.samples.len());
        let gain = inner.gain;
        let out = inner.samples[inner.position..end]
            .iter()
            .map(|s| s * gain)
            .collect();
        inner.position = end;
        Some(out)
    }
}

/// PipeWire-backed playback engine
pub struct AudioPlayer {
    shared: SharedPlayback,
    is_running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    sender: Option<pw::channel::Sender<LoopCommand>>,
}

impl AudioPlayer {
    pub fn new() -> Self {
        let shared = SharedPlayback::default();
        shared.lock().gain = VolumeLevel::DEFAULT.get();
        Self {
            shared,
            is_running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            sender: None,
        }
    }

    /// Current position in seconds
    pub fn current_time(&self) -> f64 {
        let inner = self.shared.lock();
        if inner.sample_rate == 0 {
            return 0.0;
        }
        inner.position as f64 / inner.sample_rate as f64
    }

    fn stop_stream(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(LoopCommand::Stop);
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.is_running.store(false, Ordering::SeqCst);
    }
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine for AudioPlayer {
    fn prepare(&mut self, reference: &MediaReference) -> Result<(), EngineError> {
        self.stop_stream();
        let (samples, sample_rate) = WavRecorder::load(reference.as_str())
            .map_err(|e| EngineError::Unavailable(format!("{}: {}", reference, e)))?;
        debug!(
            "Prepared {} ({} samples at {}Hz)",
            reference,
            samples.len(),
            sample_rate
        );
        self.shared.load(samples, sample_rate);
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        if self.is_running.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.shared.lock().samples.is_empty() {
            return Err(EngineError::Fault("nothing prepared".to_string()));
        }
        // Reap a thread that ended on its own at end of stream
        self.stop_stream();

        self.is_running.store(true, Ordering::SeqCst);
        let sample_rate = self.shared.lock().sample_rate;
        let shared = self.shared.clone();
        let is_running = self.is_running.clone();
        let (sender, receiver) = pw::channel::channel::<LoopCommand>();
        self.sender = Some(sender);

        self.thread_handle = Some(thread::spawn(move || {
            if let Err(e) = run_playback_loop(shared.clone(), sample_rate, receiver) {
                error!("Playback stream failed: {}", e);
                shared.set_fault(e);
            }
            is_running.store(false, Ordering::SeqCst);
        }));
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.stop_stream();
        Ok(())
    }

    fn set_volume(&mut self, level: VolumeLevel) -> Result<(), EngineError> {
        self.shared.lock().gain = level.get();
        Ok(())
    }

    fn release(&mut self) -> Result<(), EngineError> {
        self.stop_stream();
        self.shared.clear();
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.shared.lock().finished
    }

    fn take_fault(&mut self) -> Option<String> {
        self.shared.lock().fault.take()
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

fn run_playback_loop(
    shared: SharedPlayback,
    sample_rate: u32,
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
        shared: SharedPlayback,
        mainloop_weak: pw::main_loop::MainLoopWeak,
    }

    let props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => "Playback",
        *pw::keys::MEDIA_ROLE => "Music",
        *pw::keys::APP_NAME => pw_stream::APP_NAME,
    };

    let stream = pw::stream::StreamBox::new(&connection.core, "mediabox-playback", props)
        .map_err(|e| format!("Failed to create PipeWire stream: {}", e))?;

    let _listener = stream
        .add_local_listener_with_user_data(UserData {
            format: Default::default(),
            shared,
            mainloop_weak: connection.mainloop.downgrade(),
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
            let stride = std::mem::size_of::<f32>() * n_channels;

            let Some(slice) = data.data() else {
                return;
            };
            let n_frames = slice.len() / stride;

            let Some(samples) = user_data.shared.next_samples(n_frames) else {
                if let Some(mainloop) = user_data.mainloop_weak.upgrade() {
                    mainloop.quit();
                }
                return;
            };

            // Same sample on every channel of the frame
            for (frame, sample) in slice.chunks_exact_mut(stride).zip(&samples) {
                let bytes = sample.to_le_bytes();
                for channel in frame.chunks_exact_mut(4) {
                    channel.copy_from_slice(&bytes);
                }
            }
            let written = samples.len() * stride;
            slice[written..].fill(0);

            let chunk = data.chunk_mut();
            *chunk.offset_mut() = 0;
            *chunk.stride_mut() = stride as i32;
            *chunk.size_mut() = written as u32;
        })
        .register()
        .map_err(|e| format!("Failed to register stream listener: {}", e))?;

    let format = pw_stream::f32_format_pod(Some(sample_rate))?;
    let mut params = [pw_stream::as_pod(&format)?];

    stream
        .connect(
            spa::utils::Direction::Output,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_carry_gain_until_exhausted() {
        let shared = SharedPlayback::default();
        shared.load(vec![1.0, 0.5, -1.0], 44100);
        shared.lock().gain = 0.5;

        assert_eq!(shared.next_samples(2), Some(vec![0.5, 0.25]));
        assert_eq!(shared.next_samples(2), Some(vec![-0.5]));
        assert!(!shared.lock().finished);
        assert_eq!(shared.next_samples(2), None);
        assert!(shared.lock().finished);
    }

    #[test]
    fn test_stream_fault_is_reported_once() {
        let mut player = AudioPlayer::new();
        player.shared.set_fault("Failed to connect to PipeWire".to_string());

        assert_eq!(
            player.take_fault().as_deref(),
            Some("Failed to connect to PipeWire")
        );
        assert_eq!(player.take_fault(), None);

        player.shared.set_fault("stale".to_string());
        player.shared.load(vec![0.0; 4], 48000);
        assert_eq!(player.take_fault(), None);
    }
}
