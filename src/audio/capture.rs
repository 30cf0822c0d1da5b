//! Microphone capture using cpal.
//!
//! Opens the default input device and delivers mono f32 sample chunks over a
//! bounded channel, in strict capture order. A lock-free ring buffer keeps
//! the audio callback from ever blocking; a drain thread moves samples from
//! the ring into the channel. When the device sample rate differs from the
//! configured rate the callback path resamples.
//!
//! The microphone is an exclusive resource: a second open while one capturer
//! is alive fails instead of queueing, since user turns are serial.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::resampler::ResamplerState;
use super::util::{device_name, downmix_mono, find_best_config};

/// Ring buffer size in samples (~4 seconds at 16kHz).
const CAPTURE_RING_SIZE: usize = 65536;

/// Channel depth in chunks (~1 second of audio of backpressure).
const CHANNEL_DEPTH: usize = 32;

/// Process-wide flag marking the microphone as held by a capturer.
static MIC_IN_USE: AtomicBool = AtomicBool::new(false);

/// RAII claim on the microphone.
struct MicGuard;

impl MicGuard {
    fn acquire() -> Result<Self> {
        if MIC_IN_USE.swap(true, Ordering::SeqCst) {
            anyhow::bail!("Microphone is already held by another capture session");
        }
        Ok(Self)
    }
}

impl Drop for MicGuard {
    fn drop(&mut self) {
        MIC_IN_USE.store(false, Ordering::SeqCst);
    }
}

/// One open microphone stream feeding a chunk channel.
///
/// Dropping the capturer stops the stream, joins the drain thread and
/// releases the microphone claim on every exit path.
pub struct Capturer {
    stream: Stream,
    shutdown: Arc<AtomicBool>,
    drain_handle: Option<std::thread::JoinHandle<()>>,
    _guard: MicGuard,
}

impl Capturer {
    /// Open the default input device at `sample_rate` and start streaming.
    ///
    /// Returns the capturer and the receiving end of the chunk channel. The
    /// channel closes when the stream reports a device failure, so a `None`
    /// from the receiver while capturing means the hardware went away.
    ///
    /// # Errors
    /// Fails when the microphone is already held, no input device exists, or
    /// the stream cannot be built or started.
    pub fn open(sample_rate: u32) -> Result<(Self, mpsc::Receiver<Vec<f32>>)> {
        let guard = MicGuard::acquire()?;

        let host = cpal::default_host();
        let device = host.default_input_device().context("No input device available")?;

        info!("Using input device: {}", device_name(&device));

        let supported_configs = device.supported_input_configs().context("Failed to get supported input configs")?;
        let config = find_best_config(supported_configs, sample_rate)?;
        let device_sample_rate = config.sample_rate();

        let needs_resampling = device_sample_rate != sample_rate;
        if needs_resampling {
            info!("Device sample rate {} Hz differs from target {} Hz - resampling will be applied", device_sample_rate, sample_rate);
        }

        debug!("Capture config: {} Hz, {} channels, {:?}", device_sample_rate, config.channels(), config.sample_format());

        let channels = config.channels() as usize;
        let stream_config: StreamConfig = config.config();

        let failed = Arc::new(AtomicBool::new(false));
        let failed_in_callback = failed.clone();

        let err_fn = move |err| {
            tracing::error!("Audio capture error: {}", err);
            failed_in_callback.store(true, Ordering::SeqCst);
        };

        let ring = HeapRb::<f32>::new(CAPTURE_RING_SIZE);
        let (mut producer, mut consumer) = ring.split();

        let resampler_state = if needs_resampling { Some(ResamplerState::new(device_sample_rate, sample_rate)?) } else { None };

        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples = downmix_mono(data, channels);

                let samples = match &resampler_state {
                    Some(state) => state.lock().process_samples(&samples),
                    None => Some(samples),
                };

                if let Some(samples) = samples {
                    let written = producer.push_slice(&samples);
                    if written < samples.len() {
                        use std::sync::atomic::AtomicU64;
                        static DROP_COUNT: AtomicU64 = AtomicU64::new(0);
                        let count = DROP_COUNT.fetch_add(1, Ordering::Relaxed);
                        if count.is_multiple_of(100) {
                            tracing::warn!("Capture ring buffer full, dropped {} chunks", count + 1);
                        }
                    }
                }
            },
            err_fn,
            None,
        )?;

        let (tx, rx) = mpsc::channel::<Vec<f32>>(CHANNEL_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));

        let drain_shutdown = shutdown.clone();
        let drain_failed = failed.clone();
        let drain_handle = std::thread::spawn(move || {
            let mut read_buffer = vec![0.0f32; 2048];

            loop {
                if drain_shutdown.load(Ordering::Relaxed) {
                    debug!("Drain thread shutting down");
                    return;
                }

                // A stream failure closes the channel so the session sees it.
                if drain_failed.load(Ordering::Relaxed) {
                    debug!("Drain thread exiting after stream failure");
                    return;
                }

                let available = consumer.occupied_len();
                if available == 0 {
                    std::thread::sleep(std::time::Duration::from_micros(100));
                    continue;
                }

                let to_read = available.min(read_buffer.len());
                let read = consumer.pop_slice(&mut read_buffer[..to_read]);

                if read > 0 && !send_chunk(&tx, read_buffer[..read].to_vec(), &drain_shutdown, &drain_failed) {
                    debug!("Capture channel closed, drain thread exiting");
                    return;
                }
            }
        });

        stream.play().context("Failed to start capture stream")?;

        info!("Audio capture started: device {} Hz -> pipeline {} Hz", device_sample_rate, sample_rate);

        Ok((Self { stream, shutdown, drain_handle: Some(drain_handle), _guard: guard }, rx))
    }

    /// Stop the stream and join the drain thread.
    fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.stream.pause();

        if let Some(handle) = self.drain_handle.take()
            && let Err(e) = handle.join()
        {
            warn!("Failed to join drain thread: {:?}", e);
        }

        debug!("Audio capture stopped");
    }
}

impl Drop for Capturer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Push one chunk into the channel without parking the drain thread forever.
///
/// `shutdown()` joins the drain thread, so the thread must never block in a
/// send it cannot be woken from: while the channel is full it re-checks the
/// shutdown and failure flags between retries. Returns `false` when the
/// drain thread should exit.
fn send_chunk(tx: &mpsc::Sender<Vec<f32>>, chunk: Vec<f32>, shutdown: &AtomicBool, failed: &AtomicBool) -> bool {
    let mut chunk = chunk;
    loop {
        match tx.try_send(chunk) {
            Ok(()) => return true,
            Err(mpsc::error::TrySendError::Closed(_)) => return false,
            Err(mpsc::error::TrySendError::Full(returned)) => {
                if shutdown.load(Ordering::Relaxed) || failed.load(Ordering::Relaxed) {
                    return false;
                }
                chunk = returned;
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mic_guard_is_exclusive() {
        let first = MicGuard::acquire().unwrap();
        assert!(MicGuard::acquire().is_err());
        drop(first);
        assert!(MicGuard::acquire().is_ok());
    }

    #[test]
    fn test_send_chunk_delivers_when_channel_has_space() {
        let (tx, mut rx) = mpsc::channel::<Vec<f32>>(1);
        let shutdown = AtomicBool::new(false);
        let failed = AtomicBool::new(false);

        assert!(send_chunk(&tx, vec![0.5], &shutdown, &failed));
        assert_eq!(rx.try_recv().unwrap(), vec![0.5]);
    }

    #[test]
    fn test_send_chunk_exits_on_shutdown_while_channel_full() {
        // A full channel with a live but unpolled receiver must not wedge
        // the drain thread: the shutdown flag has to win.
        let (tx, _rx) = mpsc::channel::<Vec<f32>>(1);
        tx.try_send(vec![0.0]).unwrap();

        let shutdown = AtomicBool::new(true);
        let failed = AtomicBool::new(false);
        assert!(!send_chunk(&tx, vec![0.5], &shutdown, &failed));
    }

    #[test]
    fn test_send_chunk_exits_on_stream_failure_while_channel_full() {
        let (tx, _rx) = mpsc::channel::<Vec<f32>>(1);
        tx.try_send(vec![0.0]).unwrap();

        let shutdown = AtomicBool::new(false);
        let failed = AtomicBool::new(true);
        assert!(!send_chunk(&tx, vec![0.5], &shutdown, &failed));
    }

    #[test]
    fn test_send_chunk_exits_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel::<Vec<f32>>(1);
        drop(rx);

        let shutdown = AtomicBool::new(false);
        let failed = AtomicBool::new(false);
        assert!(!send_chunk(&tx, vec![0.5], &shutdown, &failed));
    }
}
