//! cpal-based capture session
//!
//! Note: cpal::Stream is not Send, so the stream lives on a dedicated
//! thread and communicates via channels.
//!
//! While recording, the callback publishes a decayed RMS level (0.0 to 1.0)
//! on a watch channel so a UI can animate without touching the sample
//! buffer.

use crate::config::AudioConfig;
use crate::error::AudioError;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::{oneshot, watch};

/// Commands sent to the audio capture thread
enum CaptureCommand {
    Stop(oneshot::Sender<Vec<f32>>),
}

/// Parameters for building an audio input stream
struct StreamBuildParams {
    samples: Arc<Mutex<Vec<f32>>>,
    level_tx: watch::Sender<f32>,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
}

/// One recording, from trigger-start to trigger-stop.
///
/// `stop()` before `start()` is a no-op that returns an empty blob; the
/// orchestrator relies on this for stop signals that race session teardown.
pub struct CaptureSession {
    config: AudioConfig,
    /// Command sender to the capture thread
    cmd_tx: Option<std::sync::mpsc::Sender<CaptureCommand>>,
    /// Handle to the capture thread
    thread_handle: Option<thread::JoinHandle<()>>,
    level_tx: watch::Sender<f32>,
    level_rx: watch::Receiver<f32>,
}

impl CaptureSession {
    pub fn new(config: &AudioConfig) -> Self {
        let (level_tx, level_rx) = watch::channel(0.0f32);
        Self {
            config: config.clone(),
            cmd_tx: None,
            thread_handle: None,
            level_tx,
            level_rx,
        }
    }

    /// Watch the live input level (0.0 silent, 1.0 loud)
    pub fn level_watch(&self) -> watch::Receiver<f32> {
        self.level_rx.clone()
    }

    /// Open the device and begin collecting samples
    pub async fn start(&mut self) -> Result<(), AudioError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        // Get the device info before spawning the thread
        let host = cpal::default_host();

        let device = if self.config.device == "default" {
            host.default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()))?
        } else {
            find_audio_device(&host, &self.config.device)?
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("Using audio device: {}", device_name);

        let supported_config = device
            .default_input_config()
            .map_err(|e| AudioError::Connection(e.to_string()))?;

        let source_sample_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let target_sample_rate = self.config.sample_rate;
        let sample_format = supported_config.sample_format();

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            source_sample_rate,
            source_channels,
            sample_format
        );

        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<CaptureCommand>();

        let samples = Arc::new(Mutex::new(Vec::<f32>::new()));
        let samples_clone = samples.clone();
        let level_tx = self.level_tx.clone();

        // Spawn audio capture thread
        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_fn = |err| tracing::error!("Audio stream error: {}", err);

            let make_params = || StreamBuildParams {
                samples: samples_clone.clone(),
                level_tx: level_tx.clone(),
                source_rate: source_sample_rate,
                target_rate: target_sample_rate,
                source_channels,
            };

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => {
                    build_stream::<f32>(&device, &stream_config, make_params(), err_fn)
                }
                cpal::SampleFormat::I16 => {
                    build_stream::<i16>(&device, &stream_config, make_params(), err_fn)
                }
                cpal::SampleFormat::U16 => {
                    build_stream::<u16>(&device, &stream_config, make_params(), err_fn)
                }
                format => {
                    tracing::error!("Unsupported sample format: {:?}", format);
                    return;
                }
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to build audio stream: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("Failed to start audio stream: {}", e);
                return;
            }

            tracing::debug!("Audio capture thread started");

            // Wait for stop command
            if let Ok(CaptureCommand::Stop(response_tx)) = cmd_rx.recv() {
                drop(stream);

                let collected = {
                    let guard = samples_clone.lock().unwrap();
                    guard.clone()
                };

                let _ = response_tx.send(collected);
            }

            tracing::debug!("Audio capture thread stopped");
        });

        self.cmd_tx = Some(cmd_tx);
        self.thread_handle = Some(thread_handle);

        Ok(())
    }

    /// Stop recording and return the finished WAV blob.
    ///
    /// A session that never started (or recorded nothing) returns an empty
    /// blob.
    pub async fn stop(&mut self) -> Result<Vec<u8>, AudioError> {
        let samples = if let Some(cmd_tx) = self.cmd_tx.take() {
            let (response_tx, response_rx) = oneshot::channel();

            if cmd_tx.send(CaptureCommand::Stop(response_tx)).is_ok() {
                match tokio::time::timeout(std::time::Duration::from_secs(2), response_rx).await {
                    Ok(Ok(samples)) => samples,
                    Ok(Err(_)) => {
                        return Err(AudioError::StreamError("Channel closed".to_string()))
                    }
                    Err(_) => return Err(AudioError::Timeout(2)),
                }
            } else {
                Vec::new()
            }
        } else {
            Vec::new()
        };

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        let _ = self.level_tx.send(0.0);

        let duration_secs = samples.len() as f32 / self.config.sample_rate as f32;
        tracing::debug!(
            "Audio capture stopped: {} samples ({:.2}s)",
            samples.len(),
            duration_secs
        );

        super::encode_wav(&samples, self.config.sample_rate)
    }
}

/// Find an audio input device by name with flexible matching.
///
/// Matching strategy (in order):
/// 1. Exact match (case-sensitive)
/// 2. Exact match (case-insensitive)
/// 3. Substring match: device name contains the search term (case-insensitive)
fn find_audio_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?
        .collect();

    let search_lower = device_name.to_lowercase();

    let matched_name = devices
        .iter()
        .filter_map(|d| d.name().ok())
        .find(|name| name == device_name)
        .or_else(|| {
            devices
                .iter()
                .filter_map(|d| d.name().ok())
                .find(|name| name.to_lowercase() == search_lower)
        })
        .or_else(|| {
            devices
                .iter()
                .filter_map(|d| d.name().ok())
                .find(|name| name.to_lowercase().contains(&search_lower))
        });

    match matched_name {
        Some(name) => {
            tracing::debug!("Found audio device: {} (searched for: {})", name, device_name);
            host.input_devices()
                .map_err(|e| AudioError::Connection(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| AudioError::DeviceNotFound(device_name.to_string()))
        }
        None => Err(AudioError::DeviceNotFound(device_name.to_string())),
    }
}

/// Build an input stream for a specific sample type
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    params: StreamBuildParams,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let StreamBuildParams {
        samples,
        level_tx,
        source_rate,
        target_rate,
        source_channels,
    } = params;

    let mut prev_level = 0.0f32;

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Convert to f32 and mix to mono
                let mono_f32: Vec<f32> = data
                    .chunks(source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels as f32
                    })
                    .collect();

                prev_level = decayed_level(&mono_f32, prev_level);
                let _ = level_tx.send(prev_level);

                // Resample if needed
                let resampled = if source_rate != target_rate {
                    resample(&mono_f32, source_rate, target_rate)
                } else {
                    mono_f32
                };

                if let Ok(mut guard) = samples.lock() {
                    guard.extend_from_slice(&resampled);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok(stream)
}

/// Input level metric: amplified RMS with a decay floor so the value falls
/// off smoothly between loud chunks instead of flickering.
fn decayed_level(chunk: &[f32], prev: f32) -> f32 {
    let decayed = prev * 0.75;
    if chunk.is_empty() {
        return decayed;
    }
    let rms = (chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32).sqrt();
    (rms * 8.0).clamp(0.0, 1.0).max(decayed)
}

/// Linear interpolation resampling
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}
