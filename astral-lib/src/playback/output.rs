//! Physical output backends for the mixing graph.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{error, info, warn};
use rodio::{OutputStream, OutputStreamBuilder, Source};

use crate::audio::AudioError;
use crate::constants::{OUTPUT_STREAM_OPEN_RETRIES, OUTPUT_STREAM_OPEN_RETRY_MS};

/// Boxed source as accepted by every backend.
pub type BoxedSource = Box<dyn Source + Send>;

/// Sink for fully routed sources.
///
/// Sources are mixed by the backend and dropped once they return `None`.
pub trait OutputBackend {
    fn add(&mut self, source: BoxedSource);
}

/// Default rodio output device.
pub struct RodioOutput {
    stream: OutputStream,
}

impl RodioOutput {
    /// Open the default output stream, retrying while the device settles.
    pub fn open() -> Result<Self, AudioError> {
        let mut stream = open_output_stream_with_retry()?;
        stream.log_on_drop(false);
        info!("opened default output stream");
        Ok(Self { stream })
    }
}

impl OutputBackend for RodioOutput {
    fn add(&mut self, source: BoxedSource) {
        self.stream.mixer().add(source);
    }
}

fn open_output_stream_with_retry() -> Result<OutputStream, AudioError> {
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if attempt == OUTPUT_STREAM_OPEN_RETRIES {
                    error!(
                        "failed to open default output stream after {} attempts: {}",
                        OUTPUT_STREAM_OPEN_RETRIES, err
                    );
                    return Err(AudioError::Device(err.to_string()));
                }
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
        }
    }
    Err(AudioError::Device("no output stream".to_string()))
}

const SILENT_TICK: Duration = Duration::from_millis(10);

/// Consumes sources in real time without touching a device.
///
/// Used when audio is disabled so completion events still arrive on schedule.
pub struct SilentOutput {
    sources: Arc<Mutex<Vec<BoxedSource>>>,
    running: Arc<AtomicBool>,
}

impl SilentOutput {
    pub fn start() -> Self {
        let sources: Arc<Mutex<Vec<BoxedSource>>> = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let thread_sources = sources.clone();
        let thread_running = running.clone();
        thread::spawn(move || {
            while thread_running.load(Ordering::Relaxed) {
                thread::sleep(SILENT_TICK);
                let mut sources = thread_sources.lock().unwrap();
                sources.retain_mut(|source| pull_for(source, SILENT_TICK));
            }
        });

        Self { sources, running }
    }
}

fn pull_for(source: &mut BoxedSource, tick: Duration) -> bool {
    let per_tick = (source.sample_rate() as f64 * tick.as_secs_f64()) as usize
        * source.channels().max(1) as usize;
    for _ in 0..per_tick.max(1) {
        if source.next().is_none() {
            return false;
        }
    }
    true
}

impl OutputBackend for SilentOutput {
    fn add(&mut self, source: BoxedSource) {
        self.sources.lock().unwrap().push(source);
    }
}

impl Drop for SilentOutput {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Keeps every added source so tests can pull samples by hand.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingOutput {
        pub(crate) sources: Arc<Mutex<Vec<BoxedSource>>>,
    }

    impl RecordingOutput {
        pub(crate) fn len(&self) -> usize {
            self.sources.lock().unwrap().len()
        }

        /// Pull up to `count` samples from source `index`.
        pub(crate) fn pull(&self, index: usize, count: usize) -> Vec<f32> {
            let mut sources = self.sources.lock().unwrap();
            sources[index].by_ref().take(count).collect()
        }

        /// Run source `index` until it ends; returns the number of samples.
        pub(crate) fn finish(&self, index: usize) -> usize {
            let mut sources = self.sources.lock().unwrap();
            sources[index].by_ref().count()
        }
    }

    impl OutputBackend for RecordingOutput {
        fn add(&mut self, source: BoxedSource) {
            self.sources.lock().unwrap().push(source);
        }
    }

    /// A graph whose output records sources instead of playing them.
    pub(crate) fn recording_graph() -> (crate::playback::MixingGraph, RecordingOutput) {
        let output = RecordingOutput::default();
        let backend = output.clone();
        let graph = crate::playback::MixingGraph::new(move || {
            Ok(Box::new(backend.clone()) as Box<dyn OutputBackend>)
        });
        (graph, output)
    }

    /// Mono 16-bit PCM WAV holding `frames` samples of `value`.
    pub(crate) fn wav_bytes(frames: u32, sample_rate: u32, value: f32) -> Vec<u8> {
        let data_len = frames * 2;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        let sample = (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        for _ in 0..frames {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }
}
