use super::resample::Resampler;
use crate::analyzer;
use crate::error::CaptureError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

#[derive(Debug, Default)]
pub struct CPalBuilder {
    pub rate: Option<usize>,
    pub buffer_size: Option<usize>,
}

impl CPalBuilder {
    pub fn new() -> CPalBuilder {
        Default::default()
    }

    /// Resample to this rate.  Defaults to the device rate.
    pub fn rate(&mut self, rate: usize) -> &mut CPalBuilder {
        self.rate = Some(rate);
        self
    }

    pub fn buffer_size(&mut self, buffer_size: usize) -> &mut CPalBuilder {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Open the default input device
    ///
    /// Blocks until the stream is playing or has failed to start.
    pub fn create(&mut self) -> Result<CPalRecorder, CaptureError> {
        CPalRecorder::new(
            self.rate,
            self.buffer_size.unwrap_or(crate::config::MIN_BUFFER_SIZE),
        )
    }

    pub fn build(&mut self) -> Result<Box<dyn super::Recorder>, CaptureError> {
        Ok(Box::new(self.create()?))
    }
}

/// Recorder capturing from the default cpal input device
///
/// The stream lives on its own thread because it is not `Send` on every platform.
#[derive(Debug)]
pub struct CPalRecorder {
    buffer: analyzer::SampleBuffer,
    alive: Arc<AtomicBool>,
    stop: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CPalRecorder {
    fn new(rate: Option<usize>, buffer_size: usize) -> Result<CPalRecorder, CaptureError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let alive = Arc::new(AtomicBool::new(true));
        let stream_alive = alive.clone();

        let thread = thread::Builder::new()
            .name("cpal-recorder".into())
            .spawn(move || {
                let stream = match open_stream(rate, buffer_size, stream_alive) {
                    Ok((stream, buffer)) => {
                        let _ = ready_tx.send(Ok(buffer));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Either a stop request or the recorder being dropped ends the stream
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("cpal-recorder: stream closed");
            })
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        let buffer = ready_rx
            .recv()
            .map_err(|_| CaptureError::Stream("Recorder thread exited early".into()))??;

        Ok(CPalRecorder {
            buffer,
            alive,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

impl super::Recorder for CPalRecorder {
    fn sample_buffer(&self) -> &analyzer::SampleBuffer {
        &self.buffer
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn release(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("cpal-recorder thread panicked");
            }
        }
    }
}

impl Drop for CPalRecorder {
    fn drop(&mut self) {
        super::Recorder::release(self);
    }
}

fn open_stream(
    rate: Option<usize>,
    buffer_size: usize,
    alive: Arc<AtomicBool>,
) -> Result<(cpal::Stream, analyzer::SampleBuffer), CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::DeviceUnavailable)?;

    let config = device.default_input_config()?;
    let device_rate = config.sample_rate().0 as usize;
    let channels = (config.channels() as usize).max(1);
    let rate = rate.unwrap_or(device_rate);

    log::debug!("CPalRecorder:");
    log::debug!("    Device      = {:?}", device.name().unwrap_or_default());
    log::debug!("    Device Rate = {:6}", device_rate);
    log::debug!("    Sample Rate = {:6}", rate);
    log::debug!("    Channels    = {:6}", channels);
    log::debug!("    Buffer Size = {:6}", buffer_size);

    let buffer = analyzer::SampleBuffer::new(buffer_size, rate);
    let resampler = Resampler::new(device_rate, rate);
    let sink = buffer.clone();

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &config.into(), sink, channels, resampler, alive)
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &config.into(), sink, channels, resampler, alive)
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &config.into(), sink, channels, resampler, alive)
        }
        fmt => {
            return Err(CaptureError::Stream(format!(
                "Unsupported sample format {:?}",
                fmt
            )))
        }
    }?;

    stream.play()?;
    log::info!("Audio capture started ({} Hz device rate)", device_rate);

    Ok((stream, buffer))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    buffer: analyzer::SampleBuffer,
    channels: usize,
    mut resampler: Resampler,
    alive: Arc<AtomicBool>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let mut mono = Vec::new();
    let mut resampled = Vec::new();

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            mono.clear();
            mono.extend(data.chunks(channels).map(|frame| {
                let sum: f32 = frame
                    .iter()
                    .map(|s| -> f32 { cpal::Sample::from_sample(*s) })
                    .sum();
                sum / frame.len() as f32
            }));

            if resampler.is_passthrough() {
                buffer.push(&mono);
            } else {
                resampled.clear();
                resampler.process(&mono, &mut resampled);
                buffer.push(&resampled);
            }
        },
        move |err| {
            log::error!("Audio stream error: {}", err);
            alive.store(false, Ordering::SeqCst);
        },
        None,
    )
}

fn backend_error(description: String) -> CaptureError {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::Stream(description)
    }
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(e: cpal::DefaultStreamConfigError) -> CaptureError {
        match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
            cpal::DefaultStreamConfigError::BackendSpecific { err } => {
                backend_error(err.description)
            }
            other => CaptureError::Stream(other.to_string()),
        }
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(e: cpal::BuildStreamError) -> CaptureError {
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
            cpal::BuildStreamError::BackendSpecific { err } => backend_error(err.description),
            other => CaptureError::Stream(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(e: cpal::PlayStreamError) -> CaptureError {
        match e {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
            cpal::PlayStreamError::BackendSpecific { err } => backend_error(err.description),
            #[allow(unreachable_patterns)]
            other => CaptureError::Stream(other.to_string()),
        }
    }
}
