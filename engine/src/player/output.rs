use std::{
    fs::File,
    io::BufReader,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc as std_mpsc, Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait};
use rodio::{decoder::DecoderError, Decoder, OutputStream, OutputStreamHandle, PlayError, Sink};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type PlaybackId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The stream behind this playback ran to its end.
    Completed(PlaybackId),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("could not open stream: {0}")]
    Open(#[from] std::io::Error),
    #[error("could not decode stream: {0}")]
    Decode(#[from] DecoderError),
    #[error("could not reach the audio output: {0}")]
    Output(#[from] PlayError),
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
}

/// One-shot completion signal handed to a controller with each stream it
/// opens. Consuming `notify` means a playback can report its end at most once.
pub struct CompletionNotifier {
    playback: PlaybackId,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl CompletionNotifier {
    pub fn new(playback: PlaybackId, events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        Self { playback, events }
    }

    pub fn playback(&self) -> PlaybackId {
        self.playback
    }

    pub fn notify(self) {
        let _ = self.events.send(PlaybackEvent::Completed(self.playback));
    }
}

/// A single opened stream. Calls are fire-and-forget.
pub trait PlaybackHandle: Send {
    fn play(&mut self);
    fn pause(&mut self);
    /// Stops for good. A stopped playback never reports completion.
    fn stop(&mut self);
    fn elapsed_seconds(&self) -> u64;
}

pub trait PlayerController: Send + Sync {
    fn open(
        &self,
        stream_uri: &str,
        on_complete: CompletionNotifier,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;
}

/// Plays every song through its own rodio `Sink` on a shared output stream.
pub struct SinkController {
    stream_handle: OutputStreamHandle,
}

impl SinkController {
    pub fn new(device_name: Option<&str>) -> Result<SinkController, PlaybackError> {
        let device_name = device_name.map(str::to_owned);
        let (ready_sender, ready_receiver) = std_mpsc::channel();

        // `OutputStream` is not `Send`, so it lives on a parked thread of its
        // own for as long as the process runs.
        thread::Builder::new()
            .name("kingjuke-output".to_owned())
            .spawn(move || {
                let opened = match select_device(device_name.as_deref()) {
                    Some(device) => OutputStream::try_from_device(&device),
                    None => OutputStream::try_default(),
                };

                match opened {
                    Ok((_stream, stream_handle)) => {
                        let _ = ready_sender.send(Ok(stream_handle));

                        loop {
                            thread::park();
                        }
                    }
                    Err(e) => {
                        let _ = ready_sender.send(Err(e.to_string()));
                    }
                }
            })?;

        let Ok(opened) = ready_receiver.recv() else {
            return Err(PlaybackError::Unavailable(
                "output thread exited before opening a stream".to_owned(),
            ));
        };

        let stream_handle = opened.map_err(PlaybackError::Unavailable)?;

        info!("Audio output ready");

        Ok(SinkController { stream_handle })
    }
}

fn select_device(device_name: Option<&str>) -> Option<cpal::Device> {
    let host = cpal::default_host();

    let Some(device_name) = device_name else {
        return host.default_output_device();
    };

    let Ok(mut devices) = host.output_devices() else {
        warn!("Could not list output devices, using the default one");

        return host.default_output_device();
    };

    match devices.find(|device| device.name().is_ok_and(|name| name == device_name)) {
        Some(device) => Some(device),
        None => {
            warn!("Output device {device_name:?} not found, using the default one");

            host.default_output_device()
        }
    }
}

impl PlayerController for SinkController {
    fn open(
        &self,
        stream_uri: &str,
        on_complete: CompletionNotifier,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        let file = File::open(stream_uri)?;
        let source = Decoder::new(BufReader::new(file))?;

        let sink = Sink::try_new(&self.stream_handle)?;
        sink.pause();
        sink.append(source);

        let sink = Arc::new(sink);
        let stopped = Arc::new(AtomicBool::new(false));

        let watched_sink = sink.clone();
        let watched_stopped = stopped.clone();

        thread::spawn(move || {
            watched_sink.sleep_until_end();

            if watched_stopped.load(Ordering::SeqCst) {
                debug!("Playback {} stopped", on_complete.playback());
            } else {
                on_complete.notify();
            }
        });

        Ok(Box::new(SinkPlayback { sink, stopped }))
    }
}

struct SinkPlayback {
    sink: Arc<Sink>,
    stopped: Arc<AtomicBool>,
}

impl PlaybackHandle for SinkPlayback {
    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.stop();
    }

    fn elapsed_seconds(&self) -> u64 {
        self.sink.get_pos().as_secs()
    }
}

impl Drop for SinkPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_reports_its_playback_once() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let playback = Uuid::new_v4();

        CompletionNotifier::new(playback, sender).notify();

        assert_eq!(receiver.try_recv(), Ok(PlaybackEvent::Completed(playback)));
        assert!(receiver.try_recv().is_err());
    }
}
