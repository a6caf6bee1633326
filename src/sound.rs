use std::{fs::File, io::BufReader, path::PathBuf};

use log::debug;
use rodio::{
    decoder::DecoderError, Decoder, OutputStream, OutputStreamHandle, PlayError, Sink, Source,
    StreamError,
};
use thiserror::Error;

use crate::alarm::Sound;

#[derive(Error, Debug)]
pub enum SoundError {
    #[error("no audio output: {0}")]
    Stream(#[from] StreamError),
    #[error("couldn't start playback: {0}")]
    Play(#[from] PlayError),
    #[error("couldn't open sound file {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't decode sound file: {0}")]
    Decode(#[from] DecoderError),
}

/// loops one alarm tone at a time on the default output device
///
/// the output stream can't move between threads, build this on the thread
/// that uses it
pub struct AlarmPlayer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
}

impl AlarmPlayer {
    pub fn new() -> Result<Self, SoundError> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
        })
    }

    /// replaces whatever is currently ringing
    pub fn play(&mut self, sound: &Sound) -> Result<(), SoundError> {
        self.stop();
        let file = File::open(&sound.path).map_err(|source| SoundError::Open {
            path: sound.path.clone(),
            source,
        })?;
        // repeat until dismissed
        let input = Decoder::new(BufReader::new(file))?.repeat_infinite();
        let sink = Sink::try_new(&self.handle)?;
        sink.append(input);
        sink.play();
        debug!("ringing {sound}");
        self.sink = Some(sink);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}
