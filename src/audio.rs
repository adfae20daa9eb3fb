//! Sound effects and background music.
//!
//! Playback goes through `rodio` when the crate is built with the `audio` feature.
//! Without it, or when no output device can be opened, every signal is ignored.

use crate::session::{Signal, Sound};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{info, trace, warn};

#[derive(Debug, Error)]
pub enum AudioError {
    #[cfg(not(feature = "audio"))]
    #[error("built without the `audio` feature")]
    Unsupported,
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[cfg(feature = "audio")]
    #[error("no output device: {0}")]
    Device(#[from] rodio::StreamError),
    #[cfg(feature = "audio")]
    #[error("cannot open sink: {0}")]
    Play(#[from] rodio::PlayError),
    #[cfg(feature = "audio")]
    #[error("cannot decode audio: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),
}

/// Asset file for each effect. `Lock` falls back to the hard-drop clip.
#[cfg(any(feature = "audio", test))]
fn clip_file(sound: Sound) -> &'static str {
    match sound {
        Sound::Rotate => "rotate.wav",
        Sound::HardDrop => "drop.wav",
        Sound::Lock => "lock.wav",
        Sound::LineClear => "line_clear.wav",
    }
}

pub struct Audio {
    backend: Option<Backend>,
}

impl fmt::Debug for Audio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Audio")
            .field("enabled", &self.backend.is_some())
            .finish()
    }
}

impl Audio {
    /// Open the default output device and load clips from `assets`.
    /// Falls back to silence on any failure.
    pub fn new(assets: &Path, enabled: bool) -> Self {
        if !enabled {
            info!("audio muted");
            return Self::silent();
        }
        match Backend::open(assets) {
            Ok(backend) => {
                info!(assets = %assets.display(), "audio enabled");
                Self {
                    backend: Some(backend),
                }
            }
            Err(err) => {
                warn!(%err, "audio disabled");
                Self::silent()
            }
        }
    }

    pub fn silent() -> Self {
        Self { backend: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// React to one session signal; particle signals are not ours.
    pub fn handle(&mut self, signal: &Signal) {
        let Some(backend) = self.backend.as_mut() else {
            trace!(?signal, "audio off");
            return;
        };
        let result = match *signal {
            Signal::Sound(sound) => backend.play(sound),
            Signal::Music(cue) => backend.music(cue),
            Signal::Shatter { .. } | Signal::Trace { .. } => Ok(()),
        };
        if let Err(err) = result {
            warn!(%err, ?signal, "playback failed");
        }
    }
}

#[cfg(any(feature = "audio", test))]
fn read_clip(path: &Path) -> Result<std::sync::Arc<[u8]>, AudioError> {
    std::fs::read(path)
        .map(std::sync::Arc::from)
        .map_err(|source| AudioError::Read {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(feature = "audio")]
use backend::Backend;

#[cfg(feature = "audio")]
mod backend {
    use super::{AudioError, clip_file, read_clip};
    use crate::session::{MusicCue, Sound};
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Arc;
    use tracing::{debug, warn};

    const MUSIC_FILE: &str = "background.mp3";
    const MUSIC_VOLUME: f32 = 0.3;
    const SOUNDS: [Sound; 4] = [Sound::Rotate, Sound::HardDrop, Sound::Lock, Sound::LineClear];

    pub struct Backend {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        clips: HashMap<Sound, Arc<[u8]>>,
        music: Option<Arc<[u8]>>,
        music_sink: Option<Sink>,
    }

    impl Backend {
        pub fn open(assets: &Path) -> Result<Self, AudioError> {
            let (stream, handle) = OutputStream::try_default()?;

            let mut clips = HashMap::new();
            for sound in SOUNDS {
                match read_clip(&assets.join(clip_file(sound))) {
                    Ok(bytes) => {
                        clips.insert(sound, bytes);
                    }
                    Err(err) => debug!(%err, ?sound, "clip missing"),
                }
            }
            if !clips.contains_key(&Sound::Lock) {
                if let Some(drop) = clips.get(&Sound::HardDrop).cloned() {
                    clips.insert(Sound::Lock, drop);
                }
            }

            let music = read_clip(&assets.join(MUSIC_FILE))
                .inspect_err(|err| warn!(%err, "no background music"))
                .ok();

            Ok(Self {
                _stream: stream,
                handle,
                clips,
                music,
                music_sink: None,
            })
        }

        pub fn play(&mut self, sound: Sound) -> Result<(), AudioError> {
            let Some(bytes) = self.clips.get(&sound) else {
                return Ok(());
            };
            let sink = Sink::try_new(&self.handle)?;
            sink.append(Decoder::new(Cursor::new(Arc::clone(bytes)))?);
            sink.detach();
            Ok(())
        }

        pub fn music(&mut self, cue: MusicCue) -> Result<(), AudioError> {
            match cue {
                MusicCue::Play => {
                    if let Some(old) = self.music_sink.take() {
                        old.stop();
                    }
                    let Some(bytes) = self.music.as_ref() else {
                        return Ok(());
                    };
                    let sink = Sink::try_new(&self.handle)?;
                    sink.set_volume(MUSIC_VOLUME);
                    sink.append(Decoder::new_looped(Cursor::new(Arc::clone(bytes)))?);
                    self.music_sink = Some(sink);
                }
                MusicCue::Pause => {
                    if let Some(sink) = &self.music_sink {
                        sink.pause();
                    }
                }
                MusicCue::Resume => {
                    if let Some(sink) = &self.music_sink {
                        sink.play();
                    }
                }
                MusicCue::Stop => {
                    if let Some(sink) = self.music_sink.take() {
                        sink.stop();
                    }
                }
            }
            Ok(())
        }
    }
}

/// Stand-in when built without `audio`; never constructed.
#[cfg(not(feature = "audio"))]
enum Backend {}

#[cfg(not(feature = "audio"))]
use crate::session::MusicCue;

#[cfg(not(feature = "audio"))]
impl Backend {
    fn open(_assets: &Path) -> Result<Self, AudioError> {
        Err(AudioError::Unsupported)
    }

    fn play(&mut self, _sound: Sound) -> Result<(), AudioError> {
        match *self {}
    }

    fn music(&mut self, _cue: MusicCue) -> Result<(), AudioError> {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::session::MusicCue;

    #[test]
    fn test_muted_audio_ignores_signals() {
        let mut audio = Audio::new(Path::new("assets"), false);
        assert!(!audio.is_enabled());
        for signal in [
            Signal::Sound(Sound::Rotate),
            Signal::Music(MusicCue::Play),
            Signal::Music(MusicCue::Stop),
            Signal::Shatter {
                col: 0,
                row: 0,
                color: Rgb::WHITE,
            },
        ] {
            audio.handle(&signal);
        }
    }

    #[test]
    fn test_clip_files() {
        assert_eq!(clip_file(Sound::HardDrop), "drop.wav");
        assert_eq!(clip_file(Sound::Lock), "lock.wav");
        assert_eq!(clip_file(Sound::LineClear), "line_clear.wav");
    }

    #[test]
    fn test_read_clip_reports_path() {
        let err = read_clip(Path::new("/nonexistent/rotate.wav")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rotate.wav"));
    }
}
