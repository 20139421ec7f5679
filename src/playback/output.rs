//! Sound outputs and clip loading
//!
//! Outputs live on the playback worker thread. The rodio backend owns the
//! audio device stream, which cannot cross threads, so it is built there from
//! a [`ClipLibrary`] moved in by the dispatcher.

use rodio::{Decoder, OutputStream, OutputStreamHandle, Source};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::PlaybackError;
use crate::storage::list_files_with_extensions;

const CLIP_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];

/// Something that can start clips by index without waiting for them
pub trait SoundOutput {
    /// Start clip `clip`; must return without waiting for it to finish
    fn play(&mut self, clip: usize) -> Result<(), PlaybackError>;
}

/// An encoded clip held in memory
#[derive(Debug, Clone)]
pub struct Clip {
    /// File name the clip was loaded from
    pub name: String,
    /// Encoded audio bytes
    pub data: Arc<[u8]>,
}

/// Clips loaded from a sound directory, in file-name order
#[derive(Debug, Clone, Default)]
pub struct ClipLibrary {
    clips: Vec<Clip>,
    source_dir: Option<PathBuf>,
}

impl ClipLibrary {
    /// Load every audio file in `dir`
    pub fn load(dir: &Path) -> Result<Self, PlaybackError> {
        if !dir.is_dir() {
            return Err(PlaybackError::MissingSoundDir(dir.to_path_buf()));
        }

        let files = list_files_with_extensions(dir, CLIP_EXTENSIONS).map_err(|source| {
            PlaybackError::ReadClip {
                path: dir.to_path_buf(),
                source,
            }
        })?;

        let mut clips = Vec::with_capacity(files.len());
        for path in files {
            let data = std::fs::read(&path).map_err(|source| PlaybackError::ReadClip {
                path: path.clone(),
                source,
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!("Loaded clip '{}' ({} bytes)", name, data.len());
            clips.push(Clip {
                name,
                data: data.into(),
            });
        }

        info!("Loaded {} clips from {:?}", clips.len(), dir);
        Ok(Self {
            clips,
            source_dir: Some(dir.to_path_buf()),
        })
    }

    /// Library from clips already in memory
    pub fn from_clips(clips: Vec<Clip>) -> Self {
        Self {
            clips,
            source_dir: None,
        }
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    /// Directory the clips came from
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }
}

/// Output that only logs; used when sound is disabled or no device exists
#[derive(Debug, Default)]
pub struct NullOutput;

impl SoundOutput for NullOutput {
    fn play(&mut self, clip: usize) -> Result<(), PlaybackError> {
        debug!("(muted) clip {}", clip);
        Ok(())
    }
}

/// Audio device output via rodio.
///
/// Each trigger is handed to the device mixer on its own, so clips overlap.
pub struct RodioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    library: ClipLibrary,
    volume: f32,
}

impl RodioOutput {
    /// Open the default output device
    pub fn open(library: ClipLibrary, volume: f32) -> Result<Self, PlaybackError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Device(e.to_string()))?;
        info!("Audio output opened ({} clips)", library.len());
        Ok(Self {
            _stream: stream,
            handle,
            library,
            volume: volume.clamp(0.0, 1.0),
        })
    }
}

impl SoundOutput for RodioOutput {
    fn play(&mut self, clip: usize) -> Result<(), PlaybackError> {
        let data = self
            .library
            .get(clip)
            .map(|c| c.data.clone())
            .ok_or(PlaybackError::ClipOutOfRange {
                index: clip,
                count: self.library.len(),
            })?;

        let decoder = Decoder::new(Cursor::new(data)).map_err(|e| PlaybackError::Decode {
            index: clip,
            message: e.to_string(),
        })?;

        self.handle
            .play_raw(decoder.amplify(self.volume).convert_samples())
            .map_err(|e| PlaybackError::Device(e.to_string()))
    }
}
