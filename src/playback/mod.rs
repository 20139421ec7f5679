//! Playback Dispatch
//!
//! Maps triggered keys to clips and hands them to a dedicated playback thread
//! so the frame loop never waits on the audio device.

pub mod output;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PlaybackSettings;
use crate::error::PlaybackError;
pub use output::{Clip, ClipLibrary, NullOutput, RodioOutput, SoundOutput};

/// How key indexes select clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Every key plays the first clip
    #[default]
    Uniform,
    /// Key `i` plays clip `i`, wrapping around the clip count
    PerKey,
    /// Clips are stretched evenly across the whole keyboard
    Spread,
}

impl SelectionPolicy {
    /// Clip for `key` on a keyboard of `total_keys`, or `None` when no clip
    /// can be chosen
    pub fn clip_for(&self, key: usize, total_keys: usize, clip_count: usize) -> Option<usize> {
        if clip_count == 0 || key >= total_keys {
            return None;
        }
        let clip = match self {
            Self::Uniform => 0,
            Self::PerKey => key % clip_count,
            Self::Spread => key * clip_count / total_keys,
        };
        Some(clip)
    }
}

/// Messages for the playback thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    /// Start a clip for a key
    Play { key: usize, clip: usize },
    /// Stop the thread
    Shutdown,
}

/// Issues sound triggers to the playback thread
pub struct PlaybackDispatcher {
    sender: Sender<PlaybackCommand>,
    clip_count: usize,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackDispatcher {
    /// Start a playback thread whose output is built by `make_output` on that
    /// thread. If building fails, triggers are logged and dropped.
    pub fn spawn<F>(clip_count: usize, make_output: F) -> Self
    where
        F: FnOnce() -> Result<Box<dyn SoundOutput>, PlaybackError> + Send + 'static,
    {
        let (sender, receiver) = unbounded();
        let worker = std::thread::Builder::new()
            .name("playback".into())
            .spawn(move || run_worker(receiver, make_output));

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to start playback thread: {}", e);
                None
            }
        };

        Self {
            sender,
            clip_count,
            worker,
        }
    }

    /// Dispatcher playing `library` on the default audio device
    pub fn with_rodio(library: ClipLibrary, volume: f32) -> Self {
        let clip_count = library.len();
        Self::spawn(clip_count, move || {
            RodioOutput::open(library, volume).map(|o| Box::new(o) as Box<dyn SoundOutput>)
        })
    }

    /// Dispatcher that accepts triggers but makes no sound
    pub fn muted(clip_count: usize) -> Self {
        Self::spawn(clip_count, || Ok(Box::new(NullOutput) as Box<dyn SoundOutput>))
    }

    /// Dispatcher for a session, or `None` when playback is disabled.
    ///
    /// A missing or unreadable sound directory leaves the session running
    /// with no clips. With `mute` the clip count still comes from `sounds_dir`
    /// (at least 1) so clip selection shows up in the logs.
    pub fn for_session(settings: &PlaybackSettings, sounds_dir: &Path, mute: bool) -> Option<Self> {
        if !settings.enabled {
            info!("Playback disabled in configuration");
            return None;
        }

        let library = ClipLibrary::load(sounds_dir).unwrap_or_else(|e| {
            warn!("Cannot load sound clips: {}", e);
            ClipLibrary::default()
        });

        if mute {
            let clip_count = library.len().max(1);
            info!("Sound muted ({} clips)", clip_count);
            return Some(Self::muted(clip_count));
        }
        if library.is_empty() {
            warn!("No sound clips in {:?}, keys will be silent", sounds_dir);
            return Some(Self::muted(0));
        }
        Some(Self::with_rodio(library, settings.volume))
    }

    /// Number of clips available to the selection policy
    pub fn clip_count(&self) -> usize {
        self.clip_count
    }

    /// Queue one playback command per triggered key. Returns how many were
    /// queued; never blocks.
    pub fn play_keys(&self, total_key_count: usize, triggered: &[usize], policy: SelectionPolicy) -> usize {
        if triggered.is_empty() {
            return 0;
        }
        if self.clip_count == 0 {
            warn!("No clips loaded, ignoring keys {:?}", triggered);
            return 0;
        }

        let mut sent = 0;
        for &key in triggered {
            let Some(clip) = policy.clip_for(key, total_key_count, self.clip_count) else {
                warn!("Key {} outside keyboard of {} keys", key, total_key_count);
                continue;
            };
            match self.sender.send(PlaybackCommand::Play { key, clip }) {
                Ok(()) => sent += 1,
                Err(_) => {
                    warn!("{}", PlaybackError::WorkerGone);
                    break;
                }
            }
        }
        sent
    }
}

impl Drop for PlaybackDispatcher {
    fn drop(&mut self) {
        let _ = self.sender.send(PlaybackCommand::Shutdown);

        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker<F>(receiver: Receiver<PlaybackCommand>, make_output: F)
where
    F: FnOnce() -> Result<Box<dyn SoundOutput>, PlaybackError>,
{
    let mut output = match make_output() {
        Ok(output) => Some(output),
        Err(e) => {
            error!("Sound output unavailable, playing nothing: {}", e);
            None
        }
    };
    info!("Playback thread started");

    for command in receiver.iter() {
        match command {
            PlaybackCommand::Play { key, clip } => match output.as_mut() {
                Some(out) => {
                    debug!("Key {} -> clip {}", key, clip);
                    if let Err(e) = out.play(clip) {
                        warn!("Failed to play clip {} for key {}: {}", clip, key, e);
                    }
                }
                None => debug!("Dropping key {} (no output)", key),
            },
            PlaybackCommand::Shutdown => break,
        }
    }

    info!("Playback thread exiting");
}
