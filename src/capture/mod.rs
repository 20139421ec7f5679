//! Frame Acquisition Layer
//!
//! The engine only needs a stream of RGB frames. Live cameras plug in through
//! [`FrameSource`]; [`DirectoryFrameSource`] replays a recorded session from
//! image files so the pipeline can run offline.

pub mod frame;

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SourceError;
use crate::storage::list_files_with_extensions;
use frame::CapturedFrame;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Anything that can deliver camera frames in order
pub trait FrameSource {
    /// Next frame, or `None` when the stream has ended
    fn next_frame(&mut self) -> Option<Result<CapturedFrame, SourceError>>;
}

/// Replays image files from a directory in file-name order
pub struct DirectoryFrameSource {
    files: Vec<PathBuf>,
    cursor: usize,
    mirror: bool,
}

impl DirectoryFrameSource {
    /// Open a directory of frames
    pub fn open(dir: &Path, mirror: bool) -> Result<Self, SourceError> {
        if !dir.is_dir() {
            return Err(SourceError::MissingDir(dir.to_path_buf()));
        }

        let files = list_files_with_extensions(dir, FRAME_EXTENSIONS)?;
        info!("Found {} frames in {:?}", files.len(), dir);

        Ok(Self {
            files,
            cursor: 0,
            mirror,
        })
    }

    /// Number of frames in the session
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the directory held no frames
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> Option<Result<CapturedFrame, SourceError>> {
        let path = self.files.get(self.cursor)?.clone();
        let index = self.cursor as u64;
        self.cursor += 1;

        debug!("Loading frame {} from {:?}", index, path);
        let result = image::open(&path)
            .map(|img| {
                let frame = CapturedFrame::new(img.to_rgb8(), index);
                if self.mirror {
                    frame.mirrored()
                } else {
                    frame
                }
            })
            .map_err(|source| SourceError::Decode { path, source });
        Some(result)
    }
}
