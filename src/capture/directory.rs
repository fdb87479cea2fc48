//! Directory replay source.
//!
//! Replays the still images (`.jpg`, `.jpeg`, `.png`) found in a local
//! directory, one per poll, in file-name order. Useful for replaying a
//! recorded attempt against a verifier without a camera attached.
//!
//! All file reads and decodes happen in `acquire()`. Frames are scaled to the
//! preferred capture size there and served from memory, so polling never
//! touches the filesystem.

use image::imageops::{self, FilterType};
use log::{info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{CaptureError, CaptureSource, Frame};

/// Still-image replay source.
pub struct DirectorySource {
    dir: PathBuf,
    /// Preferred frame size; 0 in either dimension keeps the native size
    width: u32,
    height: u32,
    frames: Vec<Frame>,
    next: usize,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            dir: dir.into(),
            width,
            height,
            frames: Vec::new(),
            next: 0,
        }
    }

    fn scan(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
        let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
            _ => CaptureError::NoDevice,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_still_image(path))
            .collect();
        files.sort();
        Ok(files)
    }

    fn load(&self, path: &Path) -> Option<Frame> {
        let image = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!("Skipping unreadable frame {}: {}", path.display(), e);
                return None;
            }
        };

        let keep_native = self.width == 0
            || self.height == 0
            || image.dimensions() == (self.width, self.height);
        if keep_native {
            return Some(Frame::new(image));
        }
        Some(Frame::new(imageops::resize(
            &image,
            self.width,
            self.height,
            FilterType::Triangle,
        )))
    }
}

fn is_still_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

impl CaptureSource for DirectorySource {
    fn acquire(&mut self) -> Result<(), CaptureError> {
        let files = Self::scan(&self.dir)?;
        let frames: Vec<Frame> = files.iter().filter_map(|path| self.load(path)).collect();
        if frames.is_empty() {
            return Err(CaptureError::NoDevice);
        }

        self.frames = frames;
        self.next = 0;
        info!(
            "📷 Loaded {} frames from {} at {}x{}",
            self.frames.len(),
            self.dir.display(),
            self.frames[0].width(),
            self.frames[0].height()
        );
        Ok(())
    }

    fn current_frame(&mut self) -> Option<Frame> {
        if self.frames.is_empty() {
            return None;
        }
        let frame = self.frames[self.next % self.frames.len()].clone();
        self.next = self.next.wrapping_add(1);
        Some(frame)
    }

    fn release(&mut self) {
        self.frames.clear();
        self.next = 0;
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}
