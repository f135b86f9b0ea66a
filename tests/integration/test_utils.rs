//! Test utilities for integration tests.
//!
//! This module provides an in-memory image engine that plans crops from
//! fixed dimensions, records every call, and can inject failures.

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use iiif_tiler::engine::scratch_file_name;
use iiif_tiler::{CroppedTile, EngineError, ImageEngine};

// =============================================================================
// Recorded Calls
// =============================================================================

/// One call made against the fake engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Probe,
    CropGrid { crop_size: u32 },
    Resize { width: u32, height: u32, output: PathBuf },
    ResizeFull { width: u32, output: PathBuf },
}

// =============================================================================
// Fake Engine
// =============================================================================

/// An engine that never touches pixels.
///
/// Crops are empty files named `<x>,<y>,<w>,<h>.png`; resized outputs are
/// text files holding `<w>x<h>`, so tests can check sizes by reading them.
pub struct FakeEngine {
    width: u32,
    height: u32,
    available: bool,
    probe_output: Option<String>,
    widen_last_crop_at: Option<u32>,
    drop_first_crop_at: Option<u32>,
    fail_resize_call: Option<usize>,
    fail_full_width: Option<u32>,
    resize_calls: AtomicUsize,
    calls: Mutex<Vec<EngineCall>>,
    scratch_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeEngine {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            available: true,
            probe_output: None,
            widen_last_crop_at: None,
            drop_first_crop_at: None,
            fail_resize_call: None,
            fail_full_width: None,
            resize_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            scratch_dirs: Mutex::new(Vec::new()),
        }
    }

    /// Engine whose binary cannot be found.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(0, 0)
        }
    }

    /// Make the probe report unparseable output.
    pub fn with_probe_output(mut self, output: impl Into<String>) -> Self {
        self.probe_output = Some(output.into());
        self
    }

    /// Report the last crop one pixel wider at this crop size.
    pub fn with_wide_last_crop(mut self, crop_size: u32) -> Self {
        self.widen_last_crop_at = Some(crop_size);
        self
    }

    /// Omit the first crop at this crop size.
    pub fn with_missing_first_crop(mut self, crop_size: u32) -> Self {
        self.drop_first_crop_at = Some(crop_size);
        self
    }

    /// Fail the nth (1-based) tile resize.
    pub fn failing_resize(mut self, call: usize) -> Self {
        self.fail_resize_call = Some(call);
        self
    }

    /// Fail the full-image derivative at this width.
    pub fn failing_full_size(mut self, width: u32) -> Self {
        self.fail_full_width = Some(width);
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scratch_dirs(&self) -> Vec<PathBuf> {
        self.scratch_dirs.lock().unwrap().clone()
    }

    pub fn crop_sizes(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::CropGrid { crop_size } => Some(crop_size),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ImageEngine for FakeEngine {
    async fn check_available(&self) -> Result<(), EngineError> {
        if self.available {
            Ok(())
        } else {
            Err(EngineError::Unavailable("convert: not found".to_string()))
        }
    }

    async fn probe_dimensions(&self, _path: &Path) -> Result<(u32, u32), EngineError> {
        self.record(EngineCall::Probe);
        if !self.available {
            return Err(EngineError::Unavailable("identify: not found".to_string()));
        }
        if let Some(ref output) = self.probe_output {
            return Err(EngineError::UnparseableDimensions {
                output: output.clone(),
            });
        }
        Ok((self.width, self.height))
    }

    async fn crop_grid(
        &self,
        _path: &Path,
        crop_size: u32,
        scratch_dir: &Path,
    ) -> Result<Vec<CroppedTile>, EngineError> {
        self.record(EngineCall::CropGrid { crop_size });
        self.scratch_dirs
            .lock()
            .unwrap()
            .push(scratch_dir.to_path_buf());

        let mut crops = Vec::new();
        for y in (0..self.height).step_by(crop_size as usize) {
            for x in (0..self.width).step_by(crop_size as usize) {
                let width = crop_size.min(self.width - x);
                let height = crop_size.min(self.height - y);
                let path = scratch_dir.join(scratch_file_name(x, y, width, height));
                std::fs::write(&path, b"")?;
                crops.push(CroppedTile {
                    x,
                    y,
                    width,
                    height,
                    path,
                });
            }
        }

        if self.widen_last_crop_at == Some(crop_size) {
            if let Some(last) = crops.last_mut() {
                last.width += 1;
            }
        }
        if self.drop_first_crop_at == Some(crop_size) && !crops.is_empty() {
            crops.remove(0);
        }

        Ok(crops)
    }

    async fn resize(
        &self,
        input: &Path,
        width: u32,
        height: u32,
        output: &Path,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::Resize {
            width,
            height,
            output: output.to_path_buf(),
        });
        let n = self.resize_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_resize_call == Some(n) {
            return Err(EngineError::CommandFailed {
                command: format!("convert {}", input.display()),
                message: "exit status: 1".to_string(),
            });
        }
        if !input.exists() {
            return Err(EngineError::Io(format!("missing crop {}", input.display())));
        }
        std::fs::write(output, format!("{}x{}", width, height))?;
        Ok(())
    }

    async fn resize_full_image(
        &self,
        _path: &Path,
        width: u32,
        output: &Path,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::ResizeFull {
            width,
            output: output.to_path_buf(),
        });
        if self.fail_full_width == Some(width) {
            return Err(EngineError::CommandFailed {
                command: format!("convert -resize {}x", width),
                message: "exit status: 1".to_string(),
            });
        }
        std::fs::write(output, format!("{}x", width))?;
        Ok(())
    }
}

// =============================================================================
// Filesystem Helpers
// =============================================================================

/// All files under `root`, relative to it, sorted.
pub fn list_files(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }

    let mut files = Vec::new();
    if root.exists() {
        walk(root, root, &mut files);
    }
    files.sort();
    files
}

/// Region tiles only (excludes `full/` and `info.json`).
pub fn region_tiles(root: &Path) -> Vec<String> {
    list_files(root)
        .into_iter()
        .filter(|f| !f.starts_with("full/") && f != "info.json")
        .collect()
}

/// Write a gradient PNG for engines that really decode.
pub fn write_gradient_png(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * 3 + y) % 256) as u8])
    });
    img.save(path).unwrap();
}
