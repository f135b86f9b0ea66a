//! Pyramid builder: drives the engine through a full Level-0 tile tree.
//!
//! # Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        PyramidBuilder                           │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                      build()                            │    │
//! │  │  1. Check engine       4. Check crops, regularize,      │    │
//! │  │  2. Probe + plan          resize into region dirs       │    │
//! │  │  3. Crop grid per sf   5. Full-image derivatives        │    │
//! │  │                        6. Write info.json               │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │        │                     │                      │           │
//! │        ▼                     ▼                      ▼           │
//! │  ┌────────────┐      ┌──────────────┐      ┌────────────────┐   │
//! │  │ PyramidPlan│      │ ImageEngine  │      │    Manifest    │   │
//! │  └────────────┘      └──────────────┘      └────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each scale factor and each derivative width is an independent job
//! writing to its own directories. Jobs run on a [`JoinSet`] gated by a
//! semaphore, one at a time unless [`PyramidBuilder::with_jobs`] says
//! otherwise. The first failing job aborts the rest.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::PyramidConfig;
use crate::engine::{CroppedTile, ImageEngine};
use crate::error::{EngineError, GenerationStage, PyramidError};
use crate::manifest::{write_manifest, Manifest};
use crate::plan::{regularize, PyramidPlan, RoundingPolicy, TileGeometry, TileGrid};

use super::layout;
use super::probe::probe;

// =============================================================================
// Jobs
// =============================================================================

/// Unit of work scheduled by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    ScaleLevel(u32),
    Downsize(u32),
}

/// Result of one finished job.
#[derive(Debug, Clone, Copy)]
enum JobOutcome {
    Tiles(usize),
    Derivative,
}

/// Read-only state shared by all jobs of one build.
#[derive(Debug)]
struct JobContext {
    source: PathBuf,
    output: PathBuf,
    plan: PyramidPlan,
    rounding: RoundingPolicy,
    scratch_root: Option<PathBuf>,
}

// =============================================================================
// PyramidBuilder
// =============================================================================

/// Builds a static tile pyramid with an [`ImageEngine`].
///
/// # Example
///
/// ```ignore
/// use iiif_tiler::{MagickEngine, PyramidBuilder, PyramidConfig};
///
/// let builder = PyramidBuilder::new(MagickEngine::new(), PyramidConfig::default());
/// let manifest = builder
///     .build(Path::new("scan.tif"), Path::new("out/scan"), "https://example.com/iiif/scan")
///     .await?;
/// println!("{} scale factors", manifest.scale_factors().len());
/// ```
pub struct PyramidBuilder<E: ImageEngine> {
    engine: Arc<E>,
    config: PyramidConfig,
    jobs: usize,
    scratch_root: Option<PathBuf>,
}

impl<E: ImageEngine + 'static> PyramidBuilder<E> {
    /// Create a builder that runs one job at a time.
    pub fn new(engine: E, config: PyramidConfig) -> Self {
        Self::with_shared_engine(Arc::new(engine), config)
    }

    /// Create a builder around an engine that is also used elsewhere.
    pub fn with_shared_engine(engine: Arc<E>, config: PyramidConfig) -> Self {
        Self {
            engine,
            config,
            jobs: 1,
            scratch_root: None,
        }
    }

    /// Allow up to `jobs` scale levels or derivatives in flight.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Put intermediate crops under `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    /// Check the engine, probe the source and plan its pyramid.
    ///
    /// Nothing is written.
    pub async fn plan(&self, source: &Path) -> Result<PyramidPlan, PyramidError> {
        self.config.validate()?;

        self.engine
            .check_available()
            .await
            .map_err(|e| PyramidError::EngineUnavailable(e.to_string()))?;

        let image = probe(self.engine.as_ref(), source).await?;
        if image.is_degenerate() {
            return Err(PyramidError::DegenerateImage {
                width: image.width,
                height: image.height,
            });
        }

        Ok(PyramidPlan::new(image, &self.config))
    }

    /// Generate the full tile tree and `info.json` for `source` in `output`.
    ///
    /// `info.json` is only written once every tile and derivative exists.
    /// On failure, files already written are left in place.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The engine is unavailable or the source cannot be probed
    /// - A crop disagrees with the planned grid
    /// - A tile would regularize to zero pixels
    /// - Any crop or resize invocation fails
    pub async fn build(
        &self,
        source: &Path,
        output: &Path,
        id: &str,
    ) -> Result<Manifest, PyramidError> {
        let plan = self.plan(source).await?;

        info!(
            "Source {}x{}: scale factors {:?}, sizes {:?}",
            plan.image.width, plan.image.height, plan.scale_factors, plan.downsize_levels
        );
        if plan.scale_factors.is_empty() {
            warn!(
                "Source is smaller than two tiles of {}px on its short side; no region tiles will be written",
                plan.tile_size
            );
        }

        tokio::fs::create_dir_all(output).await?;

        let manifest = Manifest::from_plan(id, &plan);
        let context = Arc::new(JobContext {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            plan,
            rounding: self.config.rounding,
            scratch_root: self.scratch_root.clone(),
        });

        let (tiles, derivatives) = self.run_jobs(context).await?;

        let path = write_manifest(output, &manifest).await?;
        info!(
            "Wrote {} tiles and {} derivatives; manifest at {}",
            tiles,
            derivatives,
            path.display()
        );

        Ok(manifest)
    }

    /// Run every job, stopping at the first failure.
    async fn run_jobs(&self, context: Arc<JobContext>) -> Result<(usize, usize), PyramidError> {
        let plan = &context.plan;
        let jobs: Vec<Job> = plan
            .scale_factors
            .iter()
            .map(|&sf| Job::ScaleLevel(sf))
            .chain(plan.downsize_levels.iter().map(|&w| Job::Downsize(w)))
            .collect();

        let permits = Arc::new(Semaphore::new(self.jobs));
        let mut set = JoinSet::new();

        for job in jobs {
            let engine = Arc::clone(&self.engine);
            let context = Arc::clone(&context);
            let permits = Arc::clone(&permits);

            set.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| PyramidError::Io(format!("job scheduler closed: {}", e)))?;
                run_job(engine.as_ref(), &context, job).await
            });
        }

        let mut tiles = 0;
        let mut derivatives = 0;

        while let Some(joined) = set.join_next().await {
            let failure = match joined {
                Ok(Ok(JobOutcome::Tiles(n))) => {
                    tiles += n;
                    continue;
                }
                Ok(Ok(JobOutcome::Derivative)) => {
                    derivatives += 1;
                    continue;
                }
                Ok(Err(e)) => e,
                Err(e) => PyramidError::Io(format!("job task failed: {}", e)),
            };

            error!("Aborting build: {}", failure);
            set.abort_all();
            // Let cancelled jobs drop their scratch directories before returning
            while set.join_next().await.is_some() {}
            return Err(failure);
        }

        Ok((tiles, derivatives))
    }
}

async fn run_job<E>(engine: &E, context: &JobContext, job: Job) -> Result<JobOutcome, PyramidError>
where
    E: ImageEngine + ?Sized,
{
    match job {
        Job::ScaleLevel(sf) => build_scale_level(engine, context, sf)
            .await
            .map(JobOutcome::Tiles),
        Job::Downsize(width) => build_derivative(engine, context, width)
            .await
            .map(|_| JobOutcome::Derivative),
    }
}

// =============================================================================
// Scale Levels
// =============================================================================

/// Crop, check, regularize and resize every tile of one scale factor.
async fn build_scale_level<E>(
    engine: &E,
    context: &JobContext,
    scale_factor: u32,
) -> Result<usize, PyramidError>
where
    E: ImageEngine + ?Sized,
{
    let stage = GenerationStage::ScaleFactor(scale_factor);
    let grid = context.plan.grid(scale_factor);
    let scratch = scratch_dir(context.scratch_root.as_deref(), scale_factor)?;

    info!(
        "Scale factor {}: cropping {}x{} grid of {}px crops",
        scale_factor,
        grid.columns(),
        grid.rows(),
        grid.crop_size()
    );

    let crops = engine
        .crop_grid(&context.source, grid.crop_size(), scratch.path())
        .await
        .map_err(|cause| generation_failed(stage, cause))?;

    check_crops(&grid, &crops)?;

    for crop in &crops {
        let tile = regularize(
            TileGeometry {
                scale_factor,
                x: crop.x,
                y: crop.y,
                raw_width: crop.width,
                raw_height: crop.height,
            },
            context.plan.tile_size,
            context.rounding,
        )?;

        let path = layout::tile_path(&context.output, &tile);
        create_parent(&path).await?;

        debug!(
            scale_factor,
            x = tile.x,
            y = tile.y,
            width = tile.output_width,
            height = tile.output_height,
            "Writing tile"
        );
        engine
            .resize(&crop.path, tile.output_width, tile.output_height, &path)
            .await
            .map_err(|cause| generation_failed(stage, cause))?;
    }

    scratch
        .close()
        .map_err(|e| PyramidError::Io(format!("failed to remove scratch crops: {}", e)))?;

    Ok(crops.len())
}

/// Verify the engine produced exactly one correctly sized crop per cell.
fn check_crops(grid: &TileGrid, crops: &[CroppedTile]) -> Result<(), PyramidError> {
    let scale_factor = grid.scale_factor();
    let mut seen = HashSet::with_capacity(crops.len());

    for crop in crops {
        let mismatch = |message: String| PyramidError::GeometryMismatch {
            scale_factor,
            x: crop.x,
            y: crop.y,
            message,
        };

        let cell = grid
            .cell_at(crop.x, crop.y)
            .ok_or_else(|| mismatch("offset is not on the tile grid".to_string()))?;

        if (cell.width, cell.height) != (crop.width, crop.height) {
            return Err(mismatch(format!(
                "expected {}x{}, engine produced {}x{}",
                cell.width, cell.height, crop.width, crop.height
            )));
        }

        if !seen.insert((cell.column, cell.row)) {
            return Err(mismatch("engine produced this crop twice".to_string()));
        }
    }

    if let Some(missing) = grid.cells().find(|c| !seen.contains(&(c.column, c.row))) {
        return Err(PyramidError::GeometryMismatch {
            scale_factor,
            x: missing.x,
            y: missing.y,
            message: "engine produced no crop for this cell".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Derivatives
// =============================================================================

async fn build_derivative<E>(
    engine: &E,
    context: &JobContext,
    width: u32,
) -> Result<(), PyramidError>
where
    E: ImageEngine + ?Sized,
{
    let path = layout::full_size_path(&context.output, width);
    create_parent(&path).await?;

    info!("Writing full-image derivative at width {}", width);
    engine
        .resize_full_image(&context.source, width, &path)
        .await
        .map_err(|cause| generation_failed(GenerationStage::DownsizeLevel(width), cause))
}

// =============================================================================
// Helpers
// =============================================================================

fn generation_failed(stage: GenerationStage, cause: EngineError) -> PyramidError {
    PyramidError::TileGenerationFailed { stage, cause }
}

/// Scoped directory for one scale level's crops; removed on drop.
fn scratch_dir(root: Option<&Path>, scale_factor: u32) -> Result<TempDir, PyramidError> {
    let prefix = format!("iiif-tiler-sf{}-", scale_factor);
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix);

    let dir = match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    };
    dir.map_err(|e| PyramidError::Io(format!("failed to create scratch directory: {}", e)))
}

async fn create_parent(path: &Path) -> Result<(), PyramidError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
