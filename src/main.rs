//! iiif-tiler - IIIF Image API Level-0 static file generator.
//!
//! This binary parses arguments, picks an engine and runs one build.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iiif_tiler::{
    Config, EngineKind, ImageEngine, MagickEngine, NativeEngine, PyramidBuilder,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match config.engine {
        EngineKind::Magick => {
            let engine = MagickEngine::new()
                .with_binaries(&config.convert_bin, &config.identify_bin)
                .with_quality(config.quality);
            run(engine, &config).await
        }
        EngineKind::Native => run(NativeEngine::new().with_quality(config.quality), &config).await,
    }
}

async fn run<E: ImageEngine + 'static>(engine: E, config: &Config) -> ExitCode {
    let identifier = config.resolved_identifier();

    info!("Configuration:");
    info!("  Source: {}", config.source.display());
    info!("  Output: {}", config.output.display());
    info!("  Identifier: {}", identifier);
    info!("  Tile size: {}", config.tile_size);
    info!("  Engine: {:?} (quality {})", config.engine, config.quality);
    info!("  Rounding: {:?}", config.rounding);
    info!("  Jobs: {}", config.effective_jobs());

    let mut builder = PyramidBuilder::new(engine, config.pyramid_config())
        .with_jobs(config.effective_jobs());
    if let Some(ref scratch) = config.scratch_dir {
        builder = builder.with_scratch_dir(scratch);
    }

    match builder.build(&config.source, &config.output, &identifier).await {
        Ok(manifest) => {
            info!(
                "Done: {} scale factor(s), {} size(s)",
                manifest.scale_factors().len(),
                manifest.sizes.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            error!("The output directory may hold a partial tile tree; discard it before retrying");
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "iiif_tiler=debug"
    } else {
        "iiif_tiler=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
