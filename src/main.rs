//! Capture Resolver - Demo Entry Point
//!
//! Resolves a single-frame raw capture that wants a JPEG and a thumbnail with
//! noise reduction, then prints the resulting plan as JSON.
//!
//! Usage: `capture-resolver [CONFIG]`

use anyhow::Context;
use capture_resolver::{
    config::ResolverConfig,
    pipeline::{
        BufferId, FeatureId, FeatureInference, HeapBuffer, MetadataBlock, MetadataId,
        RequestParam,
    },
    types::{ImageFormat, Size},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SENSOR_SIZE: Size = Size::new(4000, 3000);
const RESIZED_SIZE: Size = Size::new(1280, 960);
const LCS_SIZE: Size = Size::new(64, 48);
const THUMBNAIL_SIZE: Size = Size::new(320, 240);

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,capture_resolver=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!("Loading resolver config from {}", path);
            ResolverConfig::load(&path).with_context(|| format!("Failed to load {}", path))?
        }
        None => ResolverConfig::default(),
    };

    let inference = FeatureInference::from_config(&config)
        .context("Failed to build resolver")?
        .with_builtin_nodes();
    tracing::debug!("{:?}", inference);

    let mut request = inference.new_request();
    request.add_parameter(RequestParam::RequestNum, 1);
    request.add_parameter(RequestParam::FrameNum, 1);
    request.add_parameter(RequestParam::FrameCount, 1);
    request.add_parameter(RequestParam::FrameIndex, 0);
    request.add_feature(FeatureId::NR);

    let inputs = [
        (BufferId::MAIN_IN_FULL_RAW, SENSOR_SIZE, ImageFormat::Bayer10),
        (BufferId::MAIN_IN_RSZ_RAW, RESIZED_SIZE, ImageFormat::Bayer10),
        (BufferId::MAIN_IN_LCS, LCS_SIZE, ImageFormat::Stat),
        (BufferId::MAIN_OUT_JPEG, SENSOR_SIZE, ImageFormat::Jpeg),
        (BufferId::MAIN_OUT_THUMBNAIL, THUMBNAIL_SIZE, ImageFormat::Yv12),
    ];
    for (id, size, format) in inputs {
        request.add_buffer(id, Arc::new(HeapBuffer::new(size, format)));
    }
    for id in [
        MetadataId::MAIN_IN_P1_DYNAMIC,
        MetadataId::MAIN_IN_APP,
        MetadataId::MAIN_IN_HAL,
        MetadataId::MAIN_OUT_APP,
        MetadataId::MAIN_OUT_HAL,
    ] {
        request.add_metadata(id, Arc::new(MetadataBlock::new()));
    }

    let plan = inference
        .evaluate(&mut request)
        .context("Failed to resolve capture request")?;

    let snapshot = plan.snapshot(inference.path_table());
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
