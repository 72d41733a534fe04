//! Renders the tumbling torus offscreen through wgpu.
//!
//! ```text
//! cargo run --example headless_torus -- [frames]
//! ```

use anyhow::Context;
use glint::prelude::*;
use log::info;

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::with_filter("info,wgpu_core=warn,wgpu_hal=warn"));

    let frames: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("frame count must be a number")?,
        None => 120,
    };

    let config = RenderConfig::default()
        .with_clear_color([0.05, 0.05, 0.08, 1.0])
        .with_depth_test(true);
    let device = pollster::block_on(WgpuDevice::headless(config.width, config.height))
        .context("no usable GPU adapter")?;

    let scene = SceneDescription::torus(TorusParams::default(), &mut rand::rng());
    let mut render_loop = RenderLoop::setup(device, &ShaderLibrary::with_defaults(), &config, scene)?;

    let mut scheduler = ManualScheduler::new();
    let mut vertices = 0u64;
    for _ in 0..frames {
        let stats = render_loop.frame(&mut scheduler, &())?;
        vertices += u64::from(stats.vertices);
        scheduler.take_request();
    }

    let device = render_loop.teardown();
    info!(
        "rendered {} frames ({} vertices) with {} cached pipelines",
        device.frames_submitted(),
        vertices,
        device.cached_pipelines()
    );
    Ok(())
}
