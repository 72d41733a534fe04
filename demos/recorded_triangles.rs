//! Runs the three-triangle scene on the recording backend and prints the
//! command stream of each frame.
//!
//! Culling toggles on for the second frame to show the state change.

use glint::gfx::backend::Command;
use glint::prelude::*;

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let config = RenderConfig::default().with_viewport(320, 256);
    let device = RecordingDevice::new(config.width, config.height);
    let mut render_loop = RenderLoop::setup(
        device,
        &ShaderLibrary::with_defaults(),
        &config,
        SceneDescription::triangles(),
    )?;

    println!("-- setup");
    print_commands(&render_loop.device_mut().take_commands());

    let mut scheduler = ManualScheduler::new();
    let switches = [
        StaticToggles::default(),
        StaticToggles {
            culling: Some(true),
            ..Default::default()
        },
    ];
    for toggles in &switches {
        let stats = render_loop.frame(&mut scheduler, toggles)?;
        println!("-- frame {} ({} draws)", stats.frame, stats.draw_calls);
        print_commands(&render_loop.device_mut().take_commands());
    }

    let mut device = render_loop.teardown();
    println!("-- teardown");
    print_commands(&device.take_commands());
    Ok(())
}

fn print_commands(commands: &[Command]) {
    for command in commands {
        match command {
            Command::Draw(draw) => println!(
                "  Draw {:?} first={} count={} program={} cull={}",
                draw.mode,
                draw.first,
                draw.count,
                draw.program.id(),
                draw.raster.cull_face
            ),
            other => println!("  {other:?}"),
        }
    }
}
