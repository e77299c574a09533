//! # Frame Loop Demo
//!
//! Demonstrates:
//! - Acquiring pooled command buffers from several threads at once
//! - Uploading vertex data through a transfer buffer in a copy pass
//! - Rendering to a swapchain texture in a render pass
//! - Cancelling a frame when no swapchain texture is available
//! - Leak reports for command buffers that are dropped instead of submitted
//!
//! Runs on the dummy backend, so no GPU or window is needed:
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin frame_loop -- --threads 4 --frames 120 --leak
//! ```

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use clap::Parser;
use glam::Mat4;
use lilium_gpu::{
    BufferDescriptor, BufferUsage, Color, ColorTargetInfo, DataBuffer, Device, DeviceDescriptor,
    DummyBackend, GpuError, GraphicsPipeline, GraphicsPipelineDescriptor, ShaderCode,
    TextureFormat, TransferBuffer, TransferBufferDescriptor, WindowId,
};

/// Records frames from several threads on the dummy backend.
#[derive(Debug, clap::Parser)]
#[command(name = "frame_loop")]
struct Args {
    /// Number of recording threads.
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Frames recorded by each thread.
    #[arg(long, default_value_t = 120)]
    frames: usize,

    /// Drop one command buffer without submitting it.
    #[arg(long)]
    leak: bool,

    /// Pretend every n-th frame finds no swapchain texture (0 = never).
    #[arg(long, default_value_t = 0)]
    skip_every: usize,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 4],
}

const TRIANGLE: [Vertex; 3] = [
    Vertex {
        position: [0.0, 0.5, 0.0],
        color: [1.0, 0.0, 0.0, 1.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0, 1.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 0.0, 1.0, 1.0],
    },
];

const VERTEX_BYTES: u64 = std::mem::size_of::<[Vertex; 3]>() as u64;

/// Resources owned by one recording thread.
struct ThreadResources {
    window: WindowId,
    staging: Arc<TransferBuffer>,
    vertices: Arc<DataBuffer>,
}

impl ThreadResources {
    fn new(device: &Device, index: usize) -> Result<Self, GpuError> {
        let staging = device.create_transfer_buffer(
            &TransferBufferDescriptor::upload(VERTEX_BYTES)
                .with_label(format!("staging #{index}")),
        )?;
        let vertices = device.create_data_buffer(
            &BufferDescriptor::new(VERTEX_BYTES, BufferUsage::VERTEX)
                .with_label(format!("triangle #{index}")),
        )?;

        Ok(Self {
            window: WindowId(index as u64 + 1),
            staging,
            vertices,
        })
    }
}

/// Outcome of one frame.
enum Frame {
    Presented,
    Skipped,
}

fn record_frame(
    device: &Device,
    pipeline: &GraphicsPipeline,
    resources: &ThreadResources,
    frame: usize,
) -> Result<Frame, GpuError> {
    let mut cmd = device.acquire_command_buffer()?;

    let Some(swapchain) = cmd.acquire_swapchain_texture(resources.window)? else {
        cmd.cancel().map_err(|e| e.error)?;
        return Ok(Frame::Skipped);
    };

    resources.staging.write_slice(0, &TRIANGLE)?;
    let mut copy = cmd.begin_copy_pass()?;
    copy.upload_to_buffer(
        &resources.staging,
        0,
        &resources.vertices,
        0,
        VERTEX_BYTES,
        true,
    )?;
    copy.end();

    let angle = frame as f32 * std::f32::consts::TAU / 120.0;
    cmd.push_vertex_uniform_matrix(0, &Mat4::from_rotation_z(angle));

    let target = ColorTargetInfo::new(&swapchain).with_clear(Color::CORNFLOWER_BLUE);
    let mut pass = cmd.begin_render_pass(None, &[target])?;
    pass.bind_pipeline(pipeline);
    pass.bind_vertex_buffer(0, &resources.vertices, 0)?;
    pass.draw_primitives(3, 1, 0, 0)?;
    pass.end();

    cmd.submit();
    Ok(Frame::Presented)
}

fn run_thread(
    device: &Device,
    pipeline: &GraphicsPipeline,
    backend: &DummyBackend,
    index: usize,
    args: &Args,
) -> Result<(usize, usize), GpuError> {
    let resources = ThreadResources::new(device, index)?;
    let (mut presented, mut skipped) = (0, 0);

    for frame in 0..args.frames {
        // Availability is global on the dummy backend; only thread 0 toggles it.
        if index == 0 && args.skip_every > 0 {
            backend.set_swapchain_available(frame % args.skip_every != 0);
        }

        match record_frame(device, pipeline, &resources, frame)? {
            Frame::Presented => presented += 1,
            Frame::Skipped => skipped += 1,
        }

        if index == 0 {
            lilium_core::frame_mark!();
            lilium_core::profile_plot!(
                "leased command buffers",
                device.command_buffer_stats().leased
            );
        }
    }

    Ok((presented, skipped))
}

fn main() -> Result<(), GpuError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    lilium_gpu::init();

    let args = Args::parse();
    log::info!("Running {args:?}");

    let backend = Arc::new(DummyBackend::new());
    let device = Device::new(
        backend.clone(),
        &DeviceDescriptor::new("Frame Loop")
            .with_initial_command_buffers(args.threads)
            .with_initial_render_passes(args.threads),
    );

    let pipeline = device.create_graphics_pipeline(
        &GraphicsPipelineDescriptor::new(
            ShaderCode::new(vec![0u8; 4]).with_uniform_buffers(1),
            ShaderCode::new(vec![0u8; 4]),
            TextureFormat::Bgra8Unorm,
        )
        .with_vertex_buffer(std::mem::size_of::<Vertex>() as u32)
        .with_label("triangle"),
    )?;

    let results = std::thread::scope(|s| {
        let handles: Vec<_> = (0..args.threads)
            .map(|index| {
                let (device, pipeline, backend, args) = (&device, &pipeline, &backend, &args);
                s.spawn(move || run_thread(device, pipeline, backend, index, args))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    if args.leak {
        let cmd = device.acquire_command_buffer()?;
        log::info!("Dropping {cmd:?} without submitting it");
        drop(cmd);
    }

    let presented: usize = results.iter().map(|(p, _)| p).sum();
    let skipped: usize = results.iter().map(|(_, s)| s).sum();
    let command_buffers = device.command_buffer_stats();
    let render_passes = device.render_pass_stats();

    println!("frames presented:      {presented}");
    println!("frames skipped:        {skipped}");
    println!(
        "command buffers:       {} created, {} available, {} leaked",
        command_buffers.created, command_buffers.available, command_buffers.leaked
    );
    println!(
        "render pass states:    {} created, {} available",
        render_passes.created, render_passes.available
    );
    println!(
        "native calls:          {} ({} live command buffers)",
        backend.calls().len(),
        backend.live_command_buffers()
    );

    device.dispose();
    Ok(())
}
