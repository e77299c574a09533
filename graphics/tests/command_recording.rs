//! Command recording integration tests.
//!
//! These tests drive the public API the way a renderer does and check the
//! native calls that reach the dummy backend, the state of the device's
//! pools, and the leak reports.
//!
//! # Test Categories
//!
//! - **Protocol Tests**: pass ordering, submit and cancel rules
//! - **Validation Tests**: argument checks before anything reaches the driver
//! - **Lifecycle Tests**: leaks, device disposal, native failures
//! - **Concurrency Tests**: many threads recording at once

mod common;

use std::sync::Arc;

use glam::Mat4;
use rstest::{fixture, rstest};

use common::{SWAPCHAIN_FORMAT, TestContext};
use lilium_gpu::{
    BackendOp, COMMAND_BUFFER_POOL_NAME, Color, ColorTargetInfo, DepthStencilTargetInfo, Device,
    DeviceDescriptor, DummyBackend, Extent3d, GpuError, IndexElementSize, SamplerDescriptor,
    TextureDescriptor, TextureFormat, TextureRegion, TextureUsage, WindowId,
};

const WINDOW: WindowId = WindowId(7);

#[fixture]
fn ctx() -> TestContext {
    TestContext::new()
}

// ============================================================================
// Protocol Tests
// ============================================================================

#[rstest]
fn test_frame_reaches_backend_in_order(ctx: TestContext) {
    let pipeline = ctx.create_pipeline();
    let vertices = ctx.create_vertex_buffer(36);
    ctx.backend.clear_calls();

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    let swapchain = cmd.acquire_swapchain_texture(WINDOW).unwrap().unwrap();
    assert_eq!(swapchain.format(), SWAPCHAIN_FORMAT);

    let target = ColorTargetInfo::new(&swapchain).with_clear(Color::CORNFLOWER_BLUE);
    let mut pass = cmd.begin_render_pass(None, &[target]).unwrap();
    pass.bind_pipeline(&pipeline);
    pass.bind_vertex_buffer(0, &vertices, 0).unwrap();
    pass.draw_primitives(3, 1, 0, 0).unwrap();
    pass.end();
    cmd.submit();

    assert_eq!(
        ctx.backend.ops(),
        vec![
            BackendOp::AcquireCommandBuffer,
            BackendOp::AcquireSwapchainTexture,
            BackendOp::BeginRenderPass,
            BackendOp::BindGraphicsPipeline,
            BackendOp::BindVertexBuffer,
            BackendOp::DrawPrimitives,
            BackendOp::EndRenderPass,
            BackendOp::SubmitCommandBuffer,
        ]
    );
    assert_eq!(ctx.backend.live_command_buffers(), 0);
    assert!(ctx.leaks().is_empty());
}

#[rstest]
fn test_command_buffer_state_is_reused(ctx: TestContext) {
    for _ in 0..5 {
        let mut cmd = ctx.device.acquire_command_buffer().unwrap();
        cmd.begin_copy_pass().unwrap().end();
        cmd.submit();
    }

    let stats = ctx.device.command_buffer_stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.available, 1);
    assert_eq!(stats.leased, 0);
    assert_eq!(ctx.backend.count(BackendOp::SubmitCommandBuffer), 5);
}

#[rstest]
#[case::forgotten_render_pass(true)]
#[case::forgotten_copy_pass(false)]
fn test_submit_ends_forgotten_pass(ctx: TestContext, #[case] render: bool) {
    let target = ctx.create_texture(64, 64, TextureUsage::COLOR_TARGET);
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();

    if render {
        let pass = cmd
            .begin_render_pass(None, &[ColorTargetInfo::new(&*target)])
            .unwrap();
        std::mem::forget(pass);
    } else {
        std::mem::forget(cmd.begin_copy_pass().unwrap());
    }
    assert!(cmd.has_open_pass());
    ctx.backend.clear_calls();

    cmd.submit();

    let end = if render {
        BackendOp::EndRenderPass
    } else {
        BackendOp::EndCopyPass
    };
    assert_eq!(ctx.backend.ops(), vec![end, BackendOp::SubmitCommandBuffer]);
    assert_eq!(ctx.device.render_pass_stats().leased, 0);
    assert!(ctx.leaks().is_empty());
}

#[rstest]
fn test_second_pass_rejected_while_forgotten_pass_open(ctx: TestContext) {
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    std::mem::forget(cmd.begin_copy_pass().unwrap());

    let target = ctx.create_texture(16, 16, TextureUsage::COLOR_TARGET);
    assert_eq!(
        cmd.begin_render_pass(None, &[ColorTargetInfo::new(&*target)])
            .unwrap_err(),
        GpuError::PassAlreadyOpen
    );
    assert_eq!(cmd.begin_copy_pass().unwrap_err(), GpuError::PassAlreadyOpen);
    assert_eq!(cmd.acquire_swapchain_texture(WINDOW), Err(GpuError::PassAlreadyOpen));

    cmd.submit();
    assert_eq!(ctx.backend.count(BackendOp::BeginCopyPass), 1);
    assert_eq!(ctx.backend.count(BackendOp::EndCopyPass), 1);
}

#[rstest]
fn test_passes_run_back_to_back(ctx: TestContext) {
    let target = ctx.create_texture(16, 16, TextureUsage::COLOR_TARGET);
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();

    cmd.begin_copy_pass().unwrap().end();
    {
        let _pass = cmd
            .begin_render_pass(None, &[ColorTargetInfo::new(&*target)])
            .unwrap();
    }
    cmd.begin_render_pass(None, &[ColorTargetInfo::new(&*target)])
        .unwrap()
        .end();
    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::BeginRenderPass), 2);
    assert_eq!(ctx.backend.count(BackendOp::EndRenderPass), 2);
    assert_eq!(ctx.device.render_pass_stats().created, 1);
}

#[rstest]
fn test_uniform_pushes_reach_backend(ctx: TestContext) {
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    cmd.push_vertex_uniform_matrix(0, &Mat4::IDENTITY);
    cmd.push_fragment_uniform_color(1, Color::WHITE);
    cmd.submit();

    let pushes: Vec<_> = ctx
        .backend
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            lilium_gpu::BackendCall::PushVertexUniformData { slot, data, .. }
            | lilium_gpu::BackendCall::PushFragmentUniformData { slot, data, .. } => {
                Some((slot, data.len()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(pushes, vec![(0, 64), (1, 16)]);
}

// ============================================================================
// Cancel Tests
// ============================================================================

#[rstest]
fn test_cancel_discards_commands(ctx: TestContext) {
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    cmd.begin_copy_pass().unwrap().end();
    cmd.cancel().unwrap();

    assert_eq!(ctx.backend.count(BackendOp::CancelCommandBuffer), 1);
    assert_eq!(ctx.backend.count(BackendOp::SubmitCommandBuffer), 0);
    assert_eq!(ctx.backend.live_command_buffers(), 0);
    assert_eq!(ctx.device.command_buffer_stats().available, 1);
}

#[rstest]
fn test_cancel_after_swapchain_acquire_hands_buffer_back(ctx: TestContext) {
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    assert!(cmd.acquire_swapchain_texture(WINDOW).unwrap().is_some());
    assert!(cmd.has_swapchain_texture());

    let err = cmd.cancel().unwrap_err();
    assert_eq!(err.error, GpuError::CancelAfterSwapchainAcquire);
    assert_eq!(ctx.backend.count(BackendOp::CancelCommandBuffer), 0);

    err.into_command_buffer().submit();
    assert_eq!(ctx.backend.count(BackendOp::SubmitCommandBuffer), 1);
    assert!(ctx.leaks().is_empty());
}

#[rstest]
fn test_cancel_allowed_when_no_swapchain_texture(ctx: TestContext) {
    ctx.backend.set_swapchain_available(false);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    assert_eq!(cmd.acquire_swapchain_texture(WINDOW), Ok(None));
    assert!(!cmd.has_swapchain_texture());

    cmd.cancel().unwrap();
    assert_eq!(ctx.backend.live_command_buffers(), 0);
}

#[rstest]
fn test_failed_native_cancel_hands_buffer_back(ctx: TestContext) {
    let cmd = ctx.device.acquire_command_buffer().unwrap();
    ctx.backend.fail_next(BackendOp::CancelCommandBuffer);

    let err = cmd.cancel().unwrap_err();
    assert!(matches!(
        err.error,
        GpuError::NativeFunctionFailed {
            function: "cancel_command_buffer",
            ..
        }
    ));

    let cmd = err.into_command_buffer();
    assert!(cmd.handle().is_some());
    cmd.submit();
    assert_eq!(ctx.backend.live_command_buffers(), 0);
}

// ============================================================================
// Validation Tests
// ============================================================================

#[rstest]
fn test_render_pass_needs_color_target(ctx: TestContext) {
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();

    assert_eq!(
        cmd.begin_render_pass(None, &[]).unwrap_err(),
        GpuError::NoColorTargets
    );
    assert_eq!(ctx.backend.count(BackendOp::BeginRenderPass), 0);
    assert!(!cmd.has_open_pass());
    cmd.submit();
}

#[rstest]
#[case::sampler_only(TextureUsage::SAMPLER)]
#[case::depth(TextureUsage::DEPTH_STENCIL_TARGET)]
fn test_color_target_needs_color_usage(ctx: TestContext, #[case] usage: TextureUsage) {
    let texture = ctx.create_texture(16, 16, usage);
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();

    let result = cmd.begin_render_pass(None, &[ColorTargetInfo::new(&*texture)]);
    assert!(matches!(result, Err(GpuError::InvalidParameter(_))));
    drop(result);
    cmd.submit();
}

#[rstest]
fn test_depth_target(ctx: TestContext) {
    let color = ctx.create_texture(16, 16, TextureUsage::COLOR_TARGET);
    let depth = ctx.create_depth_texture(16, 16);
    let not_depth = ctx.create_texture(16, 16, TextureUsage::DEPTH_STENCIL_TARGET);
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();

    let result = cmd.begin_render_pass(
        Some(&DepthStencilTargetInfo::new(&not_depth, 1.0)),
        &[ColorTargetInfo::new(&*color)],
    );
    assert!(matches!(result, Err(GpuError::InvalidParameter(_))));
    drop(result);

    let mut pass = cmd
        .begin_render_pass(
            Some(&DepthStencilTargetInfo::new(&depth, 1.0)),
            &[ColorTargetInfo::new(&*color)],
        )
        .unwrap();
    pass.set_stencil_reference(0x80);
    pass.end();
    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::BeginRenderPass), 1);
}

#[rstest]
fn test_draw_requires_pipeline(ctx: TestContext) {
    let target = ctx.create_texture(16, 16, TextureUsage::COLOR_TARGET);
    let pipeline = ctx.create_pipeline();
    let indices = ctx.create_index_buffer(12);
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();

    let mut pass = cmd
        .begin_render_pass(None, &[ColorTargetInfo::new(&*target)])
        .unwrap();
    assert_eq!(
        pass.draw_primitives(3, 1, 0, 0),
        Err(GpuError::PipelineNotBound)
    );
    assert_eq!(
        pass.draw_indexed_primitives(6, 1, 0, 0, 0),
        Err(GpuError::PipelineNotBound)
    );

    pass.bind_pipeline(&pipeline);
    pass.bind_index_buffer(&indices, 0, IndexElementSize::U16).unwrap();
    pass.draw_indexed_primitives(6, 1, 0, 0, 0).unwrap();
    pass.end();

    // Pipeline binding does not carry over to the next pass.
    let mut pass = cmd
        .begin_render_pass(None, &[ColorTargetInfo::new(&*target)])
        .unwrap();
    assert!(!pass.is_pipeline_bound());
    pass.end();
    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::DrawPrimitives), 0);
    assert_eq!(ctx.backend.count(BackendOp::DrawIndexedPrimitives), 1);
}

#[rstest]
fn test_buffer_bindings_check_usage(ctx: TestContext) {
    let target = ctx.create_texture(16, 16, TextureUsage::COLOR_TARGET);
    let vertices = ctx.create_vertex_buffer(64);
    let indices = ctx.create_index_buffer(64);
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    let mut pass = cmd
        .begin_render_pass(None, &[ColorTargetInfo::new(&*target)])
        .unwrap();

    assert!(pass.bind_vertex_buffer(0, &indices, 0).is_err());
    assert!(pass.bind_index_buffer(&vertices, 0, IndexElementSize::U16).is_err());
    assert!(pass.bind_index_buffer(&indices, 2, IndexElementSize::U32).is_err());
    assert!(pass.bind_vertex_buffer(0, &vertices, 128).is_err());
    pass.end();
    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::BindVertexBuffer), 0);
    assert_eq!(ctx.backend.count(BackendOp::BindIndexBuffer), 0);
}

#[rstest]
fn test_fragment_sampler_needs_sampler_usage(ctx: TestContext) {
    let target = ctx.create_texture(16, 16, TextureUsage::COLOR_TARGET);
    let sampled = ctx.create_texture(16, 16, TextureUsage::SAMPLER);
    let sampler = ctx
        .device
        .create_sampler(&SamplerDescriptor::default())
        .unwrap();
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    let mut pass = cmd
        .begin_render_pass(None, &[ColorTargetInfo::new(&*target)])
        .unwrap();

    assert!(matches!(
        pass.bind_fragment_sampler(0, &target, &sampler),
        Err(GpuError::InvalidParameter(_))
    ));
    pass.bind_fragment_sampler(0, &sampled, &sampler).unwrap();
    pass.end();
    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::BindFragmentSampler), 1);
}

#[rstest]
fn test_upload_to_buffer_bounds(ctx: TestContext) {
    let staging = ctx.create_upload_buffer(64);
    let vertices = ctx.create_vertex_buffer(32);
    staging.write_slice(0, &[1.0f32; 8]).unwrap();

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    let mut copy = cmd.begin_copy_pass().unwrap();

    copy.upload_to_buffer(&staging, 0, &vertices, 0, 32, false)
        .unwrap();
    assert!(copy
        .upload_to_buffer(&staging, 0, &vertices, 16, 32, false)
        .is_err());
    assert!(copy
        .upload_to_buffer(&staging, 48, &vertices, 0, 32, false)
        .is_err());
    assert!(copy
        .upload_to_buffer(&staging, 0, &vertices, 0, 0, false)
        .is_err());
    copy.end();
    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::UploadToBuffer), 1);
}

#[rstest]
fn test_upload_to_texture_bounds(ctx: TestContext) {
    let texture = ctx.create_texture(8, 8, TextureUsage::SAMPLER);
    let staging = ctx.create_upload_buffer(8 * 8 * 4);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    let mut copy = cmd.begin_copy_pass().unwrap();

    copy.upload_to_texture(&staging, 0, &texture, &TextureRegion::whole_2d(8, 8), true)
        .unwrap();
    let too_wide = TextureRegion {
        x: 4,
        ..TextureRegion::whole_2d(8, 1)
    };
    assert!(copy
        .upload_to_texture(&staging, 0, &texture, &too_wide, false)
        .is_err());
    let bad_mip = TextureRegion {
        mip_level: 1,
        ..TextureRegion::whole_2d(1, 1)
    };
    assert!(copy
        .upload_to_texture(&staging, 0, &texture, &bad_mip, false)
        .is_err());
    copy.end();
    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::UploadToTexture), 1);
}

#[rstest]
fn test_upload_to_texture_rejects_oversized_region(ctx: TestContext) {
    let texture = ctx.create_texture(8, 8, TextureUsage::SAMPLER);
    let staging = ctx.create_upload_buffer(8 * 8 * 4);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    let mut copy = cmd.begin_copy_pass().unwrap();

    let huge = TextureRegion {
        layer_count: 2,
        ..TextureRegion::whole_2d(u32::MAX, u32::MAX)
    };
    assert!(matches!(
        copy.upload_to_texture(&staging, 0, &texture, &huge, false),
        Err(GpuError::InvalidParameter(_))
    ));
    copy.end();
    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::UploadToTexture), 0);
}

#[rstest]
fn test_upload_to_texture_array_layers(ctx: TestContext) {
    let texture = ctx
        .device
        .create_texture(&TextureDescriptor {
            size: Extent3d::new_3d(4, 4, 3),
            mip_level_count: 2,
            ..TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm, TextureUsage::SAMPLER)
        })
        .unwrap();
    let staging = ctx.create_upload_buffer(4 * 4 * 4 * 3);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    let mut copy = cmd.begin_copy_pass().unwrap();

    let all_layers = TextureRegion {
        layer_count: 3,
        ..TextureRegion::whole_2d(4, 4)
    };
    copy.upload_to_texture(&staging, 0, &texture, &all_layers, false)
        .unwrap();
    let last_layer_of_mip = TextureRegion {
        mip_level: 1,
        layer: 2,
        ..TextureRegion::whole_2d(2, 2)
    };
    copy.upload_to_texture(&staging, 0, &texture, &last_layer_of_mip, false)
        .unwrap();
    let past_last_layer = TextureRegion {
        layer: 1,
        layer_count: 3,
        ..TextureRegion::whole_2d(4, 4)
    };
    assert!(copy
        .upload_to_texture(&staging, 0, &texture, &past_last_layer, false)
        .is_err());
    let too_much_data = TextureRegion {
        layer_count: 3,
        ..TextureRegion::whole_2d(4, 4)
    };
    assert!(copy
        .upload_to_texture(&staging, 16, &texture, &too_much_data, false)
        .is_err());
    copy.end();
    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::UploadToTexture), 2);
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[rstest]
fn test_dropped_command_buffer_is_reported_and_submitted(ctx: TestContext) {
    let cmd = ctx.device.acquire_command_buffer().unwrap();
    drop(cmd);

    let leaks = ctx.leaks();
    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].pool_name, COMMAND_BUFFER_POOL_NAME);
    assert_eq!(ctx.backend.count(BackendOp::SubmitCommandBuffer), 1);
    assert_eq!(ctx.backend.live_command_buffers(), 0);

    let stats = ctx.device.command_buffer_stats();
    assert_eq!(stats.leaked, 1);
    assert_eq!(stats.leased, 0);
    assert_eq!(stats.available, 0);
}

#[test]
fn test_untracked_device_reports_nothing() {
    let backend = Arc::new(DummyBackend::new());
    let device = Device::new(
        backend.clone(),
        &DeviceDescriptor::new("untracked").with_leak_tracking(false),
    );

    drop(device.acquire_command_buffer().unwrap());

    assert_eq!(device.command_buffer_stats().leaked, 0);
    assert_eq!(backend.count(BackendOp::SubmitCommandBuffer), 1);
}

#[rstest]
fn test_failed_native_acquire_leaks_nothing(ctx: TestContext) {
    ctx.backend.fail_next(BackendOp::AcquireCommandBuffer);

    assert!(ctx.device.acquire_command_buffer().is_err());
    assert!(ctx.device.acquire_command_buffer().is_ok_and(|cmd| {
        cmd.submit();
        true
    }));

    assert!(ctx.leaks().is_empty());
    assert_eq!(ctx.device.command_buffer_stats().created, 1);
}

#[rstest]
fn test_failed_native_submit_still_returns_buffer(ctx: TestContext) {
    let cmd = ctx.device.acquire_command_buffer().unwrap();
    ctx.backend.fail_next(BackendOp::SubmitCommandBuffer);

    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::SubmitCommandBuffer), 1);
    assert_eq!(ctx.device.command_buffer_stats().available, 1);
    assert!(ctx.leaks().is_empty());
}

#[rstest]
fn test_buffer_outlives_disposed_device(ctx: TestContext) {
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    ctx.device.dispose();

    assert_eq!(
        ctx.device.acquire_command_buffer().unwrap_err(),
        GpuError::DeviceDisposed
    );

    cmd.begin_copy_pass().unwrap().end();
    cmd.submit();

    assert_eq!(ctx.backend.count(BackendOp::SubmitCommandBuffer), 1);
    assert_eq!(ctx.backend.live_command_buffers(), 0);
    assert_eq!(ctx.device.command_buffer_stats().available, 0);
    assert!(ctx.leaks().is_empty());
}

#[rstest]
fn test_dropped_buffer_after_device_disposal_is_not_reported(ctx: TestContext) {
    let cmd = ctx.device.acquire_command_buffer().unwrap();
    ctx.device.dispose();
    drop(cmd);

    assert!(ctx.leaks().is_empty());
    assert_eq!(ctx.backend.count(BackendOp::SubmitCommandBuffer), 1);
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[rstest]
#[case::single_thread(1)]
#[case::four_threads(4)]
#[case::many_threads(16)]
fn test_concurrent_recording(ctx: TestContext, #[case] threads: usize) {
    const FRAMES: usize = 25;
    let target = ctx.create_texture(32, 32, TextureUsage::COLOR_TARGET);
    let pipeline = ctx.create_pipeline();

    std::thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                for _ in 0..FRAMES {
                    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
                    let mut pass = cmd
                        .begin_render_pass(None, &[ColorTargetInfo::new(&*target)])
                        .unwrap();
                    pass.bind_pipeline(&pipeline);
                    pass.draw_primitives(3, 1, 0, 0).unwrap();
                    pass.end();
                    cmd.submit();
                }
            });
        }
    });

    assert_eq!(
        ctx.backend.count(BackendOp::SubmitCommandBuffer),
        threads * FRAMES
    );
    assert_eq!(ctx.backend.live_command_buffers(), 0);

    let stats = ctx.device.command_buffer_stats();
    assert_eq!(stats.leased, 0);
    assert!(stats.created <= threads);
    assert_eq!(stats.available, stats.created);
    assert!(ctx.device.render_pass_stats().created <= threads);
    assert!(ctx.leaks().is_empty());
}
