//! 帧资源环 + 栅栏门的端到端场景
//!
//! 手动模式的模拟设备让测试精确控制 GPU 完成到哪个栅栏值。

use std::thread;
use std::time::{Duration, Instant};

use shape_render::core::error::{CapacityError, Result, ShapeRenderError, SyncError};
use shape_render::core::{Config, GameTimer};
use shape_render::geometry::SubmeshGeometry;
use shape_render::gfx::device::{GpuDevice, SubmissionQueue};
use shape_render::gfx::headless::HeadlessDevice;
use shape_render::math::{Matrix4, Vector3};
use shape_render::renderer::app::{run_frames, RenderApp};
use shape_render::renderer::command::FrameCommands;
use shape_render::renderer::constants::{ObjectConstants, PassConstants};
use shape_render::renderer::descriptor::CbvHeapLayout;
use shape_render::renderer::resource::FrameRing;
use shape_render::renderer::shape_app::ShapeApp;
use shape_render::renderer::sync::{FenceGate, FenceValue, SlotState};
use shape_render::scene::Scene;

/// 逐步驱动一帧的测试装置
struct Harness {
    device: HeadlessDevice,
    gate: FenceGate,
    ring: FrameRing<HeadlessDevice>,
    scene: Scene,
    layout: CbvHeapLayout,
}

impl Harness {
    fn new(object_count: u32, frame_count: usize, timeout: Option<Duration>) -> Self {
        let mut device = HeadlessDevice::manual(800, 600);
        let mut scene = Scene::new(frame_count).unwrap();
        let submesh = SubmeshGeometry {
            index_count: 3,
            start_index_location: 0,
            base_vertex_location: 0,
        };
        for i in 0..object_count {
            scene
                .add_item(format!("item{i}"), Matrix4::identity(), submesh)
                .unwrap();
        }
        let layout = scene.seal().unwrap();

        let ring = FrameRing::new(&mut device, frame_count, 1, object_count as usize).unwrap();
        device.create_cbv_heap(&layout).unwrap();
        ring.create_constant_buffer_views(&mut device, &layout).unwrap();

        Self {
            device,
            gate: FenceGate::new(timeout),
            ring,
            scene,
            layout,
        }
    }

    fn update(&mut self) -> Result<usize> {
        self.ring.advance();
        let frame = self.ring.current_mut();
        self.gate.await_if_busy(&self.device, frame.tracker_mut())?;
        frame.tracker_mut().begin_recording();

        let written = self.scene.update_object_constants(frame)?;
        frame.write_pass(&PassConstants::default())?;
        Ok(written)
    }

    fn draw(&mut self) -> Result<FenceValue> {
        let frame_index = self.ring.current_index();
        let frame = self.ring.current_mut();
        self.device.reset_commands(&mut frame.cmd_list_alloc)?;

        let start = self.device.cbv_heap_start()?;
        let increment = self.device.cbv_descriptor_size();
        let mut commands = FrameCommands::new(
            frame_index,
            [0.0; 4],
            self.layout.bind_pass(start, increment, frame_index)?,
        );
        for item in self.scene.items() {
            let cbv = self
                .layout
                .bind_object(start, increment, frame_index, item.obj_cb_index())?;
            commands.push_draw(cbv, *item.submesh());
        }

        self.device.record_frame(&commands)?;
        self.device.close_commands()?;
        let fence = self.gate.submit_and_stamp(&mut self.device, frame.tracker_mut())?;
        self.device.present()?;
        Ok(fence)
    }

    /// GPU 跟得上 CPU 的一帧
    fn cycle(&mut self) -> FenceValue {
        self.device.complete_all();
        self.update().unwrap();
        self.draw().unwrap()
    }

    fn dirty_count(&self, index: u32) -> u32 {
        self.scene.item(index).unwrap().num_frames_dirty()
    }

    fn object_in_slot(&self, slot: usize, index: u32) -> ObjectConstants {
        self.ring
            .get(slot)
            .unwrap()
            .object_cb()
            .resource()
            .read(index as usize)
            .unwrap()
    }
}

fn translation(x: f32, y: f32, z: f32) -> Matrix4 {
    Matrix4::new_translation(&Vector3::new(x, y, z))
}

#[test]
fn dirty_count_sequence_for_single_item() {
    let mut h = Harness::new(1, 3, None);

    let mut seen = Vec::new();
    for _ in 0..5 {
        seen.push(h.dirty_count(0));
        h.cycle();
    }

    assert_eq!(seen, vec![3, 2, 1, 0, 0]);
}

#[test]
fn clean_items_are_not_rewritten() {
    let mut h = Harness::new(2, 3, None);
    let mut written = Vec::new();
    for _ in 0..4 {
        h.device.complete_all();
        written.push(h.update().unwrap());
        h.draw().unwrap();
    }
    assert_eq!(written, vec![2, 2, 2, 0]);
}

#[test]
fn change_mid_propagation_resets_to_frame_count() {
    let mut h = Harness::new(1, 3, None);
    h.cycle();
    h.cycle();
    assert_eq!(h.dirty_count(0), 1);

    let moved = translation(1.0, 2.0, 3.0);
    h.scene.set_world(0, moved).unwrap();
    assert_eq!(h.dirty_count(0), 3);

    let mut seen = Vec::new();
    for _ in 0..3 {
        h.cycle();
        seen.push(h.dirty_count(0));
    }
    assert_eq!(seen, vec![2, 1, 0]);

    // 每个槽位都持有新矩阵，没有残留旧值
    let expected = ObjectConstants::from_world(&moved);
    for slot in 0..3 {
        assert_eq!(h.object_in_slot(slot, 0), expected, "slot {slot}");
    }
}

#[test]
fn every_slot_holds_new_transform_after_n_updates() {
    let mut h = Harness::new(4, 3, None);
    for _ in 0..5 {
        h.cycle();
    }

    let moved = translation(-5.0, 3.5, 10.0);
    h.scene.set_world(2, moved).unwrap();
    for _ in 0..3 {
        h.cycle();
    }

    assert_eq!(h.dirty_count(2), 0);
    let expected = ObjectConstants::from_world(&moved);
    let untouched = ObjectConstants::from_world(&Matrix4::identity());
    for slot in 0..3 {
        assert_eq!(h.object_in_slot(slot, 2), expected);
        assert_eq!(h.object_in_slot(slot, 1), untouched);
    }
}

#[test]
fn fence_values_strictly_increase() {
    let mut h = Harness::new(2, 3, None);
    let fences: Vec<u64> = (0..10).map(|_| h.cycle().value()).collect();
    assert_eq!(fences, (1..=10).collect::<Vec<_>>());

    for slot in 0..3 {
        let tracker = h.ring.get(slot).unwrap().tracker();
        assert_eq!(tracker.state(), SlotState::Submitted);
        // 每个槽位上记录的是它最近一次提交的值
        assert_eq!(tracker.last_fence().value() % 3, ((slot as u64) + 1) % 3);
    }
}

#[test]
fn cpu_runs_ahead_without_waiting() {
    let mut h = Harness::new(1, 3, Some(Duration::from_millis(10)));
    for _ in 0..3 {
        h.update().unwrap();
        h.draw().unwrap();
    }
    assert_eq!(h.device.pending_signals(), &[1, 2, 3]);
    assert_eq!(h.device.completed_value().value(), 0);
}

#[test]
fn await_blocks_until_gpu_reaches_fence() {
    let mut h = Harness::new(1, 3, None);
    for _ in 0..3 {
        h.update().unwrap();
        h.draw().unwrap();
    }

    let timeline = h.device.timeline();
    let gpu = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        timeline.complete(1);
    });

    let start = Instant::now();
    h.update().unwrap();
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert!(h.device.completed_value().value() >= 1);
    gpu.join().unwrap();

    // 槽位 0 的分配器已经可以安全重置
    assert_eq!(h.draw().unwrap().value(), 4);
}

#[test]
fn await_waits_for_the_slot_fence_only() {
    let mut h = Harness::new(1, 3, None);
    for _ in 0..3 {
        h.update().unwrap();
        h.draw().unwrap();
    }

    // GPU 只完成了第一帧，槽位 0 可以复用，槽位 1 仍然繁忙
    h.device.complete_next();
    let start = Instant::now();
    h.update().unwrap();
    assert!(start.elapsed() < Duration::from_millis(500));
    h.draw().unwrap();

    let busy = h.ring.get(1).unwrap().tracker().last_fence();
    assert!(h.device.completed_value() < busy);
}

#[test]
fn fence_timeout_is_fatal_device_loss() {
    let mut h = Harness::new(1, 3, Some(Duration::from_millis(20)));
    for _ in 0..3 {
        h.update().unwrap();
        h.draw().unwrap();
    }

    let err = h.update().unwrap_err();
    assert!(err.is_device_lost());
    assert!(matches!(
        err,
        ShapeRenderError::Sync(SyncError::FenceTimeout { target: 1, completed: 0, .. })
    ));
}

#[test]
fn six_objects_three_frames_heap_layout() {
    let h = Harness::new(6, 3, None);
    assert_eq!(h.layout.num_descriptors(), 21);
    assert_eq!(h.layout.pass_cbv_offset(), 18);
    assert_eq!(h.layout.pass_cbv_index(1).unwrap(), 19);
    assert_eq!(h.device.constant_buffer_view_count(), 21);

    // 堆中第 19 个视图指向帧资源 1 的 Pass 常量
    let frame1 = h.ring.get(1).unwrap();
    let view = h.device.constant_buffer_view(19).unwrap();
    assert_eq!(view.buffer_location, frame1.pass_cb().gpu_address(0));
    assert_eq!(view.size_in_bytes, 512);

    // 帧资源 2 的对象 4
    let frame2 = h.ring.get(2).unwrap();
    let view = h.device.constant_buffer_view(2 * 6 + 4).unwrap();
    assert_eq!(view.buffer_location, frame2.object_cb().gpu_address(4));
    assert_eq!(view.size_in_bytes, 256);
}

#[test]
fn adding_items_after_heap_is_built_is_rejected() {
    let mut h = Harness::new(6, 3, None);
    let err = h
        .scene
        .add_item("late", Matrix4::identity(), SubmeshGeometry::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ShapeRenderError::Capacity(CapacityError::HeapSealed { object_count: 6 })
    ));
    assert!(h.scene.set_world(6, Matrix4::identity()).is_err());
}

#[test]
fn shape_app_runs_against_simulated_gpu() {
    let device = HeadlessDevice::new(800, 600, Duration::from_millis(1)).unwrap();
    let mut app = ShapeApp::new(device, &Config::default()).unwrap();
    app.initialize().unwrap();
    let init_fence = app.fence_gate().current_value().value();

    let mut timer = GameTimer::new();
    let stats = run_frames(&mut app, &mut timer, 30).unwrap();
    assert_eq!(stats.frames, 30);
    assert_eq!(app.fence_gate().current_value().value(), init_fence + 30);

    let device_stats = app.device().stats().clone();
    assert_eq!(device_stats.frames_recorded, 30);
    assert_eq!(device_stats.presents, 30);
    assert_eq!(app.device().last_frame().unwrap().draw_count(), 22);

    // 环中三个槽位持有最近三次提交的栅栏值
    let mut fences: Vec<u64> = app
        .frame_ring()
        .unwrap()
        .iter()
        .map(|f| f.tracker().last_fence().value())
        .collect();
    fences.sort_unstable();
    assert_eq!(fences, vec![init_fence + 28, init_fence + 29, init_fence + 30]);

    app.shutdown().unwrap();
    assert!(app.device().completed_value() >= app.fence_gate().current_value());
}

#[test]
fn shape_app_propagates_transform_to_all_slots() {
    let device = HeadlessDevice::new(800, 600, Duration::ZERO).unwrap();
    let mut app = ShapeApp::new(device, &Config::default()).unwrap();
    app.initialize().unwrap();

    let mut timer = GameTimer::new();
    run_frames(&mut app, &mut timer, 4).unwrap();

    let moved = translation(0.0, 5.0, 0.0);
    app.set_world(0, moved).unwrap();
    run_frames(&mut app, &mut timer, 3).unwrap();

    let expected = ObjectConstants::from_world(&moved);
    let ring = app.frame_ring().unwrap();
    for frame in ring.iter() {
        let stored: ObjectConstants = frame.object_cb().resource().read(0).unwrap();
        assert_eq!(stored, expected);
    }

    // 当前槽位的 Pass 常量就是最近一次计算的值
    let current = ring.current();
    let pass: PassConstants = current.pass_cb().resource().read(0).unwrap();
    assert_eq!(&pass, app.main_pass());
    assert_eq!(pass.render_target_size, [800.0, 600.0]);

    app.shutdown().unwrap();
}
