//! 形状应用
//!
//! 帧资源环 + 栅栏门驱动的主循环。CPU 可以领先 GPU 最多 N-1 帧：
//!
//! - `update`：推进环 → 等待当前帧资源被 GPU 释放 → 写对象常量和 Pass 常量
//! - `draw`：重置该帧的命令分配器 → 录制 → 提交并打上新的栅栏值 → 呈现
//!
//! 除 `await_if_busy` 外，帧循环中没有其他阻塞点。

use tracing::{debug, info};

use crate::component::OrbitCamera;
use crate::core::config::Config;
use crate::core::error::{Result, ShapeRenderError};
use crate::core::timer::GameTimer;
use crate::geometry::MeshGeometry;
use crate::gfx::device::GpuDevice;
use crate::math::Matrix4;
use crate::renderer::app::RenderApp;
use crate::renderer::command::FrameCommands;
use crate::renderer::constants::{PassConstants, PassInputs};
use crate::renderer::descriptor::CbvHeapLayout;
use crate::renderer::resource::FrameRing;
use crate::renderer::sync::{FenceGate, FenceValue};
use crate::scene::{shapes, Scene};

/// 每帧的 Pass 数量
const PASS_COUNT: usize = 1;

/// 形状应用
pub struct ShapeApp<D: GpuDevice> {
    device: D,
    gate: FenceGate,
    frame_count: usize,
    ring: Option<FrameRing<D>>,
    scene: Scene,
    layout: CbvHeapLayout,
    geometry: MeshGeometry,
    camera: OrbitCamera,
    clear_color: [f32; 4],
    main_pass: PassConstants,
}

impl<D: GpuDevice> ShapeApp<D> {
    /// 构建 CPU 侧数据：几何体、渲染项、相机，并封存对象数量
    pub fn new(device: D, config: &Config) -> Result<Self> {
        let frame_count = config.frames.frame_resources;
        let geometry = shapes::build_shape_geometry()?;

        let mut scene = Scene::new(frame_count)?;
        shapes::build_render_items(&mut scene, &geometry)?;
        let layout = scene.seal()?;

        let (width, height) = device.size();
        let camera = OrbitCamera::new(&config.camera, aspect_ratio(width, height));

        Ok(Self {
            device,
            gate: FenceGate::new(config.frames.fence_timeout()),
            frame_count,
            ring: None,
            scene,
            layout,
            geometry,
            camera,
            clear_color: config.graphics.clear_color,
            main_pass: PassConstants::default(),
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn layout(&self) -> &CbvHeapLayout {
        &self.layout
    }

    pub fn geometry(&self) -> &MeshGeometry {
        &self.geometry
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    /// 帧资源环，`initialize` 之前为 `None`
    pub fn frame_ring(&self) -> Option<&FrameRing<D>> {
        self.ring.as_ref()
    }

    pub fn fence_gate(&self) -> &FenceGate {
        &self.gate
    }

    /// 最近一次写入的 Pass 常量
    pub fn main_pass(&self) -> &PassConstants {
        &self.main_pass
    }

    /// 修改渲染项的世界矩阵
    pub fn set_world(&mut self, obj_cb_index: u32, world: Matrix4) -> Result<()> {
        self.scene.set_world(obj_cb_index, world)
    }

    /// 等待 GPU 完成所有已提交的工作
    pub fn flush(&mut self) -> Result<FenceValue> {
        self.gate.flush(&mut self.device)
    }

    /// 关闭前等待 GPU 空闲
    pub fn shutdown(&mut self) -> Result<()> {
        if self.ring.is_some() {
            let fence = self.flush()?;
            info!(fence_value = fence.value(), "GPU idle, shutting down");
        }
        Ok(())
    }

    fn update_main_pass(&mut self, timer: &GameTimer) {
        let (width, height) = self.device.size();
        self.main_pass = PassConstants::new(&PassInputs {
            view: self.camera.view_matrix(),
            proj: self.camera.proj_matrix(),
            eye_pos: self.camera.eye_position(),
            width,
            height,
            near_z: self.camera.near_z(),
            far_z: self.camera.far_z(),
            total_time: timer.total_time(),
            delta_time: timer.delta_time(),
        });
    }
}

impl<D: GpuDevice> RenderApp for ShapeApp<D> {
    fn initialize(&mut self) -> Result<()> {
        if self.ring.is_some() {
            return Err(ShapeRenderError::Initialization(
                "ShapeApp is already initialized".to_string(),
            ));
        }

        self.device.upload_geometry(&self.geometry)?;

        let ring = FrameRing::new(
            &mut self.device,
            self.frame_count,
            PASS_COUNT,
            self.layout.object_count() as usize,
        )?;

        self.device.create_cbv_heap(&self.layout)?;
        ring.create_constant_buffer_views(&mut self.device, &self.layout)?;
        self.ring = Some(ring);

        // 上传完成之前不能进入帧循环
        let fence = self.flush()?;

        info!(
            backend = self.device.backend_name(),
            objects = self.layout.object_count(),
            frame_resources = self.frame_count,
            descriptors = self.layout.num_descriptors(),
            fence_value = fence.value(),
            "ShapeApp initialized"
        );
        Ok(())
    }

    fn update(&mut self, timer: &GameTimer) -> Result<()> {
        self.update_main_pass(timer);

        let Self {
            device,
            gate,
            ring,
            scene,
            main_pass,
            ..
        } = self;
        let ring = ring.as_mut().ok_or_else(not_initialized)?;

        ring.advance();
        let frame = ring.current_mut();
        gate.await_if_busy(&*device, frame.tracker_mut())?;
        frame.tracker_mut().begin_recording();

        scene.update_object_constants(frame)?;
        frame.write_pass(main_pass)?;
        Ok(())
    }

    fn draw(&mut self, _timer: &GameTimer) -> Result<()> {
        let Self {
            device,
            gate,
            ring,
            scene,
            layout,
            clear_color,
            ..
        } = self;
        let ring = ring.as_mut().ok_or_else(not_initialized)?;
        let frame_index = ring.current_index();
        let frame = ring.current_mut();

        // 分配器的上次使用已在 update 中等待完成
        device.reset_commands(&mut frame.cmd_list_alloc)?;

        let heap_start = device.cbv_heap_start()?;
        let increment = device.cbv_descriptor_size();

        let mut commands = FrameCommands::new(
            frame_index,
            *clear_color,
            layout.bind_pass(heap_start, increment, frame_index)?,
        );
        for item in scene.items() {
            let object_cbv = layout.bind_object(heap_start, increment, frame_index, item.obj_cb_index())?;
            commands.push_draw(object_cbv, *item.submesh());
        }

        device.record_frame(&commands)?;
        device.close_commands()?;

        gate.submit_and_stamp(device, frame.tracker_mut())?;
        device.present()?;
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            debug!(width, height, "Ignoring zero-sized resize");
            return Ok(());
        }

        if self.ring.is_some() {
            self.flush()?;
        }
        self.device.resize(width, height)?;
        self.camera.set_aspect(aspect_ratio(width, height));

        debug!(width, height, aspect = self.camera.aspect(), "Projection updated");
        Ok(())
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

fn not_initialized() -> ShapeRenderError {
    ShapeRenderError::Runtime("ShapeApp::initialize must be called before the frame loop".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::headless::HeadlessDevice;
    use crate::scene::shapes::SHAPE_OBJECT_COUNT;
    use std::time::Duration;

    fn manual_app() -> ShapeApp<HeadlessDevice> {
        ShapeApp::new(HeadlessDevice::manual(800, 600), &Config::default()).unwrap()
    }

    #[test]
    fn test_update_before_initialize_fails() {
        let mut app = manual_app();
        let timer = GameTimer::new();
        assert!(app.update(&timer).is_err());
        assert!(app.draw(&timer).is_err());
    }

    #[test]
    fn test_initialize_builds_views() {
        let device = HeadlessDevice::new(800, 600, Duration::ZERO).unwrap();
        let mut app = ShapeApp::new(device, &Config::default()).unwrap();
        app.initialize().unwrap();

        assert_eq!(app.layout().object_count(), SHAPE_OBJECT_COUNT);
        assert_eq!(
            app.device().constant_buffer_view_count() as u32,
            app.layout().num_descriptors()
        );
        assert_eq!(app.frame_ring().unwrap().len(), 3);
        assert!(app.initialize().is_err());
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut app = manual_app();
        app.on_resize(1600, 400).unwrap();
        assert_eq!(app.camera().aspect(), 4.0);
        assert_eq!(app.device().size(), (1600, 400));

        app.on_resize(0, 400).unwrap();
        assert_eq!(app.camera().aspect(), 4.0);
    }
}
