//! 环绕相机
//!
//! 相机位于以原点为中心的球面上，由球坐标 (theta, phi, radius) 描述：
//! - 左键拖动：绕原点旋转，每像素 0.25 度
//! - 右键拖动：缩放半径，每像素 0.005 个单位
//!
//! 投影矩阵只在窗口尺寸变化时重算，视图矩阵每帧由球坐标重算。

use crate::core::config::CameraConfig;
use crate::math::{self, utils, Matrix4, Vector3};

/// 环绕相机
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    theta: f32,
    phi: f32,
    radius: f32,

    fov_y: f32,
    near_z: f32,
    far_z: f32,
    aspect: f32,

    proj: Matrix4,
    last_mouse: (f32, f32),
}

impl OrbitCamera {
    /// 旋转灵敏度（度/像素）
    pub const ROTATE_DEGREES_PER_PIXEL: f32 = 0.25;
    /// 缩放灵敏度（单位/像素）
    pub const ZOOM_UNITS_PER_PIXEL: f32 = 0.005;
    pub const MIN_PHI: f32 = 0.1;
    pub const MAX_PHI: f32 = math::constants::PI - 0.1;
    pub const MIN_RADIUS: f32 = 3.0;
    pub const MAX_RADIUS: f32 = 15.0;

    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self {
            theta: config.theta,
            phi: utils::clamp(config.phi, Self::MIN_PHI, Self::MAX_PHI),
            radius: utils::clamp(config.radius, Self::MIN_RADIUS, Self::MAX_RADIUS),
            fov_y: utils::deg_to_rad(config.fov_degrees),
            near_z: config.near_z,
            far_z: config.far_z,
            aspect,
            proj: Matrix4::identity(),
            last_mouse: (0.0, 0.0),
        };
        camera.set_aspect(aspect);
        camera
    }

    /// 更新宽高比并重算投影矩阵
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        self.proj = math::perspective_fov_lh(self.fov_y, self.aspect, self.near_z, self.far_z);
    }

    /// 按下鼠标时记录起点
    pub fn on_mouse_down(&mut self, x: f32, y: f32) {
        self.last_mouse = (x, y);
    }

    /// 左键拖动：旋转
    pub fn orbit(&mut self, x: f32, y: f32) {
        let dx = utils::deg_to_rad(Self::ROTATE_DEGREES_PER_PIXEL * (x - self.last_mouse.0));
        let dy = utils::deg_to_rad(Self::ROTATE_DEGREES_PER_PIXEL * (y - self.last_mouse.1));

        self.theta += dx;
        self.phi = utils::clamp(self.phi + dy, Self::MIN_PHI, Self::MAX_PHI);
        self.last_mouse = (x, y);
    }

    /// 右键拖动：缩放
    pub fn zoom(&mut self, x: f32, y: f32) {
        let dx = Self::ZOOM_UNITS_PER_PIXEL * (x - self.last_mouse.0);
        let dy = Self::ZOOM_UNITS_PER_PIXEL * (y - self.last_mouse.1);

        self.radius = utils::clamp(self.radius + dx - dy, Self::MIN_RADIUS, Self::MAX_RADIUS);
        self.last_mouse = (x, y);
    }

    /// 没有按键时只跟踪位置
    pub fn track(&mut self, x: f32, y: f32) {
        self.last_mouse = (x, y);
    }

    /// 世界空间中的相机位置
    pub fn eye_position(&self) -> Vector3 {
        Vector3::new(
            self.radius * self.phi.sin() * self.theta.cos(),
            self.radius * self.phi.cos(),
            self.radius * self.phi.sin() * self.theta.sin(),
        )
    }

    pub fn view_matrix(&self) -> Matrix4 {
        math::look_at_lh(&self.eye_position(), &Vector3::zeros(), &Vector3::y())
    }

    pub fn proj_matrix(&self) -> Matrix4 {
        self.proj
    }

    pub fn near_z(&self) -> f32 {
        self.near_z
    }

    pub fn far_z(&self) -> f32 {
        self.far_z
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn spherical(&self) -> (f32, f32, f32) {
        (self.theta, self.phi, self.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::constants::{EPSILON, PI};

    fn camera() -> OrbitCamera {
        OrbitCamera::new(&CameraConfig::default(), 800.0 / 600.0)
    }

    #[test]
    fn test_default_eye_position() {
        let cam = camera();
        let (theta, phi, radius) = cam.spherical();
        assert!(utils::approx_eq(theta, 1.5 * PI, EPSILON));
        assert!(utils::approx_eq(phi, 0.2 * PI, EPSILON));
        assert_eq!(radius, 15.0);

        let eye = cam.eye_position();
        assert!(utils::approx_eq(eye.norm(), 15.0, 1e-4));
        // theta = 1.5π 时相机位于 -z 一侧
        assert!(eye.z < 0.0);
        assert!(utils::approx_eq(eye.x, 0.0, 1e-4));
    }

    #[test]
    fn test_orbit_clamps_phi() {
        let mut cam = camera();
        cam.on_mouse_down(0.0, 0.0);
        cam.orbit(0.0, 10_000.0);
        assert_eq!(cam.spherical().1, OrbitCamera::MAX_PHI);

        cam.orbit(0.0, -20_000.0);
        assert_eq!(cam.spherical().1, OrbitCamera::MIN_PHI);
    }

    #[test]
    fn test_orbit_rate() {
        let mut cam = camera();
        let theta0 = cam.spherical().0;
        cam.on_mouse_down(100.0, 100.0);
        cam.orbit(104.0, 100.0);
        // 4 像素 = 1 度
        assert!(utils::approx_eq(cam.spherical().0 - theta0, PI / 180.0, EPSILON));
    }

    #[test]
    fn test_zoom_clamps_radius() {
        let mut cam = camera();
        cam.on_mouse_down(0.0, 0.0);
        cam.zoom(0.0, 400.0);
        assert!(utils::approx_eq(cam.spherical().2, 13.0, 1e-4));

        cam.zoom(0.0, 10_000.0);
        assert_eq!(cam.spherical().2, OrbitCamera::MIN_RADIUS);

        cam.zoom(100_000.0, 10_000.0);
        assert_eq!(cam.spherical().2, OrbitCamera::MAX_RADIUS);
    }

    #[test]
    fn test_invalid_aspect_falls_back() {
        let mut cam = camera();
        cam.set_aspect(0.0);
        assert_eq!(cam.aspect(), 1.0);
    }
}
