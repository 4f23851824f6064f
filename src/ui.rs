// src/ui.rs - Theme, projection camera and marker drawing
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};
use nalgebra::{Matrix4, Point3, Vector3};

use crate::markers::JointMarker;
use crate::scene::AxisColor;
use crate::skeleton::HandSide;

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub secondary: Color32,
    pub background: Color32,
    pub surface: Color32,
    pub grid: Color32,
    pub error: Color32,
    pub warning: Color32,
    pub success: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(70, 130, 240),
            secondary: Color32::from_rgb(255, 152, 0),
            background: Color32::from_rgb(20, 20, 25),
            surface: Color32::from_rgb(30, 30, 35),
            grid: Color32::from_rgb(45, 45, 52),
            error: Color32::from_rgb(244, 67, 54),
            warning: Color32::from_rgb(255, 152, 0),
            success: Color32::from_rgb(76, 175, 80),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

impl Theme {
    pub fn hand(&self, side: HandSide) -> Color32 {
        match side {
            HandSide::Left => self.primary,
            HandSide::Right => self.secondary,
        }
    }

    pub fn axis(&self, color: AxisColor) -> Color32 {
        let [r, g, b] = color.rgb();
        Color32::from_rgb(r, g, b)
    }
}

/// Perspective orbit camera looking at `target`.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vector3<f32>,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub fov_y: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vector3::new(0.0, 1.1, -0.35),
            yaw: 0.0,
            pitch: 0.35,
            distance: 0.8,
            fov_y: 50f32.to_radians(),
        }
    }
}

const NEAR_PLANE: f32 = 0.01;

impl OrbitCamera {
    pub fn eye(&self) -> Point3<f32> {
        let offset = Vector3::new(
            self.distance * self.pitch.cos() * self.yaw.sin(),
            self.distance * self.pitch.sin(),
            self.distance * self.pitch.cos() * self.yaw.cos(),
        );
        Point3::from(self.target + offset)
    }

    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.eye(), &Point3::from(self.target), &Vector3::y())
    }

    /// Screen position of a world point, `None` behind the camera.
    pub fn project(&self, view: &Matrix4<f32>, world: &Point3<f32>, rect: Rect) -> Option<Pos2> {
        let p = view.transform_point(world);
        let depth = -p.z;
        if depth < NEAR_PLANE {
            return None;
        }

        let focal = 0.5 * rect.height() / (self.fov_y / 2.0).tan();
        let x = rect.center().x + focal * p.x / depth;
        let y = rect.center().y - focal * p.y / depth;
        Some(Pos2::new(x, y))
    }

    /// Pixel size of `world_size` at the depth of `world`.
    pub fn screen_size(&self, view: &Matrix4<f32>, world: &Point3<f32>, world_size: f32, rect: Rect) -> f32 {
        let depth = (-view.transform_point(world).z).max(NEAR_PLANE);
        let focal = 0.5 * rect.height() / (self.fov_y / 2.0).tan();
        focal * world_size / depth
    }

    pub fn handle_input(&mut self, response: &egui::Response, scroll: f32) {
        let drag = response.drag_delta();
        self.yaw -= drag.x * 0.01;
        self.pitch = (self.pitch + drag.y * 0.01).clamp(-1.5, 1.5);

        if response.hovered() && scroll != 0.0 {
            self.distance = (self.distance * (1.0 - scroll * 0.001)).clamp(0.1, 5.0);
        }
    }
}

/// Floor grid centered under the camera target.
pub fn draw_ground_grid(painter: &egui::Painter, camera: &OrbitCamera, view: &Matrix4<f32>, rect: Rect, theme: &Theme) {
    let y = camera.target.y - 0.3;
    let half = 0.5;
    let steps = 10;
    let stroke = Stroke::new(1.0, theme.grid);

    for i in 0..=steps {
        let s = -half + i as f32 * (2.0 * half / steps as f32);
        let lines = [
            (
                Point3::new(camera.target.x + s, y, camera.target.z - half),
                Point3::new(camera.target.x + s, y, camera.target.z + half),
            ),
            (
                Point3::new(camera.target.x - half, y, camera.target.z + s),
                Point3::new(camera.target.x + half, y, camera.target.z + s),
            ),
        ];
        for (a, b) in lines {
            if let (Some(a), Some(b)) = (camera.project(view, &a, rect), camera.project(view, &b, rect)) {
                painter.line_segment([a, b], stroke);
            }
        }
    }
}

/// Sphere and axis gizmo of one marker, as currently transformed.
pub fn draw_marker(
    painter: &egui::Painter,
    camera: &OrbitCamera,
    view: &Matrix4<f32>,
    rect: Rect,
    marker: &JointMarker,
    color: Color32,
    theme: &Theme,
    show_axes: bool,
) {
    let center = Point3::from(marker.position());

    if show_axes {
        for segment in marker.axes.segments() {
            let (a, b) = segment.endpoints();
            let a = marker.transform.transform_point(&a);
            let b = marker.transform.transform_point(&b);
            if let (Some(a), Some(b)) = (camera.project(view, &a, rect), camera.project(view, &b, rect)) {
                painter.line_segment([a, b], Stroke::new(1.5, theme.axis(segment.color)));
            }
        }
    }

    if let Some(pos) = camera.project(view, &center, rect) {
        let radius = camera
            .screen_size(view, &center, marker.sphere_radius, rect)
            .clamp(1.5, 12.0);
        painter.circle_filled(pos, radius, color);
    }
}

/// Horizontal bar showing the measured update rate against the expected one.
pub fn draw_rate_bar(ui: &mut egui::Ui, theme: &Theme, rate: Option<f64>, expected: f64) {
    let bar_width = 180.0;
    let bar_height = 16.0;
    let rect = ui.allocate_space(Vec2::new(bar_width, bar_height)).1;
    let painter = ui.painter();

    painter.rect_filled(rect, egui::Rounding::same(4.0), theme.surface);

    let fraction = rate.map(|r| (r / expected).clamp(0.0, 1.0) as f32).unwrap_or(0.0);
    let fill_rect = Rect::from_min_size(rect.min, Vec2::new(bar_width * fraction, bar_height));
    let color = if fraction > 0.9 {
        theme.success
    } else if fraction > 0.5 {
        theme.warning
    } else {
        theme.error
    };
    painter.rect_filled(fill_rect, egui::Rounding::same(4.0), color);

    let label = match rate {
        Some(rate) => format!("{:.1} Hz", rate),
        None => "--".to_string(),
    };
    painter.text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        label,
        egui::FontId::proportional(11.0),
        theme.text_primary,
    );
}
