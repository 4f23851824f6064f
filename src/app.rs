// src/app.rs - Joint marker viewer
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use tokio::sync::watch;

use crate::pose::{ApplyOutcome, HandStatus, PoseSnapshot};
use crate::scene::SceneGraph;
use crate::skeleton::{HandSide, JointName};
use crate::tracking::AuthorizationStatus;
use crate::ui::{self, OrbitCamera, Theme};

/// Reads the pose consumer's snapshots; never writes marker state.
pub struct HandJointsApp {
    snapshots: watch::Receiver<PoseSnapshot>,
    authorization: watch::Receiver<Option<AuthorizationStatus>>,
    scene: SceneGraph,
    session_active: bool,
    expected_rate: f64,

    camera: OrbitCamera,
    theme: Theme,
    show_left: bool,
    show_right: bool,
    show_axes: bool,
    show_table: bool,
    show_about: bool,
}

impl HandJointsApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        snapshots: watch::Receiver<PoseSnapshot>,
        authorization: watch::Receiver<Option<AuthorizationStatus>>,
        scene: SceneGraph,
        session_active: bool,
        expected_rate: f64,
    ) -> Self {
        Self {
            snapshots,
            authorization,
            scene,
            session_active,
            expected_rate,
            camera: OrbitCamera::default(),
            theme: Theme::default(),
            show_left: true,
            show_right: true,
            show_axes: true,
            show_table: false,
            show_about: false,
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(6.0);
            egui::menu::bar(ui, |ui| {
                ui.heading("Hand Joints");
                ui.separator();

                ui.checkbox(&mut self.show_left, "Left Hand");
                ui.checkbox(&mut self.show_right, "Right Hand");
                ui.checkbox(&mut self.show_axes, "Axes");
                ui.checkbox(&mut self.show_table, "Joint Table");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("ℹ About").clicked() {
                        self.show_about = !self.show_about;
                    }
                    if ui.button("Reset View").clicked() {
                        self.camera = OrbitCamera::default();
                    }
                });
            });
            ui.add_space(6.0);
        });
    }

    fn render_status_panel(&mut self, ctx: &egui::Context, snapshot: &PoseSnapshot) {
        egui::SidePanel::right("status").min_width(240.0).show(ctx, |ui| {
            ui.heading("Session");
            if self.session_active {
                ui.colored_label(self.theme.success, "Tracking session running");
            } else {
                ui.colored_label(self.theme.error, "Tracking session inactive");
            }

            let authorization = *self.authorization.borrow();
            match authorization {
                Some(AuthorizationStatus::Allowed) => {
                    ui.colored_label(self.theme.success, "Hand tracking authorized");
                }
                Some(status) => {
                    ui.colored_label(self.theme.warning, format!("Hand tracking {:?}", status));
                }
                None => {
                    ui.colored_label(self.theme.text_secondary, "Authorization unknown");
                }
            }
            ui.label(format!("Events received: {}", snapshot.events_seen));
            ui.label(format!("Scene entities: {}", self.scene.len()));

            for side in HandSide::BOTH {
                ui.separator();
                self.render_hand_status(ui, side, &snapshot.hands[side]);
            }
        });
    }

    fn render_hand_status(&self, ui: &mut egui::Ui, side: HandSide, status: &HandStatus) {
        let title = match side {
            HandSide::Left => "Left Hand",
            HandSide::Right => "Right Hand",
        };
        ui.colored_label(self.theme.hand(side), egui::RichText::new(title).strong());

        if status.tracked {
            ui.label("Tracked");
        } else {
            ui.colored_label(self.theme.warning, "Not tracked (last pose kept)");
        }

        ui.label(format!("Updates: {}", status.updates));
        ui::draw_rate_bar(ui, &self.theme, status.rate, self.expected_rate);

        if let Some(ApplyOutcome::Updated { updated, missing }) = status.last_outcome {
            ui.label(format!("Joints updated: {} / {}", updated, JointName::COUNT));
            if missing > 0 {
                ui.colored_label(self.theme.warning, format!("Joints missing: {}", missing));
            }
        }
    }

    fn render_joint_table(&self, ctx: &egui::Context, snapshot: &PoseSnapshot) {
        egui::TopBottomPanel::bottom("joints")
            .resizable(true)
            .default_height(220.0)
            .show(ctx, |ui| {
                TableBuilder::new(ui)
                    .striped(true)
                    .column(Column::auto().at_least(200.0))
                    .column(Column::remainder())
                    .column(Column::remainder())
                    .header(20.0, |mut header| {
                        header.col(|ui| {
                            ui.strong("Joint");
                        });
                        header.col(|ui| {
                            ui.strong("Left (x, y, z)");
                        });
                        header.col(|ui| {
                            ui.strong("Right (x, y, z)");
                        });
                    })
                    .body(|mut body| {
                        for joint in JointName::ALL {
                            body.row(18.0, |mut row| {
                                row.col(|ui| {
                                    ui.label(joint.as_str());
                                });
                                for side in HandSide::BOTH {
                                    let p = snapshot.registry.marker(side, joint).position();
                                    row.col(|ui| {
                                        ui.monospace(format!("{:+.3} {:+.3} {:+.3}", p.x, p.y, p.z));
                                    });
                                }
                            });
                        }
                    });
            });
    }

    fn render_viewport(&mut self, ctx: &egui::Context, snapshot: &PoseSnapshot) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let size = ui.available_size();
            let (response, painter) = ui.allocate_painter(size, egui::Sense::drag());
            let scroll = ui.input(|i| i.scroll_delta.y);
            self.camera.handle_input(&response, scroll);

            let rect = response.rect;
            painter.rect_filled(rect, egui::Rounding::ZERO, self.theme.background);

            let view = self.camera.view();
            ui::draw_ground_grid(&painter, &self.camera, &view, rect, &self.theme);

            for (side, hand) in snapshot.registry.hands() {
                let visible = match side {
                    HandSide::Left => self.show_left,
                    HandSide::Right => self.show_right,
                };
                if !visible {
                    continue;
                }

                let color = self.theme.hand(side);
                for (_, marker) in hand.iter() {
                    ui::draw_marker(
                        &painter,
                        &self.camera,
                        &view,
                        rect,
                        marker,
                        color,
                        &self.theme,
                        self.show_axes,
                    );
                }
            }

            painter.text(
                rect.left_bottom() + egui::vec2(8.0, -8.0),
                egui::Align2::LEFT_BOTTOM,
                "drag to orbit, scroll to zoom",
                egui::FontId::proportional(12.0),
                self.theme.text_secondary,
            );
        });
    }

    fn render_about_window(&mut self, ctx: &egui::Context) {
        egui::Window::new("About")
            .open(&mut self.show_about)
            .resizable(false)
            .default_size([360.0, 200.0])
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("Hand Joints");
                    ui.label(format!("Version {}", crate::VERSION));
                    ui.add_space(12.0);
                    ui.label("Every tracked hand joint drawn as a sphere");
                    ui.label("with its X/Y/Z axis gizmo.");
                });
            });
    }
}

impl eframe::App for HandJointsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Copy out the latest snapshot so the consumer is never blocked on paint.
        let snapshot = self.snapshots.borrow().clone();

        self.render_header(ctx);
        self.render_status_panel(ctx, &snapshot);
        if self.show_table {
            self.render_joint_table(ctx, &snapshot);
        }
        if self.show_about {
            self.render_about_window(ctx);
        }
        self.render_viewport(ctx, &snapshot);

        // Request repaint for continuous updates
        ctx.request_repaint();
    }
}
