//! # Operator Window
//!
//! eframe/egui front end of the console. The window shows the link and
//! telemetry status and hosts the modal confirmation dialog through which
//! [`UiPrompter`](crate::confirm::UiPrompter) questions are answered.
//!
//! ## Layout
//! - **Top Panel**: link state and associated gamepad
//! - **Central Panel**: confirmation history counters and the last failure
//! - **Bottom Panel**: telemetry throughput counters
//!
//! The dialog is drawn above all panels, anchored to the window center.
//!
//! ## Frame Rate
//! Requests a repaint every 33ms so that incoming prompts and status changes
//! show up without user input. This is independent of the telemetry cadence,
//! which runs on its own task.

pub mod common;
pub mod confirm_dialog;

use eframe::egui::{self, RichText};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::confirm::PromptRequest;
use crate::link::LinkState;
use crate::session::{SessionStatus, StatusFeed};

use self::common::{create_frame, link_label, UiColors};
use self::confirm_dialog::ConfirmDialog;

pub struct OperatorUI {
    dialog: ConfirmDialog,
    link_state: watch::Receiver<LinkState>,
    status: StatusFeed,
}

impl OperatorUI {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        prompts: mpsc::Receiver<PromptRequest>,
        link_state: watch::Receiver<LinkState>,
        status: StatusFeed,
    ) -> Self {
        cc.egui_ctx.set_theme(egui::Theme::Dark);
        OperatorUI {
            dialog: ConfirmDialog::new(prompts),
            link_state,
            status,
        }
    }

    fn render_status(&self, ui: &mut egui::Ui, status: &SessionStatus) {
        create_frame(UiColors::INNER_BG, UiColors::BORDER).show(ui, |ui| {
            ui.heading("Confirmations");
            ui.label(format!("Resolved: {}", status.confirms_resolved));
            match &status.last_confirm_failure {
                Some(failure) => {
                    ui.label(RichText::new(format!("Last failure: {failure}")).color(UiColors::INACTIVE));
                }
                None => {
                    ui.label("No failures");
                }
            }
            if let Some(message) = self.dialog.pending_message() {
                ui.label(RichText::new(format!("Waiting for operator: {message}")).strong());
            }
        });
    }
}

impl eframe::App for OperatorUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(Duration::from_millis(33));

        let link_state = *self.link_state.borrow();
        let status = self.status.snapshot();

        egui::TopBottomPanel::top("top_panel")
            .show_separator_line(false)
            .frame(create_frame(UiColors::MAIN_BG, UiColors::BORDER))
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.label(link_label(link_state));
                    ui.separator();
                    match &status.device {
                        Some(device) => ui.label(RichText::new(format!("Gamepad: {device}")).color(UiColors::ACTIVE)),
                        None => ui.label(RichText::new("Gamepad: none").color(UiColors::INACTIVE)),
                    };
                });
            });

        egui::TopBottomPanel::bottom("bottom_panel")
            .show_separator_line(false)
            .frame(create_frame(UiColors::MAIN_BG, UiColors::BORDER))
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.label(format!("Telemetry sent: {}", status.telemetry_sent));
                    ui.label(format!("Dropped: {}", status.telemetry_dropped));
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_status(ui, &status);
        });

        self.dialog.render(ctx);
    }
}
