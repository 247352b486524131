use egui::{Align2, Button, RichText, Vec2};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::confirm::PromptRequest;

use super::common::{create_frame, UiColors};

/// Modal OK/Cancel dialog answering [`PromptRequest`]s one at a time.
///
/// A new request is only taken from the channel once the shown one has been
/// answered.
pub struct ConfirmDialog {
    requests: mpsc::Receiver<PromptRequest>,
    pending: Option<PromptRequest>,
    disconnected: bool,
}

impl ConfirmDialog {
    pub fn new(requests: mpsc::Receiver<PromptRequest>) -> Self {
        Self {
            requests,
            pending: None,
            disconnected: false,
        }
    }

    /// Picks up the next request if none is showing.
    pub fn poll(&mut self) {
        if self.pending.is_some() || self.disconnected {
            return;
        }
        match self.requests.try_recv() {
            Ok(request) => {
                info!("Showing confirmation: {}", request.message());
                self.pending = Some(request);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                warn!("Confirmation channel closed");
                self.disconnected = true;
            }
        }
    }

    pub fn pending_message(&self) -> Option<&str> {
        self.pending.as_ref().map(PromptRequest::message)
    }

    /// Answers the shown request. No-op when nothing is showing.
    pub fn resolve(&mut self, affirmed: bool) {
        if let Some(request) = self.pending.take() {
            debug!("Operator answered {}", if affirmed { "OK" } else { "Cancel" });
            request.answer(affirmed);
        }
    }

    pub fn render(&mut self, ctx: &egui::Context) {
        self.poll();
        let Some(message) = self.pending_message().map(str::to_string) else {
            return;
        };

        let mut answer = None;
        egui::Window::new("Confirmation required")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
            .frame(create_frame(UiColors::EXTREME_BG, UiColors::BORDER))
            .show(ctx, |ui| {
                ui.add_space(8.0);
                ui.label(RichText::new(message).size(18.0));
                ui.add_space(12.0);
                ui.horizontal(|ui| {
                    let size = Vec2 { x: 120.0, y: 32.0 };
                    if ui
                        .add(Button::new(RichText::new("OK").color(UiColors::ACTIVE)).min_size(size))
                        .clicked()
                    {
                        answer = Some(true);
                    }
                    if ui
                        .add(Button::new(RichText::new("Cancel").color(UiColors::INACTIVE)).min_size(size))
                        .clicked()
                    {
                        answer = Some(false);
                    }
                });
            });

        if let Some(affirmed) = answer {
            self.resolve(affirmed);
        }
    }
}
