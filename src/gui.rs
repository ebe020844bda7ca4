//! Settings window. The F6 hotkey and the Start/Stop button share one toggle path.

use autoclicky::config::{nominal_clicks_per_second, parse_interval_ms, DEFAULT_UI_INTERVAL_MS};
use autoclicky::hotkey::{Combo, HotkeyMatcher, DEFAULT_UI_HOTKEY};
use autoclicky::input::ClickerFactory;
use autoclicky::listener::{shared_matcher, KeyListener};
use autoclicky::{ClickButton, ClickConfig, ClickError, Controller, Phase, StatusUpdate, StopCause};
use crossbeam_channel::{Receiver, Sender};
use egui::{Color32, RichText};
use std::sync::Arc;
use std::time::Duration;

const REPAINT_INTERVAL: Duration = Duration::from_millis(100);

struct ClickerApp {
    controller: Arc<Controller>,
    updates: Receiver<StatusUpdate>,
    hotkey_presses: Receiver<()>,
    _listener: Option<KeyListener>,
    hotkey_label: String,

    interval_text: String,
    button: ClickButton,
    humanize: bool,

    phase: Phase,
    clicks: u64,
    status_text: String,
}

impl ClickerApp {
    fn new(ctx: egui::Context, controller: Arc<Controller>, updates: Receiver<StatusUpdate>) -> Self {
        let (hotkey_tx, hotkey_presses) = crossbeam_channel::unbounded::<()>();
        let (listener, hotkey_label) = match spawn_hotkey(ctx, hotkey_tx) {
            Ok(listener) => (Some(listener), DEFAULT_UI_HOTKEY.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "hotkeys disabled");
                (None, "disabled".to_string())
            }
        };

        Self {
            controller,
            updates,
            hotkey_presses,
            _listener: listener,
            hotkey_label,
            interval_text: DEFAULT_UI_INTERVAL_MS.to_string(),
            button: ClickButton::Left,
            humanize: true,
            phase: Phase::Idle,
            clicks: 0,
            status_text: "Ready".to_string(),
        }
    }

    fn build_config(&self) -> autoclicky::Result<ClickConfig> {
        let ms = parse_interval_ms(&self.interval_text)?;
        ClickConfig::builder()
            .interval_ms(ms as f64)
            .button(self.button)
            .humanize(self.humanize)
            .build()
    }

    fn toggle_clicking(&mut self) {
        if matches!(self.phase, Phase::Running | Phase::Paused) {
            self.controller.on_stop();
            return;
        }
        match self.build_config() {
            Ok(config) => {
                if let Err(e) = self.controller.on_start(config) {
                    self.status_text = e.to_string();
                }
            }
            Err(_) => self.status_text = "Enter a valid interval (ms).".to_string(),
        }
    }

    fn reset_count(&mut self) {
        if let Err(ClickError::InvalidOperation(_)) = self.controller.on_reset_count() {
            self.status_text = "Stop clicking before resetting the count.".to_string();
        }
    }

    fn drain_updates(&mut self) {
        for update in self.updates.try_iter() {
            match update {
                StatusUpdate::Clicked(count) => self.clicks = count,
                StatusUpdate::Phase(phase, cause) => {
                    self.phase = phase;
                    self.status_text = match (phase, cause) {
                        (Phase::Stopped, Some(StopCause::DurationElapsed)) => {
                            "Stopped (duration reached)".to_string()
                        }
                        (Phase::Stopped, Some(StopCause::InputUnavailable)) => {
                            "Stopped: mouse input unavailable".to_string()
                        }
                        _ => phase.to_string(),
                    };
                }
            }
        }
        // Status is re-read so the display never drifts from the scheduler.
        let status = self.controller.on_status_tick();
        self.phase = status.phase;
        self.clicks = status.click_count;
    }
}

/// F6 is handled on the UI thread, like the button; the listener only queues
/// the press and wakes the event loop.
fn spawn_hotkey(ctx: egui::Context, presses: Sender<()>) -> autoclicky::Result<KeyListener> {
    let mut matcher = HotkeyMatcher::new();
    matcher.register(Combo::parse(DEFAULT_UI_HOTKEY)?, move || {
        let _ = presses.send(());
        ctx.request_repaint();
    });
    KeyListener::spawn(shared_matcher(matcher))
}

impl eframe::App for ClickerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_updates();
        while self.hotkey_presses.try_recv().is_ok() {
            self.toggle_clicking();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("AutoClicky");
            ui.label("Reliable auto-clicking for daily workflows.");
            ui.add_space(12.0);

            ui.group(|ui| {
                ui.label(RichText::new("Click Settings").strong());
                ui.horizontal(|ui| {
                    ui.label("Interval (ms)");
                    ui.add(egui::TextEdit::singleline(&mut self.interval_text).desired_width(80.0));
                    ui.label("Clicks/sec");
                    ui.monospace(format!("{:.2}", nominal_clicks_per_second(&self.interval_text)));
                });
                ui.horizontal(|ui| {
                    ui.label("Mouse button");
                    egui::ComboBox::from_id_source("mouse_button")
                        .selected_text(self.button.as_str())
                        .show_ui(ui, |ui| {
                            for button in ClickButton::ALL {
                                ui.selectable_value(&mut self.button, button, button.as_str());
                            }
                        });
                });
                ui.checkbox(
                    &mut self.humanize,
                    "Humanize timing (adds slight jitter for natural clicks)",
                );
            });

            ui.add_space(8.0);
            ui.group(|ui| {
                ui.label(RichText::new("Status").strong());
                ui.horizontal(|ui| {
                    ui.label("Status");
                    ui.label(RichText::new(self.status_text.as_str()).strong());
                    ui.separator();
                    ui.label("Hotkey");
                    ui.label(self.hotkey_label.as_str());
                });
                ui.horizontal(|ui| {
                    ui.label("Total clicks");
                    ui.monospace(self.clicks.to_string());
                });
            });

            ui.add_space(12.0);
            ui.horizontal(|ui| {
                let running = matches!(self.phase, Phase::Running | Phase::Paused);
                let (label, color) = if running {
                    ("Stop Clicking", Color32::from_rgb(200, 60, 60))
                } else {
                    ("Start Clicking", Color32::from_rgb(40, 160, 80))
                };
                let toggle = egui::Button::new(RichText::new(label).color(Color32::WHITE)).fill(color);
                if ui.add(toggle).clicked() {
                    self.toggle_clicking();
                }
                if ui.button("Reset Count").clicked() {
                    self.reset_count();
                }
            });

            ui.add_space(12.0);
            ui.label(
                RichText::new(format!(
                    "Tip: Press {} anytime to start/stop. Keep the app running for hotkey access.",
                    self.hotkey_label
                ))
                .small()
                .color(Color32::GRAY),
            );
        });

        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}

/// Opens the window and blocks until it is closed. Closing stops clicking.
pub fn run(factory: ClickerFactory) -> anyhow::Result<()> {
    let controller = Arc::new(Controller::new(factory)?);
    let (tx, rx) = crossbeam_channel::unbounded::<StatusUpdate>();
    controller.subscribe(Arc::new(tx));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 420.0])
            .with_resizable(false),
        ..Default::default()
    };

    let app_controller = Arc::clone(&controller);
    let result = eframe::run_native(
        "AutoClicky",
        options,
        Box::new(move |cc| Box::new(ClickerApp::new(cc.egui_ctx.clone(), app_controller, rx))),
    );

    controller.shutdown();
    result.map_err(|e| anyhow::anyhow!("window failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoclicky::input::RecordingClicker;

    fn app() -> ClickerApp {
        let controller = Arc::new(Controller::new(RecordingClicker::new().factory()).unwrap());
        let (tx, rx) = crossbeam_channel::unbounded::<StatusUpdate>();
        controller.subscribe(Arc::new(tx));
        ClickerApp::new(egui::Context::default(), controller, rx)
    }

    #[test]
    fn test_app_defaults() {
        let app = app();
        assert_eq!(app.interval_text, "100");
        assert!(app.humanize);
        assert_eq!(app.button, ClickButton::Left);
        assert_eq!(app.status_text, "Ready");
        let config = app.build_config().unwrap();
        assert_eq!(config.interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_invalid_interval_keeps_idle() {
        let mut app = app();
        app.interval_text = "abc".to_string();
        app.toggle_clicking();
        assert_eq!(app.status_text, "Enter a valid interval (ms).");
        app.drain_updates();
        assert_eq!(app.phase, Phase::Idle);
    }

    #[test]
    fn test_toggle_starts_then_stops() {
        let mut app = app();
        app.interval_text = "10000".to_string();
        app.toggle_clicking();
        app.drain_updates();
        assert_eq!(app.phase, Phase::Running);

        app.reset_count();
        assert_eq!(app.status_text, "Stop clicking before resetting the count.");

        app.toggle_clicking();
        app.drain_updates();
        assert_eq!(app.phase, Phase::Stopped);
        app.reset_count();
        app.drain_updates();
        assert_eq!(app.clicks, 0);
        app.controller.shutdown();
    }
}
