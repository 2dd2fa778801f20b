//! What the user gets to see.
//!
use std::io::{self, Write};

use crate::prediction::{Confidence, ResultView};

/// Number of cells of the console confidence bar.
const BAR_CELLS: usize = 20;

/// Kind of the status indicator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Ready,
    Loading,
    Active,
    Error,
}

/// Surface the session renders to.
pub trait Renderer {
    /// Update the status indicator.
    fn status(&mut self, status: Status, message: &str);

    /// Show the persistent setup instructions for a missing or broken bundle.
    fn setup_required(&mut self, message: &str);

    /// Show a transient error notification.
    fn notify_error(&mut self, message: &str);

    /// Reset camera and result areas to their idle placeholders.
    fn show_placeholder(&mut self);

    /// Clear the placeholders for a live session.
    fn show_live(&mut self);

    /// Replace the previous result with the given top prediction.
    fn show_result(&mut self, view: &ResultView);

    /// Toggle between the start and the stop affordance.
    fn set_running(&mut self, running: bool);

    fn set_start_enabled(&mut self, enabled: bool);

    fn set_class_count(&mut self, count: usize);
}

/// Renderer for a terminal.
pub struct ConsoleRenderer<W: Write> {
    out: W,
    last_status: Option<(Status, String)>,
    result_line_open: bool,
}

impl ConsoleRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_status: None,
            result_line_open: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print a line, closing a pending result line first.
    fn line(&mut self, text: &str) {
        let res = if self.result_line_open {
            self.result_line_open = false;
            writeln!(self.out, "\n{}", text)
        } else {
            writeln!(self.out, "{}", text)
        };
        if let Err(err) = res.and_then(|_| self.out.flush()) {
            log::debug!("Unable to write to console: {}", err);
        }
    }
}

impl<W: Write> Renderer for ConsoleRenderer<W> {
    fn status(&mut self, status: Status, message: &str) {
        let next = (status, message.to_owned());
        if self.last_status.as_ref() == Some(&next) {
            return;
        }
        let marker = match status {
            Status::Ready => "○",
            Status::Loading => "◌",
            Status::Active => "●",
            Status::Error => "✖",
        };
        self.line(&format!("{} {}", marker, message));
        self.last_status = Some(next);
    }

    fn setup_required(&mut self, message: &str) {
        self.line(&format!(
            "Model Setup Required\n  {}\n\
             Setup Instructions:\n  \
             1. Export your image model and convert its weights to ONNX\n  \
             2. Create a folder named \"my_model\" next to the server\n  \
             3. Place model.json, metadata.json and the .onnx file in it\n  \
             4. List the .onnx file in the weightsManifest of model.json\n  \
             5. Press r to check again",
            message
        ));
    }

    fn notify_error(&mut self, message: &str) {
        self.line(&format!("! {}", message));
    }

    fn show_placeholder(&mut self) {
        self.line("Camera not active. Start the camera to see predictions.");
    }

    fn show_live(&mut self) {
        self.line("Camera live, waiting for predictions...");
    }

    fn show_result(&mut self, view: &ResultView) {
        let res = write!(self.out, "\r{}", render_result(view)).and_then(|_| self.out.flush());
        if let Err(err) = res {
            log::debug!("Unable to write to console: {}", err);
        }
        self.result_line_open = true;
    }

    fn set_running(&mut self, running: bool) {
        match running {
            true => self.line("[space] Stop Camera"),
            false => self.line("[space] Start Camera"),
        }
    }

    fn set_start_enabled(&mut self, enabled: bool) {
        match enabled {
            true => self.line("[space] Start Camera"),
            false => self.line("Setup Required: start is disabled"),
        }
    }

    fn set_class_count(&mut self, count: usize) {
        self.line(&format!("Classes: {}", count));
    }
}

/// Single line rendering of a result with a proportional bar.
pub fn render_result(view: &ResultView) -> String {
    let filled = ((view.bar_width / 100.0) * BAR_CELLS as f32).round() as usize;
    let filled = filled.min(BAR_CELLS);
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_CELLS - filled));
    let marker = match view.confidence {
        Confidence::High => " ✔",
        Confidence::Neutral => "  ",
    };

    format!("{:<20} {} {:>5}%{}", view.label, bar, view.percentage, marker)
}
