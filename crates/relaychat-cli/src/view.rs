//! Terminal rendering of an exchange

use std::io::Write;

use relaychat::assembler::Segment;
use relaychat::controller::ExchangeView;
use relaychat::conversation::ChatMessage;

use crate::output::render_segments;

/// Streams the reply to stdout as it arrives.
///
/// Replies that never streamed (failure diagnostics) are rendered from their
/// segments once committed. Streamed replies are followed by their code
/// segments in framed form.
#[derive(Debug)]
pub struct TerminalView {
    printed: usize,
    input_enabled: bool,
}

impl TerminalView {
    pub fn new() -> Self {
        Self {
            printed: 0,
            input_enabled: true,
        }
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

/// Text printed once a reply is committed, after `printed` bytes were streamed
fn closing_render(printed: usize, segments: &[Segment]) -> String {
    if printed == 0 {
        return render_segments(segments);
    }

    let code: Vec<Segment> = segments.iter().filter(|s| s.is_code()).cloned().collect();
    if code.is_empty() {
        String::new()
    } else {
        format!("\n\n{}", render_segments(&code))
    }
}

impl ExchangeView for TerminalView {
    fn show_pending(&mut self) {
        self.printed = 0;
        print!("assistant> ");
        let _ = std::io::stdout().flush();
    }

    fn update_live(&mut self, text: &str) {
        if let Some(delta) = text.get(self.printed..) {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }
        self.printed = text.len();
    }

    fn show_final(&mut self, _message: &ChatMessage, segments: &[Segment]) {
        println!("{}", closing_render(self.printed, segments));
    }

    fn clear_pending(&mut self) {
        println!("(no reply)");
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }
}
