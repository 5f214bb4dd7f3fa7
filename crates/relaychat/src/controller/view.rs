use crate::assembler::Segment;
use crate::conversation::ChatMessage;

/// Rendering surface driven by the controller during an exchange
pub trait ExchangeView: Send {
    /// The placeholder entry appeared; nothing has streamed yet
    fn show_pending(&mut self);

    /// The accumulated text after another token was folded in
    fn update_live(&mut self, text: &str);

    /// A reply was committed; render its segmented form
    fn show_final(&mut self, message: &ChatMessage, segments: &[Segment]);

    /// The placeholder went away without a committed reply
    fn clear_pending(&mut self);

    fn set_input_enabled(&mut self, enabled: bool);
}

/// View that renders nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl ExchangeView for NullView {
    fn show_pending(&mut self) {}
    fn update_live(&mut self, _text: &str) {}
    fn show_final(&mut self, _message: &ChatMessage, _segments: &[Segment]) {}
    fn clear_pending(&mut self) {}
    fn set_input_enabled(&mut self, _enabled: bool) {}
}
