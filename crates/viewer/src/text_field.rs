use gpui::prelude::FluentBuilder;
use gpui::*;

/// Minimal single-line text entry.
///
/// Enough editing for scenario descriptions and edit commands: printable
/// keystrokes append, backspace deletes, enter submits. No cursor
/// movement or selection.
pub struct TextField {
    value: String,
    placeholder: SharedString,
    focus_handle: FocusHandle,
}

#[derive(Clone, Debug)]
pub enum TextFieldEvent {
    Submitted(String),
}

impl EventEmitter<TextFieldEvent> for TextField {}

impl Focusable for TextField {
    fn focus_handle(&self, _cx: &App) -> FocusHandle {
        self.focus_handle.clone()
    }
}

impl TextField {
    pub fn new(placeholder: impl Into<SharedString>, cx: &mut Context<Self>) -> Self {
        Self {
            value: String::new(),
            placeholder: placeholder.into(),
            focus_handle: cx.focus_handle(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn clear(&mut self, cx: &mut Context<Self>) {
        self.value.clear();
        cx.notify();
    }

    fn on_key_down(&mut self, event: &KeyDownEvent, _window: &mut Window, cx: &mut Context<Self>) {
        let keystroke = &event.keystroke;
        match keystroke.key.as_str() {
            "backspace" => {
                self.value.pop();
                cx.notify();
            }
            "enter" => {
                cx.emit(TextFieldEvent::Submitted(self.value.clone()));
            }
            "space" => {
                self.value.push(' ');
                cx.notify();
            }
            _ => {
                if keystroke.modifiers.control || keystroke.modifiers.platform {
                    return;
                }
                if let Some(text) = &keystroke.key_char {
                    self.value.push_str(text);
                    cx.notify();
                }
            }
        }
    }
}

impl Render for TextField {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let focused = self.focus_handle.is_focused(window);
        let empty = self.value.is_empty();
        let shown: SharedString = if empty {
            self.placeholder.clone()
        } else {
            self.value.clone().into()
        };

        div()
            .track_focus(&self.focus_handle)
            .on_key_down(cx.listener(Self::on_key_down))
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _e: &MouseDownEvent, window, cx| {
                    window.focus(&this.focus_handle);
                    cx.notify();
                }),
            )
            .flex_1()
            .min_w(px(120.0))
            .px(px(8.0))
            .py(px(5.0))
            .rounded(px(4.0))
            .bg(rgb(0x1e293b))
            .border(px(1.0))
            .border_color(if focused { rgb(0x60a5fa) } else { rgb(0x334155) })
            .text_size(px(12.0))
            .text_color(if empty { rgb(0x64748b) } else { rgb(0xe2e8f0) })
            .cursor(CursorStyle::IBeam)
            .flex()
            .items_center()
            .child(div().child(shown))
            .when(focused, |this| {
                this.child(div().text_color(rgb(0x60a5fa)).child("▏"))
            })
    }
}
