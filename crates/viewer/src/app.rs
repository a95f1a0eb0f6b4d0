use std::time::Duration;

use backend_client::{
    BackendClient, ChannelEvent, ClientError, GeneratedWorkflow, PushChannel, ReviewFeedback,
    ScenarioType,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use gpui::prelude::FluentBuilder;
use gpui::*;
use graph_model::{Edge, Node, NodeKind, Selection};
use graphview::{CanvasEvent, WorkflowCanvas};
use tracing::error;

use crate::coordinator::{Coordinator, OperationKind};
use crate::text_field::{TextField, TextFieldEvent};

/// Responses crossing back from the client's runtime to the UI thread,
/// stamped with the coordinator epoch their request was issued under.
enum BackendMsg {
    Generated(u64, Result<GeneratedWorkflow, ClientError>),
    Edited(u64, Result<(Vec<Node>, Vec<Edge>), ClientError>),
    Reviewed(u64, Result<ReviewFeedback, ClientError>),
}

const ADD_BUTTONS: [(NodeKind, &str); 5] = [
    (NodeKind::Agent, "+ Agent"),
    (NodeKind::Tool, "+ Tool"),
    (NodeKind::Db, "+ Store"),
    (NodeKind::Input, "+ Input"),
    (NodeKind::Output, "+ Output"),
];

pub struct Playground {
    coordinator: Coordinator,
    client: Option<BackendClient>,
    channel: Option<PushChannel>,
    scenario_type: ScenarioType,
    canvas: Entity<WorkflowCanvas>,
    scenario_input: Entity<TextField>,
    command_input: Entity<TextField>,
    backend_tx: Sender<BackendMsg>,
    backend_rx: Receiver<BackendMsg>,
    push_tx: Sender<ChannelEvent>,
    push_rx: Receiver<ChannelEvent>,
    _subscriptions: Vec<Subscription>,
}

impl Playground {
    pub fn new(_window: &mut Window, cx: &mut Context<Self>) -> Self {
        let canvas = cx.new(|_| WorkflowCanvas::new());
        let scenario_input =
            cx.new(|cx| TextField::new("Describe a scenario, e.g. a customer support desk", cx));
        let command_input =
            cx.new(|cx| TextField::new("Edit in plain language, e.g. add a cache", cx));

        let (backend_tx, backend_rx) = unbounded();
        let (push_tx, push_rx) = unbounded();

        let mut coordinator = Coordinator::new();
        let client = match BackendClient::from_env() {
            Ok(client) => Some(client),
            Err(err) => {
                error!(%err, "backend client unavailable");
                coordinator.set_notice(err.to_string());
                None
            }
        };

        let _subscriptions = vec![
            cx.subscribe(&canvas, |this: &mut Self, _, event: &CanvasEvent, cx| {
                this.on_canvas_event(event.clone(), cx);
            }),
            cx.subscribe(
                &scenario_input,
                |this: &mut Self, _, event: &TextFieldEvent, cx| {
                    let TextFieldEvent::Submitted(_) = event;
                    this.submit_generate(cx);
                },
            ),
            cx.subscribe(
                &command_input,
                |this: &mut Self, _, event: &TextFieldEvent, cx| {
                    let TextFieldEvent::Submitted(_) = event;
                    this.submit_edit(cx);
                },
            ),
        ];

        // Poll the response channels from the UI side; both carry only
        // occasional small messages.
        cx.spawn(async move |this, cx| {
            loop {
                smol::Timer::after(Duration::from_millis(33)).await;
                if this
                    .update(cx, |playground: &mut Playground, cx| playground.pump(cx))
                    .is_err()
                {
                    break;
                }
            }
        })
        .detach();

        Self {
            coordinator,
            client,
            channel: None,
            scenario_type: ScenarioType::Other,
            canvas,
            scenario_input,
            command_input,
            backend_tx,
            backend_rx,
            push_tx,
            push_rx,
            _subscriptions,
        }
    }

    fn sync_canvas(&mut self, cx: &mut Context<Self>) {
        let nodes = self.coordinator.nodes().to_vec();
        let edges = self.coordinator.edges().to_vec();
        let selection = self.coordinator.selection().cloned();
        self.canvas.update(cx, |canvas, cx| {
            canvas.set_model(nodes, edges, selection, cx);
        });
        cx.notify();
    }

    fn on_canvas_event(&mut self, event: CanvasEvent, cx: &mut Context<Self>) {
        match event {
            CanvasEvent::NodeClicked(id) => {
                self.coordinator.select(Some(Selection::Node(id)));
            }
            CanvasEvent::EdgeClicked(id) => {
                self.coordinator.select(Some(Selection::Edge(id)));
            }
            CanvasEvent::BackgroundClicked => {
                self.coordinator.select(None);
            }
            CanvasEvent::ConnectRequested { source, target } => {
                if let Err(err) = self.coordinator.connect(&source, &target) {
                    self.coordinator.reject(err);
                }
                self.sync_canvas(cx);
                return;
            }
        }
        let selection = self.coordinator.selection().cloned();
        self.canvas.update(cx, |canvas, cx| {
            canvas.set_selection(selection, cx);
        });
        cx.notify();
    }

    /// Drain responses and push events delivered since the last poll.
    fn pump(&mut self, cx: &mut Context<Self>) {
        let mut dirty = false;
        while let Ok(msg) = self.backend_rx.try_recv() {
            match msg {
                BackendMsg::Generated(epoch, result) => {
                    self.coordinator.complete_generate(epoch, result)
                }
                BackendMsg::Edited(epoch, result) => {
                    self.coordinator.complete_nl_edit(epoch, result)
                }
                BackendMsg::Reviewed(epoch, result) => {
                    self.coordinator.complete_feedback(epoch, result)
                }
            }
            dirty = true;
        }
        while let Ok(event) = self.push_rx.try_recv() {
            self.coordinator.apply_push(event);
            dirty = true;
        }
        if dirty {
            // Generation responses may adopt a server-assigned session id;
            // the channel has to follow it or pushes go to the wrong topic.
            if let Some(id) = self.coordinator.simulation_id().map(str::to_string) {
                self.ensure_channel(&id);
            }
            self.sync_canvas(cx);
        }
    }

    /// Keep one push channel subscribed to the current session, reopening
    /// whenever the session id changes or the channel dropped.
    fn ensure_channel(&mut self, simulation_id: &str) {
        if !channel_needs_reopen(self.channel.as_ref(), simulation_id) {
            return;
        }
        if let Some(stale) = self.channel.take() {
            stale.disconnect();
        }
        if let Some(client) = &self.client {
            self.channel = Some(client.open_channel(simulation_id, self.push_tx.clone()));
        }
    }

    fn submit_generate(&mut self, cx: &mut Context<Self>) {
        let text = self.scenario_input.read(cx).value().to_string();
        match self.coordinator.begin_generate(&text) {
            Ok(id) => {
                self.ensure_channel(&id);
                if let Some(client) = &self.client {
                    let tx = self.backend_tx.clone();
                    let epoch = self.coordinator.epoch();
                    client.generate(&id, &text, self.scenario_type, move |result| {
                        let _ = tx.send(BackendMsg::Generated(epoch, result));
                    });
                }
            }
            Err(err) => self.coordinator.reject(err),
        }
        cx.notify();
    }

    fn submit_edit(&mut self, cx: &mut Context<Self>) {
        let command = self.command_input.read(cx).value().to_string();
        match self.coordinator.begin_nl_edit(&command) {
            Ok(id) => {
                if let Some(client) = &self.client {
                    let tx = self.backend_tx.clone();
                    let epoch = self.coordinator.epoch();
                    client.edit(&id, &command, move |result| {
                        let _ = tx.send(BackendMsg::Edited(epoch, result));
                    });
                }
                self.command_input.update(cx, |field, cx| field.clear(cx));
            }
            Err(err) => self.coordinator.reject(err),
        }
        cx.notify();
    }

    fn submit_feedback(&mut self, cx: &mut Context<Self>) {
        match self.coordinator.begin_feedback() {
            Ok((id, nodes, edges)) => {
                if let Some(client) = &self.client {
                    let tx = self.backend_tx.clone();
                    let epoch = self.coordinator.epoch();
                    client.review(&id, &nodes, &edges, move |result| {
                        let _ = tx.send(BackendMsg::Reviewed(epoch, result));
                    });
                }
            }
            Err(err) => self.coordinator.reject(err),
        }
        cx.notify();
    }

    fn reset(&mut self, cx: &mut Context<Self>) {
        let old_session = self.coordinator.reset();
        if let Some(channel) = self.channel.take() {
            if let Some(id) = &old_session {
                channel.send_reset(id);
            }
            channel.disconnect();
        }
        self.scenario_input.update(cx, |field, cx| field.clear(cx));
        self.command_input.update(cx, |field, cx| field.clear(cx));
        self.sync_canvas(cx);
    }

    fn cycle_scenario_type(&mut self) {
        self.scenario_type = match self.scenario_type {
            ScenarioType::Marketing => ScenarioType::CustomerService,
            ScenarioType::CustomerService => ScenarioType::SoftwareDevelopment,
            ScenarioType::SoftwareDevelopment => ScenarioType::Research,
            ScenarioType::Research => ScenarioType::Other,
            ScenarioType::Other => ScenarioType::Marketing,
        };
    }
}

/// A channel is stale once its session id no longer matches the
/// coordinator's (the backend may assign its own id) or it dropped.
fn channel_needs_reopen(channel: Option<&PushChannel>, simulation_id: &str) -> bool {
    channel.is_none_or(|c| c.simulation_id() != simulation_id || c.is_disconnected())
}

fn toolbar_button<F>(
    label: impl Into<SharedString>,
    enabled: bool,
    cx: &mut Context<Playground>,
    on_press: F,
) -> Div
where
    F: Fn(&mut Playground, &mut Context<Playground>) + 'static,
{
    let base = div()
        .child(label.into())
        .px(px(8.0))
        .py(px(4.0))
        .rounded(px(4.0))
        .border(px(1.0))
        .border_color(rgb(0x334155))
        .text_size(px(12.0))
        .text_color(if enabled { rgb(0xe2e8f0) } else { rgb(0x475569) });
    if !enabled {
        return base;
    }
    base.cursor_pointer()
        .hover(|this| this.bg(rgb(0x1e293b)))
        .on_mouse_down(
            MouseButton::Left,
            cx.listener(move |this, _event: &MouseDownEvent, _window, cx| {
                on_press(this, cx);
            }),
        )
}

fn list_section(title: &str, items: &[String]) -> Option<Div> {
    if items.is_empty() {
        return None;
    }
    Some(
        div()
            .flex()
            .flex_col()
            .gap(px(2.0))
            .child(
                div()
                    .text_color(rgb(0x94a3b8))
                    .text_size(px(11.0))
                    .child(title.to_string()),
            )
            .children(items.iter().map(|item| {
                div()
                    .text_size(px(12.0))
                    .text_color(rgb(0xe2e8f0))
                    .child(format!("• {item}"))
            })),
    )
}

impl Render for Playground {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let store = self.coordinator.store();
        let can_undo = store.can_undo();
        let can_redo = store.can_redo();
        let has_selection = store.selection().is_some();
        let generating = self.coordinator.is_requesting(OperationKind::Generate);
        let editing = self.coordinator.is_requesting(OperationKind::NlEdit);
        let reviewing = self.coordinator.is_requesting(OperationKind::Feedback);

        let graph_row = div()
            .flex()
            .items_center()
            .gap(px(6.0))
            .p(px(8.0))
            .border_b(px(1.0))
            .border_color(rgb(0x1e293b))
            .children(ADD_BUTTONS.map(|(kind, label)| {
                toolbar_button(label, true, cx, move |this, cx| {
                    this.coordinator.add_node(kind);
                    this.sync_canvas(cx);
                })
            }))
            .child(div().w(px(12.0)))
            .child(toolbar_button("Delete", has_selection, cx, |this, cx| {
                if let Err(err) = this.coordinator.delete_selected() {
                    this.coordinator.reject(err);
                }
                this.sync_canvas(cx);
            }))
            .child(toolbar_button("Undo", can_undo, cx, |this, cx| {
                this.coordinator.undo();
                this.sync_canvas(cx);
            }))
            .child(toolbar_button("Redo", can_redo, cx, |this, cx| {
                this.coordinator.redo();
                this.sync_canvas(cx);
            }))
            .child(div().flex_1())
            .child(toolbar_button(
                if reviewing { "Scoring…" } else { "Feedback" },
                !reviewing,
                cx,
                |this, cx| this.submit_feedback(cx),
            ))
            .child(toolbar_button("Reset", true, cx, |this, cx| this.reset(cx)));

        let scenario_row = div()
            .flex()
            .items_center()
            .gap(px(6.0))
            .p(px(8.0))
            .border_b(px(1.0))
            .border_color(rgb(0x1e293b))
            .child(self.scenario_input.clone())
            .child(toolbar_button(
                format!("Type: {}", self.scenario_type),
                true,
                cx,
                |this, cx| {
                    this.cycle_scenario_type();
                    cx.notify();
                },
            ))
            .child(toolbar_button(
                if generating { "Generating…" } else { "Generate" },
                !generating,
                cx,
                |this, cx| this.submit_generate(cx),
            ))
            .child(div().w(px(12.0)))
            .child(self.command_input.clone())
            .child(toolbar_button(
                if editing { "Applying…" } else { "Apply edit" },
                !editing,
                cx,
                |this, cx| this.submit_edit(cx),
            ));

        let notice_bar = self.coordinator.notice().map(|notice| {
            div()
                .flex()
                .items_center()
                .gap(px(8.0))
                .px(px(10.0))
                .py(px(6.0))
                .bg(rgb(0x7f1d1d))
                .text_color(rgb(0xfecaca))
                .text_size(px(12.0))
                .child(div().flex_1().child(notice.to_string()))
                .child(toolbar_button("Dismiss", true, cx, |this, cx| {
                    this.coordinator.dismiss_notice();
                    cx.notify();
                }))
        });

        let feedback_panel = self.coordinator.feedback().cloned().map(|feedback| {
            div()
                .w(px(300.0))
                .h_full()
                .flex()
                .flex_col()
                .gap(px(8.0))
                .p(px(12.0))
                .border_l(px(1.0))
                .border_color(rgb(0x1e293b))
                .bg(rgb(0x111827))
                .child(
                    div()
                        .flex()
                        .items_center()
                        .child(
                            div()
                                .flex_1()
                                .text_size(px(13.0))
                                .text_color(rgb(0x94a3b8))
                                .child("Design feedback"),
                        )
                        .child(toolbar_button("✕", true, cx, |this, cx| {
                            this.coordinator.dismiss_feedback();
                            cx.notify();
                        })),
                )
                .child(
                    div()
                        .text_size(px(28.0))
                        .text_color(rgb(0xf9fafb))
                        .child(format!("{} / 100", feedback.score)),
                )
                .when(!feedback.summary.is_empty(), |this| {
                    this.child(
                        div()
                            .text_size(px(12.0))
                            .text_color(rgb(0xcbd5e1))
                            .child(feedback.summary.clone()),
                    )
                })
                .children(list_section(
                    "Violated principles",
                    &feedback.violated_principles,
                ))
                .children(list_section(
                    "Missing components",
                    &feedback.missing_components,
                ))
                .children(list_section(
                    "Suggested improvements",
                    &feedback.suggested_improvements,
                ))
        });

        div()
            .size_full()
            .flex()
            .flex_col()
            .bg(rgb(0x0f172a))
            .font_family("sans-serif")
            .child(graph_row)
            .child(scenario_row)
            .when_some(notice_bar, |this, bar| this.child(bar))
            .child(
                div()
                    .flex_1()
                    .flex()
                    .child(
                        div()
                            .relative()
                            .flex_1()
                            .h_full()
                            .overflow_hidden()
                            .child(self.canvas.clone()),
                    )
                    .when_some(feedback_panel, |this, panel| this.child(panel)),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[core::prelude::v1::test]
    fn channel_reopens_on_session_change_or_disconnect() {
        assert!(channel_needs_reopen(None, "sim-1"));

        let client = BackendClient::new("http://127.0.0.1:1", "ws://127.0.0.1:1").unwrap();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let channel = client.open_channel("sim-1", tx);
        assert!(!channel_needs_reopen(Some(&channel), "sim-1"));
        // The backend adopted a different session id for this workflow.
        assert!(channel_needs_reopen(Some(&channel), "sim-2"));

        channel.disconnect();
        assert!(channel_needs_reopen(Some(&channel), "sim-1"));
    }
}
