mod app;
mod coordinator;
mod text_field;

use anyhow::Result;
use gpui::*;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::app::Playground;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app = Application::new();
    app.run(move |cx| {
        cx.activate(true);

        let bounds = Bounds::centered(None, size(px(1280.0), px(820.0)), cx);
        let result = cx.open_window(
            WindowOptions {
                window_bounds: Some(WindowBounds::Windowed(bounds)),
                titlebar: Some(TitlebarOptions {
                    title: Some("Agent Workflow Playground".into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            |window, cx| cx.new(|cx| Playground::new(window, cx)),
        );
        if let Err(err) = result {
            error!(%err, "failed to open window");
            cx.quit();
        }
    });

    Ok(())
}
