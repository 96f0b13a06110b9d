//! Command output rendered as text, optionally refreshed on an interval.

use std::process::Stdio;

use async_trait::async_trait;
use config::AttributeCollection;
use tracing::{trace, warn};

use super::TextFace;
use crate::{
    Error, Result,
    actions::build_command,
    context::DisplayContext,
    registry::{DisplayElement, RefreshingDisplayElement},
    ticker::Ticker,
};

/// Runs `command` and shows its stdout.
///
/// Output that parses as a JSON attribute object is overlaid onto the
/// configured attributes instead, so a script can change text, colors or
/// caption on each run.
#[derive(Default)]
pub(crate) struct ExecDisplay {
    /// Refresh loop while running.
    ticker: Option<Ticker>,
}

/// Attributes to render for a command that printed `stdout`.
fn apply_output(attrs: &AttributeCollection, stdout: &str) -> AttributeCollection {
    let mut out = attrs.clone();
    match serde_json::from_str::<AttributeCollection>(stdout) {
        Ok(overrides) => out.overlay(overrides),
        Err(_) => out.text = Some(stdout.trim().to_string()),
    }
    out
}

/// Run the command once and draw the result onto key `idx`.
async fn refresh(cx: &DisplayContext, idx: usize, attrs: &AttributeCollection) -> Result<()> {
    let (program, mut cmd) = build_command("exec", attrs)?;
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    let output = tokio::select! {
        biased;
        _ = cx.token().cancelled() => return Ok(()),
        out = cmd.output() => out,
    };
    let output = output.map_err(|e| Error::Command {
        command: program.clone(),
        message: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(Error::Command {
            command: program,
            message: format!("exited with {}", output.status),
        });
    }
    let attrs = apply_output(attrs, &String::from_utf8_lossy(&output.stdout));
    let img = TextFace::from_attrs("exec", &attrs)?.render(cx).await?;
    cx.fill_image(idx, &img).await
}

#[async_trait]
impl DisplayElement for ExecDisplay {
    async fn display(&self, cx: &DisplayContext, idx: usize, attrs: &AttributeCollection) -> Result<()> {
        refresh(cx, idx, attrs).await
    }
}

#[async_trait]
impl RefreshingDisplayElement for ExecDisplay {
    fn needs_loop(&self, attrs: &AttributeCollection) -> bool {
        attrs.interval.is_some_and(|d| !d.is_zero())
    }

    async fn start_loop_display(
        &mut self,
        cx: &DisplayContext,
        idx: usize,
        attrs: &AttributeCollection,
    ) -> Result<()> {
        build_command("exec", attrs)?;
        let interval = attrs
            .interval
            .ok_or_else(|| Error::missing("exec", "interval"))?;
        let cx = cx.clone();
        let attrs = attrs.clone();
        let label = format!("exec:{}:{}", cx.page(), idx);
        let parent = cx.token().clone();
        self.ticker = Some(Ticker::start(label, &parent, interval, move || {
            let cx = cx.clone();
            let attrs = attrs.clone();
            async move {
                if let Err(e) = refresh(&cx, idx, &attrs).await {
                    warn!(page = cx.page(), key = idx, error = %e, "exec_refresh_failed");
                }
            }
        }));
        trace!(key = idx, interval_ms = interval.as_millis() as u64, "exec_loop_started");
        Ok(())
    }

    async fn stop_loop_display(&mut self) -> Result<()> {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn plain_output_becomes_text() {
        let attrs = AttributeCollection {
            caption: Some("cpu".into()),
            ..Default::default()
        };
        let out = apply_output(&attrs, "  42%\n");
        assert_eq!(out.text.as_deref(), Some("42%"));
        assert_eq!(out.caption.as_deref(), Some("cpu"));
    }

    #[test]
    fn json_output_overrides_attributes() {
        let attrs = AttributeCollection {
            text: Some("static".into()),
            caption: Some("cpu".into()),
            ..Default::default()
        };
        let out = apply_output(&attrs, r#"{"text": "hot", "rgba": [255, 0, 0, 255]}"#);
        assert_eq!(out.text.as_deref(), Some("hot"));
        assert_eq!(out.rgba, Some(vec![255, 0, 0, 255]));
        assert_eq!(out.caption.as_deref(), Some("cpu"));
    }

    #[test]
    fn loops_only_with_an_interval() {
        let d = ExecDisplay::default();
        assert!(!d.needs_loop(&AttributeCollection::default()));
        let attrs = AttributeCollection {
            interval: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        assert!(d.needs_loop(&attrs));
    }
}
