//! Run an external command.

use std::process::Stdio;

use async_trait::async_trait;
use config::AttributeCollection;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{Error, Result, context::ActionContext, registry::Action};

/// Build the process for the `command` attribute of `element`.
///
/// The child inherits the daemon environment with `env` layered on top and
/// gets no stdin. Returns the program name alongside the command.
pub(crate) fn build_command(element: &'static str, attrs: &AttributeCollection) -> Result<(String, Command)> {
    let argv = attrs.command.as_deref().unwrap_or_default();
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::missing(element, "command"));
    };
    if program.trim().is_empty() {
        return Err(Error::invalid(element, "command", "program name is empty"));
    }
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null());
    if let Some(env) = &attrs.env {
        cmd.envs(env);
    }
    Ok((program.clone(), cmd))
}

/// Output stream setting for an `attach_*` flag.
fn attach(flag: bool) -> Stdio {
    if flag { Stdio::inherit() } else { Stdio::null() }
}

/// Starts `command`; with `wait` the press waits for it and a non-zero exit
/// is an error.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ExecAction;

#[async_trait]
impl Action for ExecAction {
    async fn execute(&self, _cx: &ActionContext, attrs: &AttributeCollection) -> Result<()> {
        let (program, mut cmd) = build_command("exec", attrs)?;
        cmd.stdout(attach(attrs.attach_stdout))
            .stderr(attach(attrs.attach_stderr));
        let mut child = cmd.spawn().map_err(|e| Error::Command {
            command: program.clone(),
            message: format!("unable to start: {}", e),
        })?;
        debug!(command = %program, pid = ?child.id(), wait = attrs.wait, "exec_started");

        if attrs.wait {
            let status = child.wait().await?;
            if !status.success() {
                return Err(Error::Command {
                    command: program,
                    message: format!("exited with {}", status),
                });
            }
            return Ok(());
        }

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    debug!(command = %program, %status, "exec_exited");
                }
                Ok(_) => {}
                Err(e) => warn!(command = %program, error = %e, "exec_wait_failed"),
            }
        });
        Ok(())
    }
}
