// ABOUTME: Non-fatal problems noticed while deploying or rolling back.
// ABOUTME: Collected during a command and printed once it finishes.

use std::fmt;

use crate::hooks::HookPoint;
use crate::output::Output;

/// Something worth telling the operator that did not change the outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Warning {
    #[error("{point} hook failed{}", ExitSuffix(.exit_code))]
    HookFailed {
        point: HookPoint,
        exit_code: Option<i32>,
    },

    /// The next `rollback` will not see this run.
    #[error("failed to save rollout history: {0}")]
    HistoryNotSaved(String),
}

struct ExitSuffix<'a>(&'a Option<i32>);

impl fmt::Display for ExitSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.0 {
            Some(code) => write!(f, " (exit {code})"),
            None => f.write_str(" (killed by signal)"),
        }
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(%warning, "deploy warning");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Print everything collected, in order.
    pub fn report(&self, output: &Output) {
        for warning in &self.warnings {
            output.warning(&warning.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_warning_names_point_and_exit() {
        let warning = Warning::HookFailed {
            point: HookPoint::PostDeploy,
            exit_code: Some(2),
        };
        assert_eq!(warning.to_string(), "post-deploy hook failed (exit 2)");

        let killed = Warning::HookFailed {
            point: HookPoint::OnError,
            exit_code: None,
        };
        assert_eq!(killed.to_string(), "on-error hook failed (killed by signal)");
    }

    #[test]
    fn warnings_keep_their_order() {
        let mut diag = Diagnostics::default();
        diag.warn(Warning::HistoryNotSaved("permission denied".to_string()));
        diag.warn(Warning::HookFailed {
            point: HookPoint::PostDeploy,
            exit_code: Some(1),
        });

        assert_eq!(
            diag.warnings()[0].to_string(),
            "failed to save rollout history: permission denied"
        );
        assert!(matches!(diag.warnings()[1], Warning::HookFailed { .. }));
    }
}
