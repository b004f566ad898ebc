//! Terminal output
//!
//! Interactive terminals get `cliclack` framing and an `indicatif` progress
//! bar; CI runners and pipes get plain prefixed lines.
//!
//! ```rust,ignore
//! use dockstash::ui::{self, RunProgress, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "dockstash run");
//! let progress = RunProgress::new(&ctx, targets.len());
//! // ... progress.on_record(&record) per settled image ...
//! progress.finish();
//! ui::outro_success(&ctx, "All images served from cache");
//! ```

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, outro_error, outro_success, outro_warn, remark, step_error, step_ok, step_ok_detail,
    step_warn, step_warn_hint,
};
pub use progress::{RunProgress, TaskSpinner};
pub use prompts::confirm;
