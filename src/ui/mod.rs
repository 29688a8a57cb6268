//! Terminal output for the CLI
//!
//! Interactive terminals get `cliclack` log lines, spinners and an
//! `indicatif` bar while assets are precached. CI and piped output fall back
//! to plain tagged lines (`[OK]`, `[WARN]`, ...).
//!
//! ```rust,ignore
//! use shellcache::ui::{self, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "shellcache install");
//! ui::step_ok_detail(&ctx, "Precached", "6 assets");
//! ui::outro_success(&ctx, "Ready for offline use");
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, outro_warn, remark, section, step_error,
    step_info, step_ok, step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::{PrecacheProgress, TaskSpinner};
pub use prompts::confirm;
pub use theme::{init_theme, ShellcacheTheme};
