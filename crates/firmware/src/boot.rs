//! Boot sequence, application side.
//!
//! Order:
//!   1. Claim the shared-memory queue ends (once per power cycle)
//!   2. Build the navigator with `Home` at the root
//!   3. Read `nav.ini`; if an autostart app is configured, exists and is
//!      not hidden, launch it once
//!   4. Hand the navigator to the event loop
//!
//! Steps 1 and 4 belong to the target entry point; [`boot`] covers 2 and 3.
//!
//! A failed autostart leaves the `LaunchFailed` view on top and never
//! retries; the menu stays reachable with `back`.

use loader::EntryResolver;
use platform::storage::{File, Storage};
use platform::{AppRegion, BasebandCore, ImageStore};
use ui::Navigator;

use crate::launcher::{AppLauncher, Launched};

/// How the boot sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// No autostart configured, or the configured app was skipped.
    Menu,
    /// The autostart app was launched.
    Autostarted(Launched),
    /// The autostart app was found but failed to launch.
    AutostartFailed,
}

/// Build the navigator and run the autostart app, if any.
pub async fn boot<S, I, C, R, X>(launcher: &mut AppLauncher<'_, S, I, C, R, X>) -> (Navigator, BootOutcome)
where
    S: Storage,
    S::File: File<Error = S::Error>,
    I: ImageStore,
    C: BasebandCore,
    R: AppRegion,
    X: EntryResolver<Navigator>,
{
    let mut nav = Navigator::new();
    let settings = launcher.settings().await;
    let Some(id) = settings.autostart() else {
        return (nav, BootOutcome::Menu);
    };

    let externals = launcher.external_apps().await;
    let Some(key) = launcher.registry().find(id, &externals) else {
        warn!("autostart app {} not found", id);
        return (nav, BootOutcome::Menu);
    };
    let blacklist = launcher.blacklist().await;
    if blacklist.hides(key.id(), key.display_name()) {
        debug!("autostart app {} is hidden", id);
        return (nav, BootOutcome::Menu);
    }

    info!("autostarting {}", id);
    let outcome = match launcher.launch(&mut nav, key).await {
        Ok(launched) => BootOutcome::Autostarted(launched),
        Err(_) => BootOutcome::AutostartFailed,
    };
    (nav, outcome)
}
