//! App launcher: turns a menu selection into a running app.
//!
//! A built-in app gets its baseband image and then its view on the
//! navigation stack. An external app is copied into the app region and run
//! to completion on top of an [`Screen::External`] entry; when it hands
//! control back the stack is restored to where it was.
//!
//! Both paths push [`Screen::LaunchFailed`] when something goes wrong, so the
//! user always sees the outcome.

use core::fmt;

use loader::{BasebandError, BasebandLoader, EntryResolver, ExternalAppError, ExternalAppLoader, ExternalLaunch, LoadOutcome};
use platform::storage::{File, Storage};
use platform::{AppRegion, BasebandCore, ImageStore};
use ui::{AppKey, AppRegistry, Blacklist, ExternalApp, ExternalApps, NavSettings, Navigator, Screen, SettingsFull};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A successful launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launched {
    /// Built-in view pushed after the baseband switch.
    Builtin {
        /// App id.
        id: &'static str,
        /// What the baseband loader did.
        baseband: LoadOutcome,
    },
    /// External app ran and returned.
    External(ExternalLaunch),
}

/// Launch failures. `SE` is the storage error, `IE` the image store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LaunchError<SE, IE> {
    /// No app with that id.
    NotFound,
    /// The built-in app's baseband image could not be started.
    Baseband(BasebandError<IE>),
    /// The external app could not be loaded.
    External(ExternalAppError<SE>),
}

impl<SE, IE> fmt::Display for LaunchError<SE, IE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("no such app"),
            Self::Baseband(e) => write!(f, "{e}"),
            Self::External(e) => write!(f, "{e}"),
        }
    }
}

/// A menu setting could not be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaveError<E> {
    /// Writing the file failed.
    Storage(E),
    /// No room for the value.
    Full,
}

impl<E> From<SettingsFull> for SaveError<E> {
    fn from(_: SettingsFull) -> Self {
        Self::Full
    }
}

impl<E> fmt::Display for SaveError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(_) => f.write_str("settings write failed"),
            Self::Full => f.write_str("settings full"),
        }
    }
}

// ---------------------------------------------------------------------------
// AppLauncher
// ---------------------------------------------------------------------------

/// Everything needed to start apps of either kind.
pub struct AppLauncher<'a, S, I, C, R, X> {
    storage: S,
    registry: AppRegistry,
    baseband: BasebandLoader<I, C>,
    external: ExternalAppLoader<'a, R>,
    resolver: X,
}

impl<'a, S, I, C, R, X> AppLauncher<'a, S, I, C, R, X>
where
    S: Storage,
    S::File: File<Error = S::Error>,
    I: ImageStore,
    C: BasebandCore,
    R: AppRegion,
    X: EntryResolver<Navigator>,
{
    /// Assemble a launcher.
    pub fn new(
        storage: S,
        registry: AppRegistry,
        baseband: BasebandLoader<I, C>,
        external: ExternalAppLoader<'a, R>,
        resolver: X,
    ) -> Self {
        Self { storage, registry, baseband, external, resolver }
    }

    /// The app registry.
    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    /// The baseband loader.
    pub fn baseband(&self) -> &BasebandLoader<I, C> {
        &self.baseband
    }

    /// Mutable baseband loader, for image switches outside a launch.
    pub fn baseband_mut(&mut self) -> &mut BasebandLoader<I, C> {
        &mut self.baseband
    }

    /// The external app loader.
    pub fn external(&self) -> &ExternalAppLoader<'a, R> {
        &self.external
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Scan storage for external apps.
    pub async fn external_apps(&mut self) -> ExternalApps {
        self.registry.collect_external(&mut self.storage).await
    }

    /// Current blacklist, empty if unreadable.
    pub async fn blacklist(&mut self) -> Blacklist {
        Blacklist::load(&mut self.storage).await
    }

    /// Current navigation settings, empty if unreadable.
    pub async fn settings(&mut self) -> NavSettings {
        NavSettings::load(&mut self.storage).await
    }

    /// Launch `key`, updating `nav` with the outcome.
    pub async fn launch(
        &mut self,
        nav: &mut Navigator,
        key: AppKey<'_>,
    ) -> Result<Launched, LaunchError<S::Error, I::Error>> {
        match key {
            AppKey::Builtin(app) => match self.baseband.run_image(app.baseband) {
                Ok(outcome) => {
                    info!("launching {}", app.id);
                    nav.push(Screen::App(app.id));
                    Ok(Launched::Builtin { id: app.id, baseband: outcome })
                }
                Err(e) => {
                    warn!("{}: baseband image {} failed", app.id, app.baseband);
                    nav.push(Screen::LaunchFailed);
                    Err(LaunchError::Baseband(e))
                }
            },
            AppKey::External(app) => self.launch_external(nav, app).await,
        }
    }

    /// Launch by id: built-ins first, then `externals` by call name.
    pub async fn launch_id(
        &mut self,
        nav: &mut Navigator,
        id: &str,
        externals: &[ExternalApp],
    ) -> Result<Launched, LaunchError<S::Error, I::Error>> {
        let Some(key) = self.registry.find(id, externals) else {
            debug!("no app {}", id);
            return Err(LaunchError::NotFound);
        };
        self.launch(nav, key).await
    }

    async fn launch_external(
        &mut self,
        nav: &mut Navigator,
        app: &ExternalApp,
    ) -> Result<Launched, LaunchError<S::Error, I::Error>> {
        let depth = nav.depth();
        nav.push(Screen::External);
        let result = self
            .external
            .run_external_app(nav, app.path.as_str(), &mut self.storage, &mut self.baseband, &self.resolver)
            .await;
        // Whatever the app pushed is gone once it returns.
        nav.truncate(depth);
        match result {
            Ok(launch) => Ok(Launched::External(launch)),
            Err(e) => {
                warn!("{} failed to launch", app.call_name.as_str());
                nav.push(Screen::LaunchFailed);
                Err(LaunchError::External(e))
            }
        }
    }

    /// Hide or unhide `name` and persist the list. Returns whether it is
    /// hidden afterwards.
    pub async fn toggle_hidden(&mut self, name: &str) -> Result<bool, S::Error> {
        let mut list = self.blacklist().await;
        let hidden = list.toggle(name);
        list.save(&mut self.storage).await?;
        Ok(hidden)
    }

    /// Launch `app_id` at the next boot.
    pub async fn set_autostart(&mut self, app_id: &str) -> Result<(), SaveError<S::Error>> {
        let mut settings = self.settings().await;
        settings.set_autostart(app_id)?;
        settings.save(&mut self.storage).await.map_err(SaveError::Storage)
    }

    /// Boot to the menu.
    pub async fn clear_autostart(&mut self) -> Result<(), S::Error> {
        let mut settings = self.settings().await;
        settings.clear_autostart();
        settings.save(&mut self.storage).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use loader::{EntryTable, LoaderConfig};
    use messaging::{ScratchBuffer, SharedMemory};
    use platform::config::{BLACKLIST_PATH, NAV_SETTINGS_PATH};
    use platform::mocks::{MockAppRegion, MockBasebandCore, MockImageStore, MockStorage};
    use platform::ImageTag;

    use crate::apps::BUILTIN_APPS;

    type TestLauncher<'a> =
        AppLauncher<'a, MockStorage, MockImageStore, MockBasebandCore, MockAppRegion, EntryTable<'static, Navigator>>;

    fn launcher(scratch: &ScratchBuffer, images: MockImageStore) -> TestLauncher<'_> {
        AppLauncher::new(
            MockStorage::new(),
            AppRegistry::new(&BUILTIN_APPS, LoaderConfig::default().header_version),
            BasebandLoader::new(images, MockBasebandCore::new(4096)),
            ExternalAppLoader::new(LoaderConfig::default(), MockAppRegion::new(4096), scratch),
            EntryTable::new(&[]),
        )
    }

    #[tokio::test]
    async fn builtin_switches_image_then_pushes_view() {
        let shared = SharedMemory::new();
        let mut images = MockImageStore::new();
        images.insert(ImageTag::AM_AUDIO, &[1, 2, 3, 4]);
        let mut launcher = launcher(&shared.scratch, images);
        let mut nav = Navigator::new();

        let launched = launcher.launch_id(&mut nav, "am", &[]).await.unwrap();
        assert_eq!(launched, Launched::Builtin { id: "am", baseband: LoadOutcome::Loaded { bytes: 4 } });
        assert_eq!(nav.current(), Screen::App("am"));
        assert_eq!(launcher.baseband().running(), Some(ImageTag::AM_AUDIO));
    }

    #[tokio::test]
    async fn missing_image_shows_launch_failed() {
        let shared = SharedMemory::new();
        let mut launcher = launcher(&shared.scratch, MockImageStore::new());
        let mut nav = Navigator::new();

        let err = launcher.launch_id(&mut nav, "wfm", &[]).await.unwrap_err();
        assert_eq!(err, LaunchError::Baseband(BasebandError::TagNotFound(ImageTag::WFM_AUDIO)));
        assert_eq!(nav.current(), Screen::LaunchFailed);
    }

    #[tokio::test]
    async fn failed_switch_leaves_running_image_alone() {
        let shared = SharedMemory::new();
        let mut images = MockImageStore::new();
        images.insert(ImageTag::AM_AUDIO, &[1, 2, 3, 4]);
        let mut launcher = launcher(&shared.scratch, images);
        let mut nav = Navigator::new();

        launcher.launch_id(&mut nav, "am", &[]).await.unwrap();
        nav.back();
        launcher.launch_id(&mut nav, "wfm", &[]).await.unwrap_err();
        assert_eq!(nav.current(), Screen::LaunchFailed);
        assert_eq!(launcher.baseband().running(), Some(ImageTag::AM_AUDIO));
        assert_eq!(launcher.baseband().core().halt_count(), 1);
    }

    #[tokio::test]
    async fn app_without_image_keeps_baseband() {
        let shared = SharedMemory::new();
        let mut launcher = launcher(&shared.scratch, MockImageStore::new());
        let mut nav = Navigator::new();

        launcher.launch_id(&mut nav, "freqman", &[]).await.unwrap();
        assert_eq!(nav.current(), Screen::App("freqman"));
        assert_eq!(launcher.baseband().core().halt_count(), 0);
    }

    #[tokio::test]
    async fn unknown_id_leaves_navigation_alone() {
        let shared = SharedMemory::new();
        let mut launcher = launcher(&shared.scratch, MockImageStore::new());
        let mut nav = Navigator::new();

        assert_eq!(launcher.launch_id(&mut nav, "nope", &[]).await.unwrap_err(), LaunchError::NotFound);
        assert_eq!(nav.depth(), 1);
    }

    #[tokio::test]
    async fn toggle_hidden_persists() {
        let shared = SharedMemory::new();
        let mut launcher = launcher(&shared.scratch, MockImageStore::new());

        assert!(launcher.toggle_hidden("jammer").await.unwrap());
        let text = std::str::from_utf8(launcher.storage().contents(BLACKLIST_PATH).unwrap()).unwrap();
        assert!(text.lines().any(|l| l == "jammer"));
        assert!(launcher.blacklist().await.contains("jammer"));

        assert!(!launcher.toggle_hidden("jammer").await.unwrap());
        assert!(launcher.blacklist().await.is_empty());
    }

    #[tokio::test]
    async fn autostart_round_trips_through_nav_ini() {
        let shared = SharedMemory::new();
        let mut launcher = launcher(&shared.scratch, MockImageStore::new());

        launcher.set_autostart("gps").await.unwrap();
        assert_eq!(launcher.storage().contents(NAV_SETTINGS_PATH).unwrap(), b"autostart_app=gps\n");
        assert_eq!(launcher.settings().await.autostart(), Some("gps"));

        launcher.clear_autostart().await.unwrap();
        assert_eq!(launcher.settings().await.autostart(), None);
    }
}
