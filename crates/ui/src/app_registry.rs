//! Application registry: built-in and external apps by menu category.
//!
//! Built-in apps come from a static table whose order is the display
//! order. External apps are discovered by scanning [`APPS_DIR`] each time a
//! menu is built; nothing is cached between visits.

use core::fmt::Write as _;

use heapless::{String, Vec};
use loader::{read_header, AppLocation, ApplicationInformation};
use platform::config::{APPS_DIR, EXTERNAL_APP_EXTENSION, MAX_APP_NAME, MAX_EXTERNAL_APPS};
use platform::storage::{File, Storage};
use platform::ImageTag;

use crate::blacklist::Blacklist;

/// Maximum length of an external app path.
pub const MAX_APP_PATH: usize = 96;

/// Maximum entries in one menu.
pub const MAX_MENU: usize = 64;

// ---------------------------------------------------------------------------
// App descriptions
// ---------------------------------------------------------------------------

/// An app compiled into the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinApp {
    /// Stable id, used for autostart and the blacklist.
    pub id: &'static str,
    /// Menu label.
    pub display_name: &'static str,
    /// Menu category.
    pub location: AppLocation,
    /// Icon color.
    pub icon_color: u32,
    /// Baseband image the app's view needs, [`ImageTag::NONE`] for none.
    pub baseband: ImageTag,
}

/// An app found on removable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalApp {
    /// File stem, used for autostart and the blacklist.
    pub call_name: String<MAX_APP_NAME>,
    /// Full path of the binary.
    pub path: String<MAX_APP_PATH>,
    /// Menu label from the header.
    pub friendly_name: String<MAX_APP_NAME>,
    /// Menu category.
    pub location: AppLocation,
    /// Preferred index in the category.
    pub desired_position: Option<usize>,
    /// Baseband image carried in the file.
    pub baseband_tag: ImageTag,
    /// Icon color.
    pub icon_color: u32,
}

impl ExternalApp {
    /// Describe the app at `path` from its header.
    pub fn from_header(call_name: &str, path: &str, info: &ApplicationInformation) -> Option<Self> {
        Some(Self {
            call_name: String::try_from(call_name).ok()?,
            path: String::try_from(path).ok()?,
            friendly_name: String::try_from(info.name()).ok()?,
            location: info.menu_location,
            desired_position: info.desired_position(),
            baseband_tag: info.m4_app_tag,
            icon_color: info.icon_color,
        })
    }
}

/// Reference to an app of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppKey<'a> {
    /// Built-in app.
    Builtin(&'static BuiltinApp),
    /// External app.
    External(&'a ExternalApp),
}

impl<'a> AppKey<'a> {
    /// Stable id.
    pub fn id(&self) -> &'a str {
        match self {
            Self::Builtin(app) => app.id,
            Self::External(app) => app.call_name.as_str(),
        }
    }

    /// Menu label.
    pub fn display_name(&self) -> &'a str {
        match self {
            Self::Builtin(app) => app.display_name,
            Self::External(app) => app.friendly_name.as_str(),
        }
    }

    /// Menu category.
    pub fn location(&self) -> AppLocation {
        match self {
            Self::Builtin(app) => app.location,
            Self::External(app) => app.location,
        }
    }

    /// Icon color.
    pub fn icon_color(&self) -> u32 {
        match self {
            Self::Builtin(app) => app.icon_color,
            Self::External(app) => app.icon_color,
        }
    }
}

/// External apps found by one scan.
pub type ExternalApps = Vec<ExternalApp, MAX_EXTERNAL_APPS>;

/// One menu's entries, in display order.
pub type Menu<'a> = Vec<AppKey<'a>, MAX_MENU>;

// ---------------------------------------------------------------------------
// AppRegistry
// ---------------------------------------------------------------------------

/// Built-in app table plus external discovery.
#[derive(Clone, Copy)]
pub struct AppRegistry {
    builtins: &'static [BuiltinApp],
    header_version: u32,
}

impl AppRegistry {
    /// Registry over `builtins`, accepting external apps with `header_version`.
    pub const fn new(builtins: &'static [BuiltinApp], header_version: u32) -> Self {
        Self { builtins, header_version }
    }

    /// The built-in table.
    pub fn builtins(&self) -> &'static [BuiltinApp] {
        self.builtins
    }

    /// Built-in app by id.
    pub fn builtin(&self, id: &str) -> Option<&'static BuiltinApp> {
        self.builtins.iter().find(|app| app.id == id)
    }

    /// App by id: built-ins first, then `externals` by call name.
    pub fn find<'a>(&self, id: &str, externals: &'a [ExternalApp]) -> Option<AppKey<'a>> {
        self.builtin(id).map(AppKey::Builtin).or_else(|| {
            externals.iter().find(|app| app.call_name == id).map(AppKey::External)
        })
    }

    /// Call `found` once per usable app in [`APPS_DIR`]. Returns how many
    /// were reported.
    ///
    /// Files with another extension, unreadable files and headers this
    /// firmware does not accept are skipped. A missing directory reports
    /// nothing.
    pub async fn scan_external<S, F>(&self, storage: &mut S, mut found: F) -> usize
    where
        S: Storage,
        S::File: File<Error = S::Error>,
        F: FnMut(ExternalApp),
    {
        let Ok(listing) = storage.list_dir(APPS_DIR).await else {
            debug!("no {} directory", APPS_DIR);
            return 0;
        };
        let mut count: usize = 0;
        for name in &listing {
            let Some(stem) = app_stem(name.as_str()) else {
                continue;
            };
            let mut path: String<MAX_APP_PATH> = String::new();
            if write!(path, "{APPS_DIR}/{name}").is_err() {
                continue;
            }
            match read_header(storage, &path, self.header_version).await {
                Ok(info) => match ExternalApp::from_header(stem, &path, &info) {
                    Some(app) => {
                        found(app);
                        count = count.saturating_add(1);
                    }
                    None => debug!("skipping {}: name too long", name.as_str()),
                },
                Err(_) => debug!("skipping {}: unreadable header", name.as_str()),
            }
        }
        count
    }

    /// Scan and collect, keeping the first [`MAX_EXTERNAL_APPS`].
    pub async fn collect_external<S>(&self, storage: &mut S) -> ExternalApps
    where
        S: Storage,
        S::File: File<Error = S::Error>,
    {
        let mut apps = ExternalApps::new();
        self.scan_external(storage, |app| {
            if apps.push(app).is_err() {
                debug!("external app list full");
            }
        })
        .await;
        apps
    }

    /// Visible apps in `location`: built-ins in table order, then external
    /// apps inserted at their desired position or appended.
    pub fn menu<'a>(
        &self,
        location: AppLocation,
        externals: &'a [ExternalApp],
        blacklist: &Blacklist,
    ) -> Menu<'a> {
        let mut menu = Menu::new();
        let visible = |key: &AppKey<'_>| {
            key.location() == location && !blacklist.hides(key.id(), key.display_name())
        };
        for key in self.builtins.iter().map(AppKey::Builtin).filter(&visible) {
            if menu.push(key).is_err() {
                return menu;
            }
        }
        for app in externals {
            let key = AppKey::External(app);
            if !visible(&key) {
                continue;
            }
            let at = app.desired_position.map_or(menu.len(), |p| p.min(menu.len()));
            if menu.insert(at, key).is_err() {
                debug!("menu full");
                break;
            }
        }
        menu
    }
}

fn app_stem(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    (!stem.is_empty() && ext.eq_ignore_ascii_case(EXTERNAL_APP_EXTENSION)).then_some(stem)
}
