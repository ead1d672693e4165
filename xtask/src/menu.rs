//! xtask menu: show the app menus a device would build from an SD card.
//!
//! Reads `APPS/`, `SETTINGS/blacklist` and `SETTINGS/nav.ini` through the
//! same storage and registry code the firmware runs.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use firmware::BUILTIN_APPS;
use loader::AppLocation;
use platform::config::CURRENT_HEADER_VERSION;
use platform::storage_local::LocalFileStorage;
use ui::{AppKey, AppRegistry, Blacklist, NavSettings};

/// One menu as the device would show it.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MenuListing {
    pub location: AppLocation,
    pub entries: Vec<String>,
}

/// Everything read from the card.
#[derive(Debug)]
pub(crate) struct CardView {
    pub menus: Vec<MenuListing>,
    pub external: usize,
    pub hidden: Vec<String>,
    pub autostart: Option<String>,
}

pub fn run(sd_root: Option<&Path>) -> Result<()> {
    let mut storage = match sd_root {
        Some(root) => LocalFileStorage::new(root.to_str().context("SD root is not valid UTF-8")?),
        None => LocalFileStorage::from_env().context("pass --sd or set SDCARD_PATH")?,
    };
    let view = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?
        .block_on(read_card(&mut storage));

    println!();
    println!("{} external app(s) found", view.external);
    for menu in &view.menus {
        println!("{}", format!("{}", menu.location).cyan().bold());
        for entry in &menu.entries {
            println!("  {entry}");
        }
    }
    if !view.hidden.is_empty() {
        println!("{} {}", "hidden:".yellow(), view.hidden.join(", "));
    }
    match &view.autostart {
        Some(id) => println!("{} {id}", "autostart:".green()),
        None => println!("autostart: none"),
    }
    println!();
    Ok(())
}

pub(crate) async fn read_card(storage: &mut LocalFileStorage) -> CardView {
    let registry = AppRegistry::new(&BUILTIN_APPS, CURRENT_HEADER_VERSION);
    let externals = registry.collect_external(storage).await;
    let blacklist = Blacklist::load(storage).await;
    let settings = NavSettings::load(storage).await;

    let menus = AppLocation::ALL
        .iter()
        .map(|&location| MenuListing {
            location,
            entries: registry
                .menu(location, &externals, &blacklist)
                .iter()
                .map(|key| match key {
                    AppKey::Builtin(app) => app.display_name.to_string(),
                    AppKey::External(app) => format!("{} (external)", app.friendly_name),
                })
                .collect(),
        })
        .filter(|menu| !menu.entries.is_empty())
        .collect();

    CardView {
        menus,
        external: externals.len(),
        hidden: blacklist.names().map(str::to_string).collect(),
        autostart: settings.autostart().map(str::to_string),
    }
}
