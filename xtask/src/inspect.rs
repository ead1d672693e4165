//! xtask inspect: print the header of an external app file.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use loader::app_info::peek_version;
use loader::ApplicationInformation;
use platform::config::CURRENT_HEADER_VERSION;

pub fn run(path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let version = peek_version(&bytes).map_err(|e| anyhow!("{e}"))?;
    let info = ApplicationInformation::decode(&bytes).map_err(|e| anyhow!("{e}"))?;

    println!();
    println!("{}", format!("{}", path.display()).cyan().bold());
    println!("  name           {}", info.name());
    if version == CURRENT_HEADER_VERSION {
        println!("  header version {version}");
    } else {
        println!(
            "  header version {}",
            format!("{version} (firmware expects {CURRENT_HEADER_VERSION})").red()
        );
    }
    println!("  firmware sum   {:08x}", info.app_version);
    println!("  menu           {}", info.menu_location);
    match info.desired_position() {
        Some(p) => println!("  position       {p}"),
        None => println!("  position       append"),
    }
    println!("  icon color     {:06x}", info.icon_color);
    println!("  entry          {:#010x}", info.external_app_entry);

    let size = bytes.len();
    match info.baseband_tail() {
        Some(tag) => {
            let offset = usize::try_from(info.m4_app_offset).unwrap_or(usize::MAX);
            println!("  UI payload     {offset} bytes");
            println!("  baseband       {tag}, {} bytes", size.saturating_sub(offset));
        }
        None => {
            println!("  UI payload     {size} bytes");
            println!("  baseband       none");
        }
    }
    println!();
    Ok(())
}
