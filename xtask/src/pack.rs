//! xtask pack-app / pack-images: build the binaries the firmware loads.
//!
//! An external app file is `[header][UI payload][baseband tail]`; the header
//! records where the tail starts. The image directory is the table the
//! baseband loader reads from SPI flash.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use loader::image_directory;
use loader::{AppLocation, ApplicationInformation, HEADER_SIZE};
use platform::config::CURRENT_HEADER_VERSION;
use platform::ImageTag;

/// Inputs for one external app.
pub struct AppSpec<'a> {
    pub name: &'a str,
    pub ui: &'a Path,
    pub tail: Option<(ImageTag, &'a Path)>,
    pub location: AppLocation,
    pub position: i32,
    pub icon_color: u32,
    pub firmware_checksum: u32,
}

pub fn run_app(spec: &AppSpec<'_>, out: &Path) -> Result<()> {
    let ui = fs::read(spec.ui).with_context(|| format!("reading {}", spec.ui.display()))?;
    let tail = spec
        .tail
        .map(|(tag, path)| fs::read(path).with_context(|| format!("reading {}", path.display())).map(|b| (tag, b)))
        .transpose()?;

    let bytes = pack_app(spec, &ui, tail.as_ref().map(|(t, b)| (*t, b.as_slice())))?;
    fs::write(out, &bytes).with_context(|| format!("writing {}", out.display()))?;

    println!(
        "{}",
        format!("✓ {} ({} bytes) → {}", spec.name, bytes.len(), out.display()).green()
    );
    Ok(())
}

pub(crate) fn pack_app(spec: &AppSpec<'_>, ui: &[u8], tail: Option<(ImageTag, &[u8])>) -> Result<Vec<u8>> {
    if spec.name.is_empty() {
        bail!("app name must not be empty");
    }
    let mut info = ApplicationInformation {
        header_version: CURRENT_HEADER_VERSION,
        app_version: spec.firmware_checksum,
        icon_color: spec.icon_color,
        menu_location: spec.location,
        desired_menu_position: spec.position,
        ..ApplicationInformation::default()
    };
    info.set_name(spec.name);
    if info.name() != spec.name {
        println!("{}", format!("  ⚠ name truncated to {:?}", info.name()).yellow());
    }

    let ui_end = HEADER_SIZE.checked_add(ui.len()).ok_or_else(|| anyhow!("UI payload too large"))?;
    if let Some((tag, _)) = tail {
        info.m4_app_tag = tag;
        info.m4_app_offset = u32::try_from(ui_end).context("UI payload exceeds 4 GiB")?;
    }

    let mut bytes = Vec::with_capacity(ui_end);
    bytes.extend_from_slice(&info.encode());
    bytes.extend_from_slice(ui);
    if let Some((_, image)) = tail {
        bytes.extend_from_slice(image);
    }
    Ok(bytes)
}

/// Parse a `TAG=path` argument.
pub fn parse_image_arg(arg: &str) -> Result<(ImageTag, PathBuf)> {
    let (tag, path) = arg.split_once('=').ok_or_else(|| anyhow!("expected TAG=path, got {arg:?}"))?;
    let tag = ImageTag::parse(tag).ok_or_else(|| anyhow!("invalid image tag {tag:?}"))?;
    Ok((tag, PathBuf::from(path)))
}

pub fn run_images(images: &[(ImageTag, PathBuf)], out: &Path) -> Result<()> {
    let mut loaded = Vec::with_capacity(images.len());
    for (tag, path) in images {
        if loaded.iter().any(|(t, _): &(ImageTag, Vec<u8>)| t == tag) {
            bail!("image {tag} given twice");
        }
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        println!("  {} {:>8} bytes  {}", tag.to_string().cyan(), bytes.len(), path.display());
        loaded.push((*tag, bytes));
    }

    let pairs: Vec<(ImageTag, &[u8])> = loaded.iter().map(|(t, b)| (*t, b.as_slice())).collect();
    let table = image_directory::build(&pairs).map_err(|e| anyhow!("{e}"))?;
    fs::write(out, &table).with_context(|| format!("writing {}", out.display()))?;

    println!(
        "{}",
        format!("✓ {} images ({} bytes) → {}", loaded.len(), table.len(), out.display()).green()
    );
    Ok(())
}

/// Menu location by name, as shown in the menu or the variant name.
pub fn parse_location(s: &str) -> Result<AppLocation> {
    AppLocation::ALL
        .into_iter()
        .find(|l| l.name().eq_ignore_ascii_case(s) || format!("{l:?}").eq_ignore_ascii_case(s))
        .ok_or_else(|| anyhow!("unknown menu location {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loader::ImageDirectory;

    fn spec(ui: &Path) -> AppSpec<'_> {
        AppSpec {
            name: "Pager",
            ui,
            tail: None,
            location: AppLocation::Rx,
            position: -1,
            icon_color: 0xF800,
            firmware_checksum: 0,
        }
    }

    #[test]
    fn app_without_tail_has_zero_offset() {
        let ui = Path::new("ui.bin");
        let bytes = pack_app(&spec(ui), &[1; 100], None).unwrap();
        let info = ApplicationInformation::decode_checked(&bytes, CURRENT_HEADER_VERSION).unwrap();
        assert_eq!(info.m4_app_offset, 0);
        assert_eq!(info.baseband_tail(), None);
        assert_eq!(info.name(), "Pager");
        assert_eq!(bytes.len(), HEADER_SIZE + 100);
    }

    #[test]
    fn tail_offset_points_past_the_payload() {
        let ui = Path::new("ui.bin");
        let bytes = pack_app(&spec(ui), &[1; 940], Some((ImageTag::AFSK_RX, &[2; 256]))).unwrap();
        let info = ApplicationInformation::decode(&bytes).unwrap();
        assert_eq!(info.m4_app_offset, 1024);
        assert_eq!(info.baseband_tail(), Some(ImageTag::AFSK_RX));
        assert!(bytes[1024..].iter().all(|&b| b == 2));
    }

    #[test]
    fn image_args_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("nfm.bin");
        fs::write(&a, [9u8; 32]).unwrap();
        let out = dir.path().join("images.bin");

        let arg = format!("PNFM={}", a.display());
        run_images(&[parse_image_arg(&arg).unwrap()], &out).unwrap();

        let table = fs::read(&out).unwrap();
        let found = ImageDirectory::new(&table).find(ImageTag::NFM_AUDIO).unwrap().unwrap();
        assert_eq!(found, &[9u8; 32]);
        assert!(parse_image_arg("PNFM").is_err());
        assert!(parse_image_arg("TOOLONG=x").is_err());
    }

    #[test]
    fn locations_by_either_name() {
        assert_eq!(parse_location("transmit").unwrap(), AppLocation::Tx);
        assert_eq!(parse_location("Tx").unwrap(), AppLocation::Tx);
        assert!(parse_location("kitchen").is_err());
    }
}
