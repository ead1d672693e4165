// Desktop/tooling crate: unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::print_stdout, clippy::use_debug, clippy::arithmetic_side_effects, clippy::indexing_slicing)]
#![allow(missing_docs)]

mod check;
mod inspect;
mod menu;
mod pack;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "DuoCore SDR development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check both core targets, clippy and formatting
    Check,
    /// Run all tests (unit, integration, and doc)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
    /// Build an external app file from a UI payload and optional baseband image
    PackApp {
        /// Menu label (at most 16 bytes)
        #[arg(long)]
        name: String,
        /// UI payload binary
        #[arg(long)]
        ui: PathBuf,
        /// Baseband image appended to the app
        #[arg(long, requires = "tag")]
        baseband: Option<PathBuf>,
        /// Tag of the baseband image, e.g. PAFR
        #[arg(long)]
        tag: Option<String>,
        /// Menu category (Receive, Transmit, Utilities, ...)
        #[arg(long, default_value = "Utilities")]
        location: String,
        /// Preferred menu index, negative to append
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        position: i32,
        /// Icon color (RGB565)
        #[arg(long, default_value_t = 0xFFFF)]
        color: u32,
        /// Checksum of the firmware the app is built against
        #[arg(long, default_value_t = 0)]
        firmware_checksum: u32,
        /// Output file (.ppma)
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Build the flash image directory from TAG=path pairs
    PackImages {
        /// Images, e.g. PNFM=build/nfm.bin
        #[arg(required = true)]
        images: Vec<String>,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Print the header of an external app file
    Inspect {
        /// App file
        path: PathBuf,
    },
    /// Show the menus a device would build from an SD card directory
    Menu {
        /// SD card root (defaults to $SDCARD_PATH)
        #[arg(long)]
        sd: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => check::run(),
        Commands::Test { unit, integration } => test::run(unit, integration),
        Commands::PackApp { name, ui, baseband, tag, location, position, color, firmware_checksum, out } => {
            let tail = match (baseband.as_deref(), tag.as_deref()) {
                (Some(path), Some(tag)) => {
                    let tag = platform::ImageTag::parse(tag)
                        .ok_or_else(|| anyhow::anyhow!("invalid image tag {tag:?}"))?;
                    Some((tag, path))
                }
                _ => None,
            };
            let spec = pack::AppSpec {
                name: &name,
                ui: &ui,
                tail,
                location: pack::parse_location(&location)?,
                position,
                icon_color: color,
                firmware_checksum,
            };
            pack::run_app(&spec, &out)
        }
        Commands::PackImages { images, out } => {
            let images = images.iter().map(|a| pack::parse_image_arg(a)).collect::<Result<Vec<_>>>()?;
            pack::run_images(&images, &out)
        }
        Commands::Inspect { path } => inspect::run(&path),
        Commands::Menu { sd } => menu::run(sd.as_deref()),
    }
}
