use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Builds that must succeed, as `(label, cargo args)`.
const BUILDS: &[(&str, &[&str])] = &[
    (
        "application core (LPC43xx M4)",
        &["check", "-p", "firmware", "--target", "thumbv7em-none-eabihf", "--features", "hardware"],
    ),
    (
        "baseband messaging (LPC43xx M0)",
        &["check", "-p", "messaging", "--target", "thumbv6m-none-eabi", "--features", "defmt"],
    ),
    ("host build", &["check", "--workspace", "--features", "firmware/std"]),
];

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking firmware builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    for (label, args) in BUILDS {
        println!("{}", format!("  Checking {label}...").cyan());
        let start = Instant::now();
        let output = Command::new("cargo")
            .args(*args)
            .output()
            .with_context(|| format!("Failed to check {label}"))?;

        if !output.status.success() {
            eprintln!("{}", format!("  ✗ {label} check failed").red().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            anyhow::bail!("{label} check failed");
        }
        println!(
            "{}",
            format!("  ✓ {label} passed in {:.2}s", start.elapsed().as_secs_f64()).green()
        );
        println!();
    }

    println!("{}", "  Running clippy lints...".cyan());
    let clippy_start = Instant::now();
    let clippy_output = Command::new("cargo")
        .args(["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])
        .output()
        .context("Failed to run clippy")?;

    if clippy_output.status.success() {
        println!(
            "{}",
            format!("  ✓ Clippy passed in {:.2}s", clippy_start.elapsed().as_secs_f64()).green()
        );
    } else {
        eprintln!("{}", "  ⚠ Clippy warnings found".yellow().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&clippy_output.stderr));
        // Don't fail on clippy warnings, just show them
    }
    println!();

    println!("{}", "  Checking code formatting...".cyan());
    let fmt_output = Command::new("cargo")
        .args(["fmt", "--all", "--check"])
        .output()
        .context("Failed to run cargo fmt")?;

    if fmt_output.status.success() {
        println!("{}", "  ✓ Formatting check passed".green());
    } else {
        eprintln!("{}", "  ⚠ Formatting issues found".yellow().bold());
        eprintln!("     Run 'cargo fmt --all' to fix");
    }
    println!();

    println!(
        "{}",
        format!("✓ All checks completed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();

    Ok(())
}
