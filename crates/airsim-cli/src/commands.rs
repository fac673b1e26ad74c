//! Subcommand handlers. Each takes the immutable [`AppConfig`] and writes
//! user-facing output to `out`; diagnostics go through `tracing`.

use std::io::Write;

use anyhow::{Context, Result};
use unicode_width::UnicodeWidthStr;

use airsim_core::cli::{CaptureImagesArgs, LidarDumpArgs, SettingsArgs};
use airsim_core::settings::SettingsStore;
use airsim_core::AppConfig;
use airsim_rpc::Connection;
use airsim_runtime::registry::ExampleDescriptor;
use airsim_runtime::{CaptureJob, CaptureService, ExampleRegistry, ExampleRunner};

/// Open and confirm a session with the simulator.
fn open(config: &AppConfig) -> Result<Connection> {
    let mut conn = Connection::connect(config)?;
    conn.confirm()?;
    Ok(conn)
}

// ── examples / describe ────────────────────────────────────────────────────────

pub fn list_examples(registry: &ExampleRegistry, out: &mut impl Write) -> Result<()> {
    let examples = registry.list();
    if examples.is_empty() {
        anyhow::bail!("no examples registered");
    }
    write_table(&examples, out)?;
    Ok(())
}

fn write_table(examples: &[ExampleDescriptor], out: &mut impl Write) -> std::io::Result<()> {
    let rows: Vec<[String; 3]> = examples
        .iter()
        .map(|e| {
            [
                e.name.clone(),
                e.summary().to_string(),
                e.file_path.display().to_string(),
            ]
        })
        .collect();

    let header = ["Name", "Description", "Path"];
    let mut widths = header.map(UnicodeWidthStr::width);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.width());
        }
    }

    let line = |cells: [&str; 3]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{}{}", cell, " ".repeat(w - cell.width())))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let rule = widths.map(|w| "-".repeat(w));
    writeln!(out, "{}", line(header))?;
    writeln!(out, "{}", line([rule[0].as_str(), rule[1].as_str(), rule[2].as_str()]))?;
    for [name, description, path] in &rows {
        writeln!(out, "{}", line([name.as_str(), description.as_str(), path.as_str()]))?;
    }
    Ok(())
}

pub fn describe_example(
    registry: &ExampleRegistry,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    let example = registry.describe(name)?;
    writeln!(out, "{}", example.name)?;
    writeln!(out, "{}", example.file_path.display())?;
    writeln!(out)?;
    writeln!(out, "{}", example.description)?;
    Ok(())
}

// ── run ────────────────────────────────────────────────────────────────────────

pub fn run_example(
    config: &AppConfig,
    registry: &ExampleRegistry,
    name: &str,
    yield_control: bool,
) -> Result<()> {
    // Unknown names fail before any connection attempt.
    registry.find(name)?;
    let mut conn = open(config)?;
    ExampleRunner::new(registry, config).run(name, &mut conn, yield_control)?;
    Ok(())
}

// ── settings ───────────────────────────────────────────────────────────────────

pub fn settings(config: &AppConfig, args: &SettingsArgs, out: &mut impl Write) -> Result<()> {
    let edit = args.to_edit(&config.vehicle);
    let store = SettingsStore::new(&config.settings_path);

    let mut doc = store.load(!edit.has_mutations())?;
    let applied = edit.apply(&mut doc)?;
    tracing::debug!(applied, path = %store.path().display(), "settings edits applied");

    if args.show || applied == 0 {
        writeln!(out, "{}", doc.show())?;
    }

    if args.save && applied > 0 {
        store.save(&doc)?;
        writeln!(out, "Saved changes to {}", store.path().display())?;
    } else if applied > 0 {
        tracing::info!("{} change(s) not saved; pass --save to write them", applied);
    }
    Ok(())
}

// ── capture-images / lidar-dump ────────────────────────────────────────────────

pub fn capture_images(
    config: &AppConfig,
    args: &CaptureImagesArgs,
    out: &mut impl Write,
) -> Result<()> {
    let job = CaptureJob::images(&args.camera, &args.out_dir, args.count, args.interval)?;
    let mut conn = open(config)?;
    let summary = CaptureService::new(&mut conn, &config.vehicle).capture_images(&job)?;
    writeln!(
        out,
        "Saved {} images to {}",
        summary.files.len(),
        job.output.display()
    )?;
    Ok(())
}

pub fn lidar_dump(config: &AppConfig, args: &LidarDumpArgs, out: &mut impl Write) -> Result<()> {
    let job = CaptureJob::lidar(&args.sensor_name, &args.out_file);
    let mut conn = open(config)?;
    let summary = CaptureService::new(&mut conn, &config.vehicle).lidar_dump(&job)?;
    writeln!(
        out,
        "Wrote {} points to {}",
        summary.points,
        summary.path.display()
    )?;
    Ok(())
}

// ── yield-control ──────────────────────────────────────────────────────────────

pub fn yield_control(config: &AppConfig, out: &mut impl Write) -> Result<()> {
    let mut conn = open(config)?;
    conn.release_control(&config.vehicle)
        .with_context(|| format!("failed to yield control of {}", config.vehicle))?;
    writeln!(out, "Yielded control of {} back to the keyboard", config.vehicle)?;
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
