//! `vld`: command-line interface for JLab VME LED Driver boards.
//!
//! ```text
//! USAGE:
//!   vld status [address] [--detailed]        Status of one or all boards
//!   vld firmware-update <slot> <file.svf>    Reload the PROM over VME
//!   vld reset <slot> <kind>                  Pulse one reset bit
//!   vld trigger-count <slot>                 Print the trigger counter
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vld_chip::vme::slot_address;
use vld_driver::buses::{MappedBus, SimBoard, SimulatedBus};
use vld_driver::{
    DeviceRegistry, FirmwareLoader, InitConfig, InitFlags, LoadEvent, LoaderConfig, VmeBus,
};

#[derive(Parser)]
#[command(name = "vld", about = "JLab VME LED Driver CLI", version)]
struct Cli {
    /// A24 window exported by the VME bridge (AM 0x39).
    #[arg(long, env = "VLD_A24_WINDOW", default_value = "/dev/vme_a24", global = true)]
    window: PathBuf,

    /// A24 window mapped with the emergency modifier (AM 0x19).
    #[arg(long, env = "VLD_EMERGENCY_WINDOW", global = true)]
    emergency_window: Option<PathBuf>,

    /// Run against a simulated crate with boards in slots 3 and 4.
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the status of every board found.
    Status {
        /// Slot number or A24 address (e.g. 0x180000). Scans the default slots if omitted.
        #[arg(value_parser = parse_address)]
        address: Option<u32>,
        /// Append the raw register dump.
        #[arg(long)]
        detailed: bool,
    },
    /// Reload the configuration PROM through the emergency JTAG port.
    FirmwareUpdate {
        /// VME slot of the board.
        slot: u32,
        /// SVF file to load.
        file: PathBuf,
        /// Answer yes to every confirmation.
        #[arg(long, short)]
        yes: bool,
        /// Store this serial number in place of the PROM user code.
        #[arg(long, value_parser = parse_address)]
        serial: Option<u32>,
    },
    /// Pulse one reset bit.
    Reset {
        /// VME slot of the board.
        slot: u32,
        /// Which block to reset.
        kind: ResetKind,
    },
    /// Print the trigger counter.
    TriggerCount {
        /// VME slot of the board.
        slot: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ResetKind {
    I2c,
    Jtag,
    Soft,
    ClockDcm,
    Mgt,
    HardClock,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let bus = open_bus(&cli)?;

    match cli.command {
        Cmd::Status { address, detailed } => cmd_status(bus, address, detailed)?,
        Cmd::FirmwareUpdate {
            slot,
            file,
            yes,
            serial,
        } => cmd_firmware_update(bus, slot, &file, yes, serial)?,
        Cmd::Reset { slot, kind } => cmd_reset(bus, slot, kind)?,
        Cmd::TriggerCount { slot } => cmd_trigger_count(bus, slot)?,
    }

    Ok(())
}

fn open_bus(cli: &Cli) -> Result<Box<dyn VmeBus>> {
    if cli.simulate {
        let sim = SimulatedBus::new()
            .with_board(3, SimBoard::vld(3))
            .with_board(4, SimBoard::vld(4));
        return Ok(Box::new(sim));
    }
    let bus = MappedBus::open(&cli.window, cli.emergency_window.as_deref())
        .with_context(|| format!("Opening A24 window {}", cli.window.display()))?;
    Ok(Box::new(bus))
}

fn parse_address(s: &str) -> std::result::Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn single_board(bus: Box<dyn VmeBus>, slot: u32) -> Result<DeviceRegistry<Box<dyn VmeBus>>> {
    let registry = DeviceRegistry::new(bus);
    registry
        .init(&InitConfig::single(slot))
        .with_context(|| format!("No VLD in slot {slot}"))?;
    Ok(registry)
}

fn cmd_status(bus: Box<dyn VmeBus>, address: Option<u32>, detailed: bool) -> Result<()> {
    let registry = DeviceRegistry::new(bus);
    let config = address.map_or_else(InitConfig::scan, InitConfig::single);
    registry.init(&config).context("VLD discovery failed")?;
    print!("{}", registry.status(detailed)?);
    Ok(())
}

fn cmd_reset(bus: Box<dyn VmeBus>, slot: u32, kind: ResetKind) -> Result<()> {
    let registry = single_board(bus, slot)?;
    match kind {
        ResetKind::I2c => registry.reset_i2c(slot)?,
        ResetKind::Jtag => registry.reset_jtag(slot)?,
        ResetKind::Soft => registry.soft_reset(slot)?,
        ResetKind::ClockDcm => registry.reset_clock_dcm(slot)?,
        ResetKind::Mgt => registry.reset_mgt(slot)?,
        ResetKind::HardClock => registry.hard_clock_reset(slot)?,
    }
    println!("Slot {slot}: reset done");
    Ok(())
}

fn cmd_trigger_count(bus: Box<dyn VmeBus>, slot: u32) -> Result<()> {
    let registry = single_board(bus, slot)?;
    println!("{}", registry.trigger_count(slot)?);
    Ok(())
}

fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let stdin = std::io::stdin();
    loop {
        print!("{prompt} (y/n): ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim() {
            "y" | "Y" => return Ok(true),
            "n" | "N" => return Ok(false),
            _ => {}
        }
    }
}

fn cmd_firmware_update(
    bus: Box<dyn VmeBus>,
    slot: u32,
    file: &Path,
    yes: bool,
    serial: Option<u32>,
) -> Result<()> {
    println!();
    println!("VLD firmware update via VME");
    println!("---------------------------");

    let registry = DeviceRegistry::new(bus);
    let flags = InitFlags {
        skip_firmware_check: true,
        ..InitFlags::default()
    };

    let address = match registry.init(&InitConfig::single(slot).with_flags(flags)) {
        Ok(_) => {
            info!("VLD found in slot {slot}");
            if registry.geo_address(slot)? == 0 {
                println!("  ...Detected non VME-64X crate...");
                0
            } else {
                registry.device(slot)?.address
            }
        }
        Err(e) => {
            warn!("Discovery in slot {slot} failed: {e}");
            println!();
            println!("*** Failed to initialize VLD ({e}) ***");
            println!("This may indicate (either):");
            println!("   a) an incorrect VME slot provided");
            println!("   b) VLD is unresponsive and needs firmware reloaded");
            println!();
            if !confirm(&format!("Proceed with the update with VME slot {slot}?"), yes)? {
                println!("--- Exiting without update ---");
                return Ok(());
            }
            println!("--- Continuing update, assuming VME slot {slot} is correct ---");
            slot_address(slot)
        }
    };

    info!("Target VME address {address:#08x}");

    let prompt = format!("Load firmware ({}) to the VLD via VME?", file.display());
    if !confirm(&prompt, yes)? {
        println!("--- Exiting without update ---");
        return Ok(());
    }

    let config = LoaderConfig {
        serial_number: serial,
        ..LoaderConfig::default()
    };
    let mut out = std::io::stdout();
    let report = FirmwareLoader::new(config)
        .load(&registry, address, file, |event| {
            match event {
                LoadEvent::Progress { .. } => print!("#"),
                LoadEvent::Erasing { seconds } => print!("\nErasing ({seconds:.1} seconds): .."),
                LoadEvent::Erased => print!("Done\nUpdating: "),
            }
            let _ = out.flush();
        })
        .with_context(|| format!("Firmware update of slot {slot} failed"))?;

    println!();
    println!(
        "** Firmware Update Complete ** ({} statements in {:.1?})",
        report.statements, report.elapsed
    );
    if serial.is_some() && !report.serial_written {
        println!("Warning: no PROM user code found, serial number not written");
    }
    Ok(())
}
