//! Emergency PROM loading
//!
//! Replays an SVF file into a board's configuration PROM through the
//! emergency JTAG port. This works on boards whose FPGA no longer
//! configures, which is the point: the normal register space is not used.
//!
//! The registry lock and the bus lock are both held for the whole load, and
//! the A24 modifier is switched to 0x19. Any failure ends the load; the
//! addressing is restored on every path and nothing is retried.

use crate::bus::VmeBus;
use crate::error::Result;
use crate::jtag::JtagPort;
use crate::registry::DeviceRegistry;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vld_chip::jtag::pack_words;
use vld_chip::vme::am;
use vld_chip::{TapOp, TapState};
use vld_svf::{Command, EndIr, Shift, SvfFile};

/// PROM user code written by the vendor tools, replaced by a serial number
/// when one is configured.
pub const PROM_USERCODE: u32 = 0x71D5_5948;

/// `RUNTEST` cycle counts above this are reported as erase phases.
pub const ERASE_REPORT_CYCLES: usize = 100_000;

/// Loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Wait after each of the two initial TAP resets.
    pub settle_delay: Duration,

    /// Sleep `cycles / 2` µs on `RUNTEST`, giving the PROM time to program.
    pub pace_runtest: bool,

    /// Probe the identity word before touching the TAP.
    pub check_readable: bool,

    /// Progress marks emitted over the whole file.
    pub progress_marks: usize,

    /// Serial number to store in place of the PROM user code.
    pub serial_number: Option<u32>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(20),
            pace_runtest: true,
            check_readable: true,
            progress_marks: 40,
            serial_number: None,
        }
    }
}

impl LoaderConfig {
    /// Configuration with every wait disabled, for simulation.
    pub fn without_delays() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            pace_runtest: false,
            ..Self::default()
        }
    }
}

/// Loader progress notifications
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadEvent {
    /// Another progress mark reached.
    Progress {
        /// Physical lines consumed.
        line: usize,
        /// Physical lines in the file.
        total: usize,
    },
    /// A long `RUNTEST` (PROM erase) started.
    Erasing {
        /// Expected duration in seconds.
        seconds: f64,
    },
    /// The erase wait finished.
    Erased,
}

/// Load operation metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Physical lines in the file.
    pub lines: usize,
    /// Statements executed or skipped.
    pub statements: usize,
    /// TAP operations executed.
    pub tap_ops: usize,
    /// Directives that were not acted on.
    pub ignored: usize,
    /// Shadow register writes.
    pub jtag_writes: u64,
    /// Whether the user code was replaced by a serial number.
    pub serial_written: bool,
    /// Wrapped `SDR` statements whose line layout disagreed with the framing table.
    pub framing_mismatches: usize,
    /// Wall time of the load.
    pub elapsed: Duration,
}

/// Emergency PROM loader
///
/// An `SDR` enters from the state the TAP is actually parked in, not from
/// the most recent `ENDIR`, so only the first shift after an `IRPAUSE` walks
/// out of Pause-IR.
#[derive(Debug, Clone, Default)]
pub struct FirmwareLoader {
    config: LoaderConfig,
}

impl FirmwareLoader {
    /// Create loader
    pub const fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Loader configuration.
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load the SVF file at `path` into the board at VME address `address`.
    ///
    /// The file is opened after emergency addressing is entered, so a missing
    /// file still passes through the lock/restore sequence.
    ///
    /// # Errors
    ///
    /// Returns addressing, probe, file, parse and bus errors; all are fatal.
    pub fn load<B: VmeBus>(
        &self,
        registry: &DeviceRegistry<B>,
        address: u32,
        path: &Path,
        progress: impl FnMut(LoadEvent),
    ) -> Result<LoadReport> {
        info!("Loading {} into the PROM at {address:#x}", path.display());
        self.run(registry, address, || Ok(SvfFile::from_file(path)?), progress)
    }

    /// Load already parsed SVF text into the board at VME address `address`.
    ///
    /// # Errors
    ///
    /// Returns addressing, probe, parse and bus errors; all are fatal.
    pub fn load_svf<B: VmeBus>(
        &self,
        registry: &DeviceRegistry<B>,
        address: u32,
        svf: &SvfFile,
        progress: impl FnMut(LoadEvent),
    ) -> Result<LoadReport> {
        self.run(registry, address, || Ok(svf.clone()), progress)
    }

    fn run<B: VmeBus>(
        &self,
        registry: &DeviceRegistry<B>,
        address: u32,
        open: impl FnOnce() -> Result<SvfFile>,
        mut progress: impl FnMut(LoadEvent),
    ) -> Result<LoadReport> {
        let start = Instant::now();
        let mut guard = registry.lock();
        let bus = &mut guard.bus;
        let base = bus.bus_to_local(am::A24_DATA, address)?;

        let mut port = JtagPort::open(bus, base)?;

        if self.config.check_readable {
            let id = port.probe()?;
            debug!("Board at {address:#x} answers with {id:#010x}");
        }

        let svf = open()?;

        port.execute(&TapOp::Reset)?;
        std::thread::sleep(self.config.settle_delay);
        port.execute(&TapOp::Reset)?;
        std::thread::sleep(self.config.settle_delay);
        debug!("PROM TAP reset to Idle");

        let total = svf.line_count();
        let step = (total / self.config.progress_marks.max(1)).max(1);
        let mut next_mark = step;

        let mut report = LoadReport {
            lines: total,
            ..LoadReport::default()
        };
        let mut end_ir = TapState::Idle;

        let mut statements = svf.statements();
        for statement in statements.by_ref() {
            let statement = statement?;
            report.statements += 1;

            while statement.last_line >= next_mark && next_mark <= total {
                progress(LoadEvent::Progress {
                    line: next_mark,
                    total,
                });
                next_mark += step;
            }

            let op = match statement.command()? {
                Command::ShiftInstruction(Shift {
                    bits,
                    tdi: Some(bytes),
                }) => TapOp::ShiftInstruction {
                    bits,
                    data: pack_words(&bytes),
                    end: end_ir,
                },
                Command::ShiftData(Shift {
                    bits,
                    tdi: Some(bytes),
                }) => {
                    let mut data = pack_words(&bytes);
                    if let Some(serial) = self.config.serial_number {
                        if bits == 32 && data.first() == Some(&PROM_USERCODE) {
                            info!("Replacing PROM user code with serial number {serial:#010x}");
                            data[0] = serial;
                            report.serial_written = true;
                        }
                    }
                    TapOp::ShiftData {
                        bits,
                        data,
                        start: port.state(),
                    }
                }
                Command::ShiftInstruction(Shift { tdi: None, .. })
                | Command::ShiftData(Shift { tdi: None, .. }) => {
                    debug!("Line {}: shift without TDI skipped", statement.line);
                    report.ignored += 1;
                    continue;
                }
                Command::RunTest { cycles } => {
                    self.run_test(&mut port, cycles, &mut progress)?;
                    report.tap_ops += 1;
                    continue;
                }
                Command::Reset => TapOp::Reset,
                Command::EndIr(EndIr::Idle) => {
                    end_ir = TapState::Idle;
                    continue;
                }
                Command::EndIr(EndIr::IrPause) => {
                    end_ir = TapState::PauseIr;
                    continue;
                }
                Command::Ignored(_) => {
                    report.ignored += 1;
                    continue;
                }
            };

            port.execute(&op)?;
            report.tap_ops += 1;
        }

        if self.config.serial_number.is_some() && !report.serial_written {
            warn!("Serial number configured but the file carries no PROM user code");
        }

        report.framing_mismatches = statements.framing_mismatches();
        report.jtag_writes = port.writes();
        report.elapsed = start.elapsed();
        drop(port);

        info!(
            "Firmware update complete: {} statements, {} JTAG writes in {:.1?}",
            report.statements, report.jtag_writes, report.elapsed
        );
        Ok(report)
    }

    fn run_test<B: VmeBus + ?Sized>(
        &self,
        port: &mut JtagPort<'_, B>,
        cycles: usize,
        progress: &mut impl FnMut(LoadEvent),
    ) -> Result<()> {
        let erasing = cycles > ERASE_REPORT_CYCLES;
        if erasing {
            #[allow(clippy::cast_precision_loss)]
            let seconds = cycles as f64 / 2.0 / 1_000_000.0;
            progress(LoadEvent::Erasing { seconds });
        }

        port.execute(&TapOp::RunTest { cycles })?;
        if self.config.pace_runtest {
            std::thread::sleep(Duration::from_micros((cycles / 2) as u64));
        }

        if erasing {
            progress(LoadEvent::Erased);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buses::{SimBoard, SimulatedBus};
    use crate::error::VldError;
    use vld_chip::vme::slot_address;

    fn registry() -> (SimulatedBus, DeviceRegistry<SimulatedBus>) {
        let sim = SimulatedBus::new().with_board(7, SimBoard::vld(7));
        (sim.clone(), DeviceRegistry::new(sim))
    }

    fn load(text: &str, config: LoaderConfig) -> (SimulatedBus, Result<LoadReport>) {
        let (sim, registry) = registry();
        let loader = FirmwareLoader::new(config);
        let svf = SvfFile::from_text(text);
        let result = loader.load_svf(&registry, slot_address(7), &svf, |_| {});
        (sim, result)
    }

    #[test]
    fn defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.progress_marks, 40);
        assert!(config.pace_runtest);
        assert!(config.serial_number.is_none());

        let fast = LoaderConfig::without_delays();
        assert_eq!(fast.settle_delay, Duration::ZERO);
        assert!(!fast.pace_runtest);
        assert!(fast.check_readable);
    }

    #[test]
    fn two_resets_before_statements() {
        let (sim, result) = load("", LoaderConfig::without_delays());
        let report = result.unwrap();
        assert_eq!(report.jtag_writes, 12);
        assert_eq!(sim.board(7).unwrap().jtag, [[1, 1, 1, 1, 1, 0], [1, 1, 1, 1, 1, 0]].concat());
        assert!(!sim.is_locked());
        assert_eq!(sim.am_history(), vec![am::EMERGENCY, am::DEFAULT]);
    }

    #[test]
    fn user_code_replaced_by_serial() {
        let config = LoaderConfig {
            serial_number: Some(0x0000_0042),
            ..LoaderConfig::without_delays()
        };
        let (sim, result) = load("SDR 32 TDI (71D55948);\n", config);
        assert!(result.unwrap().serial_written);

        let jtag = sim.board(7).unwrap().jtag;
        let expected: Vec<u32> = TapOp::ShiftData {
            bits: 32,
            data: vec![0x42],
            start: TapState::Idle,
        }
        .words()
        .collect();
        assert_eq!(&jtag[12..], expected.as_slice());
    }

    #[test]
    fn user_code_kept_without_serial() {
        let (_, result) = load("SDR 32 TDI (71D55948);\n", LoaderConfig::without_delays());
        assert!(!result.unwrap().serial_written);
    }

    #[test]
    fn erase_events() {
        let (_, registry) = registry();
        let loader = FirmwareLoader::new(LoaderConfig::without_delays());
        let svf = SvfFile::from_text("RUNTEST 200000 TCK;\nRUNTEST 10 TCK;\n");
        let mut events = Vec::new();
        loader
            .load_svf(&registry, slot_address(7), &svf, |e| events.push(e))
            .unwrap();
        let erases: Vec<_> = events
            .iter()
            .filter(|e| !matches!(e, LoadEvent::Progress { .. }))
            .collect();
        assert_eq!(erases, vec![&LoadEvent::Erasing { seconds: 0.1 }, &LoadEvent::Erased]);
    }

    #[test]
    fn parse_error_restores_addressing() {
        let (sim, result) = load("SIR 8 TDI (ZZ);\n", LoaderConfig::without_delays());
        assert!(matches!(result, Err(VldError::Svf(_))));
        assert!(!sim.is_locked());
        assert_eq!(sim.a24_am(), am::DEFAULT);
    }
}
