// SPDX-License-Identifier: AGPL-3.0-only

//! `levtrap` — operator console for the levitated-particle feedback FPGA.
//!
//! ```text
//! USAGE:
//!   levtrap                          Map /dev/mem and open the console
//!   levtrap --simulate               Console against a simulated trap
//!   levtrap --settle-ms 500          Shorter settling wait for searches
//! ```
//!
//! Console commands: `p`, `delay`, `f` → `c`, `ml`, `mlauto`, `k`, `exit`.

mod console;

use anyhow::{Context, Result};
use clap::Parser;
use console::Console;
use levtrap_driver::{DevMemConfig, DevMemPort, GainController, SearchConfig, SimulatedTrap};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "levtrap", about = "Levitated-particle feedback console", version)]
struct Cli {
    /// Physical memory device holding the FPGA registers.
    #[arg(long, env = "LEVTRAP_DEVICE", default_value = "/dev/mem")]
    device: PathBuf,

    /// Physical address of the delay / energy page (hex with 0x, or decimal).
    #[arg(long, env = "LEVTRAP_DELAY_BASE", default_value = "0x41200000", value_parser = parse_address)]
    delay_base: u64,

    /// Physical address of the gain page (hex with 0x, or decimal).
    #[arg(long, env = "LEVTRAP_GAIN_BASE", default_value = "0x42000000", value_parser = parse_address)]
    gain_base: u64,

    /// Settling wait between a gain write and its energy sample, in ms.
    #[arg(long, env = "LEVTRAP_SETTLE_MS", default_value_t = 3000)]
    settle_ms: u64,

    /// Iteration cap for `mlauto`; 0 searches until convergence.
    #[arg(long, env = "LEVTRAP_MAX_ITERATIONS", default_value_t = levtrap_driver::search::DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Use an in-memory trap instead of the hardware.
    #[arg(long, env = "LEVTRAP_SIMULATE")]
    simulate: bool,
}

impl Cli {
    fn devmem_config(&self) -> DevMemConfig {
        DevMemConfig {
            device: self.device.clone(),
            delay_page_addr: self.delay_base,
            gain_page_addr: self.gain_base,
        }
    }

    fn search_config(&self) -> SearchConfig {
        let cap = (self.max_iterations > 0).then_some(self.max_iterations);
        SearchConfig::default()
            .with_settle(Duration::from_millis(self.settle_ms))
            .with_max_iterations(cap)
    }
}

fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let search = cli.search_config();
    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();

    if cli.simulate {
        tracing::info!("Using simulated trap");
        let controller = GainController::new(SimulatedTrap::new());
        Console::new(controller, stdin, stdout, search).run()?;
    } else {
        let port = DevMemPort::open(&cli.devmem_config()).with_context(|| {
            format!(
                "Cannot map feedback registers through {}",
                cli.device.display()
            )
        })?;
        Console::new(GainController::new(port), stdin, stdout, search).run()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_parse_as_hex_or_decimal() {
        assert_eq!(parse_address("0x41200000"), Ok(0x4120_0000));
        assert_eq!(parse_address("0x4200_0000"), Ok(0x4200_0000));
        assert_eq!(parse_address("4096"), Ok(4096));
        assert!(parse_address("0xZZ").is_err());
    }

    #[test]
    fn defaults_match_hardware() {
        let cli = Cli::try_parse_from(["levtrap"]).unwrap();
        let dev = cli.devmem_config();
        assert_eq!(dev, DevMemConfig::default());

        let search = cli.search_config();
        assert_eq!(search.settle, Duration::from_secs(3));
        assert_eq!(search.max_iterations, Some(500));
    }

    #[test]
    fn zero_cap_means_unbounded() {
        let cli =
            Cli::try_parse_from(["levtrap", "--max-iterations", "0", "--settle-ms", "0"]).unwrap();
        let search = cli.search_config();
        assert_eq!(search.max_iterations, None);
        assert_eq!(search.auto_dwell, Duration::ZERO);
    }
}
