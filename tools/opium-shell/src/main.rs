//! Opium Single-User Shell
//!
//! Boots a kernel in-process and drives it from stdin, one command per
//! line. Kernel debug output (console and framebuffer traffic included)
//! goes to stderr.
//!
//! Set `OPIUM_CONFIG` to a JSON boot configuration to override the
//! defaults.

use std::process::ExitCode;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use opium_hal::HAL;
use opium_kernel::{BootConfig, Kernel, PROMPT};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// HAL over the host OS.
struct StdHal {
    boot: Instant,
}

impl HAL for StdHal {
    fn now_nanos(&self) -> u64 {
        self.boot.elapsed().as_nanos() as u64
    }

    fn wallclock_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn debug_write(&self, msg: &str) {
        eprintln!("{}", msg);
    }
}

async fn load_config() -> Result<BootConfig, String> {
    let Ok(path) = std::env::var("OPIUM_CONFIG") else {
        return Ok(BootConfig::default());
    };
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| format!("cannot read {}: {}", path, e))?;
    BootConfig::from_json(&bytes).map_err(|e| format!("{}: {}", path, e))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[shell] {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut kernel = Kernel::new(StdHal {
        boot: Instant::now(),
    });
    if let Err(e) = kernel.boot(&config) {
        eprintln!("[shell] Boot failed: {}", e);
        return ExitCode::FAILURE;
    }
    kernel.console_write("Single-user mode started\n");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        kernel.prompt();
        if stdout.write_all(PROMPT.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            break;
        }

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("[shell] stdin: {}", e);
                return ExitCode::FAILURE;
            }
        };

        let outcome = kernel.run_command(&line);
        if outcome.exit {
            break;
        }
        if stdout.write_all(outcome.output.as_bytes()).await.is_err() {
            break;
        }
    }

    ExitCode::SUCCESS
}
