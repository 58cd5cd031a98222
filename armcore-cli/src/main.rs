use std::path::PathBuf;

use anyhow::{Context, bail};
use armcore::{
    bus::Cycles,
    instr::{
        Instr,
        decode::InstrClass,
        thumb::ThumbClass,
    },
    memory::Memory,
    processor::Processor,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Log filter, in `RUST_LOG` syntax; overrides the environment
    #[arg(long, global = true)]
    log: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Load a raw binary image and execute it")]
    Run {
        /// Raw binary image to load
        image: PathBuf,
        /// Address to load the image at and boot from
        #[arg(long, default_value = "0", value_parser = parse_number)]
        base: u32,
        /// Maximum number of instructions to execute
        #[arg(long, default_value_t = 1000)]
        steps: usize,
        /// Boot in Thumb state
        #[arg(long)]
        thumb: bool,
        /// Assert the IRQ line before this step
        #[arg(long)]
        irq_at: Option<usize>,
        /// Assert the FIQ line before this step
        #[arg(long)]
        fiq_at: Option<usize>,
        /// Wait states added to every non-sequential memory cycle
        #[arg(long, default_value_t = 0)]
        non_seq_wait: u32,
        /// Wait states added to every sequential memory cycle
        #[arg(long, default_value_t = 0)]
        seq_wait: u32,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    #[command(about = "Decode instruction words")]
    Decode {
        /// Words in hexadecimal
        #[arg(required = true)]
        words: Vec<String>,
        /// Decode as Thumb halfwords
        #[arg(long)]
        thumb: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid log filter `{directives}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run {
            image,
            base,
            steps,
            thumb,
            irq_at,
            fiq_at,
            non_seq_wait,
            seq_wait,
            format,
        } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("could not read image {}", image.display()))?;
            let mut memory = Memory::default().with_wait_states(non_seq_wait, seq_wait);
            memory
                .load(base, &bytes)
                .with_context(|| format!("could not load {}", image.display()))?;
            info!(bytes = bytes.len(), base, "image loaded");

            let mut proc = Processor::with_boot_address(memory, base).with_thumb_state(thumb);
            let mut cycles = Cycles::default();
            let mut executed = 0;
            let mut halted = false;
            while executed < steps {
                if irq_at == Some(executed) {
                    proc.request_irq(true);
                }
                if fiq_at == Some(executed) {
                    proc.request_fiq(true);
                }
                let pc = proc.registers().pc();
                cycles += proc.step();
                executed += 1;
                // A branch to itself never makes progress.
                if proc.registers().pc() == pc {
                    halted = true;
                    break;
                }
            }

            match format {
                Format::Text => {
                    println!(
                        "{} after {executed} steps",
                        if halted { "Halted" } else { "Stopped" }
                    );
                    println!("Cycles: {cycles}");
                    println!("{}", proc.registers());
                }
                Format::Json => {
                    let report = json!({
                        "steps": executed,
                        "halted": halted,
                        "cycles": cycles,
                        "state": proc.snapshot(),
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
            Ok(())
        }
        Command::Decode { words, thumb } => {
            let mut address = 0u32;
            for word in &words {
                let value = u32::from_str_radix(word.trim_start_matches("0x"), 16)
                    .with_context(|| format!("`{word}` is not a hexadecimal word"))?;
                if thumb {
                    let Ok(halfword) = u16::try_from(value) else {
                        bail!("`{word}` does not fit in a halfword");
                    };
                    let class = ThumbClass::classify(halfword);
                    let (cond, instr) = Instr::decode_thumb(halfword, address);
                    println!("{address:08X}: {halfword:04X}  {class:?} {cond:?} {instr:?}");
                    address += 2;
                } else {
                    let class = InstrClass::classify(value);
                    let (cond, instr) = Instr::decode(value);
                    println!("{address:08X}: {value:08X}  {class:?} {cond:?} {instr:?}");
                    address += 4;
                }
            }
            Ok(())
        }
    }
}

/// Accepts decimal, or hexadecimal prefixed by `0x`.
fn parse_number(src: &str) -> Result<u32, String> {
    let parsed = match src.strip_prefix("0x").or_else(|| src.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => src.parse(),
    };
    parsed.map_err(|err| format!("`{src}` is not a number: {err}"))
}
