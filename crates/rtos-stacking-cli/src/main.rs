use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

use rtos_stacking::{
    Chip, FrameShape, FreeRtosStacking, MemorySnapshot, StackingDescriptor, ThreadId,
    ThreadRegisters, tls_info_for,
};

#[derive(Parser)]
#[command(name = "rtos-stacking")]
#[command(about = "Decode FreeRTOS thread registers from saved stack frames")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one suspended thread from a memory snapshot
    Decode {
        #[arg(short, long, help = "Target chip (esp32, esp32s2, esp32s3, esp32c2, esp32c3)")]
        chip: Chip,

        #[arg(
            short,
            long,
            help = "Memory snapshot file, one 'address: hex bytes' region per line"
        )]
        memory: PathBuf,

        #[arg(short, long, default_value_t = 1, help = "RTOS thread id")]
        thread: u64,

        #[arg(
            short,
            long,
            value_parser = parse_address,
            help = "Address of the word holding the thread's saved stack pointer (TCB)"
        )]
        stack_addr: u64,

        #[arg(long, help = "Print JSON instead of a register table")]
        json: bool,

        #[arg(long, help = "Print only the GDB 'g' packet payload")]
        gdb: bool,
    },
    /// Print the register offset table of a descriptor
    Layout {
        #[arg(short, long)]
        chip: Chip,

        #[arg(short, long, value_enum, default_value_t = ShapeArg::Involuntary)]
        shape: ShapeArg,

        #[arg(long)]
        json: bool,
    },
    /// Print the TLS convention for a GDB architecture name
    Tls {
        #[arg(help = "Architecture name as reported by GDB, e.g. xtensa or riscv:rv32")]
        arch: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ShapeArg {
    Involuntary,
    Voluntary,
}

impl From<ShapeArg> for FrameShape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Involuntary => Self::Involuntary,
            ShapeArg::Voluntary => Self::Voluntary,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            chip,
            memory,
            thread,
            stack_addr,
            json,
            gdb,
        } => {
            let mut snapshot = read_snapshot(&memory)?;
            let stacking = FreeRtosStacking::new(chip);
            let thread = ThreadId(thread);

            let regs = stacking
                .read_thread(&mut snapshot, thread, stack_addr)
                .with_context(|| format!("Failed to decode thread {thread}"))?;

            if gdb {
                println!("{}", regs.to_gdb_hex());
            } else if json {
                println!("{}", serde_json::to_string_pretty(&thread_json(thread, &regs))?);
            } else {
                print_thread(thread, &regs);
            }
        }
        Commands::Layout { chip, shape, json } => {
            let stacking = FreeRtosStacking::new(chip);
            let descriptor = stacking
                .descriptor(shape.into())
                .with_context(|| format!("{chip} has no {} frames", FrameShape::from(shape)))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&layout_json(descriptor))?);
            } else {
                print_layout(descriptor);
            }
        }
        Commands::Tls { arch } => {
            let info = tls_info_for(&arch)
                .with_context(|| format!("No FreeRTOS TLS convention for '{arch}'"))?;
            println!("register {} align {}", info.register, info.align);
        }
    }

    Ok(())
}

fn parse_address(text: &str) -> Result<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).with_context(|| format!("invalid hex address '{text}'"))
}

fn read_snapshot(path: &Path) -> Result<MemorySnapshot> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot = MemorySnapshot::parse(&contents)
        .with_context(|| format!("Invalid snapshot {}", path.display()))?;
    if snapshot.is_empty() {
        tracing::warn!("{} holds no memory regions", path.display());
    }
    Ok(snapshot)
}

fn print_thread(thread: ThreadId, regs: &ThreadRegisters) {
    println!(
        "thread {thread}: {} frame, sp {:#010x}, caller sp {:#010x}{}",
        regs.shape(),
        regs.stack_ptr(),
        regs.caller_stack_ptr(),
        if regs.is_degraded() { " (degraded)" } else { "" }
    );
    for value in regs.values().iter().filter(|value| value.is_available()) {
        match value.as_u32() {
            Some(word) => println!("  {:<12} {word:#010x}", value.register.to_string()),
            None => println!("  {:<12} {}", value.register.to_string(), value.to_hex()),
        }
    }
}

fn thread_json(thread: ThreadId, regs: &ThreadRegisters) -> Value {
    let registers: Vec<Value> = regs
        .values()
        .iter()
        .map(|value| {
            json!({
                "name": value.register.to_string(),
                "bits": value.bits,
                "value": value.is_available().then(|| value.to_hex()),
            })
        })
        .collect();

    json!({
        "thread": thread.0,
        "shape": regs.shape().to_string(),
        "degraded": regs.is_degraded(),
        "stack_ptr": regs.stack_ptr(),
        "caller_stack_ptr": regs.caller_stack_ptr(),
        "registers": registers,
    })
}

fn print_layout(descriptor: &StackingDescriptor) {
    println!(
        "{}: {} frame, {:#x} bytes, {} registers",
        descriptor.name(),
        descriptor.shape(),
        descriptor.frame_size(),
        descriptor.num_registers()
    );
    for entry in descriptor.registers() {
        match entry.offset() {
            Some(offset) => println!(
                "  {:<12} {offset:#06x} {:>3}",
                entry.register.to_string(),
                entry.bits
            ),
            None => println!("  {:<12}     -- {:>3}", entry.register.to_string(), entry.bits),
        }
    }
}

fn layout_json(descriptor: &StackingDescriptor) -> Value {
    let registers: Vec<Value> = descriptor
        .registers()
        .iter()
        .map(|entry| {
            json!({
                "name": entry.register.to_string(),
                "bits": entry.bits,
                "offset": entry.offset(),
            })
        })
        .collect();

    json!({
        "name": descriptor.name(),
        "shape": descriptor.shape().to_string(),
        "frame_size": descriptor.frame_size(),
        "registers": registers,
    })
}
