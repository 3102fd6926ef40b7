//! rv32i CLI: load a flat program image, optionally disassemble it, then
//! simulate it on a single hart.

use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process;

use rv32i_sim::{disassemble, hex, Hart, Memory};

/// RV32I instruction-set simulator
#[derive(Parser)]
#[command(name = "rv32i")]
#[command(version)]
#[command(about = "Simulate a flat RV32I program image", long_about = None)]
struct Cli {
    /// show disassembly before program execution
    #[arg(short = 'd')]
    disassemble: bool,

    /// show instruction printing during execution
    #[arg(short = 'i')]
    show_instructions: bool,

    /// show register printing during execution
    #[arg(short = 'r')]
    show_registers: bool,

    /// show a dump of the regs & memory after simulation
    #[arg(short = 'z')]
    post_dump: bool,

    /// maximum number of instructions to exec (0 = unlimited)
    #[arg(short = 'l', value_name = "exec-limit", default_value = "0",
          value_parser = parse_limit)]
    exec_limit: u64,

    /// specify memory size in hex (default = 0x100)
    #[arg(short = 'm', value_name = "hex-mem-size", default_value = "100",
          value_parser = parse_hex_size)]
    memory_size: u32,

    /// program image to load at address 0
    infile: PathBuf,
}

/// Parse the execution limit as decimal or 0x-prefixed hex.
fn parse_limit(s: &str) -> Result<u64, String> {
    let parsed = if let Some(hex_digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex_digits, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|_| format!("invalid execution limit: {s}"))
}

/// Parse the memory size as hex, with or without a 0x prefix.
fn parse_hex_size(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|_| format!("invalid memory size: {s}"))
}

/// Disassemble the whole image from address 0 in 4-byte steps.
fn disassemble_image(mem: &Memory) {
    let mut pc = 0;
    while pc < mem.size() {
        let insn = mem.get32(pc);
        println!(
            "{}: {}  {}",
            hex::to_hex32(pc),
            hex::to_hex32(insn),
            disassemble(pc, insn)
        );
        pc += 4;
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            process::exit(1);
        }
    };

    let mut mem = Memory::new(cli.memory_size);
    if let Err(err) = mem.load_file(&cli.infile) {
        eprintln!("{err}");
        process::exit(1);
    }

    if cli.disassemble {
        disassemble_image(&mem);
    }

    let mut hart = Hart::new(&mut mem);
    hart.set_show_instructions(cli.show_instructions);
    hart.set_show_registers(cli.show_registers);
    hart.run(cli.exec_limit);

    if cli.post_dump {
        let mut out = io::stdout();
        hart.dump(&mut out, "");
        drop(hart);
        mem.dump(&mut out);
    }
}
