//! RV32I execution engine.
//!
//! A [`Hart`] owns the program counter, instruction counter, halt state, and
//! the register file, and borrows the [`Memory`] it executes against; the
//! memory outlives the hart. Each tick fetches a 32-bit word at the PC,
//! classifies it through the decoder's [`Op`] table, and interprets the
//! variant against the architectural state.
//!
//! Tracing is controlled by passing an output stream: `exec` with `Some`
//! stream emits one line per instruction, the rendered form padded to 35
//! columns followed by a `//` explanation of pre-state operands and the
//! post-state result. With `None` the same execution runs silently.
//!
//! Halting is sticky. EBREAK, an illegal instruction, or a malformed CSRRS
//! freeze the PC at the offending word and further ticks are no-ops until
//! `reset`.

use crate::decode::{
    self, AluImmOp, AluRegOp, BranchOp, CsrOp, DecodedInstr, LoadOp, Op, StoreOp,
};
use crate::hex;
use crate::memory::Memory;
use crate::registers::RegisterFile;
use std::io::Write;

/// Width of the rendered-instruction column in trace output.
pub const INSTRUCTION_WIDTH: usize = 35;

/// The one CSR this hart can read.
const CSR_MHARTID: u32 = 0xf14;

pub struct Hart<'m> {
    regs: RegisterFile,
    mem: &'m mut Memory,
    pc: u32,
    insn_counter: u64,
    halt: bool,
    halt_reason: String,
    mhartid: u32,
    show_instructions: bool,
    show_registers: bool,
}

impl<'m> Hart<'m> {
    /// Create a hart over the given memory, in the reset state.
    pub fn new(mem: &'m mut Memory) -> Self {
        Self {
            regs: RegisterFile::new(),
            mem,
            pc: 0,
            insn_counter: 0,
            halt: false,
            halt_reason: "none".to_string(),
            mhartid: 0,
            show_instructions: false,
            show_registers: false,
        }
    }

    /// Return the hart to its initial state: registers back to the reset
    /// pattern, PC and counter zeroed, halt cleared.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.regs.reset();
        self.insn_counter = 0;
        self.halt = false;
        self.halt_reason = "none".to_string();
    }

    pub fn set_show_instructions(&mut self, b: bool) {
        self.show_instructions = b;
    }

    pub fn set_show_registers(&mut self, b: bool) {
        self.show_registers = b;
    }

    pub fn set_mhartid(&mut self, id: u32) {
        self.mhartid = id;
    }

    pub fn is_halted(&self) -> bool {
        self.halt
    }

    pub fn halt_reason(&self) -> &str {
        &self.halt_reason
    }

    pub fn insn_counter(&self) -> u64 {
        self.insn_counter
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Get a register value (x0 always returns 0).
    pub fn get_reg(&self, r: u32) -> i32 {
        self.regs.get(r)
    }

    /// Set a register value (x0 writes are ignored).
    pub fn set_reg(&mut self, r: u32, val: i32) {
        self.regs.set(r, val);
    }

    /// Dump the register file followed by the PC line.
    pub fn dump(&self, out: &mut dyn Write, hdr: &str) {
        self.regs.dump(out, hdr);
        let _ = writeln!(out, " pc {}", hex::to_hex32(self.pc));
    }

    /// One fetch-decode-execute step. A halted hart does nothing; otherwise
    /// the instruction counter advances even when the fetched word turns out
    /// to be illegal.
    pub fn tick(&mut self, hdr: &str) {
        if self.halt {
            return;
        }
        self.insn_counter += 1;

        let stdout = std::io::stdout();
        if self.show_registers {
            let mut out = stdout.lock();
            self.dump(&mut out, hdr);
        }

        let insn = self.mem.get32(self.pc);
        if self.show_instructions {
            let mut out = stdout.lock();
            let _ = write!(
                out,
                "{}{}: {}  ",
                hdr,
                hex::to_hex32(self.pc),
                hex::to_hex32(insn)
            );
            self.exec(insn, Some(&mut out));
        } else {
            self.exec(insn, None);
        }
    }

    /// Run until halt or until `exec_limit` instructions have been attempted
    /// (0 means unlimited). Initializes the stack pointer to the top of
    /// memory before the first tick.
    pub fn run(&mut self, exec_limit: u64) {
        self.regs.set(2, self.mem.size() as i32);

        while !self.halt && (exec_limit == 0 || self.insn_counter < exec_limit) {
            self.tick("");
        }

        if self.halt {
            println!("Execution terminated. Reason: {}", self.halt_reason);
        }
        println!("{} instructions executed", self.insn_counter);
    }

    /// Execute one instruction word, writing a trace line to `pos` if given.
    pub fn exec(&mut self, insn: u32, pos: Option<&mut dyn Write>) {
        let d = DecodedInstr::decode(insn);
        match d.op() {
            Op::Lui => self.exec_lui(&d, pos),
            Op::Auipc => self.exec_auipc(&d, pos),
            Op::Jal => self.exec_jal(&d, pos),
            Op::Jalr => self.exec_jalr(&d, pos),
            Op::Branch(op) => self.exec_branch(&d, op, pos),
            Op::Load(op) => self.exec_load(&d, op, pos),
            Op::Store(op) => self.exec_store(&d, op, pos),
            Op::AluImm(op) => self.exec_alu_imm(&d, op, pos),
            Op::AluReg(op) => self.exec_alu_reg(&d, op, pos),
            Op::Ebreak => self.exec_ebreak(&d, pos),
            // The executable CSR subset is csrrs on mhartid alone; every
            // other SYSTEM form, ecall included, halts as illegal.
            Op::Csr(CsrOp::Csrrs) => self.exec_csrrs(&d, pos),
            Op::Ecall | Op::Csr(_) | Op::Illegal => self.exec_illegal_insn(&d, pos),
        }
    }

    fn exec_illegal_insn(&mut self, _d: &DecodedInstr, pos: Option<&mut dyn Write>) {
        if let Some(pos) = pos {
            let _ = write!(pos, "{}", decode::render_illegal_insn());
        }
        self.halt = true;
        self.halt_reason = "Illegal instruction".to_string();
    }

    fn exec_lui(&mut self, d: &DecodedInstr, pos: Option<&mut dyn Write>) {
        let val = d.imm_u;

        if let Some(pos) = pos {
            let s = decode::render_utype(d, "lui");
            let _ = writeln!(
                pos,
                "{:<w$}// {} = {}",
                s,
                decode::render_reg(d.rd),
                hex::to_hex0x32(val as u32),
                w = INSTRUCTION_WIDTH
            );
        }
        self.regs.set(d.rd as u32, val);
        self.pc = self.pc.wrapping_add(4);
    }

    fn exec_auipc(&mut self, d: &DecodedInstr, pos: Option<&mut dyn Write>) {
        let val = self.pc.wrapping_add(d.imm_u as u32);

        if let Some(pos) = pos {
            let s = decode::render_utype(d, "auipc");
            let _ = writeln!(
                pos,
                "{:<w$}// {} = {} + {} = {}",
                s,
                decode::render_reg(d.rd),
                hex::to_hex0x32(self.pc),
                hex::to_hex0x32(d.imm_u as u32),
                hex::to_hex0x32(val),
                w = INSTRUCTION_WIDTH
            );
        }
        self.regs.set(d.rd as u32, val as i32);
        self.pc = self.pc.wrapping_add(4);
    }

    fn exec_jal(&mut self, d: &DecodedInstr, pos: Option<&mut dyn Write>) {
        let link = self.pc.wrapping_add(4);
        let target = self.pc.wrapping_add(d.imm_j as u32);

        if let Some(pos) = pos {
            let s = decode::render_jal(self.pc, d);
            let _ = writeln!(
                pos,
                "{:<w$}// {} = {},  pc = {} + {} = {}",
                s,
                decode::render_reg(d.rd),
                hex::to_hex0x32(link),
                hex::to_hex0x32(self.pc),
                hex::to_hex0x32(d.imm_j as u32),
                hex::to_hex0x32(target),
                w = INSTRUCTION_WIDTH
            );
        }
        self.regs.set(d.rd as u32, link as i32);
        self.pc = target;
    }

    fn exec_jalr(&mut self, d: &DecodedInstr, pos: Option<&mut dyn Write>) {
        let link = self.pc.wrapping_add(4);
        let rs1_val = self.regs.get(d.rs1 as u32);
        // The low bit of the computed target is always cleared.
        let target = (rs1_val as u32).wrapping_add(d.imm_i as u32) & 0xffff_fffe;

        if let Some(pos) = pos {
            let s = decode::render_jalr(d);
            let _ = writeln!(
                pos,
                "{:<w$}// {} = {},  pc = ({} + {}) & 0xfffffffe = {}",
                s,
                decode::render_reg(d.rd),
                hex::to_hex0x32(link),
                hex::to_hex0x32(d.imm_i as u32),
                hex::to_hex0x32(rs1_val as u32),
                hex::to_hex0x32(target),
                w = INSTRUCTION_WIDTH
            );
        }
        self.regs.set(d.rd as u32, link as i32);
        self.pc = target;
    }

    fn exec_branch(&mut self, d: &DecodedInstr, op: BranchOp, pos: Option<&mut dyn Write>) {
        let rs1_val = self.regs.get(d.rs1 as u32);
        let rs2_val = self.regs.get(d.rs2 as u32);

        let taken = match op {
            BranchOp::Beq => rs1_val == rs2_val,
            BranchOp::Bne => rs1_val != rs2_val,
            BranchOp::Blt => rs1_val < rs2_val,
            BranchOp::Bge => rs1_val >= rs2_val,
            BranchOp::Bltu => (rs1_val as u32) < (rs2_val as u32),
            BranchOp::Bgeu => (rs1_val as u32) >= (rs2_val as u32),
        };
        let t_addr = if taken {
            self.pc.wrapping_add(d.imm_b as u32)
        } else {
            self.pc.wrapping_add(4)
        };

        if let Some(pos) = pos {
            let cmp = match op {
                BranchOp::Beq => "==",
                BranchOp::Bne => "!=",
                BranchOp::Blt => "<",
                BranchOp::Bge => ">=",
                BranchOp::Bltu => "<U",
                BranchOp::Bgeu => ">=U",
            };
            let s = decode::render_btype(self.pc, d, op.mnemonic());
            let _ = writeln!(
                pos,
                "{:<w$}// pc += ({} {} {} ? {} : 4) = {}",
                s,
                hex::to_hex0x32(rs1_val as u32),
                cmp,
                hex::to_hex0x32(rs2_val as u32),
                hex::to_hex0x32(d.imm_b as u32),
                hex::to_hex0x32(t_addr),
                w = INSTRUCTION_WIDTH
            );
        }
        self.pc = t_addr;
    }

    fn exec_load(&mut self, d: &DecodedInstr, op: LoadOp, pos: Option<&mut dyn Write>) {
        let rs1_val = self.regs.get(d.rs1 as u32);
        let addr = (rs1_val as u32).wrapping_add(d.imm_i as u32);

        let (val, access) = match op {
            LoadOp::Lb => (self.mem.get8_sx(addr), "sx(m8"),
            LoadOp::Lh => (self.mem.get16_sx(addr), "sx(m16"),
            LoadOp::Lw => (self.mem.get32_sx(addr), "sx(m32"),
            LoadOp::Lbu => (self.mem.get8(addr) as i32, "zx(m8"),
            LoadOp::Lhu => (self.mem.get16(addr) as i32, "zx(m16"),
        };

        if let Some(pos) = pos {
            let s = decode::render_itype_load(d, op.mnemonic());
            let _ = writeln!(
                pos,
                "{:<w$}// {} = {}({} + {})) = {}",
                s,
                decode::render_reg(d.rd),
                access,
                hex::to_hex0x32(rs1_val as u32),
                hex::to_hex0x32(d.imm_i as u32),
                hex::to_hex0x32(val as u32),
                w = INSTRUCTION_WIDTH
            );
        }
        self.regs.set(d.rd as u32, val);
        self.pc = self.pc.wrapping_add(4);
    }

    fn exec_store(&mut self, d: &DecodedInstr, op: StoreOp, pos: Option<&mut dyn Write>) {
        let rs1_val = self.regs.get(d.rs1 as u32);
        let rs2_val = self.regs.get(d.rs2 as u32) as u32;
        let addr = (rs1_val as u32).wrapping_add(d.imm_s as u32);

        let (val, access) = match op {
            StoreOp::Sb => (rs2_val & 0xff, "m8"),
            StoreOp::Sh => (rs2_val & 0xffff, "m16"),
            StoreOp::Sw => (rs2_val, "m32"),
        };

        if let Some(pos) = pos {
            let s = decode::render_stype(d, op.mnemonic());
            let _ = writeln!(
                pos,
                "{:<w$}// {}({} + {}) = {}",
                s,
                access,
                hex::to_hex0x32(rs1_val as u32),
                hex::to_hex0x32(d.imm_s as u32),
                hex::to_hex0x32(val),
                w = INSTRUCTION_WIDTH
            );
        }
        match op {
            StoreOp::Sb => self.mem.set8(addr, val as u8),
            StoreOp::Sh => self.mem.set16(addr, val as u16),
            StoreOp::Sw => self.mem.set32(addr, val),
        }
        self.pc = self.pc.wrapping_add(4);
    }

    fn exec_alu_imm(&mut self, d: &DecodedInstr, op: AluImmOp, pos: Option<&mut dyn Write>) {
        let rs1_val = self.regs.get(d.rs1 as u32);
        let shamt = d.shamt();

        let val = match op {
            AluImmOp::Addi => rs1_val.wrapping_add(d.imm_i),
            AluImmOp::Slti => (rs1_val < d.imm_i) as i32,
            AluImmOp::Sltiu => ((rs1_val as u32) < (d.imm_i as u32)) as i32,
            AluImmOp::Xori => rs1_val ^ d.imm_i,
            AluImmOp::Ori => rs1_val | d.imm_i,
            AluImmOp::Andi => rs1_val & d.imm_i,
            AluImmOp::Slli => rs1_val << shamt,
            AluImmOp::Srli => ((rs1_val as u32) >> shamt) as i32,
            AluImmOp::Srai => rs1_val >> shamt,
        };

        if let Some(pos) = pos {
            let rendered_imm = match op {
                AluImmOp::Srai => d.imm_i & 0x1f,
                _ => d.imm_i,
            };
            let s = decode::render_itype_alu(d, op.mnemonic(), rendered_imm);
            let rd = decode::render_reg(d.rd);
            let a = hex::to_hex0x32(rs1_val as u32);
            let r = hex::to_hex0x32(val as u32);
            let detail = match op {
                AluImmOp::Addi => format!("{} = {} + {} = {}", rd, a, hex::to_hex0x32(d.imm_i as u32), r),
                AluImmOp::Slti => format!("{} = ({} < {}) ? 1 : 0 = {}", rd, a, d.imm_i, r),
                AluImmOp::Sltiu => format!("{} = ({} <U {}) ? 1 : 0 = {}", rd, a, d.imm_i, r),
                AluImmOp::Xori => format!("{} = {} ^ {} = {}", rd, a, hex::to_hex0x32(d.imm_i as u32), r),
                AluImmOp::Ori => format!("{} = {} | {} = {}", rd, a, hex::to_hex0x32(d.imm_i as u32), r),
                AluImmOp::Andi => format!("{} = {} & {} = {}", rd, a, hex::to_hex0x32(d.imm_i as u32), r),
                AluImmOp::Slli => format!("{} = {} << {} = {}", rd, a, shamt, r),
                AluImmOp::Srli | AluImmOp::Srai => format!("{} = {} >> {} = {}", rd, a, shamt, r),
            };
            let _ = writeln!(pos, "{:<w$}// {}", s, detail, w = INSTRUCTION_WIDTH);
        }
        self.regs.set(d.rd as u32, val);
        self.pc = self.pc.wrapping_add(4);
    }

    fn exec_alu_reg(&mut self, d: &DecodedInstr, op: AluRegOp, pos: Option<&mut dyn Write>) {
        let rs1_val = self.regs.get(d.rs1 as u32);
        let rs2_val = self.regs.get(d.rs2 as u32);
        let shamt = (rs2_val & 0x1f) as u32;

        let val = match op {
            AluRegOp::Add => rs1_val.wrapping_add(rs2_val),
            AluRegOp::Sub => rs1_val.wrapping_sub(rs2_val),
            AluRegOp::Sll => rs1_val << shamt,
            AluRegOp::Slt => (rs1_val < rs2_val) as i32,
            AluRegOp::Sltu => ((rs1_val as u32) < (rs2_val as u32)) as i32,
            AluRegOp::Xor => rs1_val ^ rs2_val,
            AluRegOp::Srl => ((rs1_val as u32) >> shamt) as i32,
            AluRegOp::Sra => rs1_val >> shamt,
            AluRegOp::Or => rs1_val | rs2_val,
            AluRegOp::And => rs1_val & rs2_val,
        };

        if let Some(pos) = pos {
            let s = decode::render_rtype(d, op.mnemonic());
            let rd = decode::render_reg(d.rd);
            let a = hex::to_hex0x32(rs1_val as u32);
            let b = hex::to_hex0x32(rs2_val as u32);
            let r = hex::to_hex0x32(val as u32);
            let detail = match op {
                AluRegOp::Add => format!("{} = {} + {} = {}", rd, a, b, r),
                AluRegOp::Sub => format!("{} = {} - {} = {}", rd, a, b, r),
                AluRegOp::Sll => format!("{} = {} << {} = {}", rd, a, shamt, r),
                AluRegOp::Slt => format!("{} = ({} < {}) ? 1 : 0 = {}", rd, a, b, r),
                AluRegOp::Sltu => format!("{} = ({} <U {}) ? 1 : 0 = {}", rd, a, b, r),
                AluRegOp::Xor => format!("{} = {} ^ {} = {}", rd, a, b, r),
                AluRegOp::Srl | AluRegOp::Sra => format!("{} = {} >> {} = {}", rd, a, shamt, r),
                AluRegOp::Or => format!("{} = {} | {} = {}", rd, a, b, r),
                AluRegOp::And => format!("{} = {} & {} = {}", rd, a, b, r),
            };
            let _ = writeln!(pos, "{:<w$}// {}", s, detail, w = INSTRUCTION_WIDTH);
        }
        self.regs.set(d.rd as u32, val);
        self.pc = self.pc.wrapping_add(4);
    }

    fn exec_ebreak(&mut self, _d: &DecodedInstr, pos: Option<&mut dyn Write>) {
        if let Some(pos) = pos {
            let _ = writeln!(pos, "{:<w$}// HALT", "ebreak", w = INSTRUCTION_WIDTH);
        }
        self.halt = true;
        self.halt_reason = "EBREAK instruction".to_string();
    }

    fn exec_csrrs(&mut self, d: &DecodedInstr, pos: Option<&mut dyn Write>) {
        // Only a read of mhartid (rs1 = x0) is legal; anything else halts
        // before touching rd or the PC.
        if d.csr() != CSR_MHARTID || d.rs1 != 0 {
            self.halt = true;
            self.halt_reason = "Illegal CSR in CRSS instruction".to_string();
        }

        if let Some(pos) = pos {
            let s = decode::render_csrrx(d, "csrrs");
            let _ = writeln!(
                pos,
                "{:<w$}// {} = {}",
                s,
                decode::render_reg(d.rd),
                self.mhartid,
                w = INSTRUCTION_WIDTH
            );
        }

        if !self.halt {
            self.regs.set(d.rd as u32, self.mhartid as i32);
            self.pc = self.pc.wrapping_add(4);
        }
    }
}

// ============================================================================
// Instruction Assembler Helpers (for testing)
// ============================================================================

/// Assemble an R-type instruction.
pub fn assemble_r(opcode: u8, rd: u8, funct3: u8, rs1: u8, rs2: u8, funct7: u8) -> u32 {
    ((funct7 as u32) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | ((funct3 as u32) << 12)
        | ((rd as u32) << 7)
        | (opcode as u32)
}

/// Assemble an I-type instruction.
pub fn assemble_i(opcode: u8, rd: u8, funct3: u8, rs1: u8, imm: i32) -> u32 {
    (((imm as u32) & 0xfff) << 20)
        | ((rs1 as u32) << 15)
        | ((funct3 as u32) << 12)
        | ((rd as u32) << 7)
        | (opcode as u32)
}

/// Assemble an S-type instruction.
pub fn assemble_s(opcode: u8, funct3: u8, rs1: u8, rs2: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7f) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | ((funct3 as u32) << 12)
        | ((imm & 0x1f) << 7)
        | (opcode as u32)
}

/// Assemble a B-type instruction.
pub fn assemble_b(opcode: u8, funct3: u8, rs1: u8, rs2: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3f) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | ((funct3 as u32) << 12)
        | (((imm >> 1) & 0xf) << 8)
        | (((imm >> 11) & 1) << 7)
        | (opcode as u32)
}

/// Assemble a U-type instruction.
pub fn assemble_u(opcode: u8, rd: u8, imm: u32) -> u32 {
    (imm & 0xfffff000) | ((rd as u32) << 7) | (opcode as u32)
}

/// Assemble a J-type instruction.
pub fn assemble_j(opcode: u8, rd: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3ff) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xff) << 12)
        | ((rd as u32) << 7)
        | (opcode as u32)
}

// Convenience assembler functions
pub fn assemble_add(rd: u8, rs1: u8, rs2: u8) -> u32 {
    assemble_r(decode::opcode::OP, rd, 0b000, rs1, rs2, 0x00)
}

pub fn assemble_sub(rd: u8, rs1: u8, rs2: u8) -> u32 {
    assemble_r(decode::opcode::OP, rd, 0b000, rs1, rs2, 0x20)
}

pub fn assemble_addi(rd: u8, rs1: u8, imm: i32) -> u32 {
    assemble_i(decode::opcode::OP_IMM, rd, 0b000, rs1, imm)
}

pub fn assemble_lui(rd: u8, imm: u32) -> u32 {
    assemble_u(decode::opcode::LUI, rd, imm)
}

pub fn assemble_auipc(rd: u8, imm: u32) -> u32 {
    assemble_u(decode::opcode::AUIPC, rd, imm)
}

pub fn assemble_jal(rd: u8, imm: i32) -> u32 {
    assemble_j(decode::opcode::JAL, rd, imm)
}

pub fn assemble_jalr(rd: u8, rs1: u8, imm: i32) -> u32 {
    assemble_i(decode::opcode::JALR, rd, 0b000, rs1, imm)
}

pub fn assemble_beq(rs1: u8, rs2: u8, imm: i32) -> u32 {
    assemble_b(decode::opcode::BRANCH, 0b000, rs1, rs2, imm)
}

pub fn assemble_bne(rs1: u8, rs2: u8, imm: i32) -> u32 {
    assemble_b(decode::opcode::BRANCH, 0b001, rs1, rs2, imm)
}

pub fn assemble_lw(rd: u8, rs1: u8, imm: i32) -> u32 {
    assemble_i(decode::opcode::LOAD, rd, 0b010, rs1, imm)
}

pub fn assemble_sw(rs1: u8, rs2: u8, imm: i32) -> u32 {
    assemble_s(decode::opcode::STORE, 0b010, rs1, rs2, imm)
}

pub fn assemble_csrrs(rd: u8, csr: u32, rs1: u8) -> u32 {
    assemble_i(decode::opcode::SYSTEM, rd, 0b010, rs1, csr as i32)
}

pub fn assemble_nop() -> u32 {
    assemble_addi(0, 0, 0)
}

pub fn assemble_ecall() -> u32 {
    decode::ECALL_BITS
}

pub fn assemble_ebreak() -> u32 {
    decode::EBREAK_BITS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::opcode;

    fn load_words(mem: &mut Memory, words: &[u32]) {
        for (i, w) in words.iter().enumerate() {
            mem.set32(i as u32 * 4, *w);
        }
    }

    fn run_ticks(hart: &mut Hart, n: usize) {
        for _ in 0..n {
            hart.tick("");
        }
    }

    #[test]
    fn test_addi() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_addi(1, 0, 42)]);
        let mut hart = Hart::new(&mut mem);
        hart.tick("");
        assert_eq!(hart.get_reg(1), 42);
        assert_eq!(hart.pc(), 4);
        assert_eq!(hart.insn_counter(), 1);
    }

    #[test]
    fn test_addi_negative_wraps() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_addi(1, 0, -1)]);
        let mut hart = Hart::new(&mut mem);
        hart.tick("");
        assert_eq!(hart.get_reg(1), -1);
        assert_eq!(hart.get_reg(1) as u32, 0xffffffff);
    }

    #[test]
    fn test_add_sub() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_addi(1, 0, 100),
                assemble_addi(2, 0, 30),
                assemble_add(3, 1, 2),
                assemble_sub(4, 1, 2),
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 4);
        assert_eq!(hart.get_reg(3), 130);
        assert_eq!(hart.get_reg(4), 70);
    }

    #[test]
    fn test_x0_always_zero() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_addi(0, 0, 42)]);
        let mut hart = Hart::new(&mut mem);
        hart.tick("");
        assert_eq!(hart.get_reg(0), 0);
    }

    #[test]
    fn test_lui_auipc() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[assemble_lui(1, 0x12345000), assemble_auipc(2, 0x1000)],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 2);
        assert_eq!(hart.get_reg(1) as u32, 0x12345000);
        // auipc executed at pc = 4
        assert_eq!(hart.get_reg(2) as u32, 0x1004);
    }

    #[test]
    fn test_jal_links_and_jumps() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_jal(1, 8)]);
        let mut hart = Hart::new(&mut mem);
        hart.tick("");
        assert_eq!(hart.get_reg(1), 4);
        assert_eq!(hart.pc(), 8);
    }

    #[test]
    fn test_jalr_clears_low_bit() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[assemble_addi(2, 0, 0x41), assemble_jalr(1, 2, 0)],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 2);
        assert_eq!(hart.get_reg(1), 8);
        assert_eq!(hart.pc(), 0x40);
    }

    #[test]
    fn test_beq_taken_and_not_taken() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_addi(1, 0, 5),
                assemble_addi(2, 0, 5),
                assemble_beq(1, 2, 8),
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 3);
        assert_eq!(hart.pc(), 8 + 8);

        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_addi(1, 0, 5),
                assemble_addi(2, 0, 6),
                assemble_beq(1, 2, 8),
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 3);
        assert_eq!(hart.pc(), 12);
    }

    #[test]
    fn test_blt_is_signed_bltu_is_unsigned() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_addi(1, 0, -5),
                assemble_addi(2, 0, 5),
                assemble_b(opcode::BRANCH, 0b100, 1, 2, 8), // blt
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 3);
        assert_eq!(hart.pc(), 16); // -5 < 5 signed, taken

        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_addi(1, 0, -5),
                assemble_addi(2, 0, 5),
                assemble_b(opcode::BRANCH, 0b110, 1, 2, 8), // bltu
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 3);
        assert_eq!(hart.pc(), 12); // 0xfffffffb > 5 unsigned, not taken
    }

    #[test]
    fn test_load_sign_and_zero_extension() {
        let mut mem = Memory::new(0x100);
        mem.set8(0x80, 0xff);
        mem.set16(0x90, 0x8000);
        load_words(
            &mut mem,
            &[
                assemble_i(opcode::LOAD, 1, 0b000, 0, 0x80), // lb
                assemble_i(opcode::LOAD, 2, 0b100, 0, 0x80), // lbu
                assemble_i(opcode::LOAD, 3, 0b001, 0, 0x90), // lh
                assemble_i(opcode::LOAD, 4, 0b101, 0, 0x90), // lhu
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 4);
        assert_eq!(hart.get_reg(1), -1);
        assert_eq!(hart.get_reg(2), 0xff);
        assert_eq!(hart.get_reg(3), -32768);
        assert_eq!(hart.get_reg(4), 0x8000);
    }

    #[test]
    fn test_store_load_round_trip() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_addi(1, 0, 0x42),
                assemble_sw(0, 1, 0x80),
                assemble_lw(2, 0, 0x80),
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 3);
        assert_eq!(hart.get_reg(2), 0x42);
    }

    #[test]
    fn test_sb_sh_store_low_bytes_only() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_lui(1, 0x12345000),
                assemble_i(opcode::OP_IMM, 1, 0b110, 1, 0x678), // ori
                assemble_s(opcode::STORE, 0b000, 0, 1, 0x80),   // sb
                assemble_s(opcode::STORE, 0b001, 0, 1, 0x90),   // sh
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 4);
        drop(hart);
        assert_eq!(mem.get8(0x80), 0x78);
        assert_eq!(mem.get8(0x81), 0xa5); // untouched sentinel
        assert_eq!(mem.get16(0x90), 0x5678);
        assert_eq!(mem.get8(0x92), 0xa5);
    }

    #[test]
    fn test_shift_amount_masked_to_5_bits() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_addi(1, 0, 1),
                assemble_addi(2, 0, 34), // & 0x1f == 2
                assemble_r(opcode::OP, 3, 0b001, 1, 2, 0x00), // sll
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 3);
        assert_eq!(hart.get_reg(3), 4);
    }

    #[test]
    fn test_sra_preserves_sign_srl_does_not() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_addi(1, 0, -16),
                assemble_addi(2, 0, 2),
                assemble_r(opcode::OP, 3, 0b101, 1, 2, 0x20), // sra
                assemble_r(opcode::OP, 4, 0b101, 1, 2, 0x00), // srl
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 4);
        assert_eq!(hart.get_reg(3), -4);
        assert_eq!(hart.get_reg(4) as u32, 0x3ffffffc);
    }

    #[test]
    fn test_srai_immediate() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_addi(1, 0, -16),
                assemble_i(opcode::OP_IMM, 2, 0b101, 1, 0x402), // srai x2, x1, 2
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 2);
        assert_eq!(hart.get_reg(2), -4);
    }

    #[test]
    fn test_slti_sltiu() {
        let mut mem = Memory::new(0x100);
        load_words(
            &mut mem,
            &[
                assemble_addi(1, 0, -1),
                assemble_i(opcode::OP_IMM, 2, 0b010, 1, 0), // slti: -1 < 0
                assemble_i(opcode::OP_IMM, 3, 0b011, 1, 0), // sltiu: 0xffffffff < 0
            ],
        );
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 3);
        assert_eq!(hart.get_reg(2), 1);
        assert_eq!(hart.get_reg(3), 0);
    }

    #[test]
    fn test_ebreak_halts_without_advancing_pc() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_addi(1, 0, 5), assemble_ebreak()]);
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 2);
        assert!(hart.is_halted());
        assert_eq!(hart.halt_reason(), "EBREAK instruction");
        assert_eq!(hart.pc(), 4);
        assert_eq!(hart.insn_counter(), 2);
    }

    #[test]
    fn test_halt_is_sticky() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_ebreak()]);
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 5);
        assert_eq!(hart.insn_counter(), 1);
        assert_eq!(hart.pc(), 0);
    }

    #[test]
    fn test_illegal_instruction_halts() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[0x00000000]);
        let mut hart = Hart::new(&mut mem);
        hart.tick("");
        assert!(hart.is_halted());
        assert_eq!(hart.halt_reason(), "Illegal instruction");
        assert_eq!(hart.pc(), 0);
        assert_eq!(hart.insn_counter(), 1);
    }

    #[test]
    fn test_ecall_executes_as_illegal() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_ecall()]);
        let mut hart = Hart::new(&mut mem);
        hart.tick("");
        assert!(hart.is_halted());
        assert_eq!(hart.halt_reason(), "Illegal instruction");
    }

    #[test]
    fn test_csrrs_reads_mhartid() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_csrrs(10, 0xf14, 0)]);
        let mut hart = Hart::new(&mut mem);
        hart.set_mhartid(7);
        hart.tick("");
        assert!(!hart.is_halted());
        assert_eq!(hart.get_reg(10), 7);
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn test_csrrs_illegal_csr_halts_before_writeback() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_csrrs(10, 0x300, 0)]);
        let mut hart = Hart::new(&mut mem);
        hart.tick("");
        assert!(hart.is_halted());
        assert_eq!(hart.halt_reason(), "Illegal CSR in CRSS instruction");
        assert_eq!(hart.pc(), 0);
        assert_eq!(hart.get_reg(10) as u32, 0xf0f0f0f0);
    }

    #[test]
    fn test_csrrs_nonzero_rs1_halts() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_csrrs(10, 0xf14, 1)]);
        let mut hart = Hart::new(&mut mem);
        hart.tick("");
        assert!(hart.is_halted());
        assert_eq!(hart.halt_reason(), "Illegal CSR in CRSS instruction");
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_addi(1, 0, 5), assemble_ebreak()]);
        let mut hart = Hart::new(&mut mem);
        run_ticks(&mut hart, 2);
        assert!(hart.is_halted());
        hart.reset();
        assert!(!hart.is_halted());
        assert_eq!(hart.halt_reason(), "none");
        assert_eq!(hart.pc(), 0);
        assert_eq!(hart.insn_counter(), 0);
        assert_eq!(hart.get_reg(1) as u32, 0xf0f0f0f0);
    }

    #[test]
    fn test_run_initializes_stack_pointer() {
        let mut mem = Memory::new(0x100);
        load_words(&mut mem, &[assemble_ebreak()]);
        let mut hart = Hart::new(&mut mem);
        hart.run(0);
        assert_eq!(hart.get_reg(2), 0x100);
    }

    #[test]
    fn test_run_honors_exec_limit() {
        let mut mem = Memory::new(0x100);
        // All-sentinel memory decodes to illegal, so seed real nops.
        let nops = [assemble_nop(); 8];
        load_words(&mut mem, &nops);
        let mut hart = Hart::new(&mut mem);
        hart.run(5);
        assert!(!hart.is_halted());
        assert_eq!(hart.insn_counter(), 5);
    }

    #[test]
    fn test_trace_line_addi() {
        let mut mem = Memory::new(0x100);
        let mut hart = Hart::new(&mut mem);
        let mut out = Vec::new();
        hart.exec(assemble_addi(1, 0, 5), Some(&mut out));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "addi    x1,x0,5                    // x1 = 0x00000000 + 0x00000005 = 0x00000005\n"
        );
    }

    #[test]
    fn test_trace_line_branch() {
        let mut mem = Memory::new(0x100);
        let mut hart = Hart::new(&mut mem);
        hart.set_reg(1, 5);
        hart.set_reg(2, 5);
        let mut out = Vec::new();
        hart.exec(assemble_beq(1, 2, 8), Some(&mut out));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "beq     x1,x2,0x00000008           // pc += (0x00000005 == 0x00000005 ? 0x00000008 : 4) = 0x00000008\n"
        );
    }

    #[test]
    fn test_trace_line_ebreak() {
        let mut mem = Memory::new(0x100);
        let mut hart = Hart::new(&mut mem);
        let mut out = Vec::new();
        hart.exec(assemble_ebreak(), Some(&mut out));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "ebreak                             // HALT\n");
    }

    #[test]
    fn test_trace_line_jal() {
        let mut mem = Memory::new(0x100);
        let mut hart = Hart::new(&mut mem);
        let mut out = Vec::new();
        hart.exec(assemble_jal(1, 8), Some(&mut out));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "jal     x1,0x00000008              // x1 = 0x00000004,  pc = 0x00000000 + 0x00000008 = 0x00000008\n"
        );
    }

    #[test]
    fn test_hart_dump_has_pc_line() {
        let mut mem = Memory::new(0x100);
        let mut hart = Hart::new(&mut mem);
        let mut out = Vec::new();
        hart.dump(&mut out, "");
        let text = String::from_utf8(out).unwrap();
        let last = text.lines().last().unwrap();
        assert_eq!(last, " pc 00000000");
    }
}
