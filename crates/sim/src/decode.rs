//! RV32I instruction decoder and disassembler.
//!
//! Decoding is pure: a 32-bit instruction word (plus the address it was
//! fetched from, for PC-relative operands) maps to a [`DecodedInstr`] field
//! record and a tagged [`Op`] variant. The renderer and the execution engine
//! both interpret the same `Op`, so there is a single place where the
//! (opcode, funct3, funct7) decision is made.

use crate::hex;

/// Width of the left-justified mnemonic field in disassembly output.
pub const MNEMONIC_WIDTH: usize = 8;

/// Opcode constants for RV32I.
pub mod opcode {
    pub const LUI: u8 = 0b0110111;
    pub const AUIPC: u8 = 0b0010111;
    pub const JAL: u8 = 0b1101111;
    pub const JALR: u8 = 0b1100111;
    pub const BRANCH: u8 = 0b1100011;
    pub const LOAD: u8 = 0b0000011;
    pub const STORE: u8 = 0b0100011;
    pub const OP_IMM: u8 = 0b0010011;
    pub const OP: u8 = 0b0110011;
    pub const SYSTEM: u8 = 0b1110011;
}

/// funct3 values for BRANCH.
pub mod branch_funct3 {
    pub const BEQ: u8 = 0b000;
    pub const BNE: u8 = 0b001;
    pub const BLT: u8 = 0b100;
    pub const BGE: u8 = 0b101;
    pub const BLTU: u8 = 0b110;
    pub const BGEU: u8 = 0b111;
}

/// funct3 values for LOAD.
pub mod load_funct3 {
    pub const LB: u8 = 0b000;
    pub const LH: u8 = 0b001;
    pub const LW: u8 = 0b010;
    pub const LBU: u8 = 0b100;
    pub const LHU: u8 = 0b101;
}

/// funct3 values for STORE.
pub mod store_funct3 {
    pub const SB: u8 = 0b000;
    pub const SH: u8 = 0b001;
    pub const SW: u8 = 0b010;
}

/// funct3 values for OP-IMM.
pub mod op_imm_funct3 {
    pub const ADDI: u8 = 0b000;
    pub const SLLI: u8 = 0b001;
    pub const SLTI: u8 = 0b010;
    pub const SLTIU: u8 = 0b011;
    pub const XORI: u8 = 0b100;
    pub const SRLI_SRAI: u8 = 0b101;
    pub const ORI: u8 = 0b110;
    pub const ANDI: u8 = 0b111;
}

/// funct3 values for OP.
pub mod op_funct3 {
    pub const ADD_SUB: u8 = 0b000;
    pub const SLL: u8 = 0b001;
    pub const SLT: u8 = 0b010;
    pub const SLTU: u8 = 0b011;
    pub const XOR: u8 = 0b100;
    pub const SRL_SRA: u8 = 0b101;
    pub const OR: u8 = 0b110;
    pub const AND: u8 = 0b111;
}

/// funct3 values for SYSTEM CSR forms.
pub mod system_funct3 {
    pub const CSRRW: u8 = 0b001;
    pub const CSRRS: u8 = 0b010;
    pub const CSRRC: u8 = 0b011;
    pub const CSRRWI: u8 = 0b101;
    pub const CSRRSI: u8 = 0b110;
    pub const CSRRCI: u8 = 0b111;
}

/// funct7 discriminators.
pub mod funct7 {
    pub const NORMAL: u8 = 0x00;
    pub const SUB_SRA: u8 = 0x20;
}

/// Full-word encodings matched exactly.
pub const ECALL_BITS: u32 = 0x0000_0073;
pub const EBREAK_BITS: u32 = 0x0010_0073;

/// Decoded RV32I instruction: raw fields plus all five immediate flavors,
/// each sign-extended as its format requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedInstr {
    /// Raw 32-bit instruction bits.
    pub bits: u32,
    /// Opcode (bits [6:0]).
    pub opcode: u8,
    /// Destination register.
    pub rd: u8,
    /// Function code 3.
    pub funct3: u8,
    /// Source register 1.
    pub rs1: u8,
    /// Source register 2.
    pub rs2: u8,
    /// Function code 7.
    pub funct7: u8,
    /// I-type immediate, bits [31:20] sign-extended.
    pub imm_i: i32,
    /// U-type immediate, bits [31:12] in the upper 20 bits.
    pub imm_u: i32,
    /// S-type immediate.
    pub imm_s: i32,
    /// B-type immediate (bit 0 always zero).
    pub imm_b: i32,
    /// J-type immediate (bit 0 always zero).
    pub imm_j: i32,
}

impl DecodedInstr {
    /// Decode a 32-bit instruction word into its fields.
    pub fn decode(bits: u32) -> Self {
        Self {
            bits,
            opcode: (bits & 0x7f) as u8,
            rd: ((bits >> 7) & 0x1f) as u8,
            funct3: ((bits >> 12) & 0x7) as u8,
            rs1: ((bits >> 15) & 0x1f) as u8,
            rs2: ((bits >> 20) & 0x1f) as u8,
            funct7: ((bits >> 25) & 0x7f) as u8,
            imm_i: (bits as i32) >> 20,
            imm_u: (bits & 0xffff_f000) as i32,
            imm_s: Self::imm_s(bits),
            imm_b: Self::imm_b(bits),
            imm_j: Self::imm_j(bits),
        }
    }

    // S-type: imm[11:5] = bits[31:25], imm[4:0] = bits[11:7].
    fn imm_s(bits: u32) -> i32 {
        let imm = ((bits >> 25) & 0x7f) << 5 | (bits >> 7) & 0x1f;
        // Sign extend from bit 11.
        ((imm as i32) << 20) >> 20
    }

    // B-type: imm[12|10:5|4:1|11], bit 0 zero.
    fn imm_b(bits: u32) -> i32 {
        let imm = ((bits >> 31) & 1) << 12
            | ((bits >> 7) & 1) << 11
            | ((bits >> 25) & 0x3f) << 5
            | ((bits >> 8) & 0xf) << 1;
        // Sign extend from bit 12.
        ((imm as i32) << 19) >> 19
    }

    // J-type: imm[20|10:1|11|19:12], bit 0 zero.
    fn imm_j(bits: u32) -> i32 {
        let imm = ((bits >> 31) & 1) << 20
            | (bits & 0x000f_f000)
            | ((bits >> 20) & 1) << 11
            | ((bits >> 21) & 0x3ff) << 1;
        // Sign extend from bit 20.
        ((imm as i32) << 11) >> 11
    }

    /// Shift amount carried in the low 5 bits of the I-immediate.
    pub fn shamt(&self) -> u32 {
        (self.imm_i & 0x1f) as u32
    }

    /// CSR number carried in the low 12 bits of the I-immediate.
    pub fn csr(&self) -> u32 {
        (self.imm_i & 0xfff) as u32
    }

    /// Classify the instruction. This is the single three-level decision on
    /// (opcode, funct3, funct7), with an exact full-word match for
    /// `ecall`/`ebreak`; any key outside the table is [`Op::Illegal`].
    pub fn op(&self) -> Op {
        match self.opcode {
            opcode::LUI => Op::Lui,
            opcode::AUIPC => Op::Auipc,
            opcode::JAL => Op::Jal,
            opcode::JALR => Op::Jalr,
            opcode::BRANCH => match self.funct3 {
                branch_funct3::BEQ => Op::Branch(BranchOp::Beq),
                branch_funct3::BNE => Op::Branch(BranchOp::Bne),
                branch_funct3::BLT => Op::Branch(BranchOp::Blt),
                branch_funct3::BGE => Op::Branch(BranchOp::Bge),
                branch_funct3::BLTU => Op::Branch(BranchOp::Bltu),
                branch_funct3::BGEU => Op::Branch(BranchOp::Bgeu),
                _ => Op::Illegal,
            },
            opcode::LOAD => match self.funct3 {
                load_funct3::LB => Op::Load(LoadOp::Lb),
                load_funct3::LH => Op::Load(LoadOp::Lh),
                load_funct3::LW => Op::Load(LoadOp::Lw),
                load_funct3::LBU => Op::Load(LoadOp::Lbu),
                load_funct3::LHU => Op::Load(LoadOp::Lhu),
                _ => Op::Illegal,
            },
            opcode::STORE => match self.funct3 {
                store_funct3::SB => Op::Store(StoreOp::Sb),
                store_funct3::SH => Op::Store(StoreOp::Sh),
                store_funct3::SW => Op::Store(StoreOp::Sw),
                _ => Op::Illegal,
            },
            opcode::OP_IMM => match self.funct3 {
                op_imm_funct3::ADDI => Op::AluImm(AluImmOp::Addi),
                op_imm_funct3::SLLI => Op::AluImm(AluImmOp::Slli),
                op_imm_funct3::SLTI => Op::AluImm(AluImmOp::Slti),
                op_imm_funct3::SLTIU => Op::AluImm(AluImmOp::Sltiu),
                op_imm_funct3::XORI => Op::AluImm(AluImmOp::Xori),
                op_imm_funct3::ORI => Op::AluImm(AluImmOp::Ori),
                op_imm_funct3::ANDI => Op::AluImm(AluImmOp::Andi),
                op_imm_funct3::SRLI_SRAI => match self.funct7 {
                    funct7::NORMAL => Op::AluImm(AluImmOp::Srli),
                    funct7::SUB_SRA => Op::AluImm(AluImmOp::Srai),
                    _ => Op::Illegal,
                },
                _ => Op::Illegal,
            },
            opcode::OP => match self.funct3 {
                op_funct3::ADD_SUB => match self.funct7 {
                    funct7::NORMAL => Op::AluReg(AluRegOp::Add),
                    funct7::SUB_SRA => Op::AluReg(AluRegOp::Sub),
                    _ => Op::Illegal,
                },
                op_funct3::SLL => Op::AluReg(AluRegOp::Sll),
                op_funct3::SLT => Op::AluReg(AluRegOp::Slt),
                op_funct3::SLTU => Op::AluReg(AluRegOp::Sltu),
                op_funct3::XOR => Op::AluReg(AluRegOp::Xor),
                op_funct3::SRL_SRA => match self.funct7 {
                    funct7::NORMAL => Op::AluReg(AluRegOp::Srl),
                    funct7::SUB_SRA => Op::AluReg(AluRegOp::Sra),
                    _ => Op::Illegal,
                },
                op_funct3::OR => Op::AluReg(AluRegOp::Or),
                op_funct3::AND => Op::AluReg(AluRegOp::And),
                _ => Op::Illegal,
            },
            opcode::SYSTEM => match self.bits {
                ECALL_BITS => Op::Ecall,
                EBREAK_BITS => Op::Ebreak,
                _ => match self.funct3 {
                    system_funct3::CSRRW => Op::Csr(CsrOp::Csrrw),
                    system_funct3::CSRRS => Op::Csr(CsrOp::Csrrs),
                    system_funct3::CSRRC => Op::Csr(CsrOp::Csrrc),
                    system_funct3::CSRRWI => Op::Csr(CsrOp::Csrrwi),
                    system_funct3::CSRRSI => Op::Csr(CsrOp::Csrrsi),
                    system_funct3::CSRRCI => Op::Csr(CsrOp::Csrrci),
                    _ => Op::Illegal,
                },
            },
            _ => Op::Illegal,
        }
    }
}

/// Tagged instruction classification shared by the disassembler and the
/// execution engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Lui,
    Auipc,
    Jal,
    Jalr,
    Branch(BranchOp),
    Load(LoadOp),
    Store(StoreOp),
    AluImm(AluImmOp),
    AluReg(AluRegOp),
    Ecall,
    Ebreak,
    Csr(CsrOp),
    Illegal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchOp {
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
}

impl BranchOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BranchOp::Beq => "beq",
            BranchOp::Bne => "bne",
            BranchOp::Blt => "blt",
            BranchOp::Bge => "bge",
            BranchOp::Bltu => "bltu",
            BranchOp::Bgeu => "bgeu",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOp {
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
}

impl LoadOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            LoadOp::Lb => "lb",
            LoadOp::Lh => "lh",
            LoadOp::Lw => "lw",
            LoadOp::Lbu => "lbu",
            LoadOp::Lhu => "lhu",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Sb,
    Sh,
    Sw,
}

impl StoreOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            StoreOp::Sb => "sb",
            StoreOp::Sh => "sh",
            StoreOp::Sw => "sw",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluImmOp {
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
}

impl AluImmOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AluImmOp::Addi => "addi",
            AluImmOp::Slti => "slti",
            AluImmOp::Sltiu => "sltiu",
            AluImmOp::Xori => "xori",
            AluImmOp::Ori => "ori",
            AluImmOp::Andi => "andi",
            AluImmOp::Slli => "slli",
            AluImmOp::Srli => "srli",
            AluImmOp::Srai => "srai",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluRegOp {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
}

impl AluRegOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AluRegOp::Add => "add",
            AluRegOp::Sub => "sub",
            AluRegOp::Sll => "sll",
            AluRegOp::Slt => "slt",
            AluRegOp::Sltu => "sltu",
            AluRegOp::Xor => "xor",
            AluRegOp::Srl => "srl",
            AluRegOp::Sra => "sra",
            AluRegOp::Or => "or",
            AluRegOp::And => "and",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsrOp {
    Csrrw,
    Csrrs,
    Csrrc,
    Csrrwi,
    Csrrsi,
    Csrrci,
}

impl CsrOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CsrOp::Csrrw => "csrrw",
            CsrOp::Csrrs => "csrrs",
            CsrOp::Csrrc => "csrrc",
            CsrOp::Csrrwi => "csrrwi",
            CsrOp::Csrrsi => "csrrsi",
            CsrOp::Csrrci => "csrrci",
        }
    }

    /// True for the zimm forms whose rs1 field is an immediate.
    pub fn is_imm_form(self) -> bool {
        matches!(self, CsrOp::Csrrwi | CsrOp::Csrrsi | CsrOp::Csrrci)
    }
}

/// Disassemble one instruction word fetched from `addr`.
pub fn disassemble(addr: u32, insn: u32) -> String {
    let d = DecodedInstr::decode(insn);
    match d.op() {
        Op::Lui => render_utype(&d, "lui"),
        Op::Auipc => render_utype(&d, "auipc"),
        Op::Jal => render_jal(addr, &d),
        Op::Jalr => render_jalr(&d),
        Op::Branch(b) => render_btype(addr, &d, b.mnemonic()),
        Op::Load(l) => render_itype_load(&d, l.mnemonic()),
        Op::Store(s) => render_stype(&d, s.mnemonic()),
        // srai carries funct7 in the immediate's upper bits; show the shift
        // amount alone.
        Op::AluImm(AluImmOp::Srai) => render_itype_alu(&d, "srai", d.imm_i & 0x1f),
        Op::AluImm(a) => render_itype_alu(&d, a.mnemonic(), d.imm_i),
        Op::AluReg(a) => render_rtype(&d, a.mnemonic()),
        Op::Ecall => "ecall".to_string(),
        Op::Ebreak => "ebreak".to_string(),
        Op::Csr(c) if c.is_imm_form() => render_csrrxi(&d, c.mnemonic()),
        Op::Csr(c) => render_csrrx(&d, c.mnemonic()),
        Op::Illegal => render_illegal_insn(),
    }
}

pub fn render_illegal_insn() -> String {
    "ERROR: UNIMPLEMENTED INSTRUCTION".to_string()
}

pub fn render_mnemonic(m: &str) -> String {
    format!("{:<width$}", m, width = MNEMONIC_WIDTH)
}

pub fn render_reg(r: u8) -> String {
    format!("x{}", r)
}

pub fn render_base_disp(base: u8, disp: i32) -> String {
    format!("{}(x{})", disp, base)
}

pub fn render_utype(d: &DecodedInstr, mnemonic: &str) -> String {
    format!(
        "{}{},{}",
        render_mnemonic(mnemonic),
        render_reg(d.rd),
        hex::to_hex0x20(d.imm_u as u32)
    )
}

pub fn render_jal(addr: u32, d: &DecodedInstr) -> String {
    format!(
        "{}{},0x{}",
        render_mnemonic("jal"),
        render_reg(d.rd),
        hex::to_hex32(addr.wrapping_add(d.imm_j as u32))
    )
}

pub fn render_jalr(d: &DecodedInstr) -> String {
    format!(
        "{}{},{}",
        render_mnemonic("jalr"),
        render_reg(d.rd),
        render_base_disp(d.rs1, d.imm_i)
    )
}

pub fn render_btype(addr: u32, d: &DecodedInstr, mnemonic: &str) -> String {
    format!(
        "{}{},x{},0x{}",
        render_mnemonic(mnemonic),
        render_reg(d.rs1),
        d.rs2,
        hex::to_hex32(addr.wrapping_add(d.imm_b as u32))
    )
}

pub fn render_itype_load(d: &DecodedInstr, mnemonic: &str) -> String {
    format!(
        "{}{},{}",
        render_mnemonic(mnemonic),
        render_reg(d.rd),
        render_base_disp(d.rs1, d.imm_i)
    )
}

pub fn render_stype(d: &DecodedInstr, mnemonic: &str) -> String {
    format!(
        "{}{},{}",
        render_mnemonic(mnemonic),
        render_reg(d.rs2),
        render_base_disp(d.rs1, d.imm_s)
    )
}

pub fn render_itype_alu(d: &DecodedInstr, mnemonic: &str, imm: i32) -> String {
    format!(
        "{}{},x{},{}",
        render_mnemonic(mnemonic),
        render_reg(d.rd),
        d.rs1,
        imm
    )
}

pub fn render_rtype(d: &DecodedInstr, mnemonic: &str) -> String {
    format!(
        "{}{},x{},x{}",
        render_mnemonic(mnemonic),
        render_reg(d.rd),
        d.rs1,
        d.rs2
    )
}

pub fn render_csrrx(d: &DecodedInstr, mnemonic: &str) -> String {
    format!(
        "{}{},{},x{}",
        render_mnemonic(mnemonic),
        render_reg(d.rd),
        hex::to_hex0x12(d.imm_i as u32),
        d.rs1
    )
}

pub fn render_csrrxi(d: &DecodedInstr, mnemonic: &str) -> String {
    format!(
        "{}{},{},{}",
        render_mnemonic(mnemonic),
        render_reg(d.rd),
        hex::to_hex0x12(d.imm_i as u32),
        d.rs1
    )
}
