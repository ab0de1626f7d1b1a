use bitvec::prelude::*;

use crate::error::Diagnostic;
use crate::operand::{Operand, ValueType};
use crate::parser::{CollectedDefinition, CollectedInstruction};
use crate::symbols::{NamesTable, SymbolKind};

/// Listing hex text of one line. Data definitions may spill onto
/// continuation rows, each `step` bytes further on.
#[derive(Debug, Clone, PartialEq)]
pub struct HexText {
    pub rows: Vec<String>,
    pub step: u16,
}

impl HexText {
    pub fn single(row: String) -> Self {
        HexText { rows: vec![row], step: 0 }
    }
}

/// mode(2) | reg(3) | rm(3)
struct ModRm(BitArr!(for 8, in u8, Msb0));

impl ModRm {
    fn new() -> Self {
        ModRm(bitarr![u8, Msb0; 0; 8])
    }

    fn set_mode(&mut self, mode: u8) {
        self.0[0..2].store(mode);
    }

    fn set_reg(&mut self, reg: u8) {
        self.0[2..5].store(reg);
    }

    fn set_rm(&mut self, rm: u8) {
        self.0[5..8].store(rm);
    }

    fn byte(&self) -> u8 {
        self.0[..].load()
    }
}

/// Second byte of an instruction: a ModRM byte, or a literal for
/// displacements and lone immediates.
enum SecondByte {
    ModRm(ModRm),
    Raw(u8),
}

fn resolve(names: &NamesTable, id: &str) -> Result<[u8; 2], Diagnostic> {
    names
        .get(id)
        .map(|e| e.address.to_le_bytes())
        .ok_or_else(|| Diagnostic::Undeclared(id.to_string()))
}

pub fn encode(inst: &CollectedInstruction, names: &NamesTable) -> Result<Vec<u8>, Diagnostic> {
    let tpl = &inst.template;
    let Some(op1) = &inst.op1 else {
        return Ok(vec![tpl.code]);
    };

    let mut opcode = u16::from(tpl.code);
    if let Some(d) = tpl.d {
        opcode = (opcode << 1) | u16::from(d);
    }

    let mut tail: Option<[u8; 2]> = None;

    let mut second = match op1 {
        Operand::Register(r) => {
            let mut m = ModRm::new();
            m.set_mode(tpl.mode.unwrap_or(0));
            match tpl.d {
                Some(1) => m.set_reg(r.index()),
                Some(_) => m.set_rm(r.index()),
                None => {
                    m.set_reg(tpl.reg.unwrap_or(0));
                    m.set_rm(r.index());
                }
            }
            SecondByte::ModRm(m)
        }
        Operand::Address(id) => {
            tail = Some(resolve(names, id)?);
            let mut m = ModRm::new();
            m.set_mode(tpl.mode.unwrap_or(0));
            m.set_rm(tpl.rm.unwrap_or(0));
            SecondByte::ModRm(m)
        }
        Operand::Displacement(id) => {
            let target = names
                .get(id)
                .ok_or_else(|| Diagnostic::UndeclaredTarget(id.clone()))?;
            if target.kind != SymbolKind::Label {
                return Err(Diagnostic::TargetNotLabel);
            }
            let disp = i32::from(target.address) - i32::from(inst.address);
            if !ValueType::Byte.contains(disp) {
                return Err(Diagnostic::DisplacementRange(disp, ValueType::Byte));
            }
            SecondByte::Raw(disp as u8)
        }
        Operand::Immediate(v) => {
            if inst.op2.is_some() {
                return Err(Diagnostic::ImmediateFirst);
            }
            if !ValueType::Byte.contains(*v) {
                return Err(Diagnostic::OutOfRange(*v, ValueType::Byte));
            }
            SecondByte::Raw(*v as u8)
        }
    };

    match (&inst.op2, &mut second) {
        (Some(Operand::Register(r)), SecondByte::ModRm(m)) => match tpl.d {
            Some(1) => m.set_rm(r.index()),
            Some(_) => m.set_reg(r.index()),
            None => {}
        },
        (Some(Operand::Address(id)), SecondByte::ModRm(m)) => {
            tail = Some(resolve(names, id)?);
            m.set_rm(tpl.rm.unwrap_or(0));
        }
        (Some(Operand::Immediate(v)), _) => {
            if !ValueType::Word.contains(*v) {
                return Err(Diagnostic::OutOfRange(*v, ValueType::Word));
            }
            tail = Some(((*v & 0xFFFF) as u16).to_le_bytes());
        }
        (Some(_), _) => return Err(Diagnostic::InvalidOperands),
        (None, SecondByte::ModRm(m)) => {
            if let Some(reg) = tpl.reg {
                m.set_reg(reg);
            }
        }
        (None, SecondByte::Raw(_)) => {}
    }

    if tpl.w {
        opcode = (opcode << 1) | 1;
    }

    let mut bytes = vec![(opcode & 0xFF) as u8];
    bytes.push(match second {
        SecondByte::ModRm(m) => m.byte(),
        SecondByte::Raw(b) => b,
    });
    if let Some(word) = tail {
        bytes.extend_from_slice(&word);
    }
    bytes.resize(usize::from(inst.length), 0);
    Ok(bytes)
}

/// `8B C3`, `CD 21`, `C7 C0 0005`: bytes 2-3 are shown as one word.
pub fn instruction_hex(bytes: &[u8]) -> String {
    let mut parts: Vec<String> = bytes.iter().take(2).map(|b| format!("{b:02X}")).collect();
    match bytes {
        [_, _, b2] => parts.push(format!("{b2:02X}")),
        [_, _, lo, hi, ..] => parts.push(format!("{:04X}", u16::from_le_bytes([*lo, *hi]))),
        _ => {}
    }
    parts.join(" ")
}

pub fn encode_definition(def: &CollectedDefinition) -> (Vec<u8>, HexText) {
    let (per_row, marker) = match def.kind {
        ValueType::Word => (4, " +"),
        ValueType::Byte => (7, "+"),
    };

    let mut bytes = Vec::with_capacity(def.values.len() * usize::from(def.kind.width()));
    let mut cells = Vec::with_capacity(def.values.len());
    for value in &def.values {
        match (value, def.kind) {
            (None, ValueType::Word) => {
                bytes.extend_from_slice(&[0, 0]);
                cells.push("????".to_string());
            }
            (None, ValueType::Byte) => {
                bytes.push(0);
                cells.push("??".to_string());
            }
            (Some(v), ValueType::Word) => {
                let word = (*v & 0xFFFF) as u16;
                bytes.extend_from_slice(&word.to_le_bytes());
                cells.push(format!("{word:04X}"));
            }
            (Some(v), ValueType::Byte) => {
                let byte = (*v & 0xFF) as u8;
                bytes.push(byte);
                cells.push(format!("{byte:02X}"));
            }
        }
    }

    let chunks: Vec<_> = cells.chunks(per_row).collect();
    let rows = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let row = chunk.join(" ");
            if i + 1 < chunks.len() { row + marker } else { row }
        })
        .collect();

    let step = per_row as u16 * def.kind.width();
    (bytes, HexText { rows, step })
}
