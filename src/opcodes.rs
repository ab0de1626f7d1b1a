use std::collections::HashMap;
use std::sync::LazyLock;

use crate::operand::OperandKind::{self, Address, Displacement, Immediate, Register};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Mov,
    Sbb,
    Mul,
    Ja,
    Int,
}

impl Mnemonic {
    pub fn from_name(name: &str) -> Option<Mnemonic> {
        match name.to_ascii_uppercase().as_str() {
            "MOV" => Some(Mnemonic::Mov),
            "SBB" => Some(Mnemonic::Sbb),
            "MUL" => Some(Mnemonic::Mul),
            "JA" => Some(Mnemonic::Ja),
            "INT" => Some(Mnemonic::Int),
            _ => None,
        }
    }

    /// Conditional jumps take a displacement instead of an address.
    pub fn is_jump(self) -> bool {
        matches!(self, Mnemonic::Ja)
    }
}

/// Encoding of one (mnemonic, operand shape) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub code: u8,
    pub d: Option<u8>,
    pub w: bool,
    pub mode: Option<u8>,
    pub reg: Option<u8>,
    pub rm: Option<u8>,
}

impl Template {
    const fn new(
        code: u8,
        d: Option<u8>,
        w: bool,
        mode: Option<u8>,
        reg: Option<u8>,
        rm: Option<u8>,
    ) -> Self {
        Template { code, d, w, mode, reg, rm }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeKey {
    pub mnemonic: Mnemonic,
    pub op1: Option<OperandKind>,
    pub op2: Option<OperandKind>,
}

impl OpcodeKey {
    pub fn new(mnemonic: Mnemonic, op1: Option<OperandKind>, op2: Option<OperandKind>) -> Self {
        OpcodeKey { mnemonic, op1, op2 }
    }
}

static OPCODES: LazyLock<HashMap<OpcodeKey, Template>> = LazyLock::new(|| {
    use Mnemonic::*;
    let t = Template::new;
    [
        // ── MOV ──────────────────────────────────
        (Mov, Some(Register), Some(Register),  t(0x22, Some(1), true, Some(3), None, None)),
        (Mov, Some(Register), Some(Immediate), t(0x63, None, true, Some(3), Some(0), None)),
        (Mov, Some(Register), Some(Address),   t(0x22, Some(1), true, Some(0), None, Some(6))),
        (Mov, Some(Address),  Some(Register),  t(0x22, Some(0), true, Some(0), None, Some(6))),
        // ── SBB ──────────────────────────────────
        (Sbb, Some(Register), Some(Register),  t(0x06, Some(1), true, Some(3), Some(0), None)),
        (Sbb, Some(Register), Some(Immediate), t(0x40, None, true, Some(3), Some(0), None)),
        (Sbb, Some(Register), Some(Address),   t(0x06, Some(1), true, Some(0), None, Some(6))),
        (Sbb, Some(Address),  Some(Register),  t(0x06, Some(0), true, Some(0), None, Some(6))),
        // ── single operand ───────────────────────
        (Mul, Some(Register), None,            t(0x7B, None, true, Some(3), Some(4), None)),
        (Ja,  Some(Displacement), None,        t(0x77, None, false, None, None, Some(0))),
        (Int, Some(Immediate), None,           t(0xCD, None, false, None, None, None)),
    ]
    .into_iter()
    .map(|(m, a, b, tpl)| (OpcodeKey::new(m, a, b), tpl))
    .collect()
});

/// Exact match on (mnemonic, operand kind, operand kind).
pub fn lookup(key: &OpcodeKey) -> Option<Template> {
    OPCODES.get(key).copied()
}
