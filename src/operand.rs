use std::fmt;

/// Value types of the original tool. The bounds are wider than true
/// signed 8/16-bit ranges and are kept that way for compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Byte,
    Word,
}

impl ValueType {
    pub fn contains(self, v: i32) -> bool {
        match self {
            ValueType::Byte => (-256..=255).contains(&v),
            ValueType::Word => (-65536..=65535).contains(&v),
        }
    }

    /// Bytes taken by one value of this type.
    pub fn width(self) -> u16 {
        match self {
            ValueType::Byte => 1,
            ValueType::Word => 2,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Byte => f.pad("Byte"),
            ValueType::Word => f.pad("Word"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Ax,
    Cx,
    Dx,
    Bx,
    Sp,
    Bp,
    Si,
    Di,
}

impl Register {
    const ALL: [(&'static str, Register); 8] = [
        ("AX", Register::Ax),
        ("CX", Register::Cx),
        ("DX", Register::Dx),
        ("BX", Register::Bx),
        ("SP", Register::Sp),
        ("BP", Register::Bp),
        ("SI", Register::Si),
        ("DI", Register::Di),
    ];

    pub fn from_name(name: &str) -> Option<Register> {
        Self::ALL
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, r)| *r)
    }

    /// 3-bit register field value.
    pub fn index(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Register,
    Address,
    Immediate,
    Displacement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(Register),
    Address(String),
    Immediate(i32),
    Displacement(String),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Register(_) => OperandKind::Register,
            Operand::Address(_) => OperandKind::Address,
            Operand::Immediate(_) => OperandKind::Immediate,
            Operand::Displacement(_) => OperandKind::Displacement,
        }
    }
}

/// Classify one operand token.
pub fn parse_operand(tok: &str) -> Operand {
    if let Some(reg) = Register::from_name(tok) {
        return Operand::Register(reg);
    }

    let mut chars = tok.chars();
    let first = chars.next();
    let second = chars.next();

    match (first, second) {
        (Some(c), None) if c.is_ascii_digit() => Operand::Immediate(c as i32 - '0' as i32),
        (Some(_), None) => Operand::Address(tok.to_string()),
        (Some(c), _) if c.is_ascii_digit() => numeric_or_address(tok),
        (Some('-'), Some(c)) if c.is_ascii_digit() => numeric_or_address(tok),
        _ => Operand::Address(tok.to_string()),
    }
}

fn numeric_or_address(tok: &str) -> Operand {
    match parse_number(tok) {
        Some(v) => Operand::Immediate(v),
        None => Operand::Address(tok.to_string()),
    }
}

/// Decimal, or hexadecimal with a trailing `H` (`1AH`, `-10h`).
pub fn parse_number(tok: &str) -> Option<i32> {
    let up = tok.to_ascii_uppercase();
    match up.strip_suffix('H') {
        Some(hex) if !hex.is_empty() => i32::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => up.parse::<i32>().ok(),
    }
}

/// `[A-Za-z_][A-Za-z0-9_-]*`
pub fn is_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
