use std::collections::BTreeMap;
use std::ops::ControlFlow;

use crate::encoder::{self, HexText};
use crate::error::{Diagnostic, Diagnostics};
use crate::lexer::{self, SourceLine};
use crate::opcodes::{self, Mnemonic, OpcodeKey, Template};
use crate::operand::{self, Operand, OperandKind, ValueType};
use crate::symbols::{NamesTable, SymbolKind};

/// Segment name used until a valid `<id> SEGMENT` line is seen.
pub const DEFAULT_SEGMENT: &str = "SEGMENT";

#[derive(Debug, Clone, PartialEq)]
pub struct CollectedInstruction {
    pub template: Template,
    pub op1: Option<Operand>,
    pub op2: Option<Operand>,
    pub address: u16,
    pub length: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectedDefinition {
    pub id: String,
    pub kind: ValueType,
    /// `None` is the `?` placeholder.
    pub values: Vec<Option<i32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Inst(CollectedInstruction),
    Data(CollectedDefinition),
}

pub struct FirstPassResult {
    pub lines: Vec<SourceLine>,
    pub symbols: NamesTable,
    /// Collected items keyed by source line number.
    pub items: BTreeMap<usize, Item>,
    /// Listing address of every line that has one.
    pub addresses: BTreeMap<usize, u16>,
    pub segment_name: String,
    pub start_address: u16,
    pub segment_length: u16,
    pub entry_point: u16,
    /// Line of the `END` directive, if scanning stopped there.
    pub end_line: Option<usize>,
}

pub struct SecondPassResult {
    /// Encoded instructions and data, in line order.
    pub body: Vec<u8>,
    pub hex: BTreeMap<usize, HexText>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    Pending,
    Open,
    Closed,
}

/// Pass-1 state, threaded through every line handler.
struct Scanner<'a> {
    log: &'a mut Diagnostics,
    segment: SegmentState,
    segment_name: String,
    next_address: u16,
    start_address: Option<u16>,
    instruction_pointer: Option<u16>,
    symbols: NamesTable,
    items: BTreeMap<usize, Item>,
    addresses: BTreeMap<usize, u16>,
}

pub fn first_pass(src: &str, log: &mut Diagnostics) -> FirstPassResult {
    let lines = lexer::source_lines(src);
    let mut scan = Scanner {
        log,
        segment: SegmentState::Pending,
        segment_name: DEFAULT_SEGMENT.to_string(),
        next_address: 0,
        start_address: None,
        instruction_pointer: None,
        symbols: NamesTable::new(),
        items: BTreeMap::new(),
        addresses: BTreeMap::new(),
    };

    let mut end_line = None;
    for line in &lines {
        let words = line.words();
        if words.is_empty() {
            continue;
        }
        if let ControlFlow::Break(()) = scan.line(line.number, &words) {
            end_line = Some(line.number);
            break;
        }
    }

    let start_address = scan.start_address.unwrap_or(0);
    let segment_length = match scan.next_address.checked_sub(start_address) {
        Some(len) => len,
        None => {
            let last = end_line.unwrap_or(lines.len());
            let len = i32::from(scan.next_address) - i32::from(start_address);
            scan.log.error(last, Diagnostic::SegmentLength(len));
            0
        }
    };

    tracing::debug!(
        "pass 1: {} items, {} names, segment {} at {:04X}+{:04X}",
        scan.items.len(),
        scan.symbols.len(),
        scan.segment_name,
        start_address,
        segment_length
    );

    FirstPassResult {
        entry_point: scan.instruction_pointer.unwrap_or(0),
        segment_name: scan.segment_name,
        symbols: scan.symbols,
        items: scan.items,
        addresses: scan.addresses,
        lines,
        start_address,
        segment_length,
        end_line,
    }
}

impl Scanner<'_> {
    fn line(&mut self, n: usize, words: &[String]) -> ControlFlow<()> {
        let head = words[0].to_ascii_uppercase();
        if head == "END" {
            return ControlFlow::Break(());
        }
        match self.segment {
            SegmentState::Pending => self.open_segment(n, words),
            SegmentState::Open | SegmentState::Closed => self.statement(n, &head, words),
        }
        ControlFlow::Continue(())
    }

    fn statement(&mut self, n: usize, head: &str, words: &[String]) {
        if let Some(m) = Mnemonic::from_name(head) {
            return self.instruction(n, m, &words[1..]);
        }
        match head {
            "ORG" => self.org(n, &words[1..]),
            "OFFSET" => self.offset(n, &words[1..]),
            "ENDS" => self.close_segment(n, None, &words[1..]),
            "SEGMENT" | "DW" | "DB" => {
                self.log.error(n, Diagnostic::UnexpectedDirective(head.to_string()))
            }
            _ => match words[0].strip_suffix(':') {
                Some(id) => self.label(n, id, &words[1..]),
                None => self.declaration(n, words),
            },
        }
    }

    // ── Segment ──────────────────────────────

    fn open_segment(&mut self, n: usize, words: &[String]) {
        let is_segment = words
            .get(1)
            .is_some_and(|w| w.eq_ignore_ascii_case("SEGMENT"));
        if !is_segment {
            self.log.error(n, Diagnostic::SegmentExpected);
            return;
        }

        let id = &words[0];
        if operand::is_identifier(id) && !is_reserved(id) {
            self.segment_name = id.to_uppercase();
        } else {
            self.log.error(n, Diagnostic::InvalidSegmentId(id.clone()));
        }
        self.addresses.insert(n, self.next_address);
        self.trailing(n, &words[2..]);
        self.segment = SegmentState::Open;
        tracing::debug!(line = n, "segment {} opened", self.segment_name);
    }

    fn close_segment(&mut self, n: usize, name: Option<&str>, rest: &[String]) {
        if self.segment != SegmentState::Open {
            self.log.error(n, Diagnostic::UnexpectedDirective("ENDS".to_string()));
            return;
        }
        if let Some(name) = name {
            if !name.eq_ignore_ascii_case(&self.segment_name) {
                self.log.error(n, Diagnostic::SegmentNameMismatch(name.to_string()));
            }
        }
        self.addresses.insert(n, self.next_address);
        self.trailing(n, rest);
        self.segment = SegmentState::Closed;
    }

    /// Records an error and returns `false` unless a segment is open.
    fn in_segment(&mut self, n: usize) -> bool {
        if self.segment == SegmentState::Open {
            return true;
        }
        self.log.error(n, Diagnostic::OutsideSegment);
        false
    }

    fn trailing(&mut self, n: usize, rest: &[String]) {
        if let Some(word) = rest.first() {
            self.log.error(n, Diagnostic::UnexpectedWord(word.clone()));
        }
    }

    // ── Address counter directives ───────────

    fn org(&mut self, n: usize, args: &[String]) {
        if !self.in_segment(n) {
            return;
        }
        let Some(value) = self.directive_value(n, args) else {
            return;
        };
        match u16::try_from(value) {
            Ok(addr) => self.next_address = addr,
            Err(_) => self.log.error(n, Diagnostic::NegativeAddress(value)),
        }
    }

    fn offset(&mut self, n: usize, args: &[String]) {
        if !self.in_segment(n) {
            return;
        }
        let Some(value) = self.directive_value(n, args) else {
            return;
        };
        let target = i32::from(self.next_address) + value;
        match u16::try_from(target) {
            Ok(addr) => {
                self.next_address = addr;
                if target > 25565 {
                    self.log.error(n, Diagnostic::OffsetLimit);
                }
            }
            Err(_) if target < 0 => self.log.error(n, Diagnostic::NegativeAddress(target)),
            Err(_) => self.log.error(n, Diagnostic::AddressOverflow),
        }
    }

    /// Word-ranged numeric argument of ORG / OFFSET.
    fn directive_value(&mut self, n: usize, args: &[String]) -> Option<i32> {
        let Some(tok) = args.first() else {
            self.log.error(n, Diagnostic::BadExpression(String::new()));
            return None;
        };
        self.trailing(n, &args[1..]);
        let Some(value) = operand::parse_number(tok) else {
            self.log.error(n, Diagnostic::BadExpression(tok.clone()));
            return None;
        };
        if !ValueType::Word.contains(value) {
            self.log.error(n, Diagnostic::OutOfRange(value, ValueType::Word));
            return None;
        }
        Some(value)
    }

    // ── Labels and data ──────────────────────

    fn label(&mut self, n: usize, id: &str, rest: &[String]) {
        if !self.in_segment(n) {
            return;
        }
        if !operand::is_identifier(id) {
            self.log.error(n, Diagnostic::InvalidLabelId(id.to_string()));
            return;
        }
        if let Err(key) = self.symbols.insert(id, SymbolKind::Label, self.next_address) {
            self.log.error(n, Diagnostic::DuplicateId(key));
            return;
        }
        self.addresses.insert(n, self.next_address);
        self.trailing(n, rest);
    }

    /// `<id> DW|DB <values>` or `<id> ENDS`.
    fn declaration(&mut self, n: usize, words: &[String]) {
        let id = &words[0];
        let Some(dir) = words.get(1) else {
            self.log.error(n, Diagnostic::InvalidInstruction);
            return;
        };
        let kind = match dir.to_ascii_uppercase().as_str() {
            "DW" => ValueType::Word,
            "DB" => ValueType::Byte,
            "ENDS" => return self.close_segment(n, Some(id.as_str()), &words[2..]),
            "SEGMENT" => {
                self.log.error(n, Diagnostic::UnexpectedDirective("SEGMENT".to_string()));
                return;
            }
            _ => {
                self.log.error(n, Diagnostic::InvalidInstruction);
                return;
            }
        };

        if !self.in_segment(n) {
            return;
        }
        if !operand::is_identifier(id) {
            self.log.error(n, Diagnostic::InvalidLabelId(id.clone()));
            return;
        }
        if self.symbols.contains(id) {
            self.log.error(n, Diagnostic::DuplicateId(id.to_uppercase()));
            return;
        }

        let values = self.values(n, kind, &words[2..]);
        let address = self.next_address;
        let next = u16::try_from(values.len())
            .ok()
            .and_then(|count| count.checked_mul(kind.width()))
            .and_then(|len| address.checked_add(len));
        let Some(next) = next else {
            self.log.error(n, Diagnostic::AddressOverflow);
            return;
        };
        if let Err(key) = self.symbols.insert(id, kind.into(), address) {
            self.log.error(n, Diagnostic::DuplicateId(key));
            return;
        }

        tracing::debug!(line = n, "{id} {kind} x{} at {address:04X}", values.len());
        self.start_address.get_or_insert(address);
        self.addresses.insert(n, address);
        self.items.insert(
            n,
            Item::Data(CollectedDefinition { id: id.to_uppercase(), kind, values }),
        );
        self.next_address = next;
    }

    fn values(&mut self, n: usize, kind: ValueType, toks: &[String]) -> Vec<Option<i32>> {
        if toks.is_empty() {
            self.log.warning(n, Diagnostic::MissingOperand);
            return vec![Some(0)];
        }
        let mut values = Vec::with_capacity(toks.len());
        for tok in toks {
            let value = match operand::parse_number(tok) {
                _ if tok == "?" => None,
                None => {
                    self.log.error(n, Diagnostic::BadExpression(tok.clone()));
                    None
                }
                Some(v) if !kind.contains(v) => {
                    self.log.error(n, Diagnostic::OutOfRange(v, kind));
                    None
                }
                Some(v) => Some(v),
            };
            values.push(value);
        }
        values
    }

    // ── Instructions ─────────────────────────

    fn instruction(&mut self, n: usize, m: Mnemonic, args: &[String]) {
        if !self.in_segment(n) {
            return;
        }
        let op1 = args.first().map(|a| operand::parse_operand(a));
        let op2 = args.get(1).map(|a| operand::parse_operand(a));
        self.trailing(n, args.get(2..).unwrap_or_default());

        let op1 = match op1 {
            Some(Operand::Address(id)) if m.is_jump() && op2.is_none() => {
                Some(Operand::Displacement(id))
            }
            other => other,
        };

        let key = OpcodeKey::new(m, op1.as_ref().map(Operand::kind), op2.as_ref().map(Operand::kind));
        let Some(template) = opcodes::lookup(&key) else {
            self.log.error(n, Diagnostic::InvalidOperands);
            return;
        };

        let address = self.next_address;
        let length = instruction_length(op1.as_ref(), op2.as_ref());
        let Some(next) = address.checked_add(length) else {
            self.log.error(n, Diagnostic::AddressOverflow);
            return;
        };

        tracing::debug!(line = n, "{m:?} at {address:04X}, {length} bytes");
        self.start_address.get_or_insert(address);
        self.instruction_pointer.get_or_insert(address);
        self.addresses.insert(n, address);
        self.items.insert(
            n,
            Item::Inst(CollectedInstruction { template, op1, op2, address, length }),
        );
        self.next_address = next;
    }
}

/// Byte length of an instruction, from its operand kinds alone.
pub fn instruction_length(op1: Option<&Operand>, op2: Option<&Operand>) -> u16 {
    use OperandKind::*;
    match (op1.map(Operand::kind), op2.map(Operand::kind)) {
        (Some(a), Some(b)) => {
            let mut len = 2;
            if a == Register && b == Immediate {
                len += 2;
            }
            if a == Address || b == Address {
                len += 2;
            }
            len
        }
        (Some(Address), None) => 4,
        (Some(_), None) => 2,
        (None, _) => 1,
    }
}

/// Directive and mnemonic names can't name a segment.
fn is_reserved(id: &str) -> bool {
    const DIRECTIVES: [&str; 7] = ["SEGMENT", "ORG", "OFFSET", "DW", "DB", "ENDS", "END"];
    DIRECTIVES.iter().any(|d| d.eq_ignore_ascii_case(id)) || Mnemonic::from_name(id).is_some()
}

pub fn second_pass(pass1: &FirstPassResult, log: &mut Diagnostics) -> SecondPassResult {
    let mut body = Vec::<u8>::new();
    let mut hex = BTreeMap::new();

    for (&n, item) in &pass1.items {
        match item {
            Item::Inst(inst) => match encoder::encode(inst, &pass1.symbols) {
                Ok(bytes) => {
                    hex.insert(n, HexText::single(encoder::instruction_hex(&bytes)));
                    body.extend_from_slice(&bytes);
                }
                Err(diag) => log.error(n, diag),
            },
            Item::Data(def) => {
                let (bytes, text) = encoder::encode_definition(def);
                hex.insert(n, text);
                body.extend_from_slice(&bytes);
            }
        }
    }

    SecondPassResult { body, hex }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolEntry;

    fn pass1(src: &str) -> (FirstPassResult, Diagnostics) {
        let mut log = Diagnostics::default();
        let res = first_pass(src, &mut log);
        (res, log)
    }

    #[test]
    fn collects_instruction_with_address() {
        let (res, log) = pass1("MAIN SEGMENT\nMOV AX, BX\nMUL CX\nMAIN ENDS\nEND");
        assert!(!log.has_errors());
        assert_eq!(res.segment_name, "MAIN");
        match &res.items[&2] {
            Item::Inst(inst) => {
                assert_eq!(inst.address, 0);
                assert_eq!(inst.length, 2);
            }
            other => panic!("unexpected item {other:?}"),
        }
        assert_eq!(res.addresses[&3], 2);
        assert_eq!(res.addresses[&4], 4);
        assert_eq!(res.segment_length, 4);
        assert_eq!(res.end_line, Some(5));
    }

    #[test]
    fn forward_label_is_collected_as_displacement() {
        let (res, log) = pass1("S SEGMENT\nJA NEXT\nNEXT:\nS ENDS\nEND");
        assert!(!log.has_errors());
        match &res.items[&2] {
            Item::Inst(inst) => {
                assert_eq!(inst.op1, Some(Operand::Displacement("NEXT".into())))
            }
            other => panic!("unexpected item {other:?}"),
        }
        assert_eq!(res.symbols.get("NEXT").map(|e| e.address), Some(2));
    }

    #[test]
    fn lengths_follow_operand_kinds() {
        let reg = Operand::Register(operand::Register::Ax);
        let imm = Operand::Immediate(1);
        let addr = Operand::Address("X".into());
        assert_eq!(instruction_length(Some(&reg), Some(&reg)), 2);
        assert_eq!(instruction_length(Some(&reg), Some(&imm)), 4);
        assert_eq!(instruction_length(Some(&reg), Some(&addr)), 4);
        assert_eq!(instruction_length(Some(&addr), Some(&reg)), 4);
        assert_eq!(instruction_length(Some(&addr), None), 4);
        assert_eq!(instruction_length(Some(&imm), None), 2);
        assert_eq!(instruction_length(None, None), 1);
    }

    #[test]
    fn org_and_offset_move_the_counter() {
        let (res, log) = pass1("S SEGMENT\nORG 100H\nOFFSET 4\nMUL BX\nS ENDS\nEND");
        assert!(!log.has_errors());
        assert_eq!(res.addresses[&4], 0x104);
        assert_eq!(res.start_address, 0x104);
        assert_eq!(res.entry_point, 0x104);
        assert_eq!(res.segment_length, 2);
    }

    #[test]
    fn offset_past_limit_is_flagged() {
        let (_, log) = pass1("S SEGMENT\nORG 25000\nOFFSET 600\nS ENDS\nEND");
        assert_eq!(log.errors()[&3], [Diagnostic::OffsetLimit]);
    }

    #[test]
    fn org_rejects_bad_values() {
        let (_, log) = pass1("S SEGMENT\nORG 12Q\nORG 70000\nORG -5\nS ENDS\nEND");
        assert_eq!(log.errors()[&2], [Diagnostic::BadExpression("12Q".into())]);
        assert_eq!(log.errors()[&3], [Diagnostic::OutOfRange(70000, ValueType::Word)]);
        assert_eq!(log.errors()[&4], [Diagnostic::NegativeAddress(-5)]);
    }

    #[test]
    fn segment_must_come_first() {
        let (res, log) = pass1("MOV AX, BX\nS SEGMENT\nS ENDS\nEND");
        assert_eq!(log.errors()[&1], [Diagnostic::SegmentExpected]);
        assert_eq!(log.error_count(), 1);
        assert_eq!(res.segment_name, "S");
    }

    #[test]
    fn invalid_segment_name_falls_back_to_default() {
        let (res, log) = pass1("1ABC SEGMENT\nEND");
        assert_eq!(log.errors()[&1], [Diagnostic::InvalidSegmentId("1ABC".into())]);
        assert_eq!(res.segment_name, DEFAULT_SEGMENT);
    }

    #[test]
    fn end_stops_scanning() {
        let (res, log) = pass1("S SEGMENT\nEND\nGARBAGE HERE");
        assert!(!log.has_errors());
        assert_eq!(res.end_line, Some(2));
    }

    #[test]
    fn code_after_ends_is_outside_segment() {
        let (res, log) = pass1("S SEGMENT\nS ENDS\nMUL BX\nX DW 1\nEND");
        assert_eq!(log.errors()[&3], [Diagnostic::OutsideSegment]);
        assert_eq!(log.errors()[&4], [Diagnostic::OutsideSegment]);
        assert!(res.items.is_empty());
        assert!(res.symbols.is_empty());
    }

    #[test]
    fn ends_checks_name_and_trailing_words() {
        let (_, log) = pass1("S SEGMENT\nT ENDS EXTRA\nEND");
        assert_eq!(
            log.errors()[&2],
            [
                Diagnostic::SegmentNameMismatch("T".into()),
                Diagnostic::UnexpectedWord("EXTRA".into())
            ]
        );
    }

    #[test]
    fn duplicate_names_keep_first_address() {
        let (res, log) = pass1("S SEGMENT\nX DW 1\nx:\nX DW 2\nS ENDS\nEND");
        assert_eq!(log.errors()[&3], [Diagnostic::DuplicateId("X".into())]);
        assert_eq!(log.errors()[&4], [Diagnostic::DuplicateId("X".into())]);
        assert_eq!(res.symbols.get("X").map(|e| e.address), Some(0));
        assert_eq!(res.segment_length, 2);
    }

    #[test]
    fn bad_label_identifier() {
        let (res, log) = pass1("S SEGMENT\n9LIVES:\nS ENDS\nEND");
        assert_eq!(log.errors()[&2], [Diagnostic::InvalidLabelId("9LIVES".into())]);
        assert!(res.symbols.is_empty());
    }

    #[test]
    fn data_values_and_placeholders() {
        let (res, log) = pass1("S SEGMENT\nA DW 1, 0FFH, ?\nB DB 7 300\nS ENDS\nEND");
        assert_eq!(log.errors()[&3], [Diagnostic::OutOfRange(300, ValueType::Byte)]);
        match &res.items[&2] {
            Item::Data(def) => assert_eq!(def.values, [Some(1), Some(0xFF), None]),
            other => panic!("unexpected item {other:?}"),
        }
        assert_eq!(res.symbols.get("B").map(|e| e.address), Some(6));
        assert_eq!(res.segment_length, 8);
    }

    #[test]
    fn missing_data_value_is_a_warning() {
        let (res, log) = pass1("S SEGMENT\nZ DW\nS ENDS\nEND");
        assert!(!log.has_errors());
        assert_eq!(log.warnings()[&2], [Diagnostic::MissingOperand]);
        assert_eq!(res.segment_length, 2);
    }

    #[test]
    fn unmatched_operands_do_not_advance() {
        let (res, log) = pass1("S SEGMENT\nMUL 5\nMUL AX\nS ENDS\nEND");
        assert_eq!(log.errors()[&2], [Diagnostic::InvalidOperands]);
        assert_eq!(res.addresses[&3], 0);
    }

    #[test]
    fn unknown_word_is_invalid_instruction() {
        let (res, log) = pass1("S SEGMENT\nFOO AX, BX\nMUL AX\nS ENDS\nEND");
        assert_eq!(log.errors()[&2], [Diagnostic::InvalidInstruction]);
        assert_eq!(log.error_count(), 1);
        assert!(res.symbols.is_empty());
    }

    #[test]
    fn counter_overflow_is_rejected_everywhere() {
        let (res, log) = pass1("S SEGMENT\nORG 0FFFFH\nMUL AX\nX DW 1\nOFFSET 2\nS ENDS\nEND");
        assert_eq!(log.errors()[&3], [Diagnostic::AddressOverflow]);
        assert_eq!(log.errors()[&4], [Diagnostic::AddressOverflow]);
        assert_eq!(log.errors()[&5], [Diagnostic::AddressOverflow]);
        assert!(res.items.is_empty());
        assert!(!res.symbols.contains("X"));
        assert_eq!(res.addresses[&6], 0xFFFF);
    }

    #[test]
    fn org_back_before_first_item_gives_negative_length() {
        let (res, log) = pass1("S SEGMENT\nORG 10\nMUL AX\nORG 0\nS ENDS\nEND");
        assert_eq!(log.errors()[&6], [Diagnostic::SegmentLength(-10)]);
        assert_eq!(
            Diagnostic::SegmentLength(-10).to_string(),
            "Длина сегмента вне диапазона: -10"
        );
        assert_eq!(res.segment_length, 0);
        assert_eq!(res.start_address, 10);
    }

    #[test]
    fn words_after_label_are_unexpected() {
        let (res, log) = pass1("S SEGMENT\nL1: MOV AX, BX\nS ENDS\nEND");
        assert_eq!(log.errors()[&2], [Diagnostic::UnexpectedWord("MOV".into())]);
        assert_eq!(
            res.symbols.get("L1"),
            Some(SymbolEntry { kind: SymbolKind::Label, address: 0 })
        );
        assert!(res.items.is_empty());
    }

    #[test]
    fn third_operand_is_unexpected() {
        let (res, log) = pass1("S SEGMENT\nMOV AX, BX, CX\nS ENDS\nEND");
        assert_eq!(log.errors()[&2], [Diagnostic::UnexpectedWord("CX".into())]);
        assert_eq!(log.error_count(), 1);
        assert_eq!(res.addresses[&3], 2);
    }
}
