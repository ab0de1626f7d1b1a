use std::collections::BTreeMap;

use thiserror::Error;

use crate::operand::ValueType;

/// Failures of the command-line front end.
#[derive(Debug, Error)]
pub enum AsmError {
    #[error("nothing to assemble in `{0}`")]
    EmptySource(String),

    #[error("{0} error(s) in source, object code withheld")]
    Rejected(usize),
}

/// Per-line diagnostics. The messages are the tool's user-facing text and
/// are kept exactly as listings have always shown them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Diagnostic {
    // ── Segment / directive context ──────────
    #[error("Неизвестная инструкция (ожидалась SEGMENT)")]
    SegmentExpected,

    #[error("Идентификатор сегмента может начинаться только с _, - или буквы: {0}")]
    InvalidSegmentId(String),

    #[error("Неверное имя сегмента: {0}")]
    SegmentNameMismatch(String),

    #[error("Неожиданная директива: {0}")]
    UnexpectedDirective(String),

    #[error("Неожиданное слово {0}")]
    UnexpectedWord(String),

    #[error("Команда вне сегмента!")]
    OutsideSegment,

    #[error("Недопустимая инструкция")]
    InvalidInstruction,

    // ── Identifiers ──────────────────────────
    #[error("Идентификатор метки может начинаться только с _, - или буквы: {0}")]
    InvalidLabelId(String),

    #[error("Идентификатор уже определен:  {0}")]
    DuplicateId(String),

    #[error("Необъявленный идентификатор: {0}")]
    Undeclared(String),

    #[error("Идентификатор не объявлен: {0}")]
    UndeclaredTarget(String),

    #[error("Аргумент команды должен быть меткой!")]
    TargetNotLabel,

    // ── Numbers / ranges ─────────────────────
    #[error("Неверное выражение {0}")]
    BadExpression(String),

    #[error("Значение {0} превышает диапазон {1}")]
    OutOfRange(i32, ValueType),

    #[error("Смещение {0} превышает диапазон {1}")]
    DisplacementRange(i32, ValueType),

    #[error("Значение СчАК превысило диапазон слова (25565)")]
    OffsetLimit,

    #[error("Значение СчАК превысило диапазон слова (65535)")]
    AddressOverflow,

    #[error("Неверный адрес {0}")]
    NegativeAddress(i32),

    #[error("Длина сегмента вне диапазона: {0}")]
    SegmentLength(i32),

    // ── Operands ─────────────────────────────
    #[error("Неверные операнды команды!")]
    InvalidOperands,

    #[error("Недопустимые операнды!")]
    ImmediateFirst,

    // ── Warnings ─────────────────────────────
    #[error("Пропущен операнд - возможно 0")]
    MissingOperand,
}

/// Line-keyed error and warning logs of one compile. Accumulate only.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    errors: BTreeMap<usize, Vec<Diagnostic>>,
    warnings: BTreeMap<usize, Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn error(&mut self, line: usize, diag: Diagnostic) {
        tracing::debug!(line, "error: {diag}");
        self.errors.entry(line).or_default().push(diag);
    }

    pub fn warning(&mut self, line: usize, diag: Diagnostic) {
        tracing::debug!(line, "warning: {diag}");
        self.warnings.entry(line).or_default().push(diag);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn errors(&self) -> &BTreeMap<usize, Vec<Diagnostic>> {
        &self.errors
    }

    pub fn warnings(&self) -> &BTreeMap<usize, Vec<Diagnostic>> {
        &self.warnings
    }
}
