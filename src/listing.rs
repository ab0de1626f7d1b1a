use crate::error::Diagnostics;
use crate::parser::{FirstPassResult, SecondPassResult};

pub fn render(pass1: &FirstPassResult, pass2: &SecondPassResult, log: &Diagnostics) -> String {
    let mut rows = Vec::with_capacity(pass1.lines.len());

    for line in &pass1.lines {
        let address = pass1.addresses.get(&line.number).copied();
        let hex = pass2.hex.get(&line.number);

        let addr_text = address.map(|a| format!("{a:04X}")).unwrap_or_default();
        let first = hex
            .and_then(|h| h.rows.first())
            .map(String::as_str)
            .unwrap_or("");
        rows.push(format!(
            "{:<3} | {:<4} | {:<12}| {}",
            line.number, addr_text, first, line.text
        ));

        // continuation rows of long data definitions
        if let (Some(hex), Some(base)) = (hex, address) {
            for (i, row) in hex.rows.iter().enumerate().skip(1) {
                let at = u32::from(base) + u32::from(hex.step) * i as u32;
                rows.push(format!(" \t{at:04X}      {row}"));
            }
        }

        if pass1.end_line == Some(line.number) {
            break;
        }
    }

    let mut out = rows.join("\n");

    if !pass1.symbols.is_empty() {
        out.push_str("\n\n\nТаблица имён:\n");
        out.push_str(&format!("{:<16}{:<16}{}", "Имя", "Тип", "Значение"));
        for (name, entry) in pass1.symbols.iter() {
            out.push_str(&format!(
                "\n{:<16}{:<16}{}:{:04x}",
                name, entry.kind, pass1.segment_name, entry.address
            ));
        }
    }

    if log.has_errors() || !log.warnings().is_empty() {
        out.push_str("\n\n");
    }
    for (line, diags) in log.errors() {
        for diag in diags {
            out.push_str(&format!("\n| ОШИБКА Строка {line}: {diag}"));
        }
    }
    for (line, diags) in log.warnings() {
        for diag in diags {
            out.push_str(&format!("\n| ПРЕДУПРЕЖДЕНИЕ Строка {line}: {diag}"));
        }
    }

    out
}
