//! segasm – two-pass assembler for a small segment-based instruction set.
//!
//! [`compile`] turns source text into a listing (addresses, hex, names
//! table, diagnostics) and, when there are no errors, an object code record.

pub mod encoder;
pub mod error;
pub mod lexer;
pub mod listing;
pub mod object;
pub mod opcodes;
pub mod operand;
pub mod parser;
pub mod symbols;

use error::Diagnostics;
use object::ObjectCode;

/// Everything one compile produces.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub listing: String,
    /// Object record as concatenated binary digits; `None` if there were errors.
    pub object_code: Option<String>,
    pub object_bytes: Option<Vec<u8>>,
    pub diagnostics: Diagnostics,
}

impl Compilation {
    pub fn into_parts(self) -> (String, Option<String>) {
        (self.listing, self.object_code)
    }
}

/// Assemble `source`. Empty input gives `None`.
///
/// Every call owns its own names table, logs and program buffer.
pub fn compile(source: &str) -> Option<Compilation> {
    if source.trim().is_empty() {
        return None;
    }

    let mut log = Diagnostics::default();

    tracing::trace!("starting pass 1");
    let pass1 = parser::first_pass(source, &mut log);

    tracing::trace!("starting pass 2");
    let pass2 = parser::second_pass(&pass1, &mut log);

    let object_bytes = (!log.has_errors()).then(|| {
        ObjectCode {
            segment_name: &pass1.segment_name,
            segment_length: pass1.segment_length,
            start_address: pass1.start_address,
            body: &pass2.body,
            entry_point: pass1.entry_point,
        }
        .to_bytes()
    });
    let object_code = object_bytes.as_deref().map(object::render);

    tracing::trace!("rendering listing");
    let listing = listing::render(&pass1, &pass2, &log);

    Some(Compilation { listing, object_code, object_bytes, diagnostics: log })
}
