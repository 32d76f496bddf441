//! A two-pass assembler for 8086 source text, producing bytes through the
//! instruction Encoder.
//!
//! ```text
//! start:  mov cx, 5
//!         rep movsb
//!         jnz short start
//! msg:    db "hello", 0
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::cpu::{EncodeError, Encoder, Instruction};
use crate::hex::hex_bytes_separated;
use crate::string::right_pad;

pub use self::mnemonic::*;
pub use self::parser::*;

mod mnemonic;
mod parser;


quick_error! {
    #[derive(Debug, PartialEq)]
    pub enum AsmError {
        Syntax(line: usize, msg: String) {
            display("line {}: {}", line, msg)
        }
        DuplicateLabel(line: usize, name: String) {
            display("line {}: label '{}' already defined", line, name)
        }
        Encode(line: usize, err: EncodeError) {
            display("line {}: {}", line, err)
            cause(err)
        }
    }
}

impl AsmError {
    /// 1-based source line of the error
    pub fn line(&self) -> usize {
        match *self {
            AsmError::Syntax(line, _) |
            AsmError::DuplicateLabel(line, _) |
            AsmError::Encode(line, _) => line,
        }
    }
}

/// one line of assembler output
#[derive(Clone, Debug, PartialEq)]
pub struct ListingLine {
    pub line: usize,
    pub offset: u16,
    pub bytes: Vec<u8>,
    pub source: String,
}

/// the result of a assembly
#[derive(Clone, Debug, PartialEq)]
pub struct Assembly {
    pub origin: u16,
    pub lines: Vec<ListingLine>,
    pub labels: HashMap<String, u16>,
}

impl Assembly {
    /// the assembled code, placed from `origin`
    pub fn bytes(&self) -> Vec<u8> {
        let mut res = Vec::new();
        for line in &self.lines {
            res.extend_from_slice(&line.bytes);
        }
        res
    }
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for line in &self.lines {
            let hex = hex_bytes_separated(&line.bytes, ' ');
            writeln!(f, "[{:04X}] {} {}", line.offset, right_pad(&hex, 20), line.source.trim())?;
        }
        Ok(())
    }
}

struct Symbols<'a> {
    labels: &'a HashMap<String, u16>,
    /// offset of the statement being assembled
    here: u16,
    /// forward references resolve to `here` until all labels are known
    last_pass: bool,
}

impl<'a> Resolve for Symbols<'a> {
    fn resolve(&self, name: &str) -> Result<u16, String> {
        match self.labels.get(name) {
            Some(v) => Ok(*v),
            None if !self.last_pass => Ok(self.here),
            None => Err(format!("unknown label '{}'", name)),
        }
    }
}

pub struct Assembler {
    encoder: Encoder,
    origin: u16,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    /// a assembler placing code at offset 0x100, as a .com program
    pub fn new() -> Self {
        Self::with_encoder(Encoder::new())
    }

    /// uses a encoder with additional rules
    pub fn with_encoder(encoder: Encoder) -> Self {
        Assembler {
            encoder,
            origin: 0x0100,
        }
    }

    pub fn with_origin(mut self, origin: u16) -> Self {
        self.origin = origin;
        self
    }

    pub fn assemble(&self, src: &str) -> Result<Vec<u8>, AsmError> {
        Ok(self.assemble_listing(src)?.bytes())
    }

    pub fn assemble_listing(&self, src: &str) -> Result<Assembly, AsmError> {
        let statements = parse_source(src).map_err(|(line, msg)| AsmError::Syntax(line, msg))?;
        let source: Vec<&str> = src.lines().collect();

        let mut labels = HashMap::new();
        self.pass(&statements, &source, &mut labels, false)?;
        log::debug!("pass 1 found {} labels", labels.len());
        self.pass(&statements, &source, &mut labels, true)
    }

    fn pass(&self, statements: &[Statement], source: &[&str], labels: &mut HashMap<String, u16>, last_pass: bool) -> Result<Assembly, AsmError> {
        let mut origin = self.origin;
        let mut offset = origin;
        let mut lines = Vec::new();

        for st in statements {
            let line = st.line;
            if let Some(Body::Org(v)) = st.body {
                if !lines.is_empty() {
                    return Err(AsmError::Syntax(line, "org must precede code and data".to_owned()));
                }
                origin = v;
                offset = v;
            }

            if let Some(ref name) = st.label {
                if !last_pass && labels.insert(name.clone(), offset).is_some() {
                    return Err(AsmError::DuplicateLabel(line, name.clone()));
                }
            }

            let symbols = Symbols { labels: &*labels, here: offset, last_pass };
            let bytes = match st.body {
                None | Some(Body::Org(_)) => continue,
                Some(Body::Db(ref items)) => data_bytes(items, false, &symbols).map_err(|msg| AsmError::Syntax(line, msg))?,
                Some(Body::Dw(ref items)) => data_bytes(items, true, &symbols).map_err(|msg| AsmError::Syntax(line, msg))?,
                Some(Body::Instruction { ref prefixes, ref mnemonic, ref operands }) => {
                    let ins = lower(mnemonic, operands, prefixes, &symbols).map_err(|msg| AsmError::Syntax(line, msg))?;
                    self.encode(&ins, offset, line, last_pass)?
                }
            };

            let len = bytes.len() as u16;
            lines.push(ListingLine {
                line,
                offset,
                source: source.get(line - 1).map_or(String::new(), |s| (*s).to_owned()),
                bytes,
            });
            offset = offset.wrapping_add(len);
        }

        Ok(Assembly {
            origin,
            lines,
            labels: labels.clone(),
        })
    }

    fn encode(&self, ins: &Instruction, offset: u16, line: usize, last_pass: bool) -> Result<Vec<u8>, AsmError> {
        match self.encoder.encode_at(ins, offset) {
            Ok(bytes) => {
                if last_pass {
                    log::trace!("[{:04X}] {} => {}", offset, ins, hex_bytes_separated(&bytes, ' '));
                }
                Ok(bytes)
            }
            Err(err) => Err(AsmError::Encode(line, err)),
        }
    }
}

/// parses a single instruction line, like "mov ax, 0x1234"
pub fn parse_instruction(s: &str) -> Result<Instruction, AsmError> {
    let labels = HashMap::new();
    let symbols = Symbols { labels: &labels, here: 0, last_pass: true };
    match parse_line(s).map_err(|msg| AsmError::Syntax(1, msg))? {
        Some((None, Some(Body::Instruction { prefixes, mnemonic, operands }))) => {
            lower(&mnemonic, &operands, &prefixes, &symbols).map_err(|msg| AsmError::Syntax(1, msg))
        }
        _ => Err(AsmError::Syntax(1, format!("expected a instruction, got '{}'", s.trim()))),
    }
}

fn data_bytes(items: &[DataItem], words: bool, symbols: &dyn Resolve) -> Result<Vec<u8>, String> {
    let mut res = Vec::new();
    for item in items {
        match *item {
            DataItem::Bytes(ref b) => {
                res.extend_from_slice(b);
                if words && b.len() % 2 != 0 {
                    res.push(0);
                }
            }
            DataItem::Value(Expr::Num(v)) if !words => {
                if v < -0x80 || v > 0xFF {
                    return Err(format!("value {} does not fit in 8 bits", v));
                }
                res.push(v as u8);
            }
            DataItem::Value(Expr::Label(ref name)) if !words => {
                return Err(format!("label '{}' can not be used as 8-bit value", name));
            }
            DataItem::Value(ref e) => {
                let v = match *e {
                    Expr::Num(v) => v,
                    Expr::Label(ref name) => i64::from(symbols.resolve(name)?),
                };
                if v < -0x8000 || v > 0xFFFF {
                    return Err(format!("value {} does not fit in 16 bits", v));
                }
                res.extend_from_slice(&(v as u16).to_le_bytes());
            }
        }
    }
    Ok(res)
}
