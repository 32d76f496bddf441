use crate::cpu::{AMode, OperandSize, R, Segment};
use crate::string::parse_number_string;

#[cfg(test)]
#[path = "./parser_test.rs"]
mod parser_test;

/// a immediate value or a reference to a label
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(i64),
    Label(String),
}

/// a memory reference like "word es:[bp+si-0x10]"
#[derive(Clone, Debug, PartialEq)]
pub struct MemRef {
    /// from a "byte" or "word" keyword
    pub size: Option<OperandSize>,
    pub seg: Segment,
    /// None for a direct address
    pub amode: Option<AMode>,
    pub disp: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Reg8(R),
    Reg16(R),
    SReg(R),
    Imm(Expr),
    /// branch target marked with "short"
    Short(Expr),
    Mem(MemRef),
    /// "seg:offset" far pointer
    FarPtr(u16, u16),
    /// memory holding a far pointer, marked with "far"
    FarMem(MemRef),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Prefix {
    Rep,
    Repe,
    Repne,
    Lock,
    Segment(Segment),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DataItem {
    Value(Expr),
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Instruction {
        prefixes: Vec<Prefix>,
        /// lower case
        mnemonic: String,
        operands: Vec<Operand>,
    },
    Db(Vec<DataItem>),
    Dw(Vec<DataItem>),
    Org(u16),
}

/// one source line
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    /// 1-based
    pub line: usize,
    pub label: Option<String>,
    pub body: Option<Body>,
}

/// parses a whole source text. empty and comment-only lines are skipped
pub fn parse_source(src: &str) -> Result<Vec<Statement>, (usize, String)> {
    let mut res = Vec::new();
    for (i, line) in src.lines().enumerate() {
        let line_number = i + 1;
        match parse_line(line) {
            Ok(Some((label, body))) => res.push(Statement { line: line_number, label, body }),
            Ok(None) => {}
            Err(msg) => return Err((line_number, msg)),
        }
    }
    Ok(res)
}

/// parses one line into a optional label and body
pub fn parse_line(line: &str) -> Result<Option<(Option<String>, Option<Body>)>, String> {
    let s = strip_comment(line).trim();
    if s.is_empty() {
        return Ok(None);
    }

    let (label, rest) = split_label(s)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(Some((label, None)));
    }
    Ok(Some((label, Some(parse_body(rest)?))))
}

/// removes a trailing "; comment", ignoring ';' inside quotes
fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, ';') => return &line[..i],
            (None, '\'') | (None, '"') => quote = Some(c),
            (Some(q), c) if q == c => quote = None,
            _ => {}
        }
    }
    line
}

fn split_label(s: &str) -> Result<(Option<String>, &str), String> {
    let first = s.split_whitespace().next().unwrap_or("");
    if let Some(name) = first.strip_suffix(':') {
        if !is_identifier(name) {
            return Err(format!("invalid label '{}'", name));
        }
        return Ok((Some(name.to_owned()), &s[first.len()..]));
    }
    Ok((None, s))
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_body(s: &str) -> Result<Body, String> {
    let mut prefixes = Vec::new();
    let mut rest = s;
    loop {
        let (word, tail) = split_word(rest);
        let lower = word.to_lowercase();
        let prefix = match lower.as_str() {
            "rep" => Prefix::Rep,
            "repe" | "repz" => Prefix::Repe,
            "repne" | "repnz" => Prefix::Repne,
            "lock" => Prefix::Lock,
            "es" | "cs" | "ss" | "ds" if !tail.is_empty() => Prefix::Segment(segment(&lower)),
            _ => break,
        };
        prefixes.push(prefix);
        rest = tail;
    }

    let (word, tail) = split_word(rest);
    if word.is_empty() {
        return Err("missing mnemonic after prefix".to_owned());
    }
    let mnemonic = word.to_lowercase();
    match mnemonic.as_str() {
        "db" | "dw" => {
            if !prefixes.is_empty() {
                return Err(format!("prefix not allowed on {}", mnemonic));
            }
            let mut items = Vec::new();
            for part in split_operands(tail)? {
                items.push(parse_data_item(&part)?);
            }
            if items.is_empty() {
                return Err(format!("{} without values", mnemonic));
            }
            Ok(if mnemonic == "db" { Body::Db(items) } else { Body::Dw(items) })
        }
        "org" => match parse_number(tail.trim()) {
            Some(v) if v >= 0 && v <= 0xFFFF => Ok(Body::Org(v as u16)),
            _ => Err(format!("invalid origin '{}'", tail.trim())),
        },
        _ => {
            let mut operands = Vec::new();
            for part in split_operands(tail)? {
                operands.push(parse_operand(&part)?);
            }
            Ok(Body::Instruction { prefixes, mnemonic, operands })
        }
    }
}

/// returns the first whitespace separated word and the remainder
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

/// splits a operand list on commas outside of quotes and brackets
fn split_operands(s: &str) -> Result<Vec<String>, String> {
    let mut res = Vec::new();
    let mut cur = String::new();
    let mut quote = None;
    let mut depth = 0;
    for c in s.chars() {
        match (quote, c) {
            (Some(q), c) if q == c => quote = None,
            (Some(_), _) => {}
            (None, '\'') | (None, '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth -= 1,
            (None, ',') if depth == 0 => {
                res.push(cur.trim().to_owned());
                cur.clear();
                continue;
            }
            _ => {}
        }
        cur.push(c);
    }
    if quote.is_some() {
        return Err("unterminated string".to_owned());
    }
    if depth != 0 {
        return Err("unbalanced brackets".to_owned());
    }
    let last = cur.trim();
    if !last.is_empty() {
        res.push(last.to_owned());
    } else if !res.is_empty() {
        return Err("missing operand after ','".to_owned());
    }
    if res.iter().any(|p| p.is_empty()) {
        return Err("empty operand".to_owned());
    }
    Ok(res)
}

fn parse_data_item(s: &str) -> Result<DataItem, String> {
    if let Some(text) = quoted(s, '"') {
        return Ok(DataItem::Bytes(text.bytes().collect()));
    }
    if s.len() > 3 {
        if let Some(text) = quoted(s, '\'') {
            return Ok(DataItem::Bytes(text.bytes().collect()));
        }
    }
    Ok(DataItem::Value(parse_expr(s)?))
}

fn quoted(s: &str, q: char) -> Option<&str> {
    if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn parse_number(s: &str) -> Option<i64> {
    if let Some(text) = quoted(s, '\'').or_else(|| quoted(s, '"')) {
        let mut chars = text.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() => Some(c as i64),
            _ => None,
        };
    }
    parse_number_string(s).ok()
}

pub fn parse_expr(s: &str) -> Result<Expr, String> {
    let s = s.trim();
    if let Some(v) = parse_number(s) {
        return Ok(Expr::Num(v));
    }
    if is_identifier(s) && register(&s.to_lowercase()).is_none() {
        return Ok(Expr::Label(s.to_owned()));
    }
    Err(format!("invalid value '{}'", s))
}

fn segment(s: &str) -> Segment {
    match s {
        "es" => Segment::ES,
        "cs" => Segment::CS,
        "ss" => Segment::SS,
        _ => Segment::DS,
    }
}

fn register(s: &str) -> Option<Operand> {
    let r = match s {
        "al" => Operand::Reg8(R::AL),
        "cl" => Operand::Reg8(R::CL),
        "dl" => Operand::Reg8(R::DL),
        "bl" => Operand::Reg8(R::BL),
        "ah" => Operand::Reg8(R::AH),
        "ch" => Operand::Reg8(R::CH),
        "dh" => Operand::Reg8(R::DH),
        "bh" => Operand::Reg8(R::BH),
        "ax" => Operand::Reg16(R::AX),
        "cx" => Operand::Reg16(R::CX),
        "dx" => Operand::Reg16(R::DX),
        "bx" => Operand::Reg16(R::BX),
        "sp" => Operand::Reg16(R::SP),
        "bp" => Operand::Reg16(R::BP),
        "si" => Operand::Reg16(R::SI),
        "di" => Operand::Reg16(R::DI),
        "es" => Operand::SReg(R::ES),
        "cs" => Operand::SReg(R::CS),
        "ss" => Operand::SReg(R::SS),
        "ds" => Operand::SReg(R::DS),
        _ => return None,
    };
    Some(r)
}

/// strips a leading keyword followed by whitespace
fn strip_keyword<'a>(s: &'a str, kw: &str) -> Option<&'a str> {
    match (s.get(..kw.len()), s.get(kw.len()..)) {
        (Some(head), Some(tail)) if head.eq_ignore_ascii_case(kw) && tail.starts_with(char::is_whitespace) => {
            Some(tail.trim_start())
        }
        _ => None,
    }
}

pub fn parse_operand(s: &str) -> Result<Operand, String> {
    let s = s.trim();
    if let Some(rest) = strip_keyword(s, "short") {
        return Ok(Operand::Short(parse_expr(rest)?));
    }
    if let Some(rest) = strip_keyword(s, "near") {
        return parse_operand(rest);
    }
    if let Some(rest) = strip_keyword(s, "far") {
        return match parse_operand(rest)? {
            Operand::Mem(m) => Ok(Operand::FarMem(m)),
            op @ Operand::FarPtr(_, _) => Ok(op),
            _ => Err(format!("far requires a memory operand or seg:offset, got '{}'", rest)),
        };
    }

    let (size, rest) = if let Some(rest) = strip_keyword(s, "byte") {
        (Some(OperandSize::_8bit), rest)
    } else if let Some(rest) = strip_keyword(s, "word") {
        (Some(OperandSize::_16bit), rest)
    } else {
        (None, s)
    };
    let rest = strip_keyword(rest, "ptr").unwrap_or(rest);

    if rest.contains('[') {
        return parse_memory(rest, size);
    }
    if size.is_some() {
        return Err(format!("size keyword requires a memory operand, got '{}'", rest));
    }

    if let Some(r) = register(&rest.to_lowercase()) {
        return Ok(r);
    }
    if let Some(pos) = rest.find(':') {
        if quoted(rest, '\'').is_none() && quoted(rest, '"').is_none() {
            let seg = parse_number(rest[..pos].trim());
            let off = parse_number(rest[pos + 1..].trim());
            return match (seg, off) {
                (Some(seg), Some(off)) if fits_u16(seg) && fits_u16(off) => Ok(Operand::FarPtr(seg as u16, off as u16)),
                _ => Err(format!("invalid far pointer '{}'", rest)),
            };
        }
    }
    Ok(Operand::Imm(parse_expr(rest)?))
}

fn fits_u16(v: i64) -> bool {
    v >= 0 && v <= 0xFFFF
}

/// parses "seg:[terms]" or "[seg:terms]"
fn parse_memory(s: &str, size: Option<OperandSize>) -> Result<Operand, String> {
    let open = s.find('[').unwrap_or(0);
    if !s.ends_with(']') {
        return Err(format!("invalid memory operand '{}'", s));
    }
    let mut seg = Segment::Default;
    let outer = s[..open].trim();
    if !outer.is_empty() {
        seg = parse_segment_override(outer)?;
    }

    let mut inner = s[open + 1..s.len() - 1].trim();
    if let Some(pos) = inner.find(':') {
        if seg != Segment::Default {
            return Err(format!("multiple segment overrides in '{}'", s));
        }
        seg = parse_segment_override(&inner[..pos])?;
        inner = inner[pos + 1..].trim();
    }

    let mut bx = false;
    let mut bp = false;
    let mut si = false;
    let mut di = false;
    let mut disp: Option<Expr> = None;
    let mut number = 0i64;

    for (negative, term) in split_terms(inner)? {
        let lower = term.to_lowercase();
        let reg = match lower.as_str() {
            "bx" => Some(&mut bx),
            "bp" => Some(&mut bp),
            "si" => Some(&mut si),
            "di" => Some(&mut di),
            _ => None,
        };
        if let Some(flag) = reg {
            if negative || *flag {
                return Err(format!("invalid use of {} in '{}'", lower, s));
            }
            *flag = true;
            continue;
        }
        match parse_expr(&term)? {
            Expr::Num(v) => number += if negative { -v } else { v },
            Expr::Label(name) => {
                if negative || disp.is_some() {
                    return Err(format!("invalid label reference in '{}'", s));
                }
                disp = Some(Expr::Label(name));
            }
        }
    }

    let amode = match (bx, bp, si, di) {
        (false, false, false, false) => None,
        (true, false, true, false) => Some(AMode::BXSI),
        (true, false, false, true) => Some(AMode::BXDI),
        (false, true, true, false) => Some(AMode::BPSI),
        (false, true, false, true) => Some(AMode::BPDI),
        (false, false, true, false) => Some(AMode::SI),
        (false, false, false, true) => Some(AMode::DI),
        (false, true, false, false) => Some(AMode::BP),
        (true, false, false, false) => Some(AMode::BX),
        _ => return Err(format!("invalid register combination in '{}'", s)),
    };

    // a label with a numeric offset is not supported, the label alone is the displacement
    if let Some(Expr::Label(_)) = disp {
        if number != 0 {
            return Err(format!("label with offset in '{}' is not supported", s));
        }
    } else if number != 0 || amode.is_none() {
        disp = Some(Expr::Num(number));
    }

    Ok(Operand::Mem(MemRef { size, seg, amode, disp }))
}

fn parse_segment_override(s: &str) -> Result<Segment, String> {
    let lower = s.trim().trim_end_matches(':').trim().to_lowercase();
    match lower.as_str() {
        "es" | "cs" | "ss" | "ds" => Ok(segment(&lower)),
        _ => Err(format!("invalid segment override '{}'", s)),
    }
}

/// splits "bx+si-0x10" into signed terms
fn split_terms(s: &str) -> Result<Vec<(bool, String)>, String> {
    let mut res = Vec::new();
    let mut cur = String::new();
    let mut negative = false;
    for c in s.chars() {
        if c == '+' || c == '-' {
            if !cur.trim().is_empty() {
                res.push((negative, cur.trim().to_owned()));
                cur.clear();
            } else if !res.is_empty() || !cur.is_empty() || negative {
                return Err(format!("invalid address expression '{}'", s));
            }
            negative = c == '-';
            continue;
        }
        cur.push(c);
    }
    if cur.trim().is_empty() {
        return Err(format!("invalid address expression '{}'", s));
    }
    res.push((negative, cur.trim().to_owned()));
    Ok(res)
}
