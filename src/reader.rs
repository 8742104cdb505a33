use crate::error::{Error, Result};
use crate::eval::Interp;
use crate::value::CellId;

/// Read one expression from `source` starting at byte offset `pos`.
///
/// Returns the expression and the offset just past it, or `None` when only
/// whitespace and comments remain. Parsing one expression at a time keeps
/// the arena free of cells for text that has not been evaluated yet, which
/// matters when the caller collects between top-level forms.
pub fn read_one_at(
    source: &str,
    pos: usize,
    interp: &mut Interp,
) -> Result<Option<(CellId, usize)>> {
    let mut reader = Reader {
        bytes: source.as_bytes(),
        pos,
    };
    reader.skip_blanks();
    if reader.at_end() {
        return Ok(None);
    }
    let expr = reader.read_expr(interp)?;
    Ok(Some((expr, reader.pos)))
}

/// Byte cursor over one source string. ASCII-structural: delimiters are all
/// single bytes, so multi-byte UTF-8 passes through symbols and strings
/// untouched.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Skip whitespace and `;` comments, which run to end of line.
    fn skip_blanks(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.pos += 1;
                }
                b';' => {
                    while let Some(b) = self.peek() {
                        self.pos += 1;
                        if b == b'\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn read_expr(&mut self, interp: &mut Interp) -> Result<CellId> {
        self.skip_blanks();
        match self.peek() {
            None => Err(Error::Read("unexpected end of input".into())),
            Some(b'(') => {
                self.pos += 1;
                self.read_list(interp)
            }
            Some(b')') => Err(Error::Read(format!(
                "unexpected ')' at offset {}",
                self.pos
            ))),
            Some(b'\'') => {
                self.pos += 1;
                let quoted = self.read_expr(interp)?;
                let sym = interp.symbol("quote");
                let nil = interp.nil();
                let tail = interp.cons(quoted, nil);
                Ok(interp.cons(sym, tail))
            }
            Some(b'"') => {
                self.pos += 1;
                self.read_string(interp)
            }
            Some(_) => self.read_word(interp),
        }
    }

    /// The opening paren has been consumed.
    fn read_list(&mut self, interp: &mut Interp) -> Result<CellId> {
        let mut items = Vec::new();
        loop {
            self.skip_blanks();
            match self.peek() {
                None => return Err(Error::Read("unterminated list".into())),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(interp.list(&items));
                }
                Some(_) => items.push(self.read_expr(interp)?),
            }
        }
    }

    /// The opening quote has been consumed. Bytes are taken verbatim up to
    /// the closing quote; there is no escape syntax.
    fn read_string(&mut self, interp: &mut Interp) -> Result<CellId> {
        let start = self.pos;
        loop {
            match self.bump() {
                None => return Err(Error::Read("unterminated string".into())),
                Some(b'"') => {
                    let text = &self.bytes[start..self.pos - 1];
                    let text = std::str::from_utf8(text)
                        .map_err(|_| Error::Read("invalid utf-8 in string".into()))?;
                    return Ok(interp.string(text));
                }
                Some(_) => {}
            }
        }
    }

    /// A run of non-delimiter bytes: a boolean, a number, or a symbol.
    fn read_word(&mut self, interp: &mut Interp) -> Result<CellId> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')' | b'"' | b';') {
                break;
            }
            self.pos += 1;
        }
        let word = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| Error::Read("invalid utf-8 in token".into()))?;

        match word {
            "#t" => return Ok(interp.t()),
            "#f" => return Ok(interp.f()),
            _ => {}
        }
        if let Ok(n) = word.parse::<i64>() {
            return Ok(interp.int(n));
        }
        // Guard the float parse so symbols like `inf` or `1+` stay symbols.
        if looks_numeric(word) {
            if let Ok(r) = word.parse::<f64>() {
                return Ok(interp.real(r));
            }
        }
        Ok(interp.symbol(word))
    }
}

/// True when a word is shaped like a number: optional sign, then digits and
/// at most one dot, with at least one digit present.
fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix(['+', '-']).unwrap_or(word);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit
}
