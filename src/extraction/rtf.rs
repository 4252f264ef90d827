use super::{ExtractionError, FileKind, TextExtractor};

/// Destinations whose content is metadata rather than body text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "colortbl",
    "datastore",
    "fldinst",
    "fonttbl",
    "footer",
    "footerl",
    "footerr",
    "generator",
    "header",
    "headerl",
    "headerr",
    "info",
    "latentstyles",
    "listoverridetable",
    "listtable",
    "object",
    "pict",
    "revtbl",
    "rsidtbl",
    "stylesheet",
    "themedata",
    "xmlnstbl",
];

/// Reads the visible text of a Rich Text Format document.
///
/// Control words are interpreted only as far as needed to recover text: paragraph and tab
/// breaks, hex and unicode escapes, and skipping of non-text destinations.
pub struct RtfExtractor;

impl TextExtractor for RtfExtractor {
    fn extract(&self, _filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let source = String::from_utf8_lossy(bytes);
        strip_rtf(&source).map_err(|reason| ExtractionError::Failed {
            kind: FileKind::Rtf,
            reason,
        })
    }
}

#[derive(Clone, Copy)]
struct GroupState {
    skip: bool,
    unicode_fallback: usize,
}

struct Stripper {
    out: String,
    current: GroupState,
    stack: Vec<GroupState>,
    pending_fallback: usize,
}

impl Stripper {
    fn emit(&mut self, ch: char) {
        if self.pending_fallback > 0 {
            self.pending_fallback -= 1;
            return;
        }
        if !self.current.skip {
            self.out.push(ch);
        }
    }

    fn control_word(&mut self, word: &str, param: Option<i32>) {
        match word {
            "par" | "line" | "sect" | "page" | "row" => self.emit('\n'),
            "tab" | "cell" => self.emit('\t'),
            "emdash" => self.emit('\u{2014}'),
            "endash" => self.emit('\u{2013}'),
            "bullet" => self.emit('\u{2022}'),
            "lquote" => self.emit('\u{2018}'),
            "rquote" => self.emit('\u{2019}'),
            "ldblquote" => self.emit('\u{201C}'),
            "rdblquote" => self.emit('\u{201D}'),
            "uc" => self.current.unicode_fallback = param.unwrap_or(1).max(0) as usize,
            "u" => {
                let code = param.unwrap_or_default();
                let code = if code < 0 { code + 65_536 } else { code } as u32;
                self.emit(char::from_u32(code).unwrap_or('\u{FFFD}'));
                self.pending_fallback = self.current.unicode_fallback;
            }
            word if SKIPPED_DESTINATIONS.contains(&word.to_ascii_lowercase().as_str()) => {
                self.current.skip = true;
            }
            _ => {}
        }
    }
}

fn strip_rtf(source: &str) -> Result<String, String> {
    if !source.trim_start().starts_with("{\\rtf") {
        return Err("missing {\\rtf header".into());
    }

    let chars: Vec<char> = source.chars().collect();
    let mut state = Stripper {
        out: String::with_capacity(source.len() / 2),
        current: GroupState {
            skip: false,
            unicode_fallback: 1,
        },
        stack: Vec::new(),
        pending_fallback: 0,
    };
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' => {
                state.stack.push(state.current);
                i += 1;
            }
            '}' => {
                state.current = state.stack.pop().ok_or("unbalanced closing brace")?;
                i += 1;
            }
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };
                match next {
                    '\\' | '{' | '}' => {
                        state.emit(next);
                        i += 1;
                    }
                    '\'' => {
                        let hex: String = chars.iter().skip(i + 1).take(2).collect();
                        if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                            state.emit(decode_cp1252(byte));
                        }
                        i += 1 + hex.len();
                    }
                    '*' => {
                        state.current.skip = true;
                        i += 1;
                    }
                    '~' => {
                        state.emit('\u{00A0}');
                        i += 1;
                    }
                    '_' => {
                        state.emit('-');
                        i += 1;
                    }
                    '\r' | '\n' => {
                        state.emit('\n');
                        i += 1;
                    }
                    c if c.is_ascii_alphabetic() => {
                        let start = i;
                        while i < chars.len() && chars[i].is_ascii_alphabetic() {
                            i += 1;
                        }
                        let word: String = chars[start..i].iter().collect();

                        let param_start = i;
                        if i < chars.len() && chars[i] == '-' {
                            i += 1;
                        }
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                        let param = chars[param_start..i]
                            .iter()
                            .collect::<String>()
                            .parse::<i32>()
                            .ok();

                        if i < chars.len() && chars[i] == ' ' {
                            i += 1;
                        }
                        state.control_word(&word, param);
                    }
                    _ => i += 1,
                }
            }
            '\r' | '\n' => i += 1,
            ch => {
                state.emit(ch);
                i += 1;
            }
        }
    }

    if !state.stack.is_empty() {
        return Err(format!("{} unclosed group(s) at end of document", state.stack.len()));
    }
    Ok(state.out)
}

/// Windows-1252 code points for 0x80..=0x9F; the rest of the byte range matches Latin-1.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}', '\u{FFFD}',
    '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
];

/// Decode a `\'hh` escape as Windows-1252, the code page `\ansi` documents declare.
fn decode_cp1252(byte: u8) -> char {
    match byte {
        0x80..=0x9F => CP1252_HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}
