//! Asset string parser.
//!
//! Turns chain-export amount strings such as
//! `"-904.000000003SUI,2647.652454USDC"` into ordered [`ParsedAsset`]s.
//! A segment is `[sign] amount [spaces] symbol`; a leading `-` means OUT,
//! no sign or `+` means IN. Segments run until the next separator
//! (whitespace, `,`, `;`, `|`) or sign character. Unparseable segments are
//! dropped without affecting their neighbours.

use rust_decimal::Decimal;
use tracing::trace;

use crate::types::{Direction, ParsedAsset};

const SEPARATORS: &[char] = &[',', ';', '|'];

fn is_separator(c: char) -> bool {
    c.is_whitespace() || SEPARATORS.contains(&c)
}

fn is_sign(c: char) -> bool {
    c == '-' || c == '+'
}

/// Parse one raw asset string. Empty or whitespace-only input yields an
/// empty list, not an error.
pub fn parse_asset_string(raw: &str) -> Vec<ParsedAsset> {
    let chars: Vec<char> = raw.chars().collect();
    let mut assets = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        if is_separator(chars[pos]) {
            pos += 1;
            continue;
        }

        let start = pos;
        match parse_segment(&chars, &mut pos) {
            Some(asset) => assets.push(asset),
            None => {
                pos = skip_segment(&chars, start);
                trace!(
                    segment = %chars[start..pos].iter().collect::<String>(),
                    "Skipping unparseable asset segment"
                );
            }
        }
    }

    assets
}

/// Parse several raw strings (one per export column) in order and
/// concatenate the results.
pub fn parse_asset_strings<S: AsRef<str>>(raws: &[S]) -> Vec<ParsedAsset> {
    raws.iter()
        .flat_map(|raw| parse_asset_string(raw.as_ref()))
        .collect()
}

/// Try to read one segment starting at `*pos`. Only advances `pos` on success.
fn parse_segment(chars: &[char], pos: &mut usize) -> Option<ParsedAsset> {
    let mut i = *pos;

    let direction = match chars[i] {
        '-' => {
            i += 1;
            Direction::Out
        }
        '+' => {
            i += 1;
            Direction::In
        }
        _ => Direction::In,
    };

    // Amount: digits with at most one decimal point.
    let amount_start = i;
    let mut seen_dot = false;
    while i < chars.len() {
        match chars[i] {
            c if c.is_ascii_digit() => i += 1,
            '.' if !seen_dot => {
                seen_dot = true;
                i += 1;
            }
            _ => break,
        }
    }
    let amount_text: String = chars[amount_start..i].iter().collect();
    let amount = parse_amount(&amount_text)?;

    // "-5 SUI" is as valid as "-5SUI"; other separators end the segment.
    while i < chars.len() && chars[i] == ' ' {
        i += 1;
    }

    let symbol_start = i;
    while i < chars.len() {
        let c = chars[i];
        let dotted_suffix = c == '.'
            && i > symbol_start
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic());
        if c.is_ascii_alphanumeric() || dotted_suffix {
            i += 1;
        } else {
            break;
        }
    }
    if i == symbol_start {
        return None;
    }
    let symbol: String = chars[symbol_start..i].iter().collect::<String>().to_uppercase();

    *pos = i;
    Some(ParsedAsset::new(amount, symbol, direction))
}

/// Normalise `.5` / `5.` forms and parse. `None` if there are no digits
/// or the value does not fit a `Decimal`.
fn parse_amount(text: &str) -> Option<Decimal> {
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let trimmed = text.strip_suffix('.').unwrap_or(text);
    let normalised = if trimmed.starts_with('.') {
        format!("0{trimmed}")
    } else {
        trimmed.to_string()
    };
    normalised.parse::<Decimal>().ok()
}

/// End of a malformed segment: the next separator or sign, always at least
/// one character past `start`.
fn skip_segment(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    while i < chars.len() && !is_separator(chars[i]) && !is_sign(chars[i]) {
        i += 1;
    }
    i
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
