//! Encoding primitives for MIME serialisation.
//!
//! Quoted-Printable and Base64 transfer encodings, RFC 2047 encoded words
//! for non-ASCII header text, and the folding passes that keep encoded
//! output within the wire line limits.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Max allowed line size for encoded body output.
pub const MAX_LINE_SIZE: usize = 76;
/// Max encoded-word size, chosen to leave room for surrounding header text.
pub const MAX_MIME_WORD_SIZE: usize = 60;

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

// All bytes outside [A-Za-z0-9] are escaped, which over-encodes but keeps
// every transport quirk (trailing spaces, bare dots, '=') out of the output.
fn needs_quoted_printable_escape(byte: u8) -> bool {
    !byte.is_ascii_alphanumeric()
}

/// Encodes text as Quoted-Printable (RFC 2045).
///
/// Every byte outside `[0-9A-Za-z]` becomes an uppercase `=HH` escape. No
/// soft line breaks are inserted here; folding is a separate pass.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> Vec<u8> {
    let mut output = Vec::with_capacity(text.len());
    for &byte in text.as_bytes() {
        if needs_quoted_printable_escape(byte) {
            output.push(b'=');
            output.push(HEX_UPPER[usize::from(byte >> 4)]);
            output.push(HEX_UPPER[usize::from(byte & 0x0F)]);
        } else {
            output.push(byte);
        }
    }
    output
}

/// Folds Quoted-Printable output into lines of at most `max_line_size`
/// bytes, using `=\r\n` soft breaks.
///
/// A `=HH` escape is treated as one unit and never split across lines. One
/// column of every line is reserved for the `=` of a possible soft break.
#[must_use]
pub fn fold_quoted_printable(encoded: &[u8], max_line_size: usize) -> Vec<u8> {
    if max_line_size == 0 || encoded.is_empty() {
        return encoded.to_vec();
    }

    let budget = max_line_size - 1;
    let mut output = Vec::with_capacity(encoded.len());
    let mut line_size = 0;
    let mut ix = 0;
    while ix < encoded.len() {
        let unit = if encoded[ix] == b'=' { 3 } else { 1 };
        if line_size + unit > budget {
            output.extend_from_slice(b"=\r\n");
            line_size = 0;
        }
        let end = (ix + unit).min(encoded.len());
        output.extend_from_slice(&encoded[ix..end]);
        line_size += unit;
        ix += unit;
    }
    output
}

/// Folds raw encoded data (Base64 output) into lines of exactly
/// `max_line_size` bytes, with hard `\r\n` breaks.
#[must_use]
pub fn fold_data(data: &[u8], max_line_size: usize) -> Vec<u8> {
    if max_line_size == 0 || data.is_empty() {
        return data.to_vec();
    }

    let mut output = Vec::with_capacity(data.len() + 2 * (data.len() / max_line_size));
    let mut line_size = 0;
    for &byte in data {
        if line_size >= max_line_size {
            output.extend_from_slice(b"\r\n");
            line_size = 0;
        }
        output.push(byte);
        line_size += 1;
    }
    output
}

fn split_into_chunks(text: &str, max_chunk_size: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if max_chunk_size == 0 || max_chunk_size >= text.chars().count() {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_size = 0;
    for ch in text.chars() {
        if current_size >= max_chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current.push(ch);
        current_size += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// The encoded size of a word cannot be predicted up front, so the input is
// re-split into ever smaller character chunks until every word fits the
// budget, or chunks are single characters (which are emitted even oversize).
fn encode_mime_word(
    text: &str,
    max_word_size: usize,
    variant: u8,
    encode: impl Fn(&str) -> Vec<u8>,
) -> Vec<u8> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut max_chunk_size = text.chars().count();
    loop {
        let chunks = split_into_chunks(text, max_chunk_size);
        let mut words: Vec<Vec<u8>> = Vec::with_capacity(chunks.len());
        let mut longest = 0;
        for chunk in &chunks {
            let mut word = Vec::new();
            word.extend_from_slice(b"=?utf-8?");
            word.push(variant);
            word.push(b'?');
            word.extend_from_slice(&encode(chunk));
            word.extend_from_slice(b"?=");
            longest = longest.max(word.len());
            words.push(word);
        }
        if longest <= max_word_size || max_chunk_size <= 1 {
            return words.join(&b"\r\n "[..]);
        }
        max_chunk_size = max_chunk_size / 2 + max_chunk_size % 2;
    }
}

/// Encodes header text as RFC 2047 `Q` words of at most `max_word_size`
/// bytes, joined with header continuations (`\r\n` + space).
#[must_use]
pub fn encode_mime_word_q(text: &str, max_word_size: usize) -> Vec<u8> {
    encode_mime_word(text, max_word_size, b'Q', |chunk| {
        encode_quoted_printable(chunk)
    })
}

/// Encodes header text as RFC 2047 `B` words of at most `max_word_size`
/// bytes, joined with header continuations (`\r\n` + space).
#[must_use]
pub fn encode_mime_word_b(text: &str, max_word_size: usize) -> Vec<u8> {
    encode_mime_word(text, max_word_size, b'B', |chunk| {
        encode_base64(chunk.as_bytes()).into_bytes()
    })
}

/// Applies RFC 5321 §4.5.2 dot transparency: a `.` at the start of a line is
/// doubled so the server cannot mistake it for the end-of-data terminator.
#[must_use]
pub fn dot_stuff(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    let mut at_line_start = true;
    let mut previous = 0;
    for &byte in data {
        if at_line_start && byte == b'.' {
            output.push(b'.');
        }
        output.push(byte);
        at_line_start = previous == b'\r' && byte == b'\n';
        previous = byte;
    }
    output
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal
)]
mod tests {
    use super::*;

    mod quoted_printable_tests {
        use super::*;

        #[test]
        fn passes_alphanumerics_through() {
            assert_eq!(encode_quoted_printable("abcXYZ019"), b"abcXYZ019");
        }

        #[test]
        fn escapes_everything_else_uppercase() {
            assert_eq!(encode_quoted_printable("a=b\n"), b"a=3Db=0A");
        }

        #[test]
        fn escapes_spaces_and_dots() {
            assert_eq!(encode_quoted_printable("a b."), b"a=20b=2E");
        }

        #[test]
        fn escapes_utf8_bytes_individually() {
            assert_eq!(encode_quoted_printable("é"), b"=C3=A9");
        }

        #[test]
        fn empty_input_yields_empty_output() {
            assert!(encode_quoted_printable("").is_empty());
        }

        #[test]
        fn output_is_seven_bit_safe() {
            let encoded = encode_quoted_printable("żółć and \u{1F980} too");
            assert!(
                encoded
                    .iter()
                    .all(|&b| (0x20..=0x7E).contains(&b) || b == b'=')
            );
        }
    }

    mod folding_tests {
        use super::*;

        #[test]
        fn short_output_is_unfolded() {
            let encoded = encode_quoted_printable("hello");
            assert_eq!(fold_quoted_printable(&encoded, 76), encoded);
        }

        #[test]
        fn lines_stay_within_the_limit() {
            let encoded = encode_quoted_printable(&"é".repeat(100));
            let folded = fold_quoted_printable(&encoded, 76);
            for line in folded.split(|&b| b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                assert!(line.len() <= 76, "line of {} bytes", line.len());
            }
        }

        #[test]
        fn escapes_are_never_split() {
            let encoded = encode_quoted_printable(&"é".repeat(100));
            let folded = fold_quoted_printable(&encoded, 76);
            for line in folded.split(|&b| b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                let line = line.strip_suffix(b"=").unwrap_or(line);
                // with only =HH content, every complete line parses as triplets
                let escapes = line.iter().filter(|&&b| b == b'=').count();
                assert_eq!(escapes * 3, line.len());
            }
        }

        #[test]
        fn soft_break_marker_is_emitted() {
            let encoded = encode_quoted_printable(&"a".repeat(200));
            let folded = fold_quoted_printable(&encoded, 76);
            assert!(folded.windows(3).any(|w| w == b"=\r\n"));
        }

        #[test]
        fn data_folds_at_exactly_the_limit() {
            let data = vec![b'A'; 200];
            let folded = fold_data(&data, 76);
            let lines: Vec<&[u8]> = folded.split_str_lines();
            assert_eq!(lines[0].len(), 76);
            assert_eq!(lines[1].len(), 76);
            assert_eq!(lines[2].len(), 200 - 2 * 76);
        }

        #[test]
        fn zero_line_size_disables_folding() {
            let data = vec![b'A'; 200];
            assert_eq!(fold_data(&data, 0), data);
        }

        trait SplitLines {
            fn split_str_lines(&self) -> Vec<&[u8]>;
        }

        impl SplitLines for Vec<u8> {
            fn split_str_lines(&self) -> Vec<&[u8]> {
                self.split(|&b| b == b'\n')
                    .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
                    .collect()
            }
        }
    }

    mod mime_word_tests {
        use super::*;

        #[test]
        fn encodes_a_single_word() {
            let word = encode_mime_word_q("Café", MAX_MIME_WORD_SIZE);
            assert_eq!(word, b"=?utf-8?Q?Caf=C3=A9?=");
        }

        #[test]
        fn splits_until_words_fit() {
            let words = encode_mime_word_q("Café", 15);
            assert_eq!(
                words,
                b"=?utf-8?Q?C?=\r\n =?utf-8?Q?a?=\r\n =?utf-8?Q?f?=\r\n =?utf-8?Q?=C3=A9?="
            );
        }

        #[test]
        fn every_word_respects_the_budget() {
            let words = encode_mime_word_q("a perfectly ordinary subject line", 24);
            for word in words.split(|&b| b == b' ').filter(|w| !w.is_empty()) {
                let word = word.strip_suffix(b"\r\n").unwrap_or(word);
                assert!(word.len() <= 24, "word of {} bytes", word.len());
            }
        }

        #[test]
        fn single_characters_are_emitted_even_oversize() {
            // one 4-byte character cannot fit a 10-byte word budget
            let words = encode_mime_word_q("\u{1F980}", 10);
            assert_eq!(words, b"=?utf-8?Q?=F0=9F=A6=80?=");
        }

        #[test]
        fn b_variant_uses_base64_payload() {
            let word = encode_mime_word_b("Café", MAX_MIME_WORD_SIZE);
            assert_eq!(word, b"=?utf-8?B?Q2Fmw6k=?=");
        }

        #[test]
        fn empty_text_yields_empty_output() {
            assert!(encode_mime_word_q("", MAX_MIME_WORD_SIZE).is_empty());
            assert!(encode_mime_word_b("", MAX_MIME_WORD_SIZE).is_empty());
        }
    }

    mod dot_stuff_tests {
        use super::*;

        #[test]
        fn doubles_a_leading_dot() {
            assert_eq!(dot_stuff(b".hidden"), b"..hidden");
        }

        #[test]
        fn doubles_dots_after_crlf() {
            assert_eq!(dot_stuff(b"a\r\n.\r\nb"), b"a\r\n..\r\nb");
        }

        #[test]
        fn leaves_interior_dots_alone() {
            assert_eq!(dot_stuff(b"a.b\r\nc.d"), b"a.b\r\nc.d");
        }

        #[test]
        fn bare_lf_does_not_open_a_line() {
            assert_eq!(dot_stuff(b"a\n.b"), b"a\n.b");
        }
    }
}
