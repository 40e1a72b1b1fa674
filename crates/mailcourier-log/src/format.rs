//! Positional message formatting.

use std::fmt::{Display, Write as _};

/// Replaces `%1`, `%2`, … placeholders with the stringified arguments.
///
/// The template is scanned left to right in a single pass, so substituted
/// text is never re-scanned and each argument fills only its own numbered
/// slot. Placeholders without a matching argument are kept verbatim, as is a
/// lone `%`.
#[must_use]
pub fn format_positional(template: &str, args: &[&dyn Display]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            output.push(ch);
            continue;
        }
        let mut number = String::new();
        while let Some(digit) = chars.peek().copied().filter(char::is_ascii_digit) {
            number.push(digit);
            chars.next();
        }
        let arg = number
            .parse::<usize>()
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| args.get(index));
        match arg {
            Some(arg) => {
                let _ = write!(output, "{arg}");
            }
            None => {
                output.push('%');
                output.push_str(&number);
            }
        }
    }

    output
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_in_call_order() {
        let formatted = format_positional("log-traffic > %1: %2", &[&"C", &"EHLO host"]);
        assert_eq!(formatted, "log-traffic > C: EHLO host");
    }

    #[test]
    fn each_argument_fills_only_its_slot() {
        let formatted = format_positional("%2 and %1", &[&"first", &"second"]);
        assert_eq!(formatted, "second and first");
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        // an argument containing a placeholder must come through untouched
        let formatted = format_positional("%1 %2", &[&"%2", &"done"]);
        assert_eq!(formatted, "%2 done");
    }

    #[test]
    fn unmatched_placeholder_is_kept() {
        let formatted = format_positional("a %3 b", &[&"only one"]);
        assert_eq!(formatted, "a %3 b");
    }

    #[test]
    fn lone_percent_is_kept() {
        let formatted = format_positional("100% done %1", &[&42]);
        assert_eq!(formatted, "100% done 42");
    }

    #[test]
    fn numeric_arguments_are_stringified() {
        let formatted = format_positional("%1 of %2", &[&3, &10]);
        assert_eq!(formatted, "3 of 10");
    }
}
