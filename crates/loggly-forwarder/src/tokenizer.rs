// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Splits an access log line into its fields.
//!
//! Fields are separated by runs of whitespace. A field that starts with a
//! double quote extends to the matching unescaped closing quote and may
//! contain whitespace. Inside quotes, `\"` and `\\` are escapes; they are kept
//! verbatim in the field, only the enclosing quotes are removed.

/// Returns the fields of `line` in order, borrowing from the input.
///
/// An unterminated quoted field runs to the end of the line.
pub fn tokenize(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut fields = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if bytes[pos] == b'"' {
            let start = pos + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end] != b'"' {
                // skip whatever the backslash escapes
                end += if bytes[end] == b'\\' { 2 } else { 1 };
            }
            let end = end.min(bytes.len());
            fields.push(&line[start..end]);
            pos = end + 1;
        } else {
            let start = pos;
            while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            fields.push(&line[start..pos]);
        }
    }

    fields
}
