// SPDX-License-Identifier: MIT

//! Line-oriented recovery log.
//!
//! Each record names the partition-relative offset of a surviving primary
//! directory entry, optionally followed by the offset of its parent
//! directory's primary entry:
//!
//! ```text
//! # comment
//! 0x1A3C0040
//! 0x1A3C00C0, 0x1A3C0040
//! 439287872 439287808
//! ```

use std::io::BufRead;

use crate::errors::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    /// 1-based line number in the log.
    pub line: u64,
    pub entry_offset: u64,
    pub parent_offset: Option<u64>,
}

fn parse_number(field: &str) -> Option<u64> {
    match field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => field.parse().ok(),
    }
}

/// Parses one log line. Blank and comment-only lines yield `None`.
pub fn parse_line(line: u64, text: &str) -> LogResult<Option<LogRecord>> {
    let body = text.split_once('#').map_or(text, |(before, _)| before).trim();
    if body.is_empty() {
        return Ok(None);
    }

    let mut fields = body
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .map(parse_number);

    let unparseable = LogError::Unparseable { line };
    let entry_offset = fields.next().flatten().ok_or(unparseable)?;
    let parent_offset = match fields.next() {
        None => None,
        Some(parsed) => Some(parsed.ok_or(unparseable)?),
    };
    crate::ensure!(fields.next().is_none(), unparseable);

    Ok(Some(LogRecord {
        line,
        entry_offset,
        parent_offset,
    }))
}

/// Iterator over the records of a log.
///
/// Unparseable lines come out as `Err(LogError::Unparseable)` and iteration
/// continues; a read failure is yielded once and ends the iteration.
pub struct RecoveryLog<R: BufRead> {
    reader: R,
    line: u64,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> RecoveryLog<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: Vec::with_capacity(64),
            done: false,
        }
    }

    /// Lines consumed so far, blank and comment lines included.
    #[inline]
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

impl<R: BufRead> Iterator for RecoveryLog<R> {
    type Item = LogResult<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    let parsed = match core::str::from_utf8(&self.buf) {
                        Ok(text) => parse_line(self.line, text),
                        Err(_) => Err(LogError::Unparseable { line: self.line }),
                    };
                    match parsed {
                        Ok(None) => continue,
                        Ok(Some(record)) => return Some(Ok(record)),
                        Err(e) => return Some(Err(e)),
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(LogError::IO(e.into())));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_accepts_hex_decimal_and_separators() {
        assert_eq!(
            parse_line(1, "0x4000\n").unwrap(),
            Some(LogRecord {
                line: 1,
                entry_offset: 0x4000,
                parent_offset: None
            })
        );
        let rec = parse_line(2, "  16448 ,0X4000  # child of /docs").unwrap().unwrap();
        assert_eq!(rec.entry_offset, 16448);
        assert_eq!(rec.parent_offset, Some(0x4000));
        assert_eq!(
            parse_line(3, "0x10\t0x20").unwrap().unwrap().parent_offset,
            Some(0x20)
        );
    }

    #[test]
    fn test_ignores_blank_and_comment_lines() {
        assert_eq!(parse_line(1, ""), Ok(None));
        assert_eq!(parse_line(1, "   \r\n"), Ok(None));
        assert_eq!(parse_line(1, "# header"), Ok(None));
    }

    #[test]
    fn test_rejects_garbage() {
        for (i, text) in ["zzz", "0x", "12 34 56", "0x10,,foo", "-5"].iter().enumerate() {
            let line = i as u64 + 1;
            assert_eq!(
                parse_line(line, text),
                Err(LogError::Unparseable { line }),
                "{text:?}"
            );
        }
    }

    #[test]
    fn test_iterator_keeps_going_after_bad_lines() {
        let input = b"# log\n0x4000\nnot a number\n\n0x4060 0x4000\n\xFF\xFE\n0x4100";
        let records: Vec<_> = RecoveryLog::new(Cursor::new(&input[..])).collect();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].as_ref().unwrap().line, 2);
        assert_eq!(records[1], Err(LogError::Unparseable { line: 3 }));
        assert_eq!(records[2].as_ref().unwrap().parent_offset, Some(0x4000));
        assert_eq!(records[3], Err(LogError::Unparseable { line: 6 }));
        assert_eq!(records[4].as_ref().unwrap().entry_offset, 0x4100);
    }
}
