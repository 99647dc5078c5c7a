//! Log Repository
//!
//! Reads the append-only log file a work process writes its combined
//! stdout/stderr into. Readers never block the writer: they take whatever bytes
//! are on disk and, while the job is still live, drop a trailing partial line.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Lines read from a job log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLines {
    pub lines: Vec<String>,
    pub total_lines: usize,
}

/// Reads a job log
///
/// `tail == 0` returns every line, otherwise only the last `tail` lines; the
/// file is streamed and only those lines are kept in memory.
/// When `settled` is false the writer may be mid-line, so an unterminated last
/// line is left out until it is complete.
pub fn read_lines(path: &Path, tail: usize, settled: bool) -> io::Result<LogLines> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(LogLines {
                lines: Vec::new(),
                total_lines: 0,
            });
        }
        Err(e) => return Err(e),
    };

    let mut reader = BufReader::new(file);
    let mut kept = VecDeque::new();
    let mut total_lines = 0;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let line = match buf.strip_suffix(b"\n") {
            Some(line) => line,
            None if settled => &buf[..],
            None => break,
        };

        total_lines += 1;
        if tail > 0 && kept.len() == tail {
            kept.pop_front();
        }
        kept.push_back(String::from_utf8_lossy(line).into_owned());
    }

    Ok(LogLines {
        lines: kept.into(),
        total_lines,
    })
}

/// Last `n` lines of a finished log joined by newlines, trimmed
pub fn tail_text(path: &Path, n: usize) -> io::Result<String> {
    let tail = read_lines(path, n, true)?;
    Ok(tail.lines.join("\n").trim().to_string())
}

/// Appends one line to a log; used only when no process ever owned the log
pub fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    file.flush()
}
