use anyhow::{Context, Result};
use memchr::memchr2_iter;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Read a log file into owned lines.
///
/// The file is memory-mapped and split at `\n`, `\r\n` or a lone `\r`; a
/// final unterminated line is kept. Invalid UTF-8 is replaced rather than
/// rejected.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(Vec::new());
    }

    // mmap the file
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("mapping {}", path.display()))?;
    Ok(split_lines(&mmap))
}

pub fn split_lines(bytes: &[u8]) -> Vec<String> {
    let mut out = Vec::with_capacity(bytes.len() / 80);
    let mut start = 0usize;
    // position of a `\n` that completes a `\r\n` pair
    let mut pending_lf = None;
    for pos in memchr2_iter(b'\n', b'\r', bytes) {
        if pending_lf == Some(pos) {
            start = pos + 1;
            continue;
        }
        out.push(decode_line(&bytes[start..pos]));
        start = pos + 1;
        pending_lf =
            (bytes[pos] == b'\r' && bytes.get(pos + 1) == Some(&b'\n')).then_some(pos + 1);
    }
    if start < bytes.len() {
        out.push(decode_line(&bytes[start..]));
    }
    out
}

#[inline]
fn decode_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn splits_and_keeps_unterminated_tail() {
        let v = split_lines(b"one\r\ntwo\n\nthree");
        assert_eq!(v, ["one", "two", "", "three"]);
    }

    #[test]
    fn lone_carriage_return_ends_a_line() {
        assert_eq!(split_lines(b"a\rb\r\n\rc"), ["a", "b", "", "c"]);
        assert_eq!(split_lines(b"x\r\r"), ["x", ""]);
        assert_eq!(split_lines(b"tail\r"), ["tail"]);
    }

    #[test]
    fn trailing_newline_adds_no_line() {
        assert_eq!(split_lines(b"a\nb\n"), ["a", "b"]);
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let v = split_lines(b"ok\n\xff\xfe bad\n");
        assert_eq!(v[0], "ok");
        assert!(v[1].ends_with(" bad"));
        assert!(v[1].contains('\u{FFFD}'));
    }

    #[test]
    fn reads_file_from_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "2024-01-15 10:30:00 INFO up\nplain\rlast").unwrap();
        f.flush().unwrap();
        let v = read_lines(f.path()).unwrap();
        assert_eq!(v, ["2024-01-15 10:30:00 INFO up", "plain", "last"]);
    }

    #[test]
    fn empty_file_has_no_lines() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert!(read_lines(f.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_lines(&dir.path().join("nope.log")).unwrap_err();
        assert!(err.to_string().contains("nope.log"));
    }
}
