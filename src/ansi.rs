// ---------------------------------------------------------------------------
// ANSI colour/style stripping
// ---------------------------------------------------------------------------

const ESC: char = '\x1b';

/// Remove ANSI SGR sequences (`ESC [ <digits/semicolons> m`) from `input`.
///
/// Anything that only looks like the start of a sequence (a bare `ESC`, an
/// `ESC [` followed by something other than digits, `;` and a final `m`) is
/// left untouched.
pub fn strip_ansi(input: &str) -> String {
    if !input.contains(ESC) {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(ESC) {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        match sgr_len(candidate) {
            Some(len) => rest = &candidate[len..],
            None => {
                out.push(ESC);
                rest = &candidate[ESC.len_utf8()..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Byte length of the SGR sequence at the start of `s`, if there is one.
fn sgr_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.len() < 3 || bytes[0] != 0x1b || bytes[1] != b'[' {
        return None;
    }
    let params = bytes[2..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b';')
        .count();
    match bytes.get(2 + params) {
        Some(b'm') => Some(3 + params),
        _ => None,
    }
}
