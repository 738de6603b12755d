//! Shell quoting for generated commands.

/// Escapes a path for inclusion inside double quotes in a POSIX shell
/// command: backslash, double quote, backtick, dollar, and exclamation mark
/// are prefixed with a backslash. The backslash replacement runs first.
#[must_use]
pub fn shell_escape(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        if matches!(ch, '\\' | '"' | '`' | '$' | '!') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
