/// Splits an exec request payload into words.
///
/// Whitespace separates words unless quoted. Single quotes are literal,
/// double quotes honour `\"` and `\\` escapes.
pub fn split_command(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    let mut has_word = false;
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (None, '"' | '\'') => {
                quote = Some(ch);
                has_word = true;
            }
            (Some(q), c) if c == q => quote = None,
            (None, ' ' | '\t' | '\n' | '\r') => {
                if has_word {
                    out.push(std::mem::take(&mut cur));
                    has_word = false;
                }
            }
            (Some('\''), c) => cur.push(c),
            (_, '\\') => {
                match chars.peek() {
                    Some(&next) if next == '"' || next == '\\' => {
                        cur.push(next);
                        chars.next();
                    }
                    _ => cur.push(ch),
                }
                has_word = true;
            }
            (_, c) => {
                cur.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words() {
        assert_eq!(split_command("ls -la  /tmp"), vec!["ls", "-la", "/tmp"]);
        assert!(split_command("   ").is_empty());
        assert!(split_command("").is_empty());
    }

    #[test]
    fn quoted_words_keep_spaces() {
        assert_eq!(split_command(r#"echo "a b" 'c d'"#), vec!["echo", "a b", "c d"]);
        assert_eq!(split_command(r#"say "x\"y""#), vec!["say", r#"x"y"#]);
        assert_eq!(split_command(r#"keep 'a\b'"#), vec!["keep", r"a\b"]);
    }

    #[test]
    fn empty_quotes_are_a_word() {
        assert_eq!(split_command(r#"set """#), vec!["set", ""]);
    }
}
