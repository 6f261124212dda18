/// Maps a human-authored title to its equalized form
///
/// # Equalization Steps
///
/// 1. Fold typographic quotes, dashes and ellipses to ASCII
/// 2. Drop zero-width characters
/// 3. Lowercase
/// 4. Collapse all whitespace runs to a single space and trim
/// 5. Strip a trailing truncation marker (`...`)
///
/// The result is a pure function of the input, so it is stable across runs
/// and safe to persist.
///
/// # Examples
///
/// ```
/// use blog_archive::title::equalize_title;
///
/// assert_eq!(equalize_title("  Hello,\u{00A0}World\u{2019}s  End… "), "hello, world's end");
/// ```
pub fn equalize_title(title: &str) -> String {
    let mut folded = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '`' => {
                folded.push('\'')
            }
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}'
            | '\u{00BB}' => folded.push('"'),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
            | '\u{2212}' => folded.push('-'),
            '\u{2026}' => folded.push_str("..."),
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}' => {}
            c if c.is_whitespace() => folded.push(' '),
            c => folded.extend(c.to_lowercase()),
        }
    }

    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = collapsed.trim_end_matches('.').trim_end();

    // A title made only of dots is kept as-is rather than emptied
    if stripped.is_empty() {
        collapsed
    } else if collapsed.ends_with("...") {
        stripped.to_string()
    } else {
        collapsed
    }
}
