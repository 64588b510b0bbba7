//! Redis-compatible glob matching for `KEYS`-style enumeration.
//!
//! Supported syntax: `*`, `?`, `[abc]`, `[^abc]`, `[a-z]` and `\` escapes.

/// Whether `key` matches the glob `pattern`.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut pi, mut ki) = (0, 0);
    // Position of the last `*` and the key index it is currently absorbing up to.
    let mut star: Option<(usize, usize)> = None;

    while ki < key.len() {
        if pi < pattern.len() {
            match pattern[pi] {
                '*' => {
                    star = Some((pi, ki));
                    pi += 1;
                    continue;
                }
                '?' => {
                    pi += 1;
                    ki += 1;
                    continue;
                }
                '[' => match match_class(&pattern, pi, key[ki]) {
                    Some((true, next)) => {
                        pi = next;
                        ki += 1;
                        continue;
                    }
                    Some((false, _)) => {}
                    // Unterminated class: treat `[` literally.
                    None if key[ki] == '[' => {
                        pi += 1;
                        ki += 1;
                        continue;
                    }
                    None => {}
                },
                '\\' if pi + 1 < pattern.len() => {
                    if pattern[pi + 1] == key[ki] {
                        pi += 2;
                        ki += 1;
                        continue;
                    }
                }
                literal => {
                    if literal == key[ki] {
                        pi += 1;
                        ki += 1;
                        continue;
                    }
                }
            }
        }

        match star {
            Some((star_pi, star_ki)) => {
                pi = star_pi + 1;
                ki = star_ki + 1;
                star = Some((star_pi, star_ki + 1));
            }
            None => return false,
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

/// Evaluate the class starting at `pattern[start] == '['` against `ch`.
///
/// Returns whether it matched and the index just past the closing `]`,
/// or `None` if the class is never closed.
fn match_class(pattern: &[char], start: usize, ch: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != ']' {
        if pattern[i] == '\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == ch;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let (lo, hi) = if pattern[i] <= pattern[i + 2] {
                (pattern[i], pattern[i + 2])
            } else {
                (pattern[i + 2], pattern[i])
            };
            matched |= lo <= ch && ch <= hi;
            i += 3;
        } else {
            matched |= pattern[i] == ch;
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}
