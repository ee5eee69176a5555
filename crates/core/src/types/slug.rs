//! URL-slug derivation for catalog entities.
//!
//! Slugs are derived from display names that may mix Arabic and Latin
//! script. Derivation keeps Arabic letters, ASCII alphanumerics, and
//! hyphens; everything else collapses away. A name made entirely of
//! dropped characters yields no slug - callers fall back to a generated
//! token in that case.

/// Arabic letter block retained in slugs (ء through ي).
const ARABIC_LETTERS: std::ops::RangeInclusive<char> = '\u{0621}'..='\u{064A}';

/// Derive a URL slug from a display name.
///
/// Lowercases the name, turns whitespace runs into single hyphens, drops
/// characters outside `[a-z0-9-]` and the Arabic letter block, collapses
/// repeated hyphens, and trims leading/trailing hyphens.
///
/// Returns `None` when nothing survives (e.g. a name of emoji or
/// punctuation only), so the caller can substitute a unique fallback.
#[must_use]
pub fn slugify(name: &str) -> Option<String> {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true; // suppress leading hyphens

    for c in name.to_lowercase().chars() {
        let mapped = if c.is_whitespace() || c == '-' {
            Some('-')
        } else if c.is_ascii_alphanumeric() || ARABIC_LETTERS.contains(&c) {
            Some(c)
        } else {
            None
        };

        match mapped {
            Some('-') => {
                if !last_was_hyphen {
                    slug.push('-');
                    last_was_hyphen = true;
                }
            }
            Some(c) => {
                slug.push(c);
                last_was_hyphen = false;
            }
            None => {}
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() { None } else { Some(slug) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::slugify;

    #[test]
    fn latin_names() {
        assert_eq!(slugify("Rose Water Soap").unwrap(), "rose-water-soap");
        assert_eq!(slugify("  Olive   Oil  ").unwrap(), "olive-oil");
    }

    #[test]
    fn arabic_names_are_preserved() {
        assert_eq!(slugify("صابون الورد").unwrap(), "صابون-الورد");
    }

    #[test]
    fn punctuation_collapses() {
        assert_eq!(slugify("100% Pure -- Honey!").unwrap(), "100-pure-honey");
    }

    #[test]
    fn unusable_names_yield_none() {
        assert_eq!(slugify("!!!"), None);
        assert_eq!(slugify("   "), None);
        assert_eq!(slugify(""), None);
    }
}
