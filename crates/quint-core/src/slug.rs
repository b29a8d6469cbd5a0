//! Slug derivation for holon identifiers.

/// Derives a filesystem- and identifier-safe slug from a title.
///
/// Lower-cases the input, collapses every run of non-alphanumeric characters
/// into a single `-`, and strips leading and trailing dashes. Uniqueness is
/// the caller's concern; collisions fall back to a generated id.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn collapses_and_lowercases() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Another_Test-Case"), "another-test-case");
        assert_eq!(slugify("123 FPF Hypo!"), "123-fpf-hypo");
    }

    #[test]
    fn strips_leading_and_trailing_separators() {
        assert_eq!(slugify("  leading and trailing   "), "leading-and-trailing");
        assert_eq!(slugify("-dash-start-and-end-"), "dash-start-and-end");
    }

    #[test]
    fn empty_and_symbol_only_titles_yield_empty_slug() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }
}
