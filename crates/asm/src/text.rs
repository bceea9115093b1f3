/// Replaces literal tab characters with two spaces so tab-formatted source
/// keeps consistent column alignment before whitespace collapsing.
pub fn remove_escapes(input: &str) -> String {
    input.replace('\t', "  ")
}

/// Trims, removes escapes, and collapses every run of two or more spaces
/// down to one space.
pub fn normalize(input: &str) -> String {
    normalize_with(input, true)
}

/// `normalize` without the escape-removal step.
pub fn normalize_keep_escapes(input: &str) -> String {
    normalize_with(input, false)
}

fn normalize_with(input: &str, remove: bool) -> String {
    let trimmed = input.trim();
    let mut out = if remove {
        remove_escapes(trimmed)
    } else {
        trimmed.to_string()
    };

    // Repeated replacement until the fixed point: a run of N spaces shrinks
    // on every pass, so this terminates.
    while out.contains("  ") {
        out = out.replace("  ", " ");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_space_runs_to_single_spaces() {
        assert_eq!(normalize("lda    #$10,   x"), "lda #$10, x");
    }

    #[test]
    fn expands_tabs_before_collapsing() {
        assert_eq!(normalize("lda\t\t#$10"), "lda #$10");
        assert_eq!(remove_escapes("a\tb"), "a  b");
    }

    #[test]
    fn keep_escapes_variant_leaves_tabs_alone() {
        assert_eq!(normalize_keep_escapes("a\tb"), "a\tb");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t  "), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("  lda \t #$10  ,  x ");
        assert_eq!(normalize(&once), once);
    }
}
