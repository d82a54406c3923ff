//! Wine name normalization
//!
//! The normalized name is the only key used by both the rating cache and the
//! in-flight request map.

/// Canonicalizes a raw wine name: trims surrounding whitespace and lower-cases it
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_lowercases() {
        assert_eq!(normalize("  Baron de Ley Reserva  "), "baron de ley reserva");
        assert_eq!(normalize("\tFOO\n"), "foo");
    }

    #[test]
    fn test_padding_and_case_collapse_to_same_key() {
        assert_eq!(normalize(" Foo "), normalize("foo"));
        assert_eq!(normalize("CHÂTEAU Margaux"), normalize("château margaux "));
    }

    #[test]
    fn test_is_idempotent() {
        for raw in ["  Mixed Case ", "already normal", "", "   ", "ÉCHÉZEAUX"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "normalize should be idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_inner_whitespace_is_preserved() {
        assert_eq!(normalize("Rioja  Gran Reserva"), "rioja  gran reserva");
    }
}
