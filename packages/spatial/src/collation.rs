//! Locale-aware ordering of region names.
//!
//! Region names are Finnish and Swedish place names, so plain byte order
//! is wrong twice over: uppercase sorts before lowercase, and `Å`, `Ä`,
//! `Ö` land after every ASCII letter only by accident of their code
//! points. This follows the Finnish alphabet: case-insensitive, `å ä ö`
//! after `z`, `ü` with `y`, accented Latin vowels with their base letter.

use std::cmp::Ordering;

/// Compares two names in Finnish alphabetical order.
///
/// Names with identical collation keys fall back to raw string order so
/// the result is total and deterministic.
#[must_use]
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

/// Primary-strength sort key for `name`.
fn collation_key(name: &str) -> Vec<u32> {
    name.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'å' => u32::from('z') + 1,
            'ä' | 'æ' => u32::from('z') + 2,
            'ö' | 'ø' => u32::from('z') + 3,
            'ü' => u32::from('y'),
            'á' | 'à' | 'â' => u32::from('a'),
            'é' | 'è' | 'ê' | 'ë' => u32::from('e'),
            'í' | 'ì' | 'î' | 'ï' => u32::from('i'),
            'ó' | 'ò' | 'ô' => u32::from('o'),
            'ú' | 'ù' | 'û' => u32::from('u'),
            other => u32::from(other),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(names: &[&'static str]) -> Vec<&'static str> {
        let mut names = names.to_vec();
        names.sort_by(|a, b| compare_names(a, b));
        names
    }

    #[test]
    fn ignores_case() {
        assert_eq!(sorted(&["kainuu", "Etelä-Savo", "Lappi"]), vec![
            "Etelä-Savo",
            "kainuu",
            "Lappi"
        ]);
    }

    #[test]
    fn nordic_letters_follow_z() {
        assert_eq!(sorted(&["Österbotten", "Åland", "Zeta", "Ärla"]), vec![
            "Zeta",
            "Åland",
            "Ärla",
            "Österbotten"
        ]);
    }

    #[test]
    fn accented_vowels_sort_with_base_letter() {
        assert_eq!(sorted(&["Ef", "Éa", "Eb"]), vec!["Éa", "Eb", "Ef"]);
    }

    #[test]
    fn equal_keys_fall_back_to_raw_order() {
        assert_eq!(compare_names("uusimaa", "Uusimaa"), Ordering::Greater);
        assert_eq!(compare_names("Uusimaa", "Uusimaa"), Ordering::Equal);
    }
}
