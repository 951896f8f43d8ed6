use crate::models::EmpathyScale;

/// Extract an ordinal label from free-form service output.
///
/// The service is asked for a single integer but routinely wraps it in prose
/// ("I'd rate this a 4 out of 5 for empathy"). The parser returns the first
/// standalone integer that falls within the scale; digit runs that are part
/// of a decimal number are skipped so "3.5" never yields 3 or 5.
pub fn extract_label(text: &str, scale: EmpathyScale) -> Option<i64> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }

        // Fraction part of a decimal ("3.[5]")
        let after_point =
            start >= 2 && chars[start - 1] == '.' && chars[start - 2].is_ascii_digit();
        // Integer part of a decimal ("[3].5") - consume the fraction too
        let before_point =
            i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
        if before_point {
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            continue;
        }
        if after_point {
            continue;
        }

        let negative = start >= 1
            && chars[start - 1] == '-'
            && (start < 2 || !chars[start - 2].is_ascii_digit());

        let run: String = chars[start..i].iter().collect();
        if let Ok(value) = run.parse::<i64>() {
            let value = if negative { -value } else { value };
            if scale.contains(value) {
                return Some(value);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale() -> EmpathyScale {
        EmpathyScale::default()
    }

    #[test]
    fn test_bare_integer() {
        assert_eq!(extract_label("4", scale()), Some(4));
        assert_eq!(extract_label("  3\n", scale()), Some(3));
    }

    #[test]
    fn test_label_embedded_in_prose() {
        assert_eq!(
            extract_label("I'd rate this a 4 out of 5 for empathy", scale()),
            Some(4)
        );
        assert_eq!(
            extract_label("Empathy rating: 2. The speaker is dismissive.", scale()),
            Some(2)
        );
    }

    #[test]
    fn test_no_extractable_label() {
        assert_eq!(extract_label("the speaker sounds warm", scale()), None);
        assert_eq!(extract_label("", scale()), None);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(extract_label("I'd say 7", scale()), None);
        assert_eq!(extract_label("0", scale()), None);
        // First in-range integer wins even after an out-of-range one
        assert_eq!(extract_label("on a 10-point scale I'd say 4", scale()), Some(4));
    }

    #[test]
    fn test_decimals_skipped() {
        assert_eq!(extract_label("roughly 3.5 overall", scale()), None);
        assert_eq!(extract_label("roughly 3.5, call it 4", scale()), Some(4));
    }

    #[test]
    fn test_negative_labels() {
        let wide = EmpathyScale::new(-2, 2).unwrap();
        assert_eq!(extract_label("score: -1", wide), Some(-1));
        // "5-2" reads as the literal 2, not negative two
        assert_eq!(extract_label("5-2", wide), Some(2));
    }
}
