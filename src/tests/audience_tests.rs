//! Audience normalization tests.

use crate::{normalize_audience, AudienceInput};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_shapes_normalize_alike() {
        let expected = vec!["a".to_string(), "b".to_string()];

        assert_eq!(normalize_audience("a,b"), expected);
        assert_eq!(normalize_audience("a, b"), expected);
        assert_eq!(normalize_audience(vec!["a", "b"]), expected);
        assert_eq!(normalize_audience(&["a", "b"][..]), expected);
    }

    #[test]
    fn test_single_value() {
        assert_eq!(normalize_audience("api://default"), vec!["api://default"]);
    }

    #[test]
    fn test_values_are_trimmed_and_empties_dropped() {
        assert_eq!(normalize_audience(" a , ,b,, "), vec!["a", "b"]);
        assert_eq!(normalize_audience(vec![" a ", "", "  ", "b"]), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_inputs_mean_no_constraint() {
        assert!(normalize_audience("").is_empty());
        assert!(normalize_audience(Vec::<String>::new()).is_empty());
        assert!(normalize_audience(None::<&str>).is_empty());
        assert!(normalize_audience(AudienceInput::default()).is_empty());
    }

    #[test]
    fn test_order_is_preserved() {
        assert_eq!(normalize_audience("z, a, m"), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs: Vec<AudienceInput> = vec![
            "a,b".into(),
            "a, b".into(),
            " x ,, y ".into(),
            "".into(),
            vec!["p", " q ", ""].into(),
        ];

        for input in inputs {
            let once = normalize_audience(input.clone());
            let twice = normalize_audience(once.clone());
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_audience_input_deserializes_untagged() {
        let single: AudienceInput = serde_json::from_str(r#""a, b""#).unwrap();
        let list: AudienceInput = serde_json::from_str(r#"["a", "b"]"#).unwrap();

        assert_eq!(single, AudienceInput::Single("a, b".to_string()));
        assert_eq!(normalize_audience(single), normalize_audience(list));
    }
}
