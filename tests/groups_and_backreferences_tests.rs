use tinygrep::{compile, PatternError};

fn test_pattern(pattern: &str, text: &str, expected: bool) {
    let regex = compile(pattern)
        .unwrap_or_else(|err| panic!("Failed to parse pattern '{pattern}': {err}"));
    let result = regex
        .is_match(text.as_bytes())
        .expect("search should stay within the step budget");
    assert_eq!(
        result, expected,
        "Pattern '{}' against text '{}' - expected: {}, got: {}",
        pattern, text, expected, result
    );
}

/// Assert that `pattern` matches `text` and that each listed group captured
/// exactly the given bytes.
fn test_captures(pattern: &str, text: &str, expected: &[(usize, &str)]) {
    let regex = compile(pattern)
        .unwrap_or_else(|err| panic!("Failed to parse pattern '{pattern}': {err}"));
    let captures = regex
        .captures(text.as_bytes())
        .expect("search should stay within the step budget")
        .unwrap_or_else(|| panic!("Pattern '{pattern}' should match '{text}'"));
    for &(index, expected_text) in expected {
        assert_eq!(
            captures.get(index),
            Some(expected_text.as_bytes()),
            "group {} of pattern '{}' against '{}'",
            index,
            pattern,
            text
        );
    }
}

#[cfg(test)]
mod basic_group_tests {
    use super::*;

    #[test]
    fn test_simple_group() {
        test_pattern("(abc)", "abc", true);
    }

    #[test]
    fn test_group_in_sequence() {
        test_pattern("x(abc)y", "xabcy", true);
    }

    #[test]
    fn test_group_fail() {
        test_pattern("(abc)", "def", false);
    }

    #[test]
    fn test_empty_group() {
        test_pattern("()", "hello", true);
    }

    #[test]
    fn test_multiple_groups() {
        test_pattern("(a)(b)", "ab", true);
    }

    #[test]
    fn test_multiple_groups_fail() {
        test_pattern("(a)(b)", "ac", false);
    }
}

#[cfg(test)]
mod nested_group_tests {
    use super::*;

    #[test]
    fn test_nested_groups() {
        test_pattern("(a(b)c)", "abc", true);
    }

    #[test]
    fn test_nested_groups_multiple() {
        test_pattern("((a)b)", "ab", true);
    }

    #[test]
    fn test_deep_nesting() {
        test_pattern("(((a)))", "a", true);
    }

    #[test]
    fn test_nested_with_alternation() {
        test_pattern("(a(b|c)d)", "abd", true);
    }

    #[test]
    fn test_nested_with_alternation_second() {
        test_pattern("(a(b|c)d)", "acd", true);
    }
}

#[cfg(test)]
mod group_with_quantifiers_tests {
    use super::*;

    #[test]
    fn test_group_with_plus() {
        test_pattern("(ab)+", "ab", true);
    }

    #[test]
    fn test_group_with_plus_multiple() {
        test_pattern("(ab)+", "ababab", true);
    }

    #[test]
    fn test_group_with_plus_fail() {
        test_pattern("(ab)+", "", false);
    }

    #[test]
    fn test_group_with_question() {
        test_pattern("(ab)?", "", true);
    }

    #[test]
    fn test_group_with_question_once() {
        test_pattern("(ab)?", "ab", true);
    }
}

#[cfg(test)]
mod capture_tests {
    use super::*;

    #[test]
    fn test_group_zero_is_whole_match() {
        test_captures("c.t", "a cat sat", &[(0, "cat")]);
    }

    #[test]
    fn test_groups_number_in_open_paren_order() {
        test_captures(
            "((a)(b))(c)",
            "abc",
            &[(0, "abc"), (1, "ab"), (2, "a"), (3, "b"), (4, "c")],
        );
    }

    #[test]
    fn test_greedy_split_between_groups() {
        test_captures("(a+)(a+)b", "aaab", &[(1, "aa"), (2, "a")]);
    }

    #[test]
    fn test_repeated_group_keeps_last_iteration() {
        let regex = compile("(a)+b").unwrap();
        let captures = regex.captures(b"aab").unwrap().unwrap();
        assert_eq!(captures.span(1), Some((1, 2)));
    }

    #[test]
    fn test_group_in_failed_alternative_is_unset() {
        let regex = compile("(a)y|ab").unwrap();
        let captures = regex.captures(b"ab").unwrap().unwrap();
        assert_eq!(captures.get(1), None);
        assert_eq!(captures.span(0), Some((0, 2)));
    }
}

#[cfg(test)]
mod backreference_tests {
    use super::*;

    #[test]
    fn test_simple_backreference() {
        test_pattern("(cat) and \\1", "cat and cat", true);
    }

    #[test]
    fn test_simple_backreference_fail() {
        test_pattern("(cat) and \\1", "cat and dog", false);
    }

    #[test]
    fn test_backreference_captures() {
        test_captures("(cat) and \\1", "cat and cat", &[(1, "cat")]);
    }

    #[test]
    fn test_repeated_word() {
        test_pattern("(\\w+) \\1", "hello hello", true);
    }

    #[test]
    fn test_repeated_word_fail() {
        test_pattern("(\\w+) \\1", "hello world", false);
    }

    #[test]
    fn test_backreference_to_empty_capture() {
        test_pattern("(a?)b\\1c", "bc", true);
    }

    #[test]
    fn test_backreference_to_unset_group_fails_quietly() {
        test_pattern("((a)|b)\\2", "baa", true);
        test_pattern("((a)|b)\\2", "ba", false);
    }

    #[test]
    fn test_backreference_with_alternation_groups() {
        test_captures(
            "(c.t|d.g) and (f..h|b..d), \\1 with \\2",
            "cat and fish, cat with fish",
            &[(1, "cat"), (2, "fish")],
        );
    }

    #[test]
    fn test_backreference_with_quantified_groups() {
        test_captures(
            "(how+dy) (he?y) there",
            "howwdy hey there",
            &[(1, "howwdy"), (2, "hey")],
        );
    }

    #[test]
    fn test_backreference_with_classes() {
        test_pattern(
            "([abc]+)-([def]+) is \\1-\\2, not [^xyz]+",
            "abc-def is abc-def, not efg",
            true,
        );
    }

    #[test]
    fn test_nested_backreferences() {
        test_captures(
            "('(cat) and \\2') is the same as \\1",
            "'cat and cat' is the same as 'cat and cat'",
            &[(1, "'cat and cat'"), (2, "cat")],
        );
    }

    #[test]
    fn test_multiple_backreferences() {
        test_captures(
            "((\\w\\w\\w\\w) (\\d\\d\\d)) is doing \\2 \\3 times, and again \\1 times",
            "grep 101 is doing grep 101 times, and again grep 101 times",
            &[(1, "grep 101"), (2, "grep"), (3, "101")],
        );
    }
}

#[cfg(test)]
mod zero_width_loop_tests {
    use super::*;

    #[test]
    fn test_empty_group_plus_terminates() {
        test_pattern("()+", "abc", true);
    }

    #[test]
    fn test_empty_alternative_plus_terminates() {
        test_pattern("(|a)+", "", true);
    }

    #[test]
    fn test_optional_group_plus_terminates() {
        test_pattern("(a?)+b", "b", true);
    }
}

#[cfg(test)]
mod malformed_pattern_tests {
    use super::*;

    #[test]
    fn test_unclosed_group() {
        assert!(matches!(
            compile("(unclosed"),
            Err(PatternError::UnclosedGroup { .. })
        ));
    }

    #[test]
    fn test_backreference_without_groups() {
        let err = compile("\\9").unwrap_err();
        assert_eq!(err, PatternError::InvalidBackref { index: 9, pos: 0 });
        assert_eq!(err.position(), 0);
    }

    #[test]
    fn test_backreference_to_open_group() {
        assert!(matches!(
            compile("(\\1)"),
            Err(PatternError::InvalidBackref { index: 1, .. })
        ));
    }

    #[test]
    fn test_backreference_to_closed_group_is_fine() {
        test_pattern("(a)\\1", "aa", true);
    }

    #[test]
    fn test_leading_quantifier() {
        assert!(matches!(
            compile("+abc"),
            Err(PatternError::DanglingQuantifier { pos: 0 })
        ));
    }

    #[test]
    fn test_unterminated_class() {
        assert!(matches!(
            compile("[abc"),
            Err(PatternError::UnclosedClass { .. })
        ));
    }

    #[test]
    fn test_dangling_escape() {
        assert!(matches!(
            compile("abc\\"),
            Err(PatternError::DanglingEscape { pos: 3 })
        ));
    }

    #[test]
    fn test_error_renders_offset() {
        let message = compile("(a").unwrap_err().to_string();
        assert!(message.contains("byte 2"), "unexpected message: {message}");
    }
}
