#[cfg(test)]
mod scanner_tests {
    use rox::error::LoxError;
    use rox::scanner::*;
    use rox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenKind, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.kind, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenKind::LeftParen, "("),
                (TokenKind::LeftBrace, "{"),
                (TokenKind::Star, "*"),
                (TokenKind::Dot, "."),
                (TokenKind::Comma, ","),
                (TokenKind::Plus, "+"),
                (TokenKind::Star, "*"),
                (TokenKind::RightBrace, "}"),
                (TokenKind::RightParen, ")"),
                (TokenKind::Eof, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_two_char_operators() {
        assert_token_sequence(
            "!= == <= >= ! = < > /",
            &[
                (TokenKind::BangEqual, "!="),
                (TokenKind::EqualEqual, "=="),
                (TokenKind::LessEqual, "<="),
                (TokenKind::GreaterEqual, ">="),
                (TokenKind::Bang, "!"),
                (TokenKind::Equal, "="),
                (TokenKind::Less, "<"),
                (TokenKind::Greater, ">"),
                (TokenKind::Slash, "/"),
                (TokenKind::Eof, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "class fun var forward _under orchid or",
            &[
                (TokenKind::Class, "class"),
                (TokenKind::Fun, "fun"),
                (TokenKind::Var, "var"),
                (TokenKind::Identifier, "forward"),
                (TokenKind::Identifier, "_under"),
                (TokenKind::Identifier, "orchid"),
                (TokenKind::Or, "or"),
                (TokenKind::Eof, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_comments_and_lines() {
        let source = "// leading comment\nvar a;\n\n// another\nprint a;";
        let tokens: Vec<Token<'_>> = Scanner::new(source).filter_map(Result::ok).collect();

        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![2, 2, 2, 5, 5, 5, 5]);
    }

    #[test]
    fn test_scanner_05_numbers() {
        let tokens: Vec<Token<'_>> = Scanner::new("123 4.5 6. .7")
            .filter_map(Result::ok)
            .collect();

        let kinds: Vec<&str> = tokens.iter().map(|t| t.kind.name()).collect();
        assert_eq!(
            kinds,
            vec!["NUMBER", "NUMBER", "NUMBER", "DOT", "DOT", "NUMBER", "EOF"]
        );

        assert!(matches!(tokens[1].literal, Some(Literal::Number(n)) if n == 4.5));
        assert_eq!(tokens[2].lexeme, "6");
        assert_eq!(tokens[5].lexeme, "7");
    }

    #[test]
    fn test_scanner_06_strings() {
        let tokens: Vec<Token<'_>> = Scanner::new("\"hi\" \"two\nlines\" x")
            .filter_map(Result::ok)
            .collect();

        assert!(matches!(&tokens[0].literal, Some(Literal::Str(s)) if &**s == "hi"));
        assert_eq!(tokens[0].lexeme, "\"hi\"");
        assert!(matches!(&tokens[1].literal, Some(Literal::Str(s)) if &**s == "two\nlines"));
        // the identifier after a multi-line string sits on line 2
        assert_eq!(tokens[2].line, 2);
    }

    #[test]
    fn test_scanner_07_unterminated_string() {
        let results: Vec<_> = Scanner::new("\"abc\ndef").collect();

        assert_eq!(results.len(), 2);
        match &results[0] {
            Err(LoxError::Lex { message, line }) => {
                assert_eq!(message, "Unterminated string.");
                assert_eq!(*line, 2);
            }
            other => panic!("expected lex error, got {:?}", other),
        }
        assert!(matches!(&results[1], Ok(t) if t.kind == TokenKind::Eof));
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let results: Vec<_> = Scanner::new(source).collect();

        // COMMA, DOT, error '$', LEFT_PAREN, error '#', EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenKind::Comma, ",");
        assert_token_matches(&results[1], TokenKind::Dot, ".");
        assert_token_matches(&results[3], TokenKind::LeftParen, "(");
        assert_token_matches(&results[5], TokenKind::Eof, "");

        let errors: Vec<String> = results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(|e| e.to_string())
            .collect();

        assert_eq!(
            errors,
            vec![
                "[line 1] Error: Unexpected character: $",
                "[line 1] Error: Unexpected character: #",
            ]
        );

        fn assert_token_matches(
            result: &rox::Result<Token<'_>>,
            expected_type: TokenKind,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(
                        token.kind, expected_type,
                        "Expected token type {:?}, got {:?}",
                        expected_type, token.kind
                    );
                    assert_eq!(
                        token.lexeme, expected_lexeme,
                        "Expected lexeme '{}', got '{}'",
                        expected_lexeme, token.lexeme
                    );
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }

    #[test]
    fn test_multibyte_character_reported_once() {
        let (tokens, errors) = scan_all("a é b");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "[line 1] Error: Unexpected character: é");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_token_display() {
        let tokens: Vec<String> = Scanner::new("var x = 3; \"s\" 2.5")
            .filter_map(Result::ok)
            .map(|t| t.to_string())
            .collect();

        assert_eq!(
            tokens,
            vec![
                "VAR var null",
                "IDENTIFIER x null",
                "EQUAL = null",
                "NUMBER 3 3.0",
                "SEMICOLON ; null",
                "STRING \"s\" s",
                "NUMBER 2.5 2.5",
                "EOF  null",
            ]
        );
    }

    #[test]
    fn test_scanner_is_fused() {
        let mut scanner = Scanner::new("");

        assert!(matches!(scanner.next(), Some(Ok(t)) if t.kind == TokenKind::Eof));
        assert!(scanner.next().is_none());
        assert!(scanner.next().is_none());
    }

    #[test]
    fn test_literal_payloads_are_decoded_once() {
        let tokens: Vec<Token<'_>> = Scanner::new("x 12 \"a b\"")
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens[0].literal, None);
        assert_eq!(tokens[1].literal, Some(Literal::Number(12.0)));
        assert_eq!(tokens[2].literal, Some(Literal::Str("a b".into())));
        assert_eq!(tokens[2].lexeme, "\"a b\"");
    }

    #[test]
    fn test_tokens_serialize_with_canonical_kind_names() {
        let tokens: Vec<Token<'_>> = Scanner::new("a 2").filter_map(Result::ok).collect();
        let json = serde_json::to_value(&tokens).unwrap();

        assert_eq!(json[0]["kind"], "IDENTIFIER");
        assert!(json[0].get("literal").is_none());
        assert_eq!(json[1]["kind"], "NUMBER");
        assert_eq!(json[1]["literal"], 2.0);
        assert_eq!(json[2]["kind"], "EOF");
    }
}
