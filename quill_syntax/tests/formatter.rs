//! Property tests for the formatter laws: output is a fixed point and
//! re-parsing it gives back the same program.

use proptest::prelude::*;
use quill_syntax::{format::format, parse_source};

const STATEMENTS: &[&str] = &[
    "let x = 1;",
    "let s=\"a\\\"b\";",
    "x = x + 2 * (3 - 1);",
    "fn f(a, b) { return a * b; }",
    "fn g() {}",
    "if (x > 1 and !y) { print(x); } else y;",
    "if (a) b; else if (c) { d; }",
    "while (x < 3) x = x + 1;",
    "for (let i = 0; i < 3; i = i + 1) { continue; }",
    "for (;;) break;",
    "{ let y = [1, 2]; y[0] = -y[1] % 2; }",
    "print(f(1, g())[0]);",
    "// comment\n",
    "/* block\n   comment */",
    "\n\n",
    "  ",
];

const FRAGMENTS: &[&str] = &["(", ")", "{", "}", "\"", "let", "1", "+", ";", "@", "/*"];

fn program() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(STATEMENTS), 0..10).prop_map(|v| v.concat())
}

fn soup() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            prop::sample::select(STATEMENTS),
            prop::sample::select(FRAGMENTS)
        ],
        0..10,
    )
    .prop_map(|v| v.join(" "))
}

proptest! {
    #[test]
    fn valid_programs_format_to_a_fixed_point(src in program()) {
        let once = format(&src);
        prop_assert_eq!(format(&once), once.clone());
        let (before, errors) = parse_source(&src);
        prop_assert!(errors.is_empty());
        let (after, errors) = parse_source(&once);
        prop_assert!(errors.is_empty());
        prop_assert_eq!(before, after);
    }

    #[test]
    fn any_input_formats_to_a_fixed_point(src in soup()) {
        let once = format(&src);
        prop_assert_eq!(format(&once), once);
    }

    #[test]
    fn arbitrary_text_never_panics(src in "\\PC{0,64}") {
        let once = format(&src);
        prop_assert_eq!(format(&once), once);
    }
}
