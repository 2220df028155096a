//! Diagnostics: subset violations and unsupported features carry
//! positions, accumulate, and suppress all output.

use gx::test_support::{check_source, compile_source};

#[test]
fn diagnostics_carry_file_line_col_prefixes() {
    let err = compile_source(
        "package main\n\nfunc main() {\n\tundefinedThing()\n}\n",
    )
    .unwrap_err();
    assert!(err.starts_with("main.gx:4:"), "err: {}", err);
    assert!(err.contains("undefined: undefinedThing"));
}

#[test]
fn multiple_errors_accumulate() {
    let err = compile_source(
        "package main\n\nfunc main() {\n\tfirstMissing()\n\tsecondMissing()\n}\n",
    )
    .unwrap_err();
    assert!(err.contains("firstMissing"));
    assert!(err.contains("secondMissing"));
}

#[test]
fn address_of_temporary_is_rejected() {
    let err = compile_source(
        r#"package main

func three() int {
	return 3
}

func main() {
	p := &three()
	check(p != nil)
}
"#,
    )
    .unwrap_err();
    assert!(
        err.contains("cannot take address of a temporary object"),
        "err: {}",
        err
    );
}

#[test]
fn multi_value_assignment_is_rejected() {
    let err = compile_source(
        "package main\n\nfunc main() {\n\ta, b := 1, 2\n\ta, b = b, a\n\tcheck(a == 2)\n\tcheck(b == 1)\n}\n",
    )
    .unwrap_err();
    assert!(err.contains("multi-value assignment unsupported"), "err: {}", err);
}

#[test]
fn array_and_slice_parameters_by_value_are_rejected() {
    let err = compile_source(
        r#"package main

func sum(vals []int) int {
	return len(vals)
}

func first(vals [4]int) int {
	return vals[0]
}

func main() {
	check(sum([]int{1}) == 1)
	check(first([4]int{1, 2, 3, 4}) == 1)
}
"#,
    )
    .unwrap_err();
    assert!(
        err.contains("cannot pass []int by value, use pointer to []int instead"),
        "err: {}",
        err
    );
    assert!(
        err.contains("cannot pass [4]int by value, use pointer to [4]int instead"),
        "err: {}",
        err
    );
}

#[test]
fn multiple_return_values_are_rejected() {
    let err = compile_source(
        "package main\n\nfunc pair() (int, int)\n\nfunc main() {\n}\n",
    )
    .unwrap_err();
    assert!(err.contains("multiple return values not supported"), "err: {}", err);
}

#[test]
fn range_requires_define() {
    let err = compile_source(
        r#"package main

func main() {
	stuff := []int{1}
	i := 0
	for i = range stuff {
		check(i == 0)
	}
}
"#,
    )
    .unwrap_err();
    assert!(err.contains("must use := in range statement"), "err: {}", err);
}

#[test]
fn defer_is_a_load_error() {
    let err = compile_source(
        "package main\n\nfunc main() {\n\tdefer cleanup()\n}\n",
    )
    .unwrap_err();
    assert!(err.contains("defer not supported"), "err: {}", err);
}

#[test]
fn unknown_field_in_keyed_literal() {
    let err = compile_source(
        r#"package main

type P struct {
	x int
}

func main() {
	p := P{nope: 1}
	check(p.x == 0)
}
"#,
    )
    .unwrap_err();
    assert!(err.contains("has no field or method nope"), "err: {}", err);
}

#[test]
fn selecting_missing_members_is_an_error() {
    let err = check_source(
        r#"package main

type P struct {
	x int
}

func main() {
	p := P{}
	check(p.missing == 0)
}
"#,
    )
    .unwrap_err();
    assert!(err.contains("type P has no field or method missing"), "err: {}", err);
}

#[test]
fn import_cycles_are_reported() {
    let err = gx::test_support::compile_sources(&[
        ("main.gx", "package main\n\nimport \"a\"\n\nfunc main() {\n}\n"),
        ("a/a.gx", "package a\n\nimport \"b\"\n\nvar A int\n"),
        ("b/b.gx", "package b\n\nimport \"a\"\n\nvar B int\n"),
    ])
    .unwrap_err();
    assert!(err.contains("import cycle"), "err: {}", err);
}

#[test]
fn checker_errors_do_not_panic_the_backend() {
    // A program with both a front-end error and otherwise-emittable
    // code: compilation fails cleanly with only diagnostics.
    let err = compile_source(
        r#"package main

func ok() int {
	return 1
}

func main() {
	check(ok() == 1)
	missing()
}
"#,
    )
    .unwrap_err();
    assert!(err.contains("undefined: missing"));
}
