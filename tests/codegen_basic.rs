//! End-to-end emission for the plain-C++ core: functions, control flow,
//! variables, pointers and strings.

use gx::test_support::compile_source;

#[test]
fn fib_program_emits_recursive_calls_and_int_main() {
    let out = compile_source(
        r#"package main

func fib(n int) int {
	if n <= 1 {
		return n
	}
	return fib(n-1) + fib(n-2)
}

func main() {
	check(fib(6) == 8)
}
"#,
    )
    .unwrap();

    assert!(out.cc.contains("int fib(int n)"), "cc:\n{}", out.cc);
    assert!(out.cc.contains("return fib(n - 1) + fib(n - 2);"));
    assert!(out.cc.contains("int main()"));
    assert!(out.cc.contains("gx::check(fib(6) == 8);"));
    assert!(out.cc.starts_with("#include \"gx.hh\"\n"));
    // Nothing is exported, so the header holds only the skeleton.
    assert!(out.hh.starts_with("#pragma once\n"));
    assert!(!out.hh.contains("fib"));
    assert!(out.glsls.is_empty());
}

#[test]
fn non_main_void_function() {
    let out = compile_source(
        "package main\n\nfunc side() {\n\treturn\n}\n\nfunc main() {\n\tside()\n}\n",
    )
    .unwrap();
    assert!(out.cc.contains("void side()"));
    assert!(out.cc.contains("side();"));
}

#[test]
fn control_flow_forms() {
    let out = compile_source(
        r#"package main

func main() {
	x := 0
	if cond := false; cond {
		x = 2
	} else {
		x = 3
	}
	for i := 0; i < 5; i++ {
		x += i
	}
	i := 0
	for i < 5 {
		i++
	}
	for {
		break
	}
	check(x == 13)
}
"#,
    )
    .unwrap();

    assert!(out.cc.contains("if (auto cond = false; cond) {"));
    assert!(out.cc.contains("} else {"));
    assert!(out.cc.contains("for (auto i = 0; i < 5; (i)++) {"));
    assert!(out.cc.contains("for (; i < 5; ) {"));
    assert!(out.cc.contains("for (; ; ) {"));
    assert!(out.cc.contains("break;"));
}

#[test]
fn defines_use_auto_except_strings() {
    let out = compile_source(
        "package main\n\nfunc main() {\n\tx := 3\n\ts := \"foo\"\n\tcheck(x == 3)\n\tcheck(len(s) == 3)\n}\n",
    )
    .unwrap();
    assert!(out.cc.contains("auto x = 3;"));
    assert!(out.cc.contains("gx::String s = \"foo\";"));
    assert!(out.cc.contains("gx::len(s)"));
}

#[test]
fn float_literals_gain_f_suffix() {
    let out = compile_source(
        "package main\n\nfunc main() {\n\tf := 1.25\n\tcheck(f > 1.0)\n}\n",
    )
    .unwrap();
    assert!(out.cc.contains("auto f = 1.25f;"));
    assert!(out.cc.contains("f > 1.0f"));
}

#[test]
fn pointers_use_deref_helper() {
    let out = compile_source(
        r#"package main

func setToFortyTwo(ptr *int) {
	*ptr = 42
}

func main() {
	val := 14
	ptr := &val
	*ptr = 7
	setToFortyTwo(ptr)
	check(val == 42)
}
"#,
    )
    .unwrap();
    assert!(out.cc.contains("void setToFortyTwo(int *ptr)"));
    assert!(out.cc.contains("gx::deref(ptr) = 42;"));
    assert!(out.cc.contains("auto ptr = &val;"));
}

#[test]
fn globals_are_inline_and_constants_constexpr() {
    let out = compile_source(
        r#"package main

const initialGlobalX = 23

var globalY = globalX - 3
var globalX = initialGlobalX
var globalSlice []int

func main() {
	check(globalY == 20)
}
"#,
    )
    .unwrap();

    assert!(out.cc.contains("inline constexpr int initialGlobalX = 23;"));
    assert!(out.cc.contains("inline int globalX = initialGlobalX;"));
    assert!(out.cc.contains("inline int globalY = globalX - 3;"));
    assert!(out.cc.contains("inline gx::Slice<int> globalSlice;"));
    // Dependency order: globalX's definition precedes globalY's.
    let x_at = out.cc.find("inline int globalX").unwrap();
    let y_at = out.cc.find("inline int globalY").unwrap();
    assert!(x_at < y_at, "cc:\n{}", out.cc);
}

#[test]
fn arrays_and_slices() {
    let out = compile_source(
        r#"package main

func main() {
	arr := [4]int{1, 2, 3, 4}
	inferred := [...]int{1, 2, 3}
	s := []int{}
	s = append(s, 1)
	check(arr[2] == 3)
	check(len(inferred) == 3)
	check(len(s) == 1)
}
"#,
    )
    .unwrap();

    assert!(out.cc.contains("auto arr = gx::Array<int, 4>{ 1, 2, 3, 4 };"));
    assert!(out.cc.contains("auto inferred = gx::Array<int, 3>{ 1, 2, 3 };"));
    assert!(out.cc.contains("auto s = gx::Slice<int>{};"));
    assert!(out.cc.contains("s = gx::append(s, 1);"));
    assert!(out.cc.contains("arr[2] == 3"));
}

#[test]
fn range_loops_rewrite_to_counted_reference_loops() {
    let out = compile_source(
        r#"package main

func main() {
	stuff := []int{1, 2, 3}
	sum := 0
	for i, elem := range stuff {
		sum += i + elem
	}
	for elem := range stuff {
		sum += elem
	}
	for range stuff {
		sum += 1
	}
	check(sum > 0)
}
"#,
    )
    .unwrap();

    assert!(out
        .cc
        .contains("for (auto i = -1; auto &elem : stuff) {"));
    assert!(out.cc.contains("++i;"));
    assert!(out
        .cc
        .contains("for (auto elem = -1; auto &_ [[maybe_unused]] : stuff) {"));
    assert!(out.cc.contains("for (auto &_ [[maybe_unused]] : stuff) {"));
}

#[test]
fn lambdas_capture_by_reference_inside_functions() {
    let out = compile_source(
        r#"package main

func iterate(f func(int)) {
	for i := 1; i <= 3; i++ {
		f(i)
	}
}

func main() {
	sum := 0
	iterate(func(i int) {
		sum += i
	})
	check(sum == 6)
}
"#,
    )
    .unwrap();

    assert!(out.cc.contains("void iterate(auto &&f)"));
    assert!(out.cc.contains("iterate([&](int i) {"));
}

#[test]
fn bitwise_operators_are_parenthesized() {
    let out = compile_source(
        "package main\n\nfunc main() {\n\tx := 6 & 3\n\ty := 6 | 3\n\tz := 6 ^ 3\n\tw := 1 << 3\n\tcheck(x+y+z+w > 0)\n}\n",
    )
    .unwrap();
    assert!(out.cc.contains("auto x = (6 & 3);"));
    assert!(out.cc.contains("auto y = (6 | 3);"));
    assert!(out.cc.contains("auto z = (6 ^ 3);"));
    assert!(out.cc.contains("auto w = 1 << 3;"));
}

#[test]
fn conversions_emit_function_style_casts() {
    let out = compile_source(
        r#"package main

func main() {
	f := float32(2)
	i := int(f)
	check(i == 2)
}
"#,
    )
    .unwrap();
    assert!(out.cc.contains("auto f = float(2);"));
    assert!(out.cc.contains("auto i = int(f);"));
}

#[test]
fn section_banners_are_present_in_order() {
    let out = compile_source("package main\n\nfunc main() {\n}\n").unwrap();
    let types_at = out.cc.find("//\n// Types\n//\n").unwrap();
    let meta_at = out.cc.find("//\n// Meta\n//\n").unwrap();
    let decls_at = out.cc.find("//\n// Function declarations\n//\n").unwrap();
    let vars_at = out.cc.find("//\n// Variables\n//\n").unwrap();
    let defs_at = out.cc.find("//\n// Function definitions\n//\n").unwrap();
    assert!(types_at < meta_at && meta_at < decls_at && decls_at < vars_at && vars_at < defs_at);
}
