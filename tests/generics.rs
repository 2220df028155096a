//! Generic types and functions: template emission, explicit and
//! inferred instantiation.

use gx::test_support::compile_source;

const HOLDER: &str = r#"package main

type Holder[T any] struct {
	Item T
}

func (h Holder[T]) get() T {
	return h.Item
}

func incrHolder[T any](h *Holder[T]) {
	h.Item = h.Item
}

func main() {
	i := Holder[int]{42}
	check(i.get() == 42)
	incrHolder(&i)
}
"#;

#[test]
fn generic_struct_gets_template_header() {
    let out = compile_source(HOLDER).unwrap();
    assert!(
        out.cc.contains("template<typename T>\nstruct Holder {\n  T Item;\n};"),
        "cc:\n{}",
        out.cc
    );
}

#[test]
fn instantiation_uses_angle_brackets() {
    let out = compile_source(HOLDER).unwrap();
    assert!(out.cc.contains("auto i = Holder<int>{ 42 };"));
}

#[test]
fn generic_method_signature_carries_receiver_params() {
    let out = compile_source(HOLDER).unwrap();
    assert!(
        out.cc.contains("template<typename T>\nT get(Holder<T> h)"),
        "cc:\n{}",
        out.cc
    );
}

#[test]
fn method_calls_do_not_spell_type_arguments() {
    let out = compile_source(HOLDER).unwrap();
    assert!(out.cc.contains("get(i)"));
    assert!(!out.cc.contains("get<"));
}

#[test]
fn inferred_instantiation_is_spelled_at_call_sites() {
    let out = compile_source(HOLDER).unwrap();
    assert!(
        out.cc.contains("incrHolder<int>(&i);"),
        "cc:\n{}",
        out.cc
    );
}

#[test]
fn explicit_instantiation_is_spelled_at_call_sites() {
    let out = compile_source(
        r#"package main

type Numeric interface {
	int | float64
}

func add[T Numeric](a, b T) T {
	return a + b
}

func main() {
	check(add(1, 2) == 3)
	check(add[float64](1.2, 2.0) == 3.2)
}
"#,
    )
    .unwrap();

    assert!(out.cc.contains("template<typename T>\nT add(T a, T b)"));
    assert!(out.cc.contains("add<int>(1, 2)"));
    assert!(out.cc.contains("add<float>(1.2f, 2.0f)"));
    // The constraint interface leaves no trace in the output.
    assert!(!out.cc.contains("Numeric"));
}

#[test]
fn generic_alias_uses_templated_using() {
    let out = compile_source(
        r#"package main

type Seq[T any] []T

func (s *Seq[T]) add(val T) {
	*s = append(*s, val)
}

func main() {
	s := Seq[int]{1, 2}
	s.add(3)
	check(len(s) == 3)
}
"#,
    )
    .unwrap();

    assert!(
        out.cc
            .contains("template<typename T>\nusing Seq = gx::Slice<T>;"),
        "cc:\n{}",
        out.cc
    );
    assert!(out.cc.contains("template<typename T>\nvoid add(Seq<T> *s, T val)"));
    assert!(out.cc.contains("add(&(s), 3);"));
    assert!(out.cc.contains("gx::deref(s) = gx::append(gx::deref(s), val);"));
}

#[test]
fn constraint_interface_methods_keep_the_member_call_form() {
    let out = compile_source(
        r#"package main

type Incrementer[T any] interface {
	*T
	incr()
}

type Single struct {
	val int
}

func (s *Single) incr() {
	s.val = s.val + 1
}

func incrAll[T any, PT Incrementer[T]](s *[]T) {
	for i := range *s {
		PT(&(*s)[i]).incr()
	}
}

func main() {
	s := []Single{{1}, {2}}
	incrAll[Single, *Single](&s)
	check(s[0].val == 2)
}
"#,
    )
    .unwrap();

    // The receiver is parenthesized and the dot-call survives; the
    // call is not lowered to the free-function form.
    assert!(
        out.cc.contains("(PT(&(gx::deref(s))[i])).incr();"),
        "cc:\n{}",
        out.cc
    );
    assert!(!out.cc.contains("incr(PT("));
    assert!(out
        .cc
        .contains("template<typename T, typename PT>\nvoid incrAll(gx::Slice<T> *s)"));
    assert!(out.cc.contains("incrAll<Single, Single *>(&s);"));
    // The concrete method on Single still lowers to a free function.
    assert!(out.cc.contains("void incr(Single *s)"));
}

#[test]
fn underdetermined_type_arguments_are_an_error() {
    let err = compile_source(
        r#"package main

func pick[T any]() int {
	return 0
}

func main() {
	check(pick() == 0)
}
"#,
    )
    .unwrap_err();
    assert!(err.contains("cannot infer type arguments for pick"), "err: {}", err);
}

#[test]
fn conversion_through_generic_type() {
    let out = compile_source(
        r#"package main

type Seq[T any] []T

func main() {
	slice := []int{1, 2}
	seq := Seq[int](slice)
	check(len(seq) == 2)
}
"#,
    )
    .unwrap();
    assert!(out.cc.contains("auto seq = Seq<int>(slice);"));
}
