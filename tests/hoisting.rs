//! Declaration ordering: dependency-ordered types and values, package
//! topological order, and the determinism the write-if-changed wrapper
//! relies on.

use gx::test_support::{compile_source, compile_sources};

#[test]
fn types_emit_after_their_dependencies_regardless_of_source_order() {
    let out = compile_source(
        r#"package main

type A struct {
	b B
}

type B struct {
	c C
}

type C struct {
	n int
}

func main() {
	a := A{}
	check(a.b.c.n == 0)
}
"#,
    )
    .unwrap();

    let c_at = out.cc.find("struct C {").unwrap();
    let b_at = out.cc.find("struct B {").unwrap();
    let a_at = out.cc.find("struct A {").unwrap();
    assert!(c_at < b_at && b_at < a_at, "cc:\n{}", out.cc);
}

#[test]
fn mutual_pointer_references_resolve_through_forward_declarations() {
    let out = compile_source(
        r#"package main

type Node struct {
	next *Node
	tree *Tree
}

type Tree struct {
	root *Node
}

func main() {
	n := Node{}
	check(n.next == nil)
}
"#,
    )
    .unwrap();

    // Both forward declarations precede both definitions.
    let fwd_node = out.cc.find("struct Node;").unwrap();
    let fwd_tree = out.cc.find("struct Tree;").unwrap();
    let def_node = out.cc.find("struct Node {").unwrap();
    let def_tree = out.cc.find("struct Tree {").unwrap();
    assert!(fwd_node < def_node && fwd_node < def_tree);
    assert!(fwd_tree < def_node && fwd_tree < def_tree);
    assert!(out.cc.contains("Node *next;"));
    assert!(out.cc.contains("n.next == nullptr"));
}

#[test]
fn imported_packages_emit_before_the_main_package() {
    let out = compile_sources(&[
        (
            "main.gx",
            r#"package main

import "foo"

func main() {
	f := foo.NewFoo(42)
	check(f.Val() == 42)
}
"#,
        ),
        (
            "foo/foo.gx",
            r#"package foo

type Foo struct {
	val int
}

func (f *Foo) Val() int {
	return f.val
}

func NewFoo(val int) Foo {
	return Foo{val}
}
"#,
        ),
    ])
    .unwrap();

    let foo_defn = out.cc.find("struct Foo {").unwrap();
    let main_defn = out.cc.find("int main()").unwrap();
    assert!(foo_defn < main_defn);
    assert!(out.cc.contains("int Val(Foo *f)"));
    assert!(out.cc.contains("Val(&(f))"));
    assert!(out.cc.contains("NewFoo(42)"));
}

#[test]
fn value_specs_follow_their_initializer_dependencies() {
    let out = compile_source(
        r#"package main

var second = first + 1
var first = base()
var third = second + first

func base() int {
	return 1
}

func main() {
	check(third == 3)
}
"#,
    )
    .unwrap();

    let first_at = out.cc.find("inline int first").unwrap();
    let second_at = out.cc.find("inline int second").unwrap();
    let third_at = out.cc.find("inline int third").unwrap();
    assert!(first_at < second_at && second_at < third_at, "cc:\n{}", out.cc);
}

#[test]
fn output_is_deterministic_across_runs() {
    let src = r#"package main

type Vec struct {
	X, Y float32
}

type Body struct {
	pos Vec
	vel Vec
}

func step(b *Body) {
	b.pos.X = b.pos.X + b.vel.X
}

func main() {
	b := Body{}
	step(&b)
	check(b.pos.X == 0)
}
"#;
    let first = compile_source(src).unwrap();
    let second = compile_source(src).unwrap();
    assert_eq!(first.cc, second.cc);
    assert_eq!(first.hh, second.hh);
}
