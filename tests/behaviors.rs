//! Behavior-marked structs: registration macros, the export closure,
//! and header filtering.

use gx::test_support::compile_source;

const GAME: &str = r#"package main

type Behavior struct {
}

type Position struct {
	Behavior
	X, Y float32
}

type Velocity struct {
	Behavior
	Dx, Dy float32
	target Waypoint
}

type Waypoint struct {
	X, Y float32
}

type Scratch struct {
	n int
}

func (p *Position) Advance_X(v Velocity) {
	p.X = p.X + v.Dx
}

func (s *Scratch) bump() {
	s.n = s.n + 1
}

func main() {
	p := Position{}
	v := Velocity{}
	p.Advance_X(v)
	s := Scratch{}
	s.bump()
	check(p.X == 0)
}
"#;

#[test]
fn behavior_structs_get_registration_macros_in_both_streams() {
    let out = compile_source(GAME).unwrap();
    assert!(
        out.cc.contains("ComponentTypeListAdd(Position);\nstruct Position {"),
        "cc:\n{}",
        out.cc
    );
    assert!(out.cc.contains("ComponentTypeListAdd(Velocity);\nstruct Velocity {"));
    assert!(out.hh.contains("ComponentTypeListAdd(Position);\nstruct Position {"));
    assert!(out.hh.contains("ComponentTypeListAdd(Velocity);\nstruct Velocity {"));
}

#[test]
fn the_marker_field_is_not_emitted() {
    let out = compile_source(GAME).unwrap();
    let defn_start = out.cc.find("struct Position {").unwrap();
    let defn_end = out.cc[defn_start..].find("};").unwrap() + defn_start;
    let defn = &out.cc[defn_start..defn_end];
    assert!(!defn.contains("Behavior"), "defn:\n{}", defn);
    assert!(defn.contains("float X;"));
}

#[test]
fn export_closure_reaches_referenced_types() {
    let out = compile_source(GAME).unwrap();
    // Waypoint is only reachable through Velocity's private field, and
    // still must be exported with it.
    assert!(out.hh.contains("struct Waypoint {"), "hh:\n{}", out.hh);
    // Scratch is reachable from nothing exported.
    assert!(!out.hh.contains("struct Scratch"));
    // Everything in the header also appears in the source.
    assert!(out.cc.contains("struct Waypoint {"));
    assert!(out.cc.contains("struct Scratch {"));
}

#[test]
fn methods_of_exported_receivers_are_declared_in_the_header() {
    let out = compile_source(GAME).unwrap();
    assert!(
        out.hh
            .contains("void Advance(gx::FieldTag<Position, 0>, Position *p, Velocity v);"),
        "hh:\n{}",
        out.hh
    );
    assert!(!out.hh.contains("bump"));
}

#[test]
fn export_promotion_covers_types_seen_before_the_behavior() {
    // Inner is hoisted before Holder (its dependent), and the behavior
    // marker sits on a later type that references Inner: the revisit
    // must promote Inner into the header without duplicating it.
    let out = compile_source(
        r#"package main

type Behavior struct {
}

type Inner struct {
	n int
}

type Plain struct {
	inner Inner
}

type Marked struct {
	Behavior
	inner Inner
}

func main() {
	m := Marked{}
	check(m.inner.n == 0)
}
"#,
    )
    .unwrap();

    assert!(out.hh.contains("struct Inner {"));
    assert!(!out.hh.contains("struct Plain"));
    // Exactly one definition of Inner in the source stream.
    assert_eq!(out.cc.matches("struct Inner {").count(), 1);
    assert_eq!(out.hh.matches("struct Inner {").count(), 1);
}
