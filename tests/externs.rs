//! Extern directives: symbol mapping, file-scope prefixes, field name
//! lowering, include preambles, and the INVALID marker.

use gx::test_support::{compile_source, compile_sources};

#[test]
fn extern_types_and_functions_use_mapped_names() {
    let out = compile_source(
        r#"//gx:include "rect.hh"

package main

//gx:extern rect::NUM_VERTICES
const RectNumVertices = 0

//gx:extern rect::Rect
type Rect struct {
	X, Y          float32
	Width, Height float32
}

//gx:extern rect::area
func area(r Rect) float32

//gx:extern rect::area
func (r Rect) area() float32

func main() {
	r := Rect{X: 100, Y: 100, Width: 20, Height: 30}
	check(r.X == 100)
	check(area(r) == 600)
	check(r.area() == 600)
	check(RectNumVertices == 4)
}
"#,
    )
    .unwrap();

    // No declarations for extern entities.
    assert!(!out.cc.contains("struct Rect"));
    assert!(!out.cc.contains("float area"));
    assert!(!out.cc.contains("RectNumVertices ="));
    // Call sites and literals use the mapped names.
    assert!(out.cc.contains("auto r = rect::Rect{ .x = 100, .y = 100, .width = 20, .height = 30 };"));
    assert!(out.cc.contains("rect::area(r)"));
    assert!(out.cc.contains("rect::NUM_VERTICES == 4"));
    // Includes come first, deduplicated, before the runtime header.
    assert!(out.cc.starts_with("#include \"rect.hh\"\n#include \"gx.hh\"\n"));
    assert!(out.hh.contains("#include \"rect.hh\"\n#include \"gx.hh\"\n"));
}

#[test]
fn exported_fields_of_extern_structs_lowercase_by_default() {
    let out = compile_source(
        r#"package main

//gx:extern ext::Thing
type Thing struct {
	Value  int
	Custom int //gx:extern specialName
}

func main() {
	t := Thing{}
	check(t.Value == 0)
	check(t.Custom == 0)
}
"#,
    )
    .unwrap();
    assert!(out.cc.contains("t.value == 0"));
    assert!(out.cc.contains("t.specialName == 0"));
}

#[test]
fn externs_prefix_applies_to_unannotated_top_level_names() {
    let out = compile_sources(&[
        (
            "main.gx",
            r#"package main

import "person"

func main() {
	p := person.NewPerson(20, 100)
	check(person.Population == 1)
	p.Grow()
	check(p.Age() == 21)
}
"#,
        ),
        (
            "person/person.gx",
            r#"//gx:include "person/person.hh"
//gx:externs person::

package person

type Person struct {
	age    int
	health float32
}

var Population int

func NewPerson(age int, health float32) Person

//gx:extern person::GetAge
func (p Person) Age() float32

func (p *Person) Grow()
"#,
        ),
    ])
    .unwrap();

    // Package-qualified references drop the qualifier and use the
    // mapped symbols directly.
    assert!(out.cc.contains("auto p = person::NewPerson(20, 100);"));
    assert!(out.cc.contains("person::Population == 1"));
    assert!(out.cc.contains("person::GetAge(p)"));
    // Methods go through the same maps; Grow has a pointer receiver.
    assert!(out.cc.contains("person::Grow(&(p));"));
    // Nothing of the extern package is declared locally.
    assert!(!out.cc.contains("struct Person"));
    assert!(out.cc.contains("#include \"person/person.hh\""));
}

#[test]
fn invalid_extern_blocks_emission_with_an_error() {
    let err = compile_source(
        r#"package main

//gx:extern INVALID
func hostOnly() int

func main() {
	check(hostOnly() == 0)
}
"#,
    )
    .unwrap_err();
    assert!(
        err.contains("hostOnly not usable from this target"),
        "err: {}",
        err
    );
}

#[test]
fn invalid_extern_is_fine_while_unreferenced() {
    let out = compile_source(
        r#"package main

//gx:extern INVALID
func shaderOnly() int

func main() {
}
"#,
    )
    .unwrap();
    assert!(!out.cc.contains("shaderOnly"));
}

#[test]
fn unknown_directives_are_ignored() {
    let out = compile_source(
        r#"package main

//lint:ignore everything
//gadget:mode fast
func tagged() int {
	return 1
}

func main() {
	check(tagged() == 1)
}
"#,
    )
    .unwrap();
    assert!(out.cc.contains("int tagged()"));
}
