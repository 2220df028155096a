//! The `Base_FieldName` method rewrite: dispatch-parameter splicing at
//! declarations and the matching tag argument at call sites.

use gx::test_support::compile_source;

const PERSON: &str = r#"package main

type Person struct {
	Age    int
	Health float32
}

func (p Person) GetAgeAdder_Age() int {
	return p.Age
}

func (p Person) Boost_Health() float32 {
	return p.Health
}

func main() {
	p := Person{20, 100}
	check(p.GetAgeAdder_Age() == 20)
	check(p.Boost_Health() == 100)
}
"#;

#[test]
fn declaration_gains_leading_field_tag_parameter() {
    let out = compile_source(PERSON).unwrap();
    assert!(
        out.cc
            .contains("int GetAgeAdder(gx::FieldTag<Person, 0>, Person p)"),
        "cc:\n{}",
        out.cc
    );
    assert!(out
        .cc
        .contains("float Boost(gx::FieldTag<Person, 1>, Person p)"));
}

#[test]
fn call_sites_pass_a_tag_value_first() {
    let out = compile_source(PERSON).unwrap();
    assert!(
        out.cc
            .contains("GetAgeAdder(gx::FieldTag<Person, 0>{}, p)"),
        "cc:\n{}",
        out.cc
    );
    assert!(out.cc.contains("Boost(gx::FieldTag<Person, 1>{}, p)"));
}

#[test]
fn suffixed_name_without_matching_field_is_rejected() {
    let err = compile_source(
        r#"package main

type Person struct {
	Age int
}

func (p Person) Get_Nope() int {
	return p.Age
}

func main() {
	p := Person{20}
	check(p.Get_Nope() == 20)
}
"#,
    )
    .unwrap_err();
    assert!(
        err.contains("struct Person has no field named Nope"),
        "err: {}",
        err
    );
}

#[test]
fn ordinal_counts_only_exported_fields() {
    let out = compile_source(
        r#"package main

type Gadget struct {
	secret int
	Knob   int
}

func (g Gadget) Turn_Knob() int {
	return g.Knob
}

func main() {
	g := Gadget{1, 2}
	check(g.Turn_Knob() == 2)
}
"#,
    )
    .unwrap();
    // `secret` is unexported, so Knob's exported ordinal is 0 even
    // though its struct position is 1.
    assert!(out.cc.contains("int Turn(gx::FieldTag<Gadget, 0>, Gadget g)"));
    assert!(out.cc.contains("Turn(gx::FieldTag<Gadget, 0>{}, g)"));
}

#[test]
fn plain_method_names_are_untouched() {
    let out = compile_source(
        r#"package main

type Person struct {
	Age int
}

func (p Person) Grow() int {
	return p.Age + 1
}

func main() {
	p := Person{20}
	check(p.Grow() == 21)
}
"#,
    )
    .unwrap();
    assert!(out.cc.contains("int Grow(Person p)"));
    assert!(out.cc.contains("Grow(p)"));
    assert!(!out.cc.contains("Grow(gx::FieldTag"));
}
