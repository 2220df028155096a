//! GLSL emission: entry tagging, storage-class expansion, operator
//! externs, dependency closure ordering, and the int→float policy.

use gx::test_support::compile_source;

const SHADER: &str = r#"package main

//glsl:extern vec2
//gx:extern INVALID
type Vec2 struct {
	X, Y float64
}

//glsl:extern vec4
//gx:extern INVALID
type Vec4 struct {
	X, Y, Z, W float64
}

//glsl:extern *
//gx:extern INVALID
func (v Vec4) Multiply(u Vec4) Vec4

//glsl:extern -
//gx:extern INVALID
func (v Vec4) Negate() Vec4

//glsl:extern sampler2D
//gx:extern INVALID
type Sampler2D struct {
}

//glsl:extern texture2D
//gx:extern INVALID
func Texture2D(sampler Sampler2D, coord Vec2) Vec4

//gx:extern INVALID
var gl_FragColor Vec4

//gx:extern INVALID
type RedTextureParams struct {
	ColDiffuse Vec4
	Texture0   Sampler2D
}

//gx:extern INVALID
type Varyings struct {
	FragTexCoord Vec2
	FragColor    Vec4
}

//gx:extern INVALID
func scaleByTwo(vec Vec4) Vec4 {
	return vec.Multiply(vec)
}

//glsl:entry
func redTextureShader(uniforms RedTextureParams, varyings Varyings) {
	result := Vec4{1, 0.2, 0.2, 1}
	texelColor := Texture2D(uniforms.Texture0, varyings.FragTexCoord)
	result = result.Multiply(texelColor)
	result = result.Multiply(uniforms.ColDiffuse)
	result = result.Multiply(varyings.FragColor)
	result = scaleByTwo(result.Negate())
	gl_FragColor = result
}

func main() {
}
"#;

fn shader_source() -> String {
    let out = compile_source(SHADER).unwrap();
    assert_eq!(out.glsls.len(), 1);
    let (name, src) = &out.glsls[0];
    assert_eq!(name, "redTextureShader");
    src.clone()
}

#[test]
fn shader_begins_with_version_and_precision() {
    let src = shader_source();
    assert!(
        src.starts_with("#version 100\nprecision mediump float;\n\n"),
        "glsl:\n{}",
        src
    );
}

#[test]
fn storage_class_parameters_expand_to_globals() {
    let src = shader_source();
    assert!(src.contains("uniform vec4 colDiffuse;"), "glsl:\n{}", src);
    assert!(src.contains("uniform sampler2D texture0;"));
    assert!(src.contains("varying vec2 fragTexCoord;"));
    assert!(src.contains("varying vec4 fragColor;"));
}

#[test]
fn entry_body_becomes_void_main() {
    let src = shader_source();
    assert!(src.contains("void main() {"));
    assert!(src.contains("gl_FragColor = result;"));
}

#[test]
fn texture_sampling_uses_extern_names_and_storage_selectors() {
    let src = shader_source();
    assert!(
        src.contains("texture2D(texture0, fragTexCoord)"),
        "glsl:\n{}",
        src
    );
}

#[test]
fn operator_externs_inline_as_operators() {
    let src = shader_source();
    // Binary `*`: parenthesized application. Unary `-`: prefix call.
    assert!(src.contains("(result) * (texelColor)"), "glsl:\n{}", src);
    assert!(src.contains("(result) * (colDiffuse)"));
    assert!(src.contains("-(result)"));
}

#[test]
fn dependencies_precede_main() {
    let src = shader_source();
    let dep_at = src.find("vec4 scaleByTwo(vec4 vec) {").unwrap();
    let main_at = src.find("void main()").unwrap();
    assert!(dep_at < main_at, "glsl:\n{}", src);
}

#[test]
fn integer_literals_gain_float_suffix_in_shaders() {
    let src = shader_source();
    assert!(
        src.contains("vec4 result = vec4(1.0, 0.2, 0.2, 1.0);"),
        "glsl:\n{}",
        src
    );
}

#[test]
fn shader_entries_are_excluded_from_the_host_streams() {
    let out = compile_source(SHADER).unwrap();
    assert!(!out.cc.contains("redTextureShader"), "cc:\n{}", out.cc);
    assert!(!out.hh.contains("redTextureShader"));
}

#[test]
fn glsl_shader_synonym_also_marks_entries() {
    let out = compile_source(
        r#"package main

type FlatParams struct {
}

//glsl:shader
func flatShader(uniforms FlatParams) {
}

func main() {
}
"#,
    )
    .unwrap();
    assert_eq!(out.glsls.len(), 1);
    assert_eq!(out.glsls[0].0, "flatShader");
}
