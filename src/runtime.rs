//! The runtime support header, embedded at build time.
//!
//! Generated sources include `gx.hh` for `gx::deref`, `gx::Array`,
//! `gx::Slice`, `gx::String`, the field-tag metadata machinery and the
//! component registration macro. The compiler treats the header as an
//! opaque string; the driver writes it next to the generated header.

pub const RUNTIME_HEADER: &str = include_str!("../runtime/gx.hh");

pub const RUNTIME_HEADER_NAME: &str = "gx.hh";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_carries_the_support_surface() {
        for needle in [
            "namespace gx",
            "deref",
            "struct String",
            "struct Array",
            "struct Slice",
            "struct FieldAttribs",
            "struct FieldTag",
            "ComponentTypeListAdd",
        ] {
            assert!(RUNTIME_HEADER.contains(needle), "missing {}", needle);
        }
    }
}
