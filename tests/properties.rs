//! Property tests over the backend's structural guarantees:
//! determinism, dependency ordering, and the keyed-literal rule.

use proptest::prelude::*;

use gx::test_support::compile_source;

// ============================================================================
// Generators
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
        }
    }
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Add), Just(Op::Sub), Just(Op::Mul)]
}

/// A fully parenthesized arithmetic expression over small literals.
fn arb_expr() -> impl Strategy<Value = String> {
    let leaf = (0i32..100).prop_map(|n| n.to_string());
    leaf.prop_recursive(3, 16, 2, |inner| {
        (inner.clone(), arb_op(), inner)
            .prop_map(|(a, op, b)| format!("({} {} {})", a, op.symbol(), b))
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn determinism_over_random_arithmetic(expr in arb_expr()) {
        let src = format!(
            "package main\n\nfunc main() {{\n\tx := {}\n\tcheck(x == x)\n}}\n",
            expr
        );
        let first = compile_source(&src).unwrap();
        let second = compile_source(&src).unwrap();
        prop_assert_eq!(&first.cc, &second.cc);
        prop_assert_eq!(&first.hh, &second.hh);
        prop_assert!(first.cc.contains("auto x = "));
    }

    #[test]
    fn hoisting_orders_chains_under_any_declaration_order(
        order in Just(vec![0usize, 1, 2, 3]).prop_shuffle()
    ) {
        // T0 contains T1 contains T2 contains T3; declaration order is
        // shuffled, emission order must not change.
        let mut decls = vec![String::new(); 4];
        for i in 0..4usize {
            let body = if i < 3 {
                format!("\tnext T{}\n", i + 1)
            } else {
                "\tn int\n".to_string()
            };
            decls[i] = format!("type T{} struct {{\n{}}}\n", i, body);
        }
        let mut src = String::from("package main\n\n");
        for &i in &order {
            src.push_str(&decls[i]);
            src.push('\n');
        }
        src.push_str("func main() {\n\tt := T0{}\n\tcheck(t.next.next.next.n == 0)\n}\n");

        let out = compile_source(&src).unwrap();
        let positions: Vec<usize> = (0..4)
            .map(|i| out.cc.find(&format!("struct T{} {{", i)).unwrap())
            .collect();
        for i in 0..3 {
            prop_assert!(
                positions[i + 1] < positions[i],
                "T{} must be defined before T{}\n{}",
                i + 1,
                i,
                out.cc
            );
        }
    }

    #[test]
    fn keyed_literals_accept_exactly_the_monotone_orders(
        fields in proptest::sample::subsequence(vec![0usize, 1, 2, 3], 2..=4),
        swap in any::<bool>()
    ) {
        let names = ["a", "b", "c", "d"];
        let mut chosen: Vec<usize> = fields;
        if swap {
            // Force a strictly decreasing step.
            chosen.reverse();
        }
        let elems = chosen
            .iter()
            .map(|&i| format!("{}: {}", names[i], i))
            .collect::<Vec<_>>()
            .join(", ");
        let src = format!(
            "package main\n\ntype S struct {{\n\ta int\n\tb int\n\tc int\n\td int\n}}\n\nfunc main() {{\n\ts := S{{{}}}\n\tcheck(s.a == 0)\n}}\n",
            elems
        );

        let result = compile_source(&src);
        if swap {
            let err = result.expect_err("decreasing order must fail");
            prop_assert!(err.contains("struct literal fields must appear in definition order"));
        } else {
            let out = result.expect("monotone order must compile");
            prop_assert!(out.cc.contains(".a = 0") || !chosen.contains(&0));
        }
    }
}
