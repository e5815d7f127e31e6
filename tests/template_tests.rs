/// Tests for the template grammar: `&{name}` references and `@{expr}` tokens
use examgen::template::{expand, Context, ExpandError};

fn context(pairs: &[(&str, &str)]) -> Context {
    let mut ctx = Context::new();
    for (name, value) in pairs {
        ctx.bind(*name, *value);
    }
    ctx
}

#[test]
fn test_reference_then_arithmetic() {
    let ctx = context(&[("X", "3")]);
    assert_eq!(expand("&{X}+1=@{ &{X} +1}", &ctx).unwrap(), "3+1=4");
}

#[test]
fn test_expansion_is_idempotent() {
    let ctx = context(&[("X", "3")]);
    let once = expand("x is &{X}, twice @{&{X}*2}", &ctx).unwrap();
    let twice = expand(&once, &ctx).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_plain_text_passes_through() {
    let ctx = context(&[]);
    let text = "A LaTeX table: a & b \\\\ 10% of @ nothing";
    assert_eq!(expand(text, &ctx).unwrap(), text);
}

#[test]
fn test_unresolved_reference_left_for_later_layers() {
    let ctx = context(&[("KNOWN", "k")]);
    assert_eq!(
        expand("&{KNOWN} and &{LATER}", &ctx).unwrap(),
        "k and &{LATER}"
    );
}

#[test]
fn test_layered_values_expand_through() {
    let ctx = context(&[("OUTER", "&{INNER} squared"), ("INNER", "r")]);
    assert_eq!(expand("&{OUTER}", &ctx).unwrap(), "r squared");
}

#[test]
fn test_significant_figures_format() {
    let ctx = context(&[]);
    assert_eq!(expand("@[3]{3.14159}", &ctx).unwrap(), "3.14");
}

#[test]
fn test_latex_scientific_format() {
    let ctx = context(&[]);
    assert_eq!(
        expand("c = @[2t]{3E+8} m/s", &ctx).unwrap(),
        "c = \\ensuremath{3.0\\times{}10^{8}} m/s"
    );
}

#[test]
fn test_general_format_collapses() {
    let ctx = context(&[("V", "10")]);
    assert_eq!(expand("@[3g]{&{V}/4}", &ctx).unwrap(), "2.5");
    assert_eq!(expand("@[3g]{&{V}/5}", &ctx).unwrap(), "2");
}

#[test]
fn test_power_operator() {
    let ctx = context(&[]);
    assert_eq!(expand("@{2**10}", &ctx).unwrap(), "1024");
}

#[test]
fn test_multiple_tokens_left_to_right() {
    let ctx = context(&[]);
    assert_eq!(expand("@{1+1} and @{2+2}", &ctx).unwrap(), "2 and 4");
}

#[test]
fn test_expression_error_names_the_expression() {
    let ctx = context(&[]);
    match expand("ratio @{3/(2-2)}", &ctx) {
        Err(ExpandError::Expression { expr, .. }) => assert_eq!(expr, "3/(2-2)"),
        other => panic!("expected an expression error, got {:?}", other),
    }
}

#[test]
fn test_sandbox_rejects_names() {
    let ctx = context(&[]);
    assert!(matches!(
        expand("@{list()}", &ctx),
        Err(ExpandError::Expression { .. })
    ));
}

#[test]
fn test_self_referential_template_errors() {
    let ctx = context(&[("LOOP", "more &{LOOP}")]);
    assert!(matches!(
        expand("&{LOOP}", &ctx),
        Err(ExpandError::SubstitutionLimit { .. })
    ));
}
