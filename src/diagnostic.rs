/// Diagnostic reporting using ariadne for readable template errors
use crate::expr::ExprError;
use crate::template::ExpandError;
use ariadne::{Color, Label, Report, ReportKind, Source};

/// Report a template expansion error against the template source
pub fn report_expand_error(source_name: &str, source: &str, error: &ExpandError) -> String {
    let mut output = Vec::new();

    let report = match error {
        // Substitution may have shifted the token since the original
        // template, so the expression error is reported against the
        // expression text itself.
        ExpandError::Expression {
            expr,
            source: inner,
            ..
        } => {
            let offender = inner.span();
            let report = Report::build(ReportKind::Error, source_name, offender.start)
                .with_message(format!("Expression error while expanding {}", source_name))
                .with_label(
                    Label::new((source_name, offender.range()))
                        .with_message(expr_error_note(inner))
                        .with_color(Color::Red),
                )
                .with_help("Expressions allow numbers, + - * / **, and parentheses only")
                .finish();
            let mut output = Vec::new();
            report
                .write((source_name, Source::from(expr.as_str())), &mut output)
                .expect("Failed to write diagnostic");
            return String::from_utf8(output).expect("Invalid UTF-8 in diagnostic output");
        }
        ExpandError::SubstitutionLimit { .. } => {
            Report::build(ReportKind::Error, source_name, 0)
                .with_message("Variable substitution did not converge")
                .with_label(
                    Label::new((source_name, 0..source.len().max(1)))
                        .with_message("this template keeps producing new references")
                        .with_color(Color::Red),
                )
                .with_note("A value probably refers back to itself through other values")
                .finish()
        }
        ExpandError::ExpressionLimit { .. } => {
            Report::build(ReportKind::Error, source_name, 0)
                .with_message("Expression expansion did not converge")
                .with_label(
                    Label::new((source_name, 0..source.len().max(1)))
                        .with_message("this template keeps producing new expression tokens")
                        .with_color(Color::Red),
                )
                .finish()
        }
    };

    report
        .write((source_name, Source::from(source)), &mut output)
        .expect("Failed to write diagnostic");

    String::from_utf8(output).expect("Invalid UTF-8 in diagnostic output")
}

fn expr_error_note(error: &ExprError) -> String {
    match error {
        ExprError::UnexpectedChar { ch, .. } => {
            format!("'{}' is not allowed here", ch)
        }
        ExprError::UnexpectedEnd { .. } => "the expression ends too early".to_string(),
        ExprError::InvalidNumber { text, .. } => format!("'{}' is not a valid number", text),
        ExprError::DivisionByZero { .. } => "division by zero".to_string(),
        ExprError::EmptyExpression => "the expression is empty".to_string(),
    }
}
