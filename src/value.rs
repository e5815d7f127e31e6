//! Values substituted into exam text
//!
//! A `Value` describes how a named string is produced: a fixed constant, a
//! uniform choice from a list, or a uniform choice from a discretized
//! range. Drawing always goes through an explicit RNG so a seeded run is
//! reproducible. A `ValueInstance` freezes one draw; the frozen string is
//! what gets substituted into templates.

use rand::Rng;

use crate::numfmt::{self, Format};

/// How a drawn element is converted before stringification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coerce {
    #[default]
    Str,
    Int,
    Float,
}

/// A named value definition
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Constant {
        name: String,
        value: String,
    },
    List {
        name: String,
        values: Vec<String>,
        coerce: Coerce,
        significant: Option<usize>,
    },
    Range {
        name: String,
        minimum: f64,
        maximum: f64,
        step: f64,
        coerce: Coerce,
        significant: Option<usize>,
    },
}

impl Value {
    pub fn name(&self) -> &str {
        match self {
            Value::Constant { name, .. } => name,
            Value::List { name, .. } => name,
            Value::Range { name, .. } => name,
        }
    }

    /// Draw a fresh string. Constants always return the same string; list
    /// and range values consume one draw from the RNG.
    ///
    /// List elements that need coercion or rounding, and range parameters,
    /// are validated numeric when the pool is compiled, so drawing itself
    /// cannot fail.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> String {
        match self {
            Value::Constant { value, .. } => value.clone(),
            Value::List {
                values,
                coerce,
                significant,
                ..
            } => {
                let picked = &values[rng.gen_range(0..values.len())];
                render(picked, *coerce, *significant)
            }
            Value::Range {
                minimum,
                maximum,
                step,
                coerce,
                significant,
                ..
            } => {
                let points = ((maximum - minimum) / step).floor() as u64 + 1;
                let index = rng.gen_range(0..points);
                let value = minimum + step * index as f64;
                render_number(value, *coerce, *significant)
            }
        }
    }

    /// Freeze one draw into an instance
    pub fn instance<R: Rng>(&self, rng: &mut R) -> ValueInstance {
        ValueInstance {
            name: self.name().to_string(),
            value: self.draw(rng),
        }
    }
}

fn render(raw: &str, coerce: Coerce, significant: Option<usize>) -> String {
    if coerce == Coerce::Str && significant.is_none() {
        return raw.to_string();
    }
    // Compile-time validation guarantees the parse; fall back to the raw
    // text so a stale value never panics mid-generation.
    match raw.parse::<f64>() {
        Ok(number) => render_number(number, coerce, significant),
        Err(_) => raw.to_string(),
    }
}

fn render_number(value: f64, coerce: Coerce, significant: Option<usize>) -> String {
    let value = match coerce {
        Coerce::Int => value.trunc(),
        _ => value,
    };
    match significant {
        Some(digits) => numfmt::apply(value, &Format::significant(digits)),
        None if coerce == Coerce::Int => format!("{}", value as i64),
        None => value.to_string(),
    }
}

/// One frozen draw of a value
#[derive(Debug, Clone)]
pub struct ValueInstance {
    name: String,
    value: String,
}

impl ValueInstance {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_constant_always_draws_the_same_string() {
        let value = Value::Constant {
            name: "GREETING".to_string(),
            value: "hello".to_string(),
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(value.draw(&mut rng), "hello");
        assert_eq!(value.draw(&mut rng), "hello");
    }

    #[test]
    fn test_list_draws_are_members() {
        let value = Value::List {
            name: "color".to_string(),
            values: vec!["red".into(), "green".into(), "blue".into()],
            coerce: Coerce::Str,
            significant: None,
        };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let drawn = value.draw(&mut rng);
            assert!(["red", "green", "blue"].contains(&drawn.as_str()));
        }
    }

    #[test]
    fn test_list_int_coercion_truncates() {
        let value = Value::List {
            name: "n".to_string(),
            values: vec!["3.7".into()],
            coerce: Coerce::Int,
            significant: None,
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(value.draw(&mut rng), "3");
    }

    #[test]
    fn test_list_significant_figures_collapse() {
        let value = Value::List {
            name: "x".to_string(),
            values: vec!["2.0".into()],
            coerce: Coerce::Float,
            significant: Some(3),
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(value.draw(&mut rng), "2");
    }

    #[test]
    fn test_range_draws_lie_on_the_grid() {
        let value = Value::Range {
            name: "r".to_string(),
            minimum: 1.0,
            maximum: 2.0,
            step: 0.5,
            coerce: Coerce::Float,
            significant: None,
        };
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..30 {
            let drawn: f64 = value.draw(&mut rng).parse().unwrap();
            assert!([1.0, 1.5, 2.0].contains(&drawn));
        }
    }

    #[test]
    fn test_range_never_overshoots_maximum() {
        let value = Value::Range {
            name: "r".to_string(),
            minimum: 0.0,
            maximum: 1.0,
            step: 0.3,
            coerce: Coerce::Float,
            significant: None,
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let drawn: f64 = value.draw(&mut rng).parse().unwrap();
            assert!(drawn <= 1.0);
        }
    }

    #[test]
    fn test_instance_is_frozen() {
        let value = Value::Range {
            name: "r".to_string(),
            minimum: 0.0,
            maximum: 100.0,
            step: 1.0,
            coerce: Coerce::Int,
            significant: None,
        };
        let mut rng = StdRng::seed_from_u64(5);
        let instance = value.instance(&mut rng);
        let first = instance.get().to_string();
        assert_eq!(instance.get(), first);
        assert_eq!(instance.name(), "r");
    }

    #[test]
    fn test_same_seed_same_stream() {
        let value = Value::Range {
            name: "r".to_string(),
            minimum: 0.0,
            maximum: 1000.0,
            step: 1.0,
            coerce: Coerce::Int,
            significant: None,
        };
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            assert_eq!(value.draw(&mut a), value.draw(&mut b));
        }
    }
}
