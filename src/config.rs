//! Input records and compilation
//!
//! The crate does not read files: an external loader parses whatever
//! format it likes into these `serde` records (every struct rejects
//! unknown fields) and hands them to [`compile`], which validates shapes
//! once and produces the immutable [`Exam`]. Anything malformed (a
//! duplicate name, an empty answer set, a bad regex, a `follows` naming a
//! missing item, a question no draw could ever answer) aborts here, before
//! any generation starts.

use serde::Deserialize;

use crate::exam::{Answer, Exam, Group, Question, Templates};
use crate::pool::{compile_pattern, Pool, SelectError, Selector};
use crate::value::{Coerce, Value};

/// Default solution text bound when a question declares none
const NO_SOLUTION: &str = "There is no solution.";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct ExamDef {
    pub title: String,
    pub base_name: String,
    #[serde(default)]
    pub constants: Vec<(String, String)>,
    #[serde(default)]
    pub variables: Vec<(String, VariableDef)>,
    pub questions: Vec<QuestionDef>,
    pub groups: Vec<GroupDef>,
    pub versions: VersionsDef,
    pub templates: TemplatesDef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct QuestionDef {
    pub name: String,
    #[serde(default = "default_points")]
    pub points: i64,
    #[serde(default)]
    pub extra_credit: bool,
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub before: Option<SelectorDef>,
    #[serde(default)]
    pub after: Option<SelectorDef>,
    #[serde(default)]
    pub follows: Option<String>,
    #[serde(default)]
    pub constants: Vec<(String, String)>,
    #[serde(default)]
    pub variables: Vec<(String, VariableDef)>,
    #[serde(default)]
    pub unique: Vec<(String, String)>,
    pub answers: Vec<AnswerDef>,
    pub text: String,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub figure: Option<String>,
}

fn default_points() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct AnswerDef {
    pub name: String,
    pub correct: bool,
    pub text: String,
    #[serde(default)]
    pub before: Option<SelectorDef>,
    #[serde(default)]
    pub after: Option<SelectorDef>,
    #[serde(default)]
    pub follows: Option<String>,
}

/// A selection criterion as it appears in records: the string `"all"`, a
/// single anchored regex, or a list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SelectorDef {
    One(String),
    Many(Vec<String>),
}

/// A random value: a list of choices or a discretized range
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariableDef {
    List(ListDef),
    Range(RangeDef),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct ListDef {
    pub values: Vec<String>,
    #[serde(default)]
    pub r#type: Option<CoerceDef>,
    #[serde(default)]
    pub significant: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct RangeDef {
    pub minimum: f64,
    pub maximum: f64,
    pub step: f64,
    #[serde(default)]
    pub r#type: Option<CoerceDef>,
    #[serde(default)]
    pub significant: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoerceDef {
    Str,
    Int,
    Float,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct GroupDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub choose: Option<usize>,
    pub choices: SelectorDef,
}

/// Per-copy substitution rows. Field names containing "dummy" (any case)
/// are dropped; defaults fill fields a row leaves unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct VersionsDef {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub defaults: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct TemplatesDef {
    pub document: String,
    pub question: String,
    #[serde(default)]
    pub question_with_figure: Option<String>,
    pub answer: String,
    #[serde(default)]
    pub sections: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    DuplicateQuestion { name: String },
    DuplicateAnswer { question: String, name: String },
    NoAnswers { question: String },
    NoCorrectAnswer { question: String },
    TooManyAnswers { question: String, count: usize },
    BadFollow { item: String, target: String },
    BadPattern { pattern: String, message: String },
    NonNumericValue { name: String, value: String },
    BadRange { name: String, message: String },
    EmptyValueList { name: String },
    MissingFigureTemplate { question: String },
    NoVersions,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::DuplicateQuestion { name } => {
                write!(f, "Duplicate question name: {}", name)
            }
            ConfigError::DuplicateAnswer { question, name } => {
                write!(f, "Duplicate answer name '{}' in question '{}'", name, question)
            }
            ConfigError::NoAnswers { question } => {
                write!(f, "Question '{}' has no answers", question)
            }
            ConfigError::NoCorrectAnswer { question } => {
                write!(f, "Question '{}' has no correct answer", question)
            }
            ConfigError::TooManyAnswers { question, count } => {
                write!(
                    f,
                    "Question '{}' has {} answers; labels run out at 26",
                    question, count
                )
            }
            ConfigError::BadFollow { item, target } => {
                write!(f, "'{}' follows '{}', which does not name another item", item, target)
            }
            ConfigError::BadPattern { pattern, message } => {
                write!(f, "Invalid selection pattern '{}': {}", pattern, message)
            }
            ConfigError::NonNumericValue { name, value } => {
                write!(
                    f,
                    "Value '{}' needs numeric entries but contains '{}'",
                    name, value
                )
            }
            ConfigError::BadRange { name, message } => {
                write!(f, "Invalid range for value '{}': {}", name, message)
            }
            ConfigError::EmptyValueList { name } => {
                write!(f, "Value '{}' has an empty choice list", name)
            }
            ConfigError::MissingFigureTemplate { question } => {
                write!(
                    f,
                    "Question '{}' has a figure but no figure template is defined",
                    question
                )
            }
            ConfigError::NoVersions => write!(f, "No version rows; nothing to generate"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<SelectError> for ConfigError {
    fn from(e: SelectError) -> Self {
        match e {
            SelectError::InvalidPattern { pattern, message } => {
                ConfigError::BadPattern { pattern, message }
            }
            SelectError::DuplicateName { name } => ConfigError::DuplicateQuestion { name },
            SelectError::FollowCycle { name } => ConfigError::BadFollow {
                item: name.clone(),
                target: name,
            },
        }
    }
}

/// Validate the records and build the immutable exam
pub fn compile(def: ExamDef) -> Result<Exam, ConfigError> {
    let constants = make_constants(&def.constants);
    let variables = make_variables(&def.variables)?;

    let mut pool = Pool::new();
    for question_def in def.questions {
        if question_def.figure.is_some() && def.templates.question_with_figure.is_none() {
            return Err(ConfigError::MissingFigureTemplate {
                question: question_def.name.clone(),
            });
        }
        let question = compile_question(question_def)?;
        pool.insert(question)?;
    }
    validate_follows(&pool)?;

    let mut groups = Vec::new();
    for group_def in def.groups {
        let choices = selector(Some(group_def.choices));
        validate_selector(&choices)?;
        groups.push(Group {
            name: group_def.name,
            choose: group_def.choose,
            choices,
        });
    }

    Ok(Exam {
        title: def.title,
        base_name: def.base_name,
        constants,
        variables,
        pool,
        groups,
        versions: resolve_versions(def.versions)?,
        templates: Templates {
            document: def.templates.document,
            question: def.templates.question,
            question_with_figure: def.templates.question_with_figure,
            answer: def.templates.answer,
            sections: def.templates.sections,
        },
    })
}

fn compile_question(def: QuestionDef) -> Result<Question, ConfigError> {
    let question_name = def.name.clone();

    let mut answers = Pool::new();
    let mut any_correct = false;
    let count = def.answers.len();
    if count == 0 {
        return Err(ConfigError::NoAnswers {
            question: question_name,
        });
    }
    if count > 26 {
        return Err(ConfigError::TooManyAnswers {
            question: question_name,
            count,
        });
    }
    for answer_def in def.answers {
        any_correct |= answer_def.correct;
        let before = selector(answer_def.before);
        let after = selector(answer_def.after);
        validate_selector(&before)?;
        validate_selector(&after)?;
        let answer = Answer {
            name: answer_def.name.clone(),
            correct: answer_def.correct,
            text: answer_def.text,
            before,
            after,
            follows: answer_def.follows,
        };
        answers.insert(answer).map_err(|e| match e {
            SelectError::DuplicateName { name } => ConfigError::DuplicateAnswer {
                question: question_name.clone(),
                name,
            },
            other => other.into(),
        })?;
    }
    if !any_correct {
        return Err(ConfigError::NoCorrectAnswer {
            question: question_name,
        });
    }
    validate_follows(&answers)?;

    // The automatic entries come after user constants so they win a clash.
    let mut constants = make_constants(&def.constants);
    constants.push(constant("NAME", &def.name));
    constants.push(constant("POINTS", def.points.to_string()));
    constants.push(constant("TEXT", &def.text));
    if let Some(figure) = &def.figure {
        constants.push(constant("FIGURE", figure));
    }
    constants.push(constant(
        "SOLUTION",
        def.solution.as_deref().unwrap_or(NO_SOLUTION),
    ));

    let before = selector(def.before);
    let after = selector(def.after);
    validate_selector(&before)?;
    validate_selector(&after)?;

    Ok(Question {
        name: def.name,
        points: def.points,
        extra_credit: def.extra_credit,
        index: def.index,
        before,
        after,
        follows: def.follows,
        constants,
        variables: make_variables(&def.variables)?,
        unique: def.unique,
        answers,
    })
}

fn constant(name: &str, value: impl Into<String>) -> Value {
    Value::Constant {
        name: name.to_string(),
        value: value.into(),
    }
}

fn make_constants(defs: &[(String, String)]) -> Vec<Value> {
    defs.iter()
        .map(|(name, value)| constant(name, value))
        .collect()
}

fn make_variables(defs: &[(String, VariableDef)]) -> Result<Vec<Value>, ConfigError> {
    let mut out = Vec::new();
    for (name, def) in defs {
        match def {
            VariableDef::List(list) => {
                if list.values.is_empty() {
                    return Err(ConfigError::EmptyValueList { name: name.clone() });
                }
                let coerce = coerce(list.r#type);
                if coerce != Coerce::Str || list.significant.is_some() {
                    for value in &list.values {
                        if value.parse::<f64>().is_err() {
                            return Err(ConfigError::NonNumericValue {
                                name: name.clone(),
                                value: value.clone(),
                            });
                        }
                    }
                }
                out.push(Value::List {
                    name: name.clone(),
                    values: list.values.clone(),
                    coerce,
                    significant: list.significant,
                });
            }
            VariableDef::Range(range) => {
                if !(range.step > 0.0) {
                    return Err(ConfigError::BadRange {
                        name: name.clone(),
                        message: "step must be positive".to_string(),
                    });
                }
                if range.maximum < range.minimum {
                    return Err(ConfigError::BadRange {
                        name: name.clone(),
                        message: "maximum is below minimum".to_string(),
                    });
                }
                out.push(Value::Range {
                    name: name.clone(),
                    minimum: range.minimum,
                    maximum: range.maximum,
                    step: range.step,
                    coerce: coerce(range.r#type),
                    significant: range.significant,
                });
            }
        }
    }
    Ok(out)
}

fn coerce(def: Option<CoerceDef>) -> Coerce {
    match def {
        None | Some(CoerceDef::Str) => Coerce::Str,
        Some(CoerceDef::Int) => Coerce::Int,
        Some(CoerceDef::Float) => Coerce::Float,
    }
}

fn selector(def: Option<SelectorDef>) -> Selector {
    match def {
        None => Selector::None,
        Some(SelectorDef::One(s)) if s == "all" => Selector::All,
        Some(SelectorDef::One(s)) => Selector::Pattern(s),
        Some(SelectorDef::Many(list)) => Selector::Patterns(list),
    }
}

fn validate_selector(selector: &Selector) -> Result<(), ConfigError> {
    match selector {
        Selector::Pattern(pattern) => {
            compile_pattern(pattern)?;
        }
        Selector::Patterns(patterns) => {
            for pattern in patterns {
                compile_pattern(pattern)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Every `follows` must name a different, existing item in its pool
fn validate_follows<T: crate::pool::PoolItem>(pool: &Pool<T>) -> Result<(), ConfigError> {
    for item in pool.iter() {
        if let Some(target) = item.follows() {
            if target == item.name() || !pool.contains(target) {
                return Err(ConfigError::BadFollow {
                    item: item.name().to_string(),
                    target: target.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn resolve_versions(def: VersionsDef) -> Result<Vec<Vec<(String, String)>>, ConfigError> {
    let mut out = Vec::new();
    for row in &def.rows {
        let mut fields = Vec::new();
        for (field, value) in def.fields.iter().zip(row.iter()) {
            if field.to_lowercase().contains("dummy") {
                continue;
            }
            fields.push((field.clone(), value.clone()));
        }
        for (name, value) in &def.defaults {
            if !fields.iter().any(|(f, _)| f == name) {
                fields.push((name.clone(), value.clone()));
            }
        }
        out.push(fields);
    }
    if out.is_empty() {
        return Err(ConfigError::NoVersions);
    }
    Ok(out)
}
