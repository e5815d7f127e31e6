//! Exam model and per-copy assembly
//!
//! `Exam` is the immutable compiled description: the question pool, global
//! values, templates, question groups and version rows. Each copy is built
//! by an `ExamInstance`: layer the global context, choose and order the
//! questions, then materialize every question (draw values, resolve the
//! unique set, choose/order/label the full answer set, render) and finally
//! the document itself. Generation is strictly sequential and
//! all-or-nothing: the first error aborts the whole batch.

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::order::{order_chosen, OrderError};
use crate::pool::{choose_from_pool, Pool, PoolItem, SelectError, SelectionOrder, Selector};
use crate::retry::{self, Outcome, RetryError};
use crate::template::{expand, Context, ExpandError};
use crate::value::Value;

/// Labels assigned to answers in final order
pub const ANSWER_LABELS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Attempts to resolve a question's unique set before giving up
const UNIQUE_ATTEMPTS: usize = 100;

/// Attempts to instantiate a question whose rendered answers collide
const QUESTION_ATTEMPTS: usize = 10;

/// One multiple-choice answer in a question's pool
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub name: String,
    pub correct: bool,
    pub text: String,
    pub before: Selector,
    pub after: Selector,
    pub follows: Option<String>,
}

impl PoolItem for Answer {
    fn name(&self) -> &str {
        &self.name
    }
    fn before(&self) -> &Selector {
        &self.before
    }
    fn after(&self) -> &Selector {
        &self.after
    }
    fn follows(&self) -> Option<&str> {
        self.follows.as_deref()
    }
}

/// One question in the exam pool
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub name: String,
    pub points: i64,
    pub extra_credit: bool,
    pub index: Option<i64>,
    pub before: Selector,
    pub after: Selector,
    pub follows: Option<String>,
    /// Includes the automatic NAME/POINTS/TEXT/FIGURE/SOLUTION entries,
    /// bound after any user constants so they win on a name clash
    pub constants: Vec<Value>,
    pub variables: Vec<Value>,
    /// Named templates whose expansions must be pairwise distinct
    pub unique: Vec<(String, String)>,
    pub answers: Pool<Answer>,
}

impl PoolItem for Question {
    fn name(&self) -> &str {
        &self.name
    }
    fn before(&self) -> &Selector {
        &self.before
    }
    fn after(&self) -> &Selector {
        &self.after
    }
    fn follows(&self) -> Option<&str> {
        self.follows.as_deref()
    }
}

/// One entry in the exam's question sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: Option<String>,
    pub choose: Option<usize>,
    pub choices: Selector,
}

/// Document, question and answer templates plus named free-text sections
#[derive(Debug, Clone, PartialEq)]
pub struct Templates {
    pub document: String,
    pub question: String,
    pub question_with_figure: Option<String>,
    pub answer: String,
    pub sections: Vec<(String, String)>,
}

/// The compiled, immutable exam description
#[derive(Debug, Clone, PartialEq)]
pub struct Exam {
    pub title: String,
    pub base_name: String,
    pub(crate) constants: Vec<Value>,
    pub(crate) variables: Vec<Value>,
    pub(crate) pool: Pool<Question>,
    pub(crate) groups: Vec<Group>,
    pub(crate) versions: Vec<Vec<(String, String)>>,
    pub(crate) templates: Templates,
}

/// Knobs for a generation run
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// `Declared` is the include-all debugging mode: every selectable
    /// question, no shuffling, no count limits
    pub order: SelectionOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Template expansion failed; `context` names the question, answer or
    /// document being rendered
    Template {
        context: String,
        source: ExpandError,
    },
    Selection(SelectError),
    Ordering(OrderError),
    /// The unique set still collided after every attempt
    UniqueExhausted {
        question: String,
        values: Vec<(String, String)>,
    },
    /// Re-instantiation never cleared a wrong-answer duplicate class
    AnswersExhausted {
        question: String,
        duplicates: Vec<String>,
    },
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Template { context, source } => {
                write!(f, "While rendering {}: {}", context, source)
            }
            BuildError::Selection(e) => write!(f, "{}", e),
            BuildError::Ordering(e) => write!(f, "{}", e),
            BuildError::UniqueExhausted { question, values } => {
                write!(
                    f,
                    "Cannot find a unique value set for question '{}' (last attempt:",
                    question
                )?;
                for (name, value) in values {
                    write!(f, " {}={}", name, value)?;
                }
                write!(f, ")")
            }
            BuildError::AnswersExhausted {
                question,
                duplicates,
            } => {
                write!(
                    f,
                    "Question '{}' keeps rendering duplicate wrong answers: {}",
                    question,
                    duplicates.join(" | ")
                )
            }
        }
    }
}

impl std::error::Error for BuildError {}

impl From<SelectError> for BuildError {
    fn from(e: SelectError) -> Self {
        BuildError::Selection(e)
    }
}

impl From<OrderError> for BuildError {
    fn from(e: OrderError) -> Self {
        BuildError::Ordering(e)
    }
}

impl Exam {
    /// Generate every copy described by the version rows. Copies are built
    /// sequentially from the shared RNG; the first failure aborts the
    /// batch with nothing emitted.
    pub fn generate<R: Rng>(
        &self,
        options: &GenerateOptions,
        rng: &mut R,
    ) -> Result<Vec<ExamInstance>, BuildError> {
        let mut instances = Vec::new();
        for (i, version) in self.versions.iter().enumerate() {
            instances.push(ExamInstance::build(self, version, i as u32 + 1, options, rng)?);
        }
        Ok(instances)
    }
}

/// One generated copy of the exam
#[derive(Debug, Clone)]
pub struct ExamInstance {
    pub copy: u32,
    /// Basename of the copy, `<base>-<copy zero-padded to 4>`
    pub name: String,
    pub version: Vec<(String, String)>,
    pub questions: Vec<QuestionInstance>,
    document: String,
}

impl ExamInstance {
    fn build<R: Rng>(
        exam: &Exam,
        version: &[(String, String)],
        copy: u32,
        options: &GenerateOptions,
        rng: &mut R,
    ) -> Result<Self, BuildError> {
        // Global layer: section templates, then drawn constants and
        // variables, then the version fields. Version fields come last so
        // they override same-named globals.
        let mut globals = Context::new();
        for (name, text) in &exam.templates.sections {
            globals.bind(name, text);
        }
        for value in exam.constants.iter().chain(exam.variables.iter()) {
            let instance = value.instance(rng);
            globals.bind(instance.name(), instance.get());
        }
        for (name, value) in version {
            globals.bind(name, value);
        }
        globals.bind("TITLE", &exam.title);
        globals.bind("COPY", copy.to_string());

        let mut chosen = Vec::new();
        for group in &exam.groups {
            let limit = match options.order {
                SelectionOrder::Declared => usize::MAX,
                SelectionOrder::Shuffled => group.choose.unwrap_or(usize::MAX),
            };
            chosen.extend(choose_from_pool(
                &exam.pool,
                &group.choices,
                limit,
                options.order,
                rng,
            )?);
        }
        if options.order == SelectionOrder::Declared {
            // Explicitly indexed questions sort first; ties keep
            // declaration order.
            chosen.sort_by_key(|name| {
                exam.pool
                    .get(name)
                    .and_then(|q| q.index)
                    .unwrap_or(i64::MAX)
            });
        }
        let ordered = order_chosen(chosen, &exam.pool, options.order, rng)?;
        info!(copy, questions = %ordered.join(" "), "selected questions");

        let mut questions = Vec::new();
        for (i, name) in ordered.iter().enumerate() {
            let question = exam.pool.get(name).expect("ordered names come from the pool");
            let built = retry::with_attempts(QUESTION_ATTEMPTS, |_| {
                QuestionInstance::build(exam, question, i + 1, &globals, options.order, rng)
            });
            match built {
                Ok(instance) => questions.push(instance),
                Err(RetryError::Failed(e)) => return Err(e),
                Err(RetryError::Exhausted { attempts, last }) => {
                    error!(
                        question = %question.name,
                        attempts,
                        "no instantiation without duplicate wrong answers"
                    );
                    return Err(BuildError::AnswersExhausted {
                        question: question.name.clone(),
                        duplicates: last,
                    });
                }
            }
        }

        let mut rendered = String::new();
        for question in &questions {
            rendered.push_str(&question.rendered);
        }
        let mut ctx = globals.child();
        ctx.bind("QUESTIONS", rendered);
        let document = expand(&exam.templates.document, &ctx).map_err(|source| {
            BuildError::Template {
                context: "the document template".to_string(),
                source,
            }
        })?;

        Ok(ExamInstance {
            copy,
            name: format!("{}-{:04}", exam.base_name, copy),
            version: version.to_vec(),
            questions,
            document,
        })
    }

    /// The fully rendered document for this copy
    pub fn document(&self) -> &str {
        &self.document
    }

    /// The answer-key record for this copy
    pub fn key_record(&self) -> KeyRecord {
        let correct_answers = self
            .questions
            .iter()
            .map(|q| q.correct.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let question_names = self
            .questions
            .iter()
            .map(|q| q.name.as_str())
            .collect::<Vec<_>>()
            .join(";");
        KeyRecord {
            copy: self.copy,
            question_count: self.questions.len(),
            correct_answers,
            basename: self.name.clone(),
            question_names,
            version: self.version.clone(),
        }
    }
}

/// One materialized question inside a copy
#[derive(Debug, Clone)]
pub struct QuestionInstance {
    pub name: String,
    /// 1-based position in the copy
    pub number: usize,
    /// Correct labels in final answer order. Upper-case means the response
    /// must match exactly; lower-case (the duplicate-answer repair) means
    /// any one of the letters grades as correct.
    pub correct: String,
    pub answers: Vec<AnswerInstance>,
    pub(crate) rendered: String,
}

impl QuestionInstance {
    /// One instantiation attempt. `Reject` means the rendered answers
    /// contained a duplicate class with no correct member, which a fresh
    /// set of draws may fix; real errors fail outright.
    fn build<R: Rng>(
        exam: &Exam,
        question: &Question,
        number: usize,
        globals: &Context,
        order: SelectionOrder,
        rng: &mut R,
    ) -> Result<Outcome<QuestionInstance, Vec<String>>, BuildError> {
        let mut ctx = globals.child();
        draw_locals(question, &mut ctx, rng);
        resolve_unique(question, &mut ctx, rng)?;

        // The answer criterion is always "everything": a rendered question
        // carries its whole answer set.
        let chosen = choose_from_pool(&question.answers, &Selector::All, usize::MAX, order, rng)?;
        let ordered = order_chosen(chosen, &question.answers, order, rng)?;

        let mut correct = String::new();
        let mut answers = Vec::new();
        for (i, answer_name) in ordered.iter().enumerate() {
            let answer = question
                .answers
                .get(answer_name)
                .expect("ordered names come from the pool");
            let label = ANSWER_LABELS.as_bytes()[i] as char;
            if answer.correct {
                correct.push(label);
            }

            let mut actx = ctx.child();
            actx.bind("ITEM", label.to_string());
            actx.bind("TEXT", &answer.text);
            actx.bind("CORRECT", if answer.correct { "Correct" } else { "Wrong" });
            let text = expand(&answer.text, &actx).map_err(|source| BuildError::Template {
                context: format!("answer '{}' of question '{}'", answer.name, question.name),
                source,
            })?;
            let block = format!(
                "%% Start answer {}\n{}\n%% Finish answer {}\n",
                answer.name, exam.templates.answer, answer.name
            );
            let rendered = expand(&block, &actx).map_err(|source| BuildError::Template {
                context: format!("answer '{}' of question '{}'", answer.name, question.name),
                source,
            })?;
            answers.push(AnswerInstance {
                name: answer.name.clone(),
                label,
                correct: answer.correct,
                text,
                rendered,
            });
        }

        match repair_duplicates(&question.name, &mut answers, &mut correct) {
            DuplicateCheck::Ok => {}
            DuplicateCheck::WrongOnly(texts) => {
                debug!(
                    question = %question.name,
                    "duplicate wrong answers, re-instantiating"
                );
                return Ok(Outcome::Reject(texts));
            }
        }

        let mut answers_text = String::new();
        for answer in &answers {
            answers_text.push_str(&answer.rendered);
        }
        ctx.bind("ANSWERS", answers_text);
        ctx.bind("NUMBER", number.to_string());

        let template = if ctx.get("FIGURE").is_some() {
            exam.templates
                .question_with_figure
                .as_deref()
                .unwrap_or_else(|| exam.templates.question.as_str())
        } else {
            exam.templates.question.as_str()
        };
        let block = format!(
            "%% Start Question {}\n{}\n%% Finish Question {}\n",
            question.name, template, question.name
        );
        let rendered = expand(&block, &ctx).map_err(|source| BuildError::Template {
            context: format!("question '{}'", question.name),
            source,
        })?;

        Ok(Outcome::Accept(QuestionInstance {
            name: question.name.clone(),
            number,
            correct,
            answers,
            rendered,
        }))
    }
}

/// One rendered answer inside a question instance
#[derive(Debug, Clone)]
pub struct AnswerInstance {
    pub name: String,
    pub label: char,
    pub correct: bool,
    /// The expanded answer text (used for duplicate detection)
    pub text: String,
    pub(crate) rendered: String,
}

/// Bind fresh draws of the question's constants and variables
fn draw_locals<R: Rng>(question: &Question, ctx: &mut Context, rng: &mut R) {
    for value in question.constants.iter().chain(question.variables.iter()) {
        let instance = value.instance(rng);
        ctx.bind(instance.name(), instance.get());
    }
}

/// Resolve the question's unique set: expand every entry, and while any
/// two expansions collide redraw all of the question's values and try
/// again. Success binds the resolved strings as constants.
fn resolve_unique<R: Rng>(
    question: &Question,
    ctx: &mut Context,
    rng: &mut R,
) -> Result<(), BuildError> {
    if question.unique.is_empty() {
        return Ok(());
    }
    let resolved = retry::with_attempts(UNIQUE_ATTEMPTS, |attempt| {
        if attempt > 0 {
            draw_locals(question, ctx, rng);
        }
        let mut resolved = Vec::new();
        let mut distinct = true;
        for (name, template) in &question.unique {
            let value = expand(template, ctx).map_err(|source| BuildError::Template {
                context: format!("unique value '{}' of question '{}'", name, question.name),
                source,
            })?;
            if resolved.iter().any(|(_, v): &(String, String)| *v == value) {
                distinct = false;
            }
            resolved.push((name.clone(), value));
        }
        if distinct {
            Ok(Outcome::Accept(resolved))
        } else {
            Ok(Outcome::Reject(resolved))
        }
    });
    match resolved {
        Ok(resolved) => {
            for (name, value) in resolved {
                ctx.bind(name, value);
            }
            Ok(())
        }
        Err(RetryError::Failed(e)) => Err(e),
        Err(RetryError::Exhausted { attempts, last }) => {
            error!(question = %question.name, attempts, "unique value set never resolved");
            Err(BuildError::UniqueExhausted {
                question: question.name.clone(),
                values: last,
            })
        }
    }
}

enum DuplicateCheck {
    Ok,
    /// Expanded texts of duplicate classes containing no correct answer
    WrongOnly(Vec<String>),
}

/// Detect answers rendering identical text. A class containing a correct
/// label makes every label in the class correct and case-folds the
/// question's correct string into its "any-of" form; a class with no
/// correct label asks for re-instantiation.
fn repair_duplicates(
    question: &str,
    answers: &mut [AnswerInstance],
    correct: &mut String,
) -> DuplicateCheck {
    let mut wrong_only = Vec::new();
    let mut repaired = false;

    let mut seen: Vec<usize> = Vec::new();
    for i in 0..answers.len() {
        if seen.contains(&i) {
            continue;
        }
        let mut class = vec![i];
        for j in i + 1..answers.len() {
            if answers[j].text == answers[i].text {
                class.push(j);
                seen.push(j);
            }
        }
        if class.len() < 2 {
            continue;
        }
        if class.iter().any(|&k| answers[k].correct) {
            for &k in &class {
                if !answers[k].correct {
                    warn!(
                        question,
                        answer = %answers[k].name,
                        label = %answers[k].label,
                        "duplicate of a correct answer, marking correct"
                    );
                    answers[k].correct = true;
                    correct.push(answers[k].label);
                }
            }
            repaired = true;
        } else {
            wrong_only.push(answers[i].text.clone());
        }
    }

    if !wrong_only.is_empty() {
        return DuplicateCheck::WrongOnly(wrong_only);
    }
    if repaired && correct.len() > 1 {
        // Lower-case is the grading contract's "any one of these letters"
        // signal.
        *correct = correct.to_lowercase();
    }
    DuplicateCheck::Ok
}

/// One answer-key row. The grading contract rides in `correct_answers`:
/// an upper-case entry requires an exact response, a lower-case entry
/// accepts any one of its letters.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
    pub copy: u32,
    pub question_count: usize,
    /// Semicolon-joined per-question correct strings
    pub correct_answers: String,
    pub basename: String,
    /// Semicolon-joined per-question names
    pub question_names: String,
    pub version: Vec<(String, String)>,
}

impl KeyRecord {
    /// The CSV header matching this record's version fields
    pub fn header(&self) -> String {
        let mut line =
            String::from("\"Copy\",\"Questions\",\"Answers\",\"Basename\",\"QuestionNames\"");
        for (field, _) in &self.version {
            line.push_str(",\"");
            line.push_str(field);
            line.push('"');
        }
        line.push('\n');
        line
    }

    /// One CSV data line
    pub fn line(&self) -> String {
        let mut line = format!(
            "{},{},\"{}\",\"{}\",\"{}\"",
            self.copy, self.question_count, self.correct_answers, self.basename, self.question_names
        );
        for (_, value) in &self.version {
            line.push_str(",\"");
            line.push_str(value);
            line.push('"');
        }
        line.push('\n');
        line
    }
}

/// Render the whole answer key: one header line, one line per copy
pub fn key_table(instances: &[ExamInstance]) -> String {
    let mut out = String::new();
    if let Some(first) = instances.first() {
        out.push_str(&first.key_record().header());
    }
    for instance in instances {
        out.push_str(&instance.key_record().line());
    }
    out
}
