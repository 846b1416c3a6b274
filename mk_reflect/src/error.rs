use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("annotation does not start with 'mk::': {0:?}")] MissingPrefix(String),
    #[error("expected annotation name at byte {0}")] MissingName(usize),
    #[error("expected argument name at byte {0}")] MissingKey(usize),
    #[error("expected '=' after '{key}' at byte {at}")] MissingEquals { key: String, at: usize },
    #[error("unterminated string value starting at byte {0}")] UnterminatedString(usize),
    #[error("unterminated argument list, expected ')'")] UnterminatedArgs,
    #[error("unexpected trailing input at byte {0}")] TrailingInput(usize),
    #[error("duplicate argument '{0}'")] DuplicateKey(String),
    #[error("missing required argument '{key}' in {annotation}")] MissingArg { key: String, annotation: String },
    #[error("argument '{key}' = '{value}' is not an unsigned integer")] NotAnInteger { key: String, value: String },
    #[error("unknown vertex format '{0}'")] UnknownFormat(String),
    #[error("unknown resource kind '{0}'")] UnknownResourceKind(String),
    #[error("unknown shader stage '{0}'")] UnknownStage(String),
    #[error("expected a '{expected}' annotation, got {got}")] WrongKind { expected: &'static str, got: String },
}

#[derive(Debug, Error)]
pub enum ReflectError {
    #[error("{location}: {source}")]
    Annotation { location: String, #[source] source: AnnotationError },
    #[error("{location}: unknown C type '{type_name}'")]
    UnknownType { location: String, type_name: String },
    #[error("{location}: format '{format}' is {format_size} bytes but the field type '{type_name}' is {type_size} bytes")]
    FormatSizeMismatch { location: String, format: String, format_size: u32, type_name: String, type_size: u32 },
    #[error("{location}: duplicate (binding, location) ({binding}, {loc}), first used by field '{first}'")]
    DuplicateLocation { location: String, binding: u32, loc: u32, first: String },
    #[error("duplicate (set, binding) ({set}, {binding}) on {second}, first used by {first}")]
    DuplicateBinding { set: u32, binding: u32, first: String, second: String },
    #[error("{location}: record layout exceeds u32::MAX bytes")]
    LayoutOverflow { location: String },
    #[error("{location}: more than one '{kind}' annotation")]
    DuplicateAnnotation { location: String, kind: &'static str },
    #[error("{0} error(s) during reflection:\n{1}")]
    Many(usize, String),
}

impl ReflectError {
    /// Fold a list of errors into one; `None` when the list is empty.
    pub fn combine(mut errors: Vec<ReflectError>) -> Option<ReflectError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            n => {
                let text = errors.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n");
                Some(ReflectError::Many(n, text))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ClangExecError {
    #[error("clang not found or failed to execute: {0}")] Exec(String),
    #[error("clang returned non-zero status: {0}")] Status(String),
    #[error("invalid JSON from clang: {0}")] Json(String),
    #[error("cannot read {path}: {source}")] Io { path: String, #[source] source: std::io::Error },
}
