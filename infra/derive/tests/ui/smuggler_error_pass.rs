use smuggler_derive::smuggler_error;
use std::borrow::Cow;

#[smuggler_error]
pub enum DemoError {
    #[validation]
    #[error("Invalid input{}: {message}", format_context(.context))]
    Invalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn main() {
    let err = DemoError::Invalid { message: "x".into(), context: None };
    assert!(err.is_validation());
}
