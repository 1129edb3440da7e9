use kff_derive::kff_error;
use std::borrow::Cow;

#[kff_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Listener {listener} failed{}: {source}", format_context(.context))]
    Listener {
        listener: Cow<'static, str>,
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<(), DemoError> {
    Err(std::io::Error::other("boom")).context("reading config")?;
    Ok(())
}

fn main() {
    let err = read().unwrap_err();
    assert!(err.to_string().contains("reading config"));

    let internal: DemoError = "broken".into();
    assert!(matches!(internal, DemoError::Internal { .. }));
}
