use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),
}
