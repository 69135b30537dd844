use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("empty type descriptor")]
    Empty,

    #[error("unexpected character '{found}' at offset {position} in descriptor '{input}'")]
    UnexpectedChar {
        input: String,
        found: char,
        position: usize,
    },

    #[error("descriptor '{input}' ends before a complete type")]
    Truncated { input: String },

    #[error("unterminated object type in descriptor '{input}'")]
    UnterminatedObject { input: String },

    #[error("method descriptor '{input}' must start with '('")]
    MissingParameters { input: String },

    #[error("void is not a valid parameter type in '{input}'")]
    VoidParameter { input: String },

    #[error("trailing input after descriptor: '{input}'")]
    TrailingInput { input: String },
}
