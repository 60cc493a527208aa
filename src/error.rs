use thiserror::Error;

#[derive(Error, Debug)]
pub enum HisaabError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Could not infer statement structure: {0}")]
    StructuralInference(String),

    #[error("Incomplete data: {0}")]
    IncompleteData(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HisaabError>;
