use std::fmt::Display;

/// GermEval 2014 NER, in the two-column CoNLL form
pub static GERMEVAL14: &str = "germeval14";

/// CoNLL 2003 NER
pub static CONLL03: &str = "conll03";

/// The Dataset enum
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum Dataset {
    /// GermEval 2014
    #[default]
    GermEval14,

    /// CoNLL 2003
    Conll03,
}

impl Dataset {
    /// The directory name under the data root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Dataset::GermEval14 => GERMEVAL14,
            Dataset::Conll03 => CONLL03,
        }
    }

    /// The field delimiter of the dataset files
    pub fn delimiter(&self) -> &'static str {
        match self {
            Dataset::GermEval14 | Dataset::Conll03 => " ",
        }
    }
}

impl TryFrom<&str> for Dataset {
    type Error = DatasetError;

    /// Try to convert a string to a Dataset
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.to_lowercase();

        if value == GERMEVAL14 {
            Ok(Dataset::GermEval14)
        } else if value == CONLL03 {
            Ok(Dataset::Conll03)
        } else {
            Err(Self::Error::Unknown(value))
        }
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Dataset Error
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    /// No dataset found for the given string
    #[error("no dataset found for {0}")]
    Unknown(String),
}
