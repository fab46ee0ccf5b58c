use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Response {
    Yes,
    No,
}

impl Response {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Yes => "Responder",
            Self::No => "Non-Responder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub subject_id: String,
    pub project_id: String,
    pub condition: String,
    pub age: i32,
    pub sex: String,
    pub treatment: Option<String>,
    pub response: Option<String>,
}

/// Untreated subjects are recorded either without a treatment or with the
/// literal `none`.
pub(crate) fn is_treated(treatment: Option<&str>) -> bool {
    treatment.is_some_and(|t| !t.trim().is_empty() && !t.eq_ignore_ascii_case("none"))
}

/// Human readable label for the sex codes used in the dataset.
#[must_use]
pub fn sex_label(sex: &str) -> &str {
    match sex {
        "M" | "m" => "Male",
        "F" | "f" => "Female",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::{Response, is_treated, sex_label};

    #[test]
    fn response_parses_dataset_labels() {
        assert_eq!(Response::from_str("yes").unwrap(), Response::Yes);
        assert_eq!(Response::from_str("No").unwrap(), Response::No);
        assert!(Response::from_str("").is_err());
    }

    #[test]
    fn untreated_subjects() {
        assert!(is_treated(Some("miraclib")));
        assert!(!is_treated(Some("none")));
        assert!(!is_treated(None));
    }

    #[test]
    fn sex_labels() {
        assert_eq!(sex_label("M"), "Male");
        assert_eq!(sex_label("F"), "Female");
        assert_eq!(sex_label("X"), "X");
    }
}
