use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantArray};

/// The immune cell populations counted for every sample, in source column order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    VariantArray,
)]
pub enum Population {
    #[serde(rename = "b_cell")]
    #[strum(serialize = "b_cell")]
    BCell,
    #[serde(rename = "cd8_t_cell")]
    #[strum(serialize = "cd8_t_cell")]
    Cd8TCell,
    #[serde(rename = "cd4_t_cell")]
    #[strum(serialize = "cd4_t_cell")]
    Cd4TCell,
    #[serde(rename = "nk_cell")]
    #[strum(serialize = "nk_cell")]
    NkCell,
    #[serde(rename = "monocyte")]
    #[strum(serialize = "monocyte")]
    Monocyte,
}

impl Population {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::BCell => "B Cell",
            Self::Cd8TCell => "CD8 T Cell",
            Self::Cd4TCell => "CD4 T Cell",
            Self::NkCell => "NK Cell",
            Self::Monocyte => "Monocyte",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use strum::VariantArray;

    use super::Population;

    #[rstest]
    #[case("b_cell", Population::BCell)]
    #[case("cd8_t_cell", Population::Cd8TCell)]
    #[case("cd4_t_cell", Population::Cd4TCell)]
    #[case("nk_cell", Population::NkCell)]
    #[case("monocyte", Population::Monocyte)]
    fn column_names_agree(#[case] column: &str, #[case] population: Population) {
        assert_eq!(Population::from_str(column).unwrap(), population);
        assert_eq!(population.to_string(), column);
        assert_eq!(
            serde_json::to_string(&population).unwrap(),
            format!("\"{column}\"")
        );
    }

    #[test]
    fn variants_keep_source_order() {
        let columns: Vec<_> = Population::VARIANTS
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            columns,
            ["b_cell", "cd8_t_cell", "cd4_t_cell", "nk_cell", "monocyte"]
        );
    }
}
