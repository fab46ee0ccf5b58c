pub mod cohort;
pub mod population;
pub mod sample;
pub mod subject;

pub use cohort::Cohort;
pub use population::Population;
pub use sample::{CellCounts, Sample};
pub use subject::{Response, Subject, sex_label};
