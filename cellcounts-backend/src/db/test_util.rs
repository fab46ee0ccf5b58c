use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use diesel::SqliteConnection;
use rstest::fixture;
use tempfile::NamedTempFile;

use super::{establish, load::load, reset_schema};

pub const HEADER: &str = "project,subject,condition,age,sex,treatment,response,sample,sample_type,time_from_treatment_start,b_cell,cd8_t_cell,cd4_t_cell,nk_cell,monocyte";

pub fn sample_csv_path() -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/cell-count-sample.csv")
}

/// Writes `rows` below the standard header into a temporary file.
pub fn write_csv(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();

    file
}

#[fixture]
pub fn bare_db() -> SqliteConnection {
    establish(Utf8Path::new(":memory:")).unwrap()
}

#[fixture]
pub fn empty_db(#[from(bare_db)] mut conn: SqliteConnection) -> SqliteConnection {
    reset_schema(&mut conn).unwrap();

    conn
}

#[fixture]
pub fn loaded_db(#[from(bare_db)] mut conn: SqliteConnection) -> SqliteConnection {
    load(&mut conn, &sample_csv_path()).unwrap();

    conn
}
