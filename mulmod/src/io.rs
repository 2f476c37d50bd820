//! Store and reload generated artifacts.

use std::{
    fs,
    path::{Path, PathBuf},
};

use num_bigint::BigUint;
use tracing::info;

use crate::{timing::always_timed, Artifacts, Design, Error, Result};

/// Name of the include file read by the multiplier wrapper.
pub const RTL_NAME: &str = "accum_mult_mod_generated.inc";

/// Write the include file and every memory file into `dir`, creating it if
/// needed. Returns the paths written.
pub fn store(artifacts: &Artifacts, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    always_timed("storing artifacts", || -> Result<Vec<PathBuf>> {
        let rtl = dir.join(RTL_NAME);
        fs::write(&rtl, &artifacts.rtl)?;
        let mut written = vec![rtl];

        for table in &artifacts.tables {
            let path = dir.join(table.file_name());
            fs::write(&path, &table.contents)?;
            written.push(path);
        }
        let bytes: usize =
            artifacts.rtl.len() + artifacts.tables.iter().map(|t| t.contents.len()).sum::<usize>();
        info!(files = written.len(), bytes, dir = %dir.display(), "stored");
        Ok(written)
    })
}

/// Entries of one memory file.
pub fn load_table(path: &Path) -> Result<Vec<BigUint>> {
    let text = fs::read_to_string(path)?;
    text.lines()
        .enumerate()
        .map(|(line, entry)| {
            BigUint::parse_bytes(entry.trim().as_bytes(), 16).ok_or_else(|| Error::Parse {
                file: path.display().to_string(),
                line: line + 1,
            })
        })
        .collect()
}

/// Every table of `design` from `dir`, in [`Design::all_tables`] order.
pub fn load_tables(design: &Design, dir: &Path) -> Result<Vec<Vec<BigUint>>> {
    design
        .all_tables()
        .map(|table| {
            let path = dir.join(format!("{}.mem", table.name));
            let values = load_table(&path)?;
            if values.len() != table.depth() {
                return Err(Error::TableDepth {
                    file: path.display().to_string(),
                    found: values.len(),
                    expected: table.depth(),
                });
            }
            Ok(values)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::toy_parameters;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("accum-mult-mod-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn store_and_reload() {
        let design = Design::build(toy_parameters()).unwrap();
        let dir = scratch("roundtrip");
        let written = store(&design.artifacts(), &dir).unwrap();
        assert_eq!(written.len(), 4);
        assert!(written[0].ends_with(RTL_NAME));

        let tables = load_tables(&design, &dir).unwrap();
        assert_eq!(tables, design.contents());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn malformed_tables() {
        let design = Design::build(toy_parameters()).unwrap();
        let dir = scratch("malformed");
        store(&design.artifacts(), &dir).unwrap();

        fs::write(dir.join("mod_ram_1.mem"), "0\n1\n").unwrap();
        assert!(matches!(
            load_tables(&design, &dir),
            Err(Error::TableDepth {
                found: 2,
                expected: 8,
                ..
            })
        ));

        fs::write(dir.join("mod_ram_0.mem"), "0\nzz\n").unwrap();
        assert!(matches!(
            load_table(&dir.join("mod_ram_0.mem")),
            Err(Error::Parse { line: 2, .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
