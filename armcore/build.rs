use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Builds the test suite.
/// A test is generated for each `.prog` file in the `test` subdirectory.
fn main() {
    println!("cargo::rerun-if-changed=test/");

    let out_dir = std::env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("tests.rs");
    let mut file = BufWriter::new(File::create(dest_path).unwrap());

    let root = Path::new(&std::env::var_os("CARGO_MANIFEST_DIR").unwrap()).join("test");
    traverse(&mut file, &root);

    file.flush().unwrap();
}

fn traverse(file: &mut impl std::io::Write, path: &Path) {
    let mut entries = std::fs::read_dir(path)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect::<Vec<PathBuf>>();
    entries.sort();
    for entry in entries {
        let name = entry.file_stem().unwrap().to_string_lossy().into_owned();
        if entry.is_dir() {
            writeln!(file, "mod {name} {{").unwrap();
            traverse(file, &entry);
            writeln!(file, "}}").unwrap();
        } else if entry.extension().is_some_and(|ext| ext == "prog") {
            writeln!(file, "#[test]").unwrap();
            writeln!(
                file,
                "fn {name}() -> Result<(), crate::test::TestError> {{"
            )
            .unwrap();
            writeln!(file, "let src = std::fs::read_to_string({entry:?}).map_err(|x| crate::test::TestError::FileError(x.to_string()))?;").unwrap();
            writeln!(file, "crate::test::test(&src)").unwrap();
            writeln!(file, "}}").unwrap();
            writeln!(file).unwrap();
        }
    }
}
