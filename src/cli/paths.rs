use std::path::{Path, PathBuf};

/// Why a path given on the command line cannot be used as an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileProblem {
    Missing(PathBuf),
    NotAFile(PathBuf),
}

/// The path must exist and be a regular file (symlinks are followed).
pub fn check_regular_file(path: &Path) -> Result<(), FileProblem> {
    if !path.exists() {
        return Err(FileProblem::Missing(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(FileProblem::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("env");
        std::fs::write(&file, "export GAUSSHOME=/opt\n").unwrap();

        assert_eq!(check_regular_file(&file), Ok(()));
        assert_eq!(
            check_regular_file(dir.path()),
            Err(FileProblem::NotAFile(dir.path().to_path_buf()))
        );
        let missing = dir.path().join("nope");
        assert_eq!(
            check_regular_file(&missing),
            Err(FileProblem::Missing(missing.clone()))
        );
    }
}
